//! 规划核心的错误类型。
//!
//! 分类：
//! - [`StructuralError`]：结构性问题（重名、悬空引用、版本号非法、检测规则为空等）
//! - [`PolicyShapeError`]：卸载策略形态问题（multi 缺少子配置等）
//! - [`CycleError`]：安装器之间存在循环依赖，携带完整环路
//!
//! 以上错误均不可在核心内部恢复；校验阶段会一次性收集全部问题（见 [`crate::validate`]），
//! 便于上层一次展示所有违规项。
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use thiserror::Error;

use crate::profile::CompareOp;
use crate::validate::ValidationReport;

/// 结构性错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("应用字段为空: {field}")]
    EmptyField { field: &'static str },
    #[error("第 {index} 个安装器名称为空")]
    EmptyInstallerName { index: usize },
    #[error("安装器名称重复: {name}")]
    DuplicateInstaller { name: String },
    #[error("安装器缺少路径: {installer}")]
    EmptyInstallerPath { installer: String },
    #[error("安装器 {installer} 依赖不存在的安装器: {missing}")]
    DanglingDependency { installer: String, missing: String },
    #[error("安装器超时时间必须大于 0: {installer}")]
    ZeroTimeout { installer: String },
    #[error("版本号无法解析（{field}）: {value}")]
    MalformedVersion { field: String, value: String },
    #[error("未提供任何检测规则")]
    EmptyRuleSet,
    #[error("第 {index} 条检测规则缺少字段: {field}")]
    EmptyRuleField { index: usize, field: &'static str },
    #[error("第 {index} 条检测规则的运算符 {operator:?} 缺少比较值")]
    MissingComparand { index: usize, operator: CompareOp },
    #[error("自定义检测规则 ID 重复: {id}")]
    DuplicateCustomRule { id: String },
    #[error("快捷方式无效（{name}）: {reason}")]
    InvalidShortcut { name: String, reason: &'static str },
    #[error("第 {index} 个分配无效: {reason}")]
    InvalidAssignment { index: usize, reason: &'static str },
    #[error("预计安装时长必须大于 0")]
    ZeroInstallTime,
}

/// 卸载策略形态错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyShapeError {
    #[error("卸载策略为 multi 时必须提供 standard 配置")]
    MultiMissingStandard,
    #[error("卸载策略为 multi 时必须提供 force 配置")]
    MultiMissingForce,
    #[error("标准卸载方式为 command 时必须提供非空 command")]
    MissingStandardCommand,
    #[error("卸载策略为 force 时不能关闭强制清理（force.enabled = false）")]
    ForceStrategyDisabled,
}

/// 循环依赖错误。
///
/// 说明：
/// - `cycle` 按依赖方向排列：`cycle[i]` 依赖 `cycle[i + 1]`，最后一个依赖第一个
/// - 自依赖时 `cycle` 只有一个元素
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("检测到循环依赖: {}", describe_cycle(.cycle))]
pub struct CycleError {
    pub cycle: Vec<String>,
}

impl CycleError {
    /// 以 `A -> B -> A` 的形式描述环路。
    pub fn describe(&self) -> String {
        describe_cycle(&self.cycle)
    }

    /// 环路是否包含指定安装器。
    pub fn contains(&self, name: &str) -> bool {
        self.cycle.iter().any(|n| n == name)
    }
}

fn describe_cycle(cycle: &[String]) -> String {
    let mut chain = cycle.to_vec();
    if let Some(first) = cycle.first() {
        chain.push(first.clone());
    }
    chain.join(" -> ")
}

/// 单条校验违规项。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    PolicyShape(#[from] PolicyShapeError),
    #[error(transparent)]
    CyclicDependency(#[from] CycleError),
}

/// 检测求值错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectionError {
    #[error("检测规则为空，无法给出已安装/未安装结论")]
    EmptyRuleSet,
}

/// 规划流水线错误：任一阶段失败即停止，不做部分规划。
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("描述文件校验失败: {0}")]
    Invalid(ValidationReport),
    #[error(transparent)]
    Cycle(#[from] CycleError),
}
