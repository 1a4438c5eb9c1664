//! 规划流水线：未校验 → 已校验 → 已排序 → 计划。
//!
//! 每个阶段用一个类型表示，转换消耗上一阶段的值：
//! - [`ValidatedProfile::new`]：结构校验，失败时返回完整的校验报告
//! - [`ValidatedProfile::resolve`]：解析安装顺序，失败时返回精确环路
//! - [`ResolvedProfile::plan`]：组装计划（不会失败）
//!
//! 任一阶段失败即停止，不产出部分计划。
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use tracing::{debug, info};

use crate::error::PipelineError;
use crate::graph::resolve_order;
use crate::plan::{shortcut_steps, InstallStep, Plan, PlanApplication};
use crate::profile::{ApplicationProfile, Installer};
use crate::uninstall::plan_uninstall;
use crate::validate::validate;

/// 已通过结构校验的描述文件。
#[derive(Debug, Clone, Copy)]
pub struct ValidatedProfile<'a> {
    profile: &'a ApplicationProfile,
}

impl<'a> ValidatedProfile<'a> {
    /// 校验描述文件。
    ///
    /// 异常处理：
    /// - 存在任何违规项时返回 [`PipelineError::Invalid`]，报告中包含全部违规项
    pub fn new(profile: &'a ApplicationProfile) -> Result<Self, PipelineError> {
        let report = validate(profile);
        if !report.is_valid() {
            return Err(PipelineError::Invalid(report));
        }
        debug!("描述文件校验通过: {} {}", profile.name, profile.version);
        Ok(Self { profile })
    }

    pub fn profile(&self) -> &'a ApplicationProfile {
        self.profile
    }

    /// 解析安装顺序。
    pub fn resolve(self) -> Result<ResolvedProfile<'a>, PipelineError> {
        let order = resolve_order(&self.profile.installers)?;
        Ok(ResolvedProfile {
            profile: self.profile,
            order,
        })
    }
}

/// 已确定安装顺序的描述文件。
#[derive(Debug, Clone)]
pub struct ResolvedProfile<'a> {
    profile: &'a ApplicationProfile,
    order: Vec<&'a Installer>,
}

impl<'a> ResolvedProfile<'a> {
    pub fn profile(&self) -> &'a ApplicationProfile {
        self.profile
    }

    /// 安装顺序。
    pub fn order(&self) -> &[&'a Installer] {
        &self.order
    }

    /// 组装部署计划。
    pub fn plan(self) -> Plan {
        let profile = self.profile;
        let install_steps: Vec<InstallStep> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, installer)| InstallStep::new(i + 1, installer))
            .collect();

        let shortcut_steps = if profile.auto_create_shortcuts {
            let last = install_steps.last().map(|s| s.installer.as_str());
            shortcut_steps(&profile.shortcuts, last)
        } else {
            Vec::new()
        };

        let uninstall_steps = plan_uninstall(&profile.uninstall, &profile.name, &profile.shortcuts);

        info!(
            "已生成部署计划: {} {}（安装 {} 步，卸载 {} 步，快捷方式 {} 步）",
            profile.name,
            profile.version,
            install_steps.len(),
            uninstall_steps.len(),
            shortcut_steps.len()
        );

        Plan {
            application: PlanApplication::from(profile),
            install_steps,
            detection: profile.detection.clone(),
            uninstall_steps,
            shortcut_steps,
            deployment: profile.deployment.clone(),
            assignments: profile.assignments.clone(),
            supersedes: profile.supersedes.clone(),
            dependencies: profile.dependencies.clone(),
            company_portal: profile.company_portal.clone(),
            testing: profile.testing,
        }
    }
}

/// 由描述文件生成部署计划。
///
/// 返回值：
/// - 成功：完整的部署计划
///
/// 异常处理：
/// - 校验失败返回 [`PipelineError::Invalid`]（含环路在内的全部违规项）
/// - 排序失败返回 [`PipelineError::Cycle`]
pub fn render(profile: &ApplicationProfile) -> Result<Plan, PipelineError> {
    Ok(ValidatedProfile::new(profile)?.resolve()?.plan())
}
