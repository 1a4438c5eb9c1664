//! 描述文件结构校验。
//!
//! 原则：
//! - 一次遍历收集全部违规项，不在第一个问题处停止
//! - 数据形态问题只作为结果返回，不以 `Err`/panic 的方式中断控制流
//! - 无副作用
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::error::{PolicyShapeError, StructuralError, Violation};
use crate::graph::DependencyGraph;
use crate::profile::{
    ApplicationProfile, AssignmentIntent, CompareOp, DetectionRule, UninstallMethod,
    UninstallStrategy,
};
use crate::version::AppVersion;

/// 校验结果：违规项列表（为空表示通过）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    /// 是否通过校验。
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// 全部违规项（按发现顺序）。
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// 转换为 `Result`，便于在流水线中使用 `?`。
    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn push(&mut self, violation: impl Into<Violation>) {
        self.violations.push(violation.into());
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "共 {} 项问题", self.violations.len())?;
        for (i, v) in self.violations.iter().enumerate() {
            write!(f, "\n  {}. {v}", i + 1)?;
        }
        Ok(())
    }
}

/// 校验应用描述文件。
///
/// 检查项：
/// - 应用名称非空、版本号可解析
/// - 安装器名称唯一且非空、路径非空、超时大于 0
/// - `depends_on` 全部可解析，且不存在循环依赖（环路完整上报）
/// - 至少一条检测规则，且每条规则字段完整、版本号可解析
/// - `multi` 卸载策略同时提供 standard 与 force；`force` 策略不能关闭强制清理
/// - 快捷方式、部署设置与分配的基本形态
///
/// 返回值：
/// - [`ValidationReport`]：包含本次发现的全部违规项
pub fn validate(profile: &ApplicationProfile) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_application(profile, &mut report);
    check_installers(profile, &mut report);
    check_detection(profile, &mut report);
    check_uninstall(profile, &mut report);
    check_shortcuts(profile, &mut report);
    check_deployment(profile, &mut report);

    debug!(
        "校验完成: {} {}，违规项 {}",
        profile.name,
        profile.version,
        report.violations.len()
    );
    report
}

fn check_application(profile: &ApplicationProfile, report: &mut ValidationReport) {
    if profile.name.trim().is_empty() {
        report.push(StructuralError::EmptyField { field: "name" });
    }
    if AppVersion::parse(&profile.version).is_err() {
        report.push(StructuralError::MalformedVersion {
            field: "version".to_string(),
            value: profile.version.clone(),
        });
    }
}

fn check_installers(profile: &ApplicationProfile, report: &mut ValidationReport) {
    let names: HashSet<&str> = profile
        .installers
        .iter()
        .map(|i| i.name.as_str())
        .collect();

    let mut seen = HashSet::new();
    let mut reported_duplicates = HashSet::new();
    for (index, installer) in profile.installers.iter().enumerate() {
        if installer.name.trim().is_empty() {
            report.push(StructuralError::EmptyInstallerName { index: index + 1 });
        } else if !seen.insert(installer.name.as_str())
            && reported_duplicates.insert(installer.name.as_str())
        {
            report.push(StructuralError::DuplicateInstaller {
                name: installer.name.clone(),
            });
        }
        if installer.path.trim().is_empty() {
            report.push(StructuralError::EmptyInstallerPath {
                installer: installer.name.clone(),
            });
        }
        if installer.timeout_secs == 0 {
            report.push(StructuralError::ZeroTimeout {
                installer: installer.name.clone(),
            });
        }
        for dep in &installer.depends_on {
            if !names.contains(dep.as_str()) {
                report.push(StructuralError::DanglingDependency {
                    installer: installer.name.clone(),
                    missing: dep.clone(),
                });
            }
        }
    }

    if let Some(cycle) = DependencyGraph::build(&profile.installers).find_cycle() {
        report.push(cycle);
    }
}

fn check_detection(profile: &ApplicationProfile, report: &mut ValidationReport) {
    let rules = &profile.detection.rules;
    if rules.is_empty() {
        report.push(StructuralError::EmptyRuleSet);
        return;
    }

    let mut custom_ids = HashSet::new();
    for (i, rule) in rules.iter().enumerate() {
        let index = i + 1;
        match rule {
            DetectionRule::FileExists(r) => {
                if r.path.trim().is_empty() {
                    report.push(StructuralError::EmptyRuleField { index, field: "path" });
                }
                match &r.min_version {
                    Some(min) if AppVersion::parse(min).is_err() => {
                        report.push(StructuralError::MalformedVersion {
                            field: format!("detection.rules[{index}].min_version"),
                            value: min.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        let operator = r.effective_operator();
                        if operator != CompareOp::Exists {
                            report.push(StructuralError::MissingComparand { index, operator });
                        }
                    }
                }
            }
            DetectionRule::RegistryValue(r) => {
                if r.key.trim().is_empty() {
                    report.push(StructuralError::EmptyRuleField { index, field: "key" });
                }
                let has_expected = r.expected.as_deref().is_some_and(|e| !e.is_empty());
                if r.operator != CompareOp::Exists && !has_expected {
                    report.push(StructuralError::MissingComparand {
                        index,
                        operator: r.operator,
                    });
                }
            }
            DetectionRule::ProcessRunning(r) => {
                if r.process_name.trim().is_empty() {
                    report.push(StructuralError::EmptyRuleField {
                        index,
                        field: "process_name",
                    });
                }
            }
            DetectionRule::CustomScript(r) => {
                if r.id.trim().is_empty() {
                    report.push(StructuralError::EmptyRuleField { index, field: "id" });
                } else if !custom_ids.insert(r.id.as_str()) {
                    report.push(StructuralError::DuplicateCustomRule { id: r.id.clone() });
                }
            }
        }
    }
}

fn check_uninstall(profile: &ApplicationProfile, report: &mut ValidationReport) {
    let policy = &profile.uninstall;
    if policy.strategy == UninstallStrategy::Multi {
        if policy.standard.is_none() {
            report.push(PolicyShapeError::MultiMissingStandard);
        }
        if policy.force.is_none() {
            report.push(PolicyShapeError::MultiMissingForce);
        }
    }
    if policy.strategy == UninstallStrategy::Force && policy.force.as_ref().is_some_and(|f| !f.enabled) {
        report.push(PolicyShapeError::ForceStrategyDisabled);
    }
    if let Some(standard) = &policy.standard {
        let has_command = standard
            .command
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if standard.method == UninstallMethod::Command && !has_command {
            report.push(PolicyShapeError::MissingStandardCommand);
        }
    }
}

fn check_shortcuts(profile: &ApplicationProfile, report: &mut ValidationReport) {
    for shortcut in &profile.shortcuts {
        let reason = if shortcut.name.trim().is_empty() {
            Some("名称为空")
        } else if shortcut.target.trim().is_empty() {
            Some("目标路径为空")
        } else if shortcut.locations.is_empty() {
            Some("未指定放置位置")
        } else {
            None
        };
        if let Some(reason) = reason {
            report.push(StructuralError::InvalidShortcut {
                name: shortcut.name.clone(),
                reason,
            });
        }
    }
}

fn check_deployment(profile: &ApplicationProfile, report: &mut ValidationReport) {
    if profile.deployment.install_time_minutes == 0 {
        report.push(StructuralError::ZeroInstallTime);
    }
    for (i, assignment) in profile.assignments.iter().enumerate() {
        if assignment.target_groups.is_empty() {
            report.push(StructuralError::InvalidAssignment {
                index: i + 1,
                reason: "target_groups 为空",
            });
        }
        if assignment.deadline.is_some() && assignment.intent != AssignmentIntent::Required {
            report.push(StructuralError::InvalidAssignment {
                index: i + 1,
                reason: "仅 required 分配可以设置 deadline",
            });
        }
    }
}
