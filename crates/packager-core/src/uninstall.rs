//! 卸载步骤规划。
//!
//! 策略：
//! - `standard`：执行一个标准卸载步骤（注册表卸载命令或指定命令）
//! - `force`：按固定阶段依次执行：结束进程 → 删除注册表键 → 删除文件/目录 → 删除快捷方式，
//!   阶段内保持描述文件中的声明顺序
//! - `multi`：先执行标准卸载，之后附带一个回退块（强制清理），
//!   仅当标准卸载后检测结果仍为“已安装”时执行；`force.enabled = false` 时不生成回退块
//!
//! 说明：
//! - 是否执行回退块以检测结论为准，标准卸载的退出码只做记录
//! - 本模块只产出数据，不执行任何步骤
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::profile::{
    ForceUninstall, Shortcut, ShortcutLocation, StandardUninstall, UninstallMethod, UninstallPolicy,
    UninstallStrategy,
};

/// 单个卸载步骤。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UninstallStep {
    /// 按显示名称在注册表 Uninstall 项中查找卸载命令并执行。
    RunRegistryUninstall { display_name: String, wait: bool },
    /// 执行指定卸载命令。
    RunCommand { command: String, wait: bool },
    /// 结束进程。
    TerminateProcess { process_name: String },
    /// 删除注册表键（含根键）。
    RemoveRegistryKey { key: String },
    /// 删除文件或目录。
    RemovePath { path: String },
    /// 删除快捷方式。
    RemoveShortcut {
        name: String,
        location: ShortcutLocation,
    },
    /// 条件回退块。
    Fallback {
        condition: FallbackCondition,
        steps: Vec<UninstallStep>,
    },
}

impl UninstallStep {
    /// 步骤类型名称（用于日志与展示）。
    pub fn action(&self) -> &'static str {
        match self {
            UninstallStep::RunRegistryUninstall { .. } => "run_registry_uninstall",
            UninstallStep::RunCommand { .. } => "run_command",
            UninstallStep::TerminateProcess { .. } => "terminate_process",
            UninstallStep::RemoveRegistryKey { .. } => "remove_registry_key",
            UninstallStep::RemovePath { .. } => "remove_path",
            UninstallStep::RemoveShortcut { .. } => "remove_shortcut",
            UninstallStep::Fallback { .. } => "fallback",
        }
    }

    /// 强制清理阶段序号（非强制清理步骤返回 `None`）。
    pub fn force_phase(&self) -> Option<u8> {
        match self {
            UninstallStep::TerminateProcess { .. } => Some(0),
            UninstallStep::RemoveRegistryKey { .. } => Some(1),
            UninstallStep::RemovePath { .. } => Some(2),
            UninstallStep::RemoveShortcut { .. } => Some(3),
            _ => None,
        }
    }
}

/// 回退块的执行条件。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackCondition {
    /// 标准卸载后检测结论仍为“已安装”。
    StillDetected,
}

/// 标准卸载执行后的结果（由执行方提供）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardOutcome {
    /// 标准卸载程序的退出码（未能启动时为空）。
    pub exit_code: Option<i32>,
    /// 标准卸载后重新检测的结论。
    pub still_detected: bool,
}

/// 生成卸载步骤。
///
/// 参数：
/// - `policy`：卸载策略
/// - `app_name`：应用名称（标准卸载未指定显示名称时使用）
/// - `shortcuts`：需要在强制清理阶段删除的快捷方式
///
/// 返回值：
/// - 按执行顺序排列的步骤；`multi` 策略的强制清理包含在末尾的回退块中
pub fn plan_uninstall(
    policy: &UninstallPolicy,
    app_name: &str,
    shortcuts: &[Shortcut],
) -> Vec<UninstallStep> {
    let steps = match policy.strategy {
        UninstallStrategy::Standard => {
            vec![standard_step(policy.standard.as_ref(), app_name)]
        }
        UninstallStrategy::Force => force_steps(policy.force.as_ref(), shortcuts),
        UninstallStrategy::Multi => {
            if policy.standard.is_none() || policy.force.is_none() {
                warn!("multi 卸载策略缺少子配置，使用默认值补齐");
            }
            let mut steps = vec![standard_step(policy.standard.as_ref(), app_name)];
            if force_enabled(policy.force.as_ref()) {
                steps.push(UninstallStep::Fallback {
                    condition: FallbackCondition::StillDetected,
                    steps: force_steps(policy.force.as_ref(), shortcuts),
                });
            } else {
                debug!("强制清理已关闭，不生成回退块");
            }
            steps
        }
    };
    debug!("卸载步骤({:?}): {} 个", policy.strategy, steps.len());
    steps
}

fn standard_step(standard: Option<&StandardUninstall>, app_name: &str) -> UninstallStep {
    let default = StandardUninstall::default();
    let standard = standard.unwrap_or(&default);
    match (standard.method, standard.command.as_deref()) {
        (UninstallMethod::Command, Some(command)) if !command.trim().is_empty() => {
            UninstallStep::RunCommand {
                command: command.to_string(),
                wait: standard.wait,
            }
        }
        _ => UninstallStep::RunRegistryUninstall {
            display_name: standard
                .display_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| app_name.to_string()),
            wait: standard.wait,
        },
    }
}

fn force_enabled(force: Option<&ForceUninstall>) -> bool {
    force.map_or(true, |f| f.enabled)
}

fn force_steps(force: Option<&ForceUninstall>, shortcuts: &[Shortcut]) -> Vec<UninstallStep> {
    if !force_enabled(force) {
        return Vec::new();
    }
    let default = ForceUninstall::default();
    let force = force.unwrap_or(&default);

    let processes = force
        .kill_processes
        .iter()
        .map(|p| UninstallStep::TerminateProcess {
            process_name: p.clone(),
        });
    let registry = force
        .remove_registry
        .iter()
        .map(|k| UninstallStep::RemoveRegistryKey { key: k.clone() });
    let paths = force
        .remove_paths
        .iter()
        .map(|p| UninstallStep::RemovePath { path: p.clone() });
    let links = shortcuts.iter().flat_map(|s| {
        s.locations.iter().map(move |&location| UninstallStep::RemoveShortcut {
            name: s.name.clone(),
            location,
        })
    });

    processes.chain(registry).chain(paths).chain(links).collect()
}

/// 判断回退块是否需要执行。
pub fn fallback_required(condition: FallbackCondition, outcome: &StandardOutcome) -> bool {
    match condition {
        FallbackCondition::StillDetected => {
            if let Some(code) = outcome.exit_code {
                debug!("标准卸载退出码: {code}");
            }
            outcome.still_detected
        }
    }
}

/// 展开卸载计划，得到给定标准卸载结果下需要执行的步骤。
///
/// 说明：
/// - 回退块满足条件时展开为其内部步骤，否则整体跳过
/// - 不含回退块的计划原样返回
pub fn steps_to_execute<'a>(
    steps: &'a [UninstallStep],
    outcome: &StandardOutcome,
) -> Vec<&'a UninstallStep> {
    let mut out = Vec::with_capacity(steps.len());
    for step in steps {
        match step {
            UninstallStep::Fallback { condition, steps } => {
                if fallback_required(*condition, outcome) {
                    out.extend(steps_to_execute(steps, outcome));
                } else {
                    debug!("跳过回退块（{condition:?} 不成立）");
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shortcut(name: &str, locations: &[ShortcutLocation]) -> Shortcut {
        Shortcut {
            name: name.to_string(),
            target: format!(r"C:\App\{name}.exe"),
            locations: locations.to_vec(),
            icon: None,
            arguments: None,
            description: None,
        }
    }

    fn force() -> ForceUninstall {
        ForceUninstall {
            enabled: true,
            kill_processes: vec!["app.exe".to_string(), "helper.exe".to_string()],
            remove_registry: vec![r"HKLM\SOFTWARE\Vendor".to_string()],
            remove_paths: vec![r"C:\App".to_string()],
        }
    }

    #[test]
    fn standard_defaults_to_registry_lookup_by_app_name() {
        let policy = UninstallPolicy {
            strategy: UninstallStrategy::Standard,
            standard: None,
            force: None,
        };
        let steps = plan_uninstall(&policy, "Firebird", &[]);
        assert_eq!(
            steps,
            [UninstallStep::RunRegistryUninstall {
                display_name: "Firebird".to_string(),
                wait: true,
            }]
        );
    }

    #[test]
    fn standard_command_method_runs_command() {
        let policy = UninstallPolicy {
            strategy: UninstallStrategy::Standard,
            standard: Some(StandardUninstall {
                method: UninstallMethod::Command,
                command: Some("msiexec /x {GUID} /qn".to_string()),
                display_name: None,
                wait: false,
            }),
            force: None,
        };
        let steps = plan_uninstall(&policy, "App", &[]);
        assert_eq!(
            steps,
            [UninstallStep::RunCommand {
                command: "msiexec /x {GUID} /qn".to_string(),
                wait: false,
            }]
        );
    }

    #[test]
    fn force_phases_follow_fixed_order() {
        let policy = UninstallPolicy {
            strategy: UninstallStrategy::Force,
            standard: None,
            force: Some(force()),
        };
        let shortcuts = [shortcut(
            "App",
            &[ShortcutLocation::Desktop, ShortcutLocation::StartMenu],
        )];
        let steps = plan_uninstall(&policy, "App", &shortcuts);
        let actions: Vec<&str> = steps.iter().map(UninstallStep::action).collect();
        assert_eq!(
            actions,
            [
                "terminate_process",
                "terminate_process",
                "remove_registry_key",
                "remove_path",
                "remove_shortcut",
                "remove_shortcut",
            ]
        );
        assert_eq!(
            steps[0],
            UninstallStep::TerminateProcess {
                process_name: "app.exe".to_string()
            }
        );
        assert_eq!(
            steps[5],
            UninstallStep::RemoveShortcut {
                name: "App".to_string(),
                location: ShortcutLocation::StartMenu,
            }
        );
    }

    #[test]
    fn force_without_section_only_removes_shortcuts() {
        let policy = UninstallPolicy {
            strategy: UninstallStrategy::Force,
            standard: None,
            force: None,
        };
        let steps = plan_uninstall(&policy, "App", &[shortcut("App", &[ShortcutLocation::Desktop])]);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action(), "remove_shortcut");
    }

    #[test]
    fn multi_wraps_force_in_still_detected_fallback() {
        let policy = UninstallPolicy {
            strategy: UninstallStrategy::Multi,
            standard: Some(StandardUninstall::default()),
            force: Some(force()),
        };
        let steps = plan_uninstall(&policy, "App", &[]);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].action(), "run_registry_uninstall");
        match &steps[1] {
            UninstallStep::Fallback { condition, steps } => {
                assert_eq!(*condition, FallbackCondition::StillDetected);
                assert_eq!(steps.len(), 4);
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[test]
    fn multi_with_force_disabled_has_no_fallback() {
        let policy = UninstallPolicy {
            strategy: UninstallStrategy::Multi,
            standard: Some(StandardUninstall::default()),
            force: Some(ForceUninstall {
                enabled: false,
                ..force()
            }),
        };
        let steps = plan_uninstall(&policy, "App", &[shortcut("App", &[ShortcutLocation::Desktop])]);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action(), "run_registry_uninstall");

        let lingering = StandardOutcome {
            exit_code: Some(0),
            still_detected: true,
        };
        assert_eq!(steps_to_execute(&steps, &lingering).len(), 1);
    }

    #[test]
    fn force_section_enabled_by_default() {
        let force: ForceUninstall = serde_json::from_str(r#"{ "kill_processes": ["app.exe"] }"#).unwrap();
        assert!(force.enabled);
        assert!(ForceUninstall::default().enabled);
    }

    #[test]
    fn fallback_follows_detection_not_exit_code() {
        let policy = UninstallPolicy {
            strategy: UninstallStrategy::Multi,
            standard: Some(StandardUninstall::default()),
            force: Some(force()),
        };
        let steps = plan_uninstall(&policy, "App", &[]);

        let clean = StandardOutcome {
            exit_code: Some(1603),
            still_detected: false,
        };
        let run = steps_to_execute(&steps, &clean);
        assert_eq!(run.len(), 1);

        let lingering = StandardOutcome {
            exit_code: Some(0),
            still_detected: true,
        };
        let run = steps_to_execute(&steps, &lingering);
        assert_eq!(run.len(), 5);
        assert_eq!(run[1].action(), "terminate_process");
        assert!(run.iter().all(|s| s.action() != "fallback"));
    }

    #[test]
    fn steps_serialize_with_action_tag() {
        let step = UninstallStep::RemoveShortcut {
            name: "App".to_string(),
            location: ShortcutLocation::StartMenu,
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["action"], "remove_shortcut");
        assert_eq!(json["location"], "start_menu");
    }
}
