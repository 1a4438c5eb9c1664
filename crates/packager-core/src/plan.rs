//! 部署计划数据结构。
//!
//! 计划是规划流水线的最终产物，只包含数据：
//! 安装步骤（已按依赖排序）、检测规则、卸载步骤、快捷方式步骤以及透传的部署设置。
//! 执行方（安装脚本/执行器）按计划执行，本 crate 不执行任何步骤。
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use serde::{Deserialize, Serialize};

use crate::profile::{
    AppIdentity, ApplicationProfile, Assignment, CompanyPortal, DeploymentSettings, DetectionSpec,
    Installer, Shortcut, ShortcutLocation, TestingConfig,
};
use crate::result_code::ResultCodes;
use crate::uninstall::UninstallStep;

/// 部署计划。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub application: PlanApplication,
    pub install_steps: Vec<InstallStep>,
    pub detection: DetectionSpec,
    pub uninstall_steps: Vec<UninstallStep>,
    pub shortcut_steps: Vec<ShortcutStep>,
    pub deployment: DeploymentSettings,
    pub assignments: Vec<Assignment>,
    pub supersedes: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub company_portal: CompanyPortal,
    #[serde(default)]
    pub testing: TestingConfig,
}

impl Plan {
    /// 安装器名称，按安装顺序排列。
    pub fn install_order(&self) -> Vec<&str> {
        self.install_steps
            .iter()
            .map(|s| s.installer.as_str())
            .collect()
    }

    /// 应用标识（名称 + 版本）。
    pub fn identity(&self) -> AppIdentity {
        AppIdentity {
            name: self.application.name.clone(),
            version: self.application.version.clone(),
        }
    }

    /// 以格式化 JSON 输出计划。
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// 计划中的应用信息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanApplication {
    pub name: String,
    pub version: String,
    pub publisher: String,
    #[serde(default)]
    pub description: String,
}

impl From<&ApplicationProfile> for PlanApplication {
    fn from(profile: &ApplicationProfile) -> Self {
        Self {
            name: profile.name.clone(),
            version: profile.version.clone(),
            publisher: profile.publisher.clone(),
            description: profile.description.clone(),
        }
    }
}

/// 单个安装步骤。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallStep {
    /// 执行序号（从 1 开始）。
    pub sequence: usize,
    /// 安装器名称。
    pub installer: String,
    /// 安装程序路径。
    pub path: String,
    /// 静默安装参数。
    pub silent_args: String,
    /// 超时时间（秒）。
    pub timeout_secs: u64,
    /// 是否等待安装程序退出。
    pub wait_for_completion: bool,
    /// 退出码分类表。
    pub result_codes: ResultCodes,
}

impl InstallStep {
    pub(crate) fn new(sequence: usize, installer: &Installer) -> Self {
        Self {
            sequence,
            installer: installer.name.clone(),
            path: installer.path.clone(),
            silent_args: installer.silent_args.clone(),
            timeout_secs: installer.timeout_secs,
            wait_for_completion: installer.wait_for_completion,
            result_codes: ResultCodes::default(),
        }
    }
}

/// 快捷方式步骤。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ShortcutStep {
    /// 快捷方式不存在时创建（已存在则保持不变）。
    EnsureShortcut {
        name: String,
        target: String,
        #[serde(default)]
        icon: Option<String>,
        #[serde(default)]
        arguments: Option<String>,
        #[serde(default)]
        description: Option<String>,
        location: ShortcutLocation,
        /// 在该安装器完成后执行（无安装器时为空）。
        #[serde(default)]
        after_installer: Option<String>,
    },
}

/// 为每个快捷方式的每个位置生成一个创建步骤。
pub(crate) fn shortcut_steps(shortcuts: &[Shortcut], after_installer: Option<&str>) -> Vec<ShortcutStep> {
    shortcuts
        .iter()
        .flat_map(|s| {
            s.locations
                .iter()
                .map(move |&location| ShortcutStep::EnsureShortcut {
                    name: s.name.clone(),
                    target: s.target.clone(),
                    icon: s.icon.clone(),
                    arguments: s.arguments.clone(),
                    description: s.description.clone(),
                    location,
                    after_installer: after_installer.map(str::to_string),
                })
        })
        .collect()
}
