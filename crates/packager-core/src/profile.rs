//! 应用描述文件（profile）数据模型定义。
//!
//! 该模块描述“一个应用如何打包、检测、卸载”需要的全部输入：
//! - 应用信息（名称/版本/发布者）
//! - 安装器列表（静默参数、超时、依赖关系）
//! - 检测规则（文件/注册表/进程/自定义脚本）与组合方式
//! - 卸载策略（标准/强制/先标准后强制）
//! - 快捷方式、部署设置、分配与替代关系
//!
//! 约定：
//! - 大部分字段通过 `#[serde(default)]` 提供默认值，以便描述文件向前兼容
//! - 该模块仅定义数据结构，不执行任何 IO；结构校验见 [`crate::validate`]
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::version::AppVersion;

/// 应用描述根对象。
///
/// 说明：
/// - `installers` 的声明顺序参与安装顺序的确定（无依赖约束时按声明顺序）
/// - `name` + `version` 共同构成应用的逻辑身份（见 [`AppIdentity`]）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationProfile {
    /// 应用显示名称。
    pub name: String,
    #[serde(deserialize_with = "scalar::string")]
    /// 应用版本号（需可按语义化版本比较）。
    pub version: String,
    /// 发布者。
    pub publisher: String,
    #[serde(default)]
    /// 应用描述（用于展示）。
    pub description: String,
    #[serde(default)]
    /// 安装器列表（按声明顺序）。
    pub installers: Vec<Installer>,
    #[serde(default)]
    /// 检测规则及组合方式。
    pub detection: DetectionSpec,
    #[serde(default)]
    /// 卸载策略。
    pub uninstall: UninstallPolicy,
    #[serde(default)]
    /// 快捷方式列表。
    pub shortcuts: Vec<Shortcut>,
    #[serde(default = "default_true")]
    /// 安装完成后是否补建快捷方式（缺失才创建）。
    pub auto_create_shortcuts: bool,
    #[serde(default)]
    /// 部署平台相关设置（透传给上传组件）。
    pub deployment: DeploymentSettings,
    #[serde(default)]
    /// 分配策略（透传给上传组件）。
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    /// 被本应用替代的旧应用名称/ID。
    pub supersedes: Vec<String>,
    #[serde(default)]
    /// 依赖的其他已发布应用名称/ID（透传给上传组件）。
    pub dependencies: Vec<String>,
    #[serde(default)]
    /// 公司门户展示信息。
    pub company_portal: CompanyPortal,
    #[serde(default)]
    /// 打包后验证项（沙箱中逐项执行）。
    pub testing: TestingConfig,
}

impl ApplicationProfile {
    /// 返回应用的逻辑身份（名称 + 版本）。
    pub fn identity(&self) -> AppIdentity {
        AppIdentity {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }

    /// 按名称查找安装器。
    pub fn installer(&self, name: &str) -> Option<&Installer> {
        self.installers.iter().find(|i| i.name == name)
    }
}

/// 应用逻辑身份（名称 + 版本），用于替代关系比较。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub name: String,
    pub version: String,
}

impl AppIdentity {
    /// 判断当前应用是否替代 `other`。
    ///
    /// 返回值：
    /// - `true`：名称相同（忽略大小写）且当前版本严格更高
    /// - `false`：名称不同、版本不更高，或任一版本无法解析
    pub fn supersedes(&self, other: &AppIdentity) -> bool {
        if !self.name.eq_ignore_ascii_case(&other.name) {
            return false;
        }
        match (
            AppVersion::parse(&self.version),
            AppVersion::parse(&other.version),
        ) {
            (Ok(mine), Ok(theirs)) => mine.cmp(&theirs) == Ordering::Greater,
            _ => false,
        }
    }
}

/// 单个安装器定义（一个可执行组件）。
///
/// 约定：
/// - `name` 在同一 profile 内唯一
/// - `depends_on` 只能引用同一 profile 内的安装器名称，且不得成环
/// - `timeout_secs` 与 `wait_for_completion` 仅作为数据透传给执行方
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installer {
    /// 安装器逻辑名称（唯一）。
    pub name: String,
    /// 安装器文件路径（通常相对安装包根目录）。
    pub path: String,
    #[serde(default)]
    /// 静默安装参数。
    pub silent_args: String,
    #[serde(default)]
    /// 依赖的其他安装器名称。
    pub depends_on: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    /// 超时时间（秒）。
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    /// 是否等待安装器退出。
    pub wait_for_completion: bool,
}

/// 检测规则集合及其组合方式。
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DetectionSpec {
    #[serde(default)]
    /// 组合方式（默认 `all`）。
    pub mode: CombinationMode,
    #[serde(default)]
    /// 检测规则列表（不允许为空，由校验阶段拒绝）。
    pub rules: Vec<DetectionRule>,
}

/// 检测规则组合方式。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CombinationMode {
    #[default]
    /// 逻辑与：全部规则为真才视为已安装。
    All,
    /// 逻辑或：任一规则为真即视为已安装。
    Any,
}

/// 单条检测规则。
///
/// 序列化格式：
/// - 使用 `#[serde(tag = "type")]`，在文档中通过 `type` 字段区分规则类型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectionRule {
    /// 文件存在（可附带版本比较）。
    FileExists(FileRule),
    /// 注册表值检测。
    RegistryValue(RegistryRule),
    /// 进程是否运行。
    ProcessRunning(ProcessRule),
    /// 自定义脚本检测（脚本由外部执行，结果以布尔值注入）。
    CustomScript(CustomScriptRule),
}

impl DetectionRule {
    /// 规则类型名称（用于日志与诊断）。
    pub fn kind(&self) -> &'static str {
        match self {
            DetectionRule::FileExists(_) => "file_exists",
            DetectionRule::RegistryValue(_) => "registry_value",
            DetectionRule::ProcessRunning(_) => "process_running",
            DetectionRule::CustomScript(_) => "custom_script",
        }
    }
}

/// 文件存在检测规则。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRule {
    /// 目标文件路径（允许 `%ProgramFiles%` 等环境变量引用）。
    pub path: String,
    #[serde(default, deserialize_with = "scalar::optional_string")]
    /// 版本比较基准（为空则只检测存在性）。
    pub min_version: Option<String>,
    #[serde(default)]
    /// 版本比较运算符（提供 `min_version` 时默认 `greater_or_equal`）。
    pub operator: Option<CompareOp>,
}

impl FileRule {
    /// 实际生效的比较运算符。
    pub fn effective_operator(&self) -> CompareOp {
        match (self.operator, &self.min_version) {
            (Some(op), _) => op,
            (None, Some(_)) => CompareOp::GreaterOrEqual,
            (None, None) => CompareOp::Exists,
        }
    }
}

/// 注册表值检测规则。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryRule {
    /// 根键。
    pub hive: RegistryHive,
    /// 子键路径（不含根键）。
    pub key: String,
    #[serde(default)]
    /// 值名（为空表示默认值）。
    pub value_name: Option<String>,
    #[serde(default)]
    /// 比较运算符（默认 `exists`）。
    pub operator: CompareOp,
    #[serde(default, deserialize_with = "scalar::optional_string")]
    /// 期望值（`exists` 之外的运算符必填）。
    pub expected: Option<String>,
}

/// 进程运行检测规则。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessRule {
    /// 进程名（如 `app.exe`，匹配时忽略大小写）。
    pub process_name: String,
}

/// 自定义脚本检测规则。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomScriptRule {
    /// 规则 ID（用于关联外部注入的执行结果，唯一）。
    pub id: String,
    #[serde(default)]
    /// 脚本内容（对本库不透明）。
    pub script: String,
}

/// 比较运算符。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    #[default]
    #[serde(alias = "Exists")]
    /// 仅检测存在，不比较值。
    Exists,
    #[serde(alias = "Equals")]
    /// 等于。
    Equals,
    #[serde(alias = "GreaterOrEqual")]
    /// 大于等于。
    GreaterOrEqual,
    #[serde(alias = "GreaterThan")]
    /// 大于。
    GreaterThan,
    #[serde(alias = "LessOrEqual")]
    /// 小于等于。
    LessOrEqual,
    #[serde(alias = "LessThan")]
    /// 小于。
    LessThan,
}

impl CompareOp {
    /// 判断比较结果是否满足运算符。
    ///
    /// 参数：
    /// - `ordering`：观测值相对期望值的大小关系
    ///
    /// 返回值：
    /// - `Exists` 恒为 `true`（存在性已由调用方确认）
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Exists => true,
            CompareOp::Equals => ordering == Ordering::Equal,
            CompareOp::GreaterOrEqual => ordering != Ordering::Less,
            CompareOp::GreaterThan => ordering == Ordering::Greater,
            CompareOp::LessOrEqual => ordering != Ordering::Greater,
            CompareOp::LessThan => ordering == Ordering::Less,
        }
    }
}

/// 注册表根键枚举。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegistryHive {
    #[serde(alias = "hklm", alias = "HKEY_LOCAL_MACHINE")]
    /// HKEY_LOCAL_MACHINE。
    Hklm,
    #[serde(alias = "hkcu", alias = "HKEY_CURRENT_USER")]
    /// HKEY_CURRENT_USER。
    Hkcu,
    #[serde(alias = "hkcr", alias = "HKEY_CLASSES_ROOT")]
    /// HKEY_CLASSES_ROOT。
    Hkcr,
    #[serde(alias = "hku", alias = "HKEY_USERS")]
    /// HKEY_USERS。
    Hku,
}

impl RegistryHive {
    /// 根键缩写（用于诊断信息与观测快照的键）。
    pub fn short_name(self) -> &'static str {
        match self {
            RegistryHive::Hklm => "HKLM",
            RegistryHive::Hkcu => "HKCU",
            RegistryHive::Hkcr => "HKCR",
            RegistryHive::Hku => "HKU",
        }
    }
}

/// 卸载策略。
///
/// 约束：
/// - `strategy = multi` 时 `standard` 与 `force` 必须同时提供
/// - `standard`/`force` 策略缺少对应子配置时使用默认值
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UninstallPolicy {
    #[serde(default)]
    /// 卸载策略（默认 `multi`）。
    pub strategy: UninstallStrategy,
    #[serde(default)]
    /// 标准卸载配置。
    pub standard: Option<StandardUninstall>,
    #[serde(default)]
    /// 强制清理配置。
    pub force: Option<ForceUninstall>,
}

/// 卸载策略枚举。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UninstallStrategy {
    /// 仅标准卸载。
    Standard,
    /// 仅强制清理。
    Force,
    #[default]
    /// 先标准卸载，检测仍为已安装时再强制清理。
    Multi,
}

/// 标准卸载配置。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardUninstall {
    #[serde(default)]
    /// 卸载方式（默认从注册表读取卸载命令）。
    pub method: UninstallMethod,
    #[serde(default)]
    /// `method = command` 时执行的卸载命令。
    pub command: Option<String>,
    #[serde(default)]
    /// 注册表 Uninstall 项中的显示名称（为空则使用应用名称）。
    pub display_name: Option<String>,
    #[serde(default = "default_true")]
    /// 是否等待卸载程序退出。
    pub wait: bool,
}

impl Default for StandardUninstall {
    fn default() -> Self {
        Self {
            method: UninstallMethod::Registry,
            command: None,
            display_name: None,
            wait: true,
        }
    }
}

/// 标准卸载方式。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UninstallMethod {
    #[default]
    /// 从注册表 Uninstall 项读取 `UninstallString` 执行。
    Registry,
    /// 执行描述文件中给定的命令。
    Command,
}

/// 强制清理配置。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForceUninstall {
    #[serde(default = "default_true")]
    /// 是否启用强制清理（`multi` 策略下为 `false` 时不生成回退块）。
    pub enabled: bool,
    #[serde(default)]
    /// 需要结束的进程名。
    pub kill_processes: Vec<String>,
    #[serde(default)]
    /// 需要删除的注册表键（含根键，如 `HKLM\SOFTWARE\Vendor`）。
    pub remove_registry: Vec<String>,
    #[serde(default)]
    /// 需要删除的文件/目录。
    pub remove_paths: Vec<String>,
}

impl Default for ForceUninstall {
    fn default() -> Self {
        Self {
            enabled: true,
            kill_processes: Vec::new(),
            remove_registry: Vec::new(),
            remove_paths: Vec::new(),
        }
    }
}

/// 快捷方式定义。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shortcut {
    /// 快捷方式显示名称（不含 `.lnk`）。
    pub name: String,
    /// 目标可执行文件路径。
    pub target: String,
    #[serde(default)]
    /// 放置位置。
    pub locations: Vec<ShortcutLocation>,
    #[serde(default)]
    /// 图标路径（可选）。
    pub icon: Option<String>,
    #[serde(default)]
    /// 启动参数（可选）。
    pub arguments: Option<String>,
    #[serde(default)]
    /// 备注（鼠标悬停提示）。
    pub description: Option<String>,
}

/// 快捷方式放置位置。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutLocation {
    #[serde(alias = "Desktop")]
    /// 公共桌面。
    Desktop,
    #[serde(alias = "StartMenu")]
    /// 开始菜单 Programs 目录。
    StartMenu,
}

/// 部署平台设置（透传数据）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentSettings {
    #[serde(default = "default_install_command")]
    /// 平台调用的安装命令。
    pub install_command: String,
    #[serde(default = "default_uninstall_command")]
    /// 平台调用的卸载命令。
    pub uninstall_command: String,
    #[serde(default = "default_install_time_minutes")]
    /// 预计安装时长（分钟）。
    pub install_time_minutes: u32,
    #[serde(default = "default_true")]
    /// 是否允许用户从门户卸载“可用”分配的应用。
    pub allow_available_uninstall: bool,
    #[serde(default)]
    /// 系统要求。
    pub requirements: Requirements,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            install_command: default_install_command(),
            uninstall_command: default_uninstall_command(),
            install_time_minutes: default_install_time_minutes(),
            allow_available_uninstall: true,
            requirements: Requirements::default(),
        }
    }
}

/// 系统要求。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Requirements {
    #[serde(default = "default_minimum_os")]
    /// 最低 Windows 10 版本号（如 `1809`）。
    pub minimum_os: String,
    #[serde(default)]
    /// 处理器架构。
    pub architecture: Architecture,
    #[serde(default = "default_disk_space_mb")]
    /// 最低磁盘空间（MB）。
    pub minimum_disk_space_mb: u64,
    #[serde(default = "default_memory_mb")]
    /// 最低内存（MB）。
    pub minimum_memory_mb: u64,
}

impl Default for Requirements {
    fn default() -> Self {
        Self {
            minimum_os: default_minimum_os(),
            architecture: Architecture::default(),
            minimum_disk_space_mb: default_disk_space_mb(),
            minimum_memory_mb: default_memory_mb(),
        }
    }
}

/// 处理器架构。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    X86,
    #[default]
    X64,
    Arm64,
}

/// 分配策略（将应用分配给哪些组、以何种意图）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    /// 分配意图。
    pub intent: AssignmentIntent,
    /// 目标组（组 ID 或名称，不能为空）。
    pub target_groups: Vec<String>,
    #[serde(default = "default_true")]
    /// 是否向终端用户显示通知。
    pub notification: bool,
    #[serde(default)]
    /// 安装截止时间（仅 `required` 意图有效）。
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    /// 重启宽限期（分钟）。
    pub restart_grace_period_minutes: Option<u32>,
    #[serde(default = "default_true")]
    /// 是否在公司门户中展示。
    pub available_in_company_portal: bool,
}

/// 公司门户展示信息（透传数据）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyPortal {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    /// 图标文件路径。
    pub icon_path: Option<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub information_url: Option<String>,
    #[serde(default)]
    pub privacy_url: Option<String>,
    #[serde(default)]
    /// 是否作为推荐应用展示。
    pub featured: bool,
    #[serde(default = "default_category")]
    /// 分类（默认 `Productivity`）。
    pub category: Option<String>,
}

impl Default for CompanyPortal {
    fn default() -> Self {
        Self {
            description: String::new(),
            icon_path: None,
            screenshots: Vec::new(),
            information_url: None,
            privacy_url: None,
            featured: false,
            category: default_category(),
        }
    }
}

/// 打包后验证项。
///
/// 说明：
/// - 各项默认开启；本库只规划，验证由执行方在沙箱中完成
/// - `verify_detection_after_uninstall` 即卸载后检测结论应为“未安装”
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestingConfig {
    #[serde(default = "default_true")]
    pub sandbox_enabled: bool,
    #[serde(default = "default_true")]
    pub verify_install: bool,
    #[serde(default = "default_true")]
    pub verify_detection: bool,
    #[serde(default = "default_true")]
    pub verify_shortcuts: bool,
    #[serde(default = "default_true")]
    pub verify_uninstall: bool,
    #[serde(default = "default_true")]
    pub verify_detection_after_uninstall: bool,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            sandbox_enabled: true,
            verify_install: true,
            verify_detection: true,
            verify_shortcuts: true,
            verify_uninstall: true,
            verify_detection_after_uninstall: true,
        }
    }
}

/// 分配意图。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentIntent {
    Available,
    Required,
    Uninstall,
}

fn default_true() -> bool {
    true
}

fn default_category() -> Option<String> {
    Some("Productivity".to_string())
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_install_command() -> String {
    "powershell.exe -ExecutionPolicy Bypass -File install.ps1".to_string()
}

fn default_uninstall_command() -> String {
    "powershell.exe -ExecutionPolicy Bypass -File uninstall.ps1".to_string()
}

fn default_install_time_minutes() -> u32 {
    15
}

fn default_minimum_os() -> String {
    "1809".to_string()
}

fn default_disk_space_mb() -> u64 {
    100
}

fn default_memory_mb() -> u64 {
    512
}

/// 数字或字符串标量。
///
/// YAML 中未加引号的 `2.1`、`528040` 会被解析为数字，这里统一转为字符串。
/// 浮点数按最短表示输出，`2.10` 之类带尾随零的版本号需要加引号。
mod scalar {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
    }

    impl From<Scalar> for String {
        fn from(value: Scalar) -> Self {
            match value {
                Scalar::Text(s) => s,
                Scalar::Unsigned(n) => n.to_string(),
                Scalar::Signed(n) => n.to_string(),
                Scalar::Float(n) => n.to_string(),
            }
        }
    }

    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Scalar::deserialize(deserializer).map(String::from)
    }

    pub fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
    }
}
