//! 检测规则求值（是否已安装）。
//!
//! 设计：
//! - 求值是输入的纯函数：同一组观测结果总得到同一结论
//! - 观测（文件是否存在/版本、注册表值、进程列表、自定义脚本结果）由外部通过
//!   [`Observations`] 提供；本模块不访问任何系统状态
//! - `all` 遇到第一个 false 即停止，`any` 遇到第一个 true 即停止；
//!   对实时探测而言，短路意味着后续规则不会被探测
//!
//! 比较规则：
//! - 文件版本：按 [`crate::version::AppVersion`] 的语义化版本顺序比较
//! - 注册表值：双方都是整数（十进制或 `0x` 十六进制）时按数值比较，
//!   否则双方都是版本号时按版本比较，否则只支持 `equals` 文本相等
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::DetectionError;
use crate::profile::{
    CombinationMode, CompareOp, DetectionRule, DetectionSpec, FileRule, RegistryHive, RegistryRule,
};
use crate::version;

/// 文件观测结果。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFacts {
    #[serde(default)]
    /// 文件版本（读取不到时为空）。
    pub version: Option<String>,
}

/// 外部观测来源。
///
/// 说明：
/// - 快照实现见 [`ObservationSet`]，实时探测实现位于 `packager-windows`
/// - 返回 `None`/`false` 均表示“不存在”
pub trait Observations {
    /// 文件是否存在及其版本。
    fn file(&self, path: &str) -> Option<FileFacts>;
    /// 注册表值（以字符串表示；DWORD/QWORD 为十进制）。
    fn registry_value(&self, hive: RegistryHive, key: &str, value_name: Option<&str>) -> Option<String>;
    /// 指定进程是否正在运行。
    fn process_running(&self, process_name: &str) -> bool;
    /// 自定义检测脚本的执行结果（未提供时为 `None`）。
    fn custom_result(&self, id: &str) -> Option<bool>;
}

/// 观测结果快照（可序列化，用于测试、离线求值与执行方回传）。
///
/// JSON 形态：
/// ```json
/// {
///   "files": { "C:\\App\\app.exe": { "version": "2.1.0" } },
///   "registry": { "HKLM\\SOFTWARE\\Vendor\\App": { "Version": "2.1.0" } },
///   "processes": ["app.exe"],
///   "custom": { "service-check": true }
/// }
/// ```
/// 注册表默认值使用空字符串作为值名。
///
/// 键的规范化：
/// - 路径、注册表键与值名在载入时统一转为小写，`/` 统一为 `\`，去掉末尾分隔符
/// - 规范化后相同的多个键只保留按原始键排序后的最后一个（注册表键合并其值）
/// - 查找时对查询做同样的规范化后精确匹配，同一快照总得到同一结论
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationSet {
    #[serde(default, deserialize_with = "normalized_files")]
    files: BTreeMap<String, FileFacts>,
    #[serde(default, deserialize_with = "normalized_registry")]
    registry: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub processes: Vec<String>,
    #[serde(default)]
    pub custom: BTreeMap<String, bool>,
}

impl ObservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个存在的文件（同一规范化路径后写覆盖先写）。
    pub fn with_file(mut self, path: &str, version: Option<&str>) -> Self {
        self.files.insert(
            normalize_key(path),
            FileFacts {
                version: version.map(str::to_string),
            },
        );
        self
    }

    /// 记录一个注册表值（`value_name` 为空表示默认值）。
    pub fn with_registry_value(
        mut self,
        hive: RegistryHive,
        key: &str,
        value_name: Option<&str>,
        data: &str,
    ) -> Self {
        self.registry
            .entry(normalize_key(&registry_path(hive, key)))
            .or_default()
            .insert(normalize_key(value_name.unwrap_or_default()), data.to_string());
        self
    }

    /// 记录一个正在运行的进程。
    pub fn with_process(mut self, name: &str) -> Self {
        self.processes.push(name.to_string());
        self
    }

    /// 记录自定义检测脚本的结果。
    pub fn with_custom(mut self, id: &str, result: bool) -> Self {
        self.custom.insert(id.to_string(), result);
        self
    }
}

impl Observations for ObservationSet {
    fn file(&self, path: &str) -> Option<FileFacts> {
        self.files.get(&normalize_key(path)).cloned()
    }

    fn registry_value(&self, hive: RegistryHive, key: &str, value_name: Option<&str>) -> Option<String> {
        self.registry
            .get(&normalize_key(&registry_path(hive, key)))
            .and_then(|values| values.get(&normalize_key(value_name.unwrap_or_default())))
            .cloned()
    }

    fn process_running(&self, process_name: &str) -> bool {
        self.processes.iter().any(|p| same_process(p, process_name))
    }

    fn custom_result(&self, id: &str) -> Option<bool> {
        self.custom.get(id).copied()
    }
}

fn normalized_files<'de, D>(deserializer: D) -> Result<BTreeMap<String, FileFacts>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, FileFacts>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(path, facts)| (normalize_key(&path), facts))
        .collect())
}

fn normalized_registry<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, BTreeMap<String, String>>::deserialize(deserializer)?;
    let mut out: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for (key, values) in raw {
        out.entry(normalize_key(&key))
            .or_default()
            .extend(values.into_iter().map(|(name, data)| (normalize_key(&name), data)));
    }
    Ok(out)
}

/// 单条规则的求值结果（用于诊断输出）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleVerdict {
    /// 规则序号（从 1 开始）。
    pub index: usize,
    /// 规则类型。
    pub kind: &'static str,
    /// 是否满足。
    pub matched: bool,
}

/// 按组合方式求值检测规则。
///
/// 参数：
/// - `rules`：检测规则（不允许为空）
/// - `mode`：组合方式
/// - `observations`：外部观测结果
///
/// 返回值：
/// - `Ok(true)`：视为已安装
/// - `Ok(false)`：视为未安装
///
/// 异常处理：
/// - 规则为空时返回 [`DetectionError::EmptyRuleSet`]，不给出任何结论
pub fn evaluate_rules<O: Observations + ?Sized>(
    rules: &[DetectionRule],
    mode: CombinationMode,
    observations: &O,
) -> Result<bool, DetectionError> {
    if rules.is_empty() {
        return Err(DetectionError::EmptyRuleSet);
    }
    let verdict = match mode {
        CombinationMode::All => rules.iter().all(|r| evaluate_rule(r, observations)),
        CombinationMode::Any => rules.iter().any(|r| evaluate_rule(r, observations)),
    };
    debug!("检测结论({mode:?}): {verdict}");
    Ok(verdict)
}

/// 求值 [`DetectionSpec`]，等价于 [`evaluate_rules`]。
pub fn evaluate<O: Observations + ?Sized>(
    spec: &DetectionSpec,
    observations: &O,
) -> Result<bool, DetectionError> {
    evaluate_rules(&spec.rules, spec.mode, observations)
}

/// 逐条求值全部规则（不短路），用于展示每条规则的结果。
pub fn explain<O: Observations + ?Sized>(spec: &DetectionSpec, observations: &O) -> Vec<RuleVerdict> {
    spec.rules
        .iter()
        .enumerate()
        .map(|(i, rule)| RuleVerdict {
            index: i + 1,
            kind: rule.kind(),
            matched: evaluate_rule(rule, observations),
        })
        .collect()
}

/// 求值单条规则。
pub fn evaluate_rule<O: Observations + ?Sized>(rule: &DetectionRule, observations: &O) -> bool {
    let matched = match rule {
        DetectionRule::FileExists(r) => evaluate_file(r, observations),
        DetectionRule::RegistryValue(r) => evaluate_registry(r, observations),
        DetectionRule::ProcessRunning(r) => observations.process_running(&r.process_name),
        DetectionRule::CustomScript(r) => match observations.custom_result(&r.id) {
            Some(result) => result,
            None => {
                debug!("自定义检测 {} 未提供结果，按未满足处理", r.id);
                false
            }
        },
    };
    debug!("检测规则 {}: {matched}", rule.kind());
    matched
}

fn evaluate_file<O: Observations + ?Sized>(rule: &FileRule, observations: &O) -> bool {
    let Some(facts) = observations.file(&rule.path) else {
        return false;
    };
    let operator = rule.effective_operator();
    if operator == CompareOp::Exists {
        return true;
    }
    match (facts.version.as_deref(), rule.min_version.as_deref()) {
        (Some(found), Some(wanted)) => version_satisfies(operator, found, wanted),
        _ => false,
    }
}

fn evaluate_registry<O: Observations + ?Sized>(rule: &RegistryRule, observations: &O) -> bool {
    let Some(found) = observations.registry_value(rule.hive, &rule.key, rule.value_name.as_deref())
    else {
        return false;
    };
    match (rule.operator, rule.expected.as_deref()) {
        (CompareOp::Exists, _) => true,
        (operator, Some(expected)) => compare_values(operator, &found, expected),
        (_, None) => false,
    }
}

/// 按版本号顺序判断 `found <op> wanted` 是否成立。
///
/// 任一版本号无法解析时返回 `false`。
pub fn version_satisfies(operator: CompareOp, found: &str, wanted: &str) -> bool {
    if operator == CompareOp::Exists {
        return true;
    }
    version::compare(found, wanted).is_some_and(|ordering| operator.accepts(ordering))
}

/// 比较注册表值与期望值。
pub fn compare_values(operator: CompareOp, found: &str, expected: &str) -> bool {
    if operator == CompareOp::Exists {
        return true;
    }
    if let (Some(a), Some(b)) = (parse_integer(found), parse_integer(expected)) {
        return operator.accepts(a.cmp(&b));
    }
    if let Some(ordering) = version::compare(found, expected) {
        return operator.accepts(ordering);
    }
    operator == CompareOp::Equals && found == expected
}

fn parse_integer(raw: &str) -> Option<i128> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

/// 注册表完整路径（`HKLM\SOFTWARE\...`），用作快照中的键。
pub fn registry_path(hive: RegistryHive, key: &str) -> String {
    format!("{}\\{}", hive.short_name(), key.trim_matches('\\'))
}

/// 路径/键的规范化形式：小写、`\` 分隔、无末尾分隔符。
fn normalize_key(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(['\\', '/'])
        .chars()
        .map(|c| if c == '/' { '\\' } else { c.to_ascii_lowercase() })
        .collect()
}

fn same_process(a: &str, b: &str) -> bool {
    fn stem(name: &str) -> &str {
        let name = name.trim();
        let cut = name.len().saturating_sub(4);
        match name.get(cut..) {
            Some(ext) if cut > 0 && ext.eq_ignore_ascii_case(".exe") => &name[..cut],
            _ => name,
        }
    }
    stem(a).eq_ignore_ascii_case(stem(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{CustomScriptRule, ProcessRule};

    fn file_rule(path: &str, min: Option<&str>, op: Option<CompareOp>) -> DetectionRule {
        DetectionRule::FileExists(FileRule {
            path: path.to_string(),
            min_version: min.map(str::to_string),
            operator: op,
        })
    }

    fn registry_rule(op: CompareOp, expected: Option<&str>) -> DetectionRule {
        DetectionRule::RegistryValue(RegistryRule {
            hive: RegistryHive::Hklm,
            key: r"SOFTWARE\Vendor\App".to_string(),
            value_name: Some("Version".to_string()),
            operator: op,
            expected: expected.map(str::to_string),
        })
    }

    #[test]
    fn empty_rule_set_gives_no_verdict() {
        let obs = ObservationSet::new();
        assert_eq!(
            evaluate_rules(&[], CombinationMode::All, &obs),
            Err(DetectionError::EmptyRuleSet)
        );
        assert_eq!(
            evaluate_rules(&[], CombinationMode::Any, &obs),
            Err(DetectionError::EmptyRuleSet)
        );
    }

    #[test]
    fn file_version_greater_or_equal_matches_equal_version() {
        let obs = ObservationSet::new().with_file(r"C:\App\app.exe", Some("2.1.0"));
        let rules = [file_rule(r"C:\App\app.exe", Some("2.1.0"), Some(CompareOp::GreaterOrEqual))];
        assert_eq!(evaluate_rules(&rules, CombinationMode::All, &obs), Ok(true));
    }

    #[test]
    fn file_version_below_minimum_fails() {
        let obs = ObservationSet::new().with_file(r"C:\App\app.exe", Some("2.0.9"));
        let rules = [file_rule(r"C:\App\app.exe", Some("2.1"), None)];
        assert_eq!(evaluate_rules(&rules, CombinationMode::All, &obs), Ok(false));
    }

    #[test]
    fn file_without_readable_version_fails_version_check_but_passes_exists() {
        let obs = ObservationSet::new().with_file(r"c:\app\APP.exe", None);
        assert!(!evaluate_rule(
            &file_rule(r"C:\App\app.exe", Some("1.0"), None),
            &obs
        ));
        assert!(evaluate_rule(&file_rule(r"C:/App/app.exe", None, None), &obs));
        assert!(evaluate_rule(
            &file_rule(r"C:\App\app.exe", Some("1.0"), Some(CompareOp::Exists)),
            &obs
        ));
    }

    #[test]
    fn registry_comparisons_use_numbers_then_versions_then_text() {
        assert!(compare_values(CompareOp::GreaterOrEqual, "528040", "528040"));
        assert!(compare_values(CompareOp::GreaterThan, "0x10", "15"));
        assert!(compare_values(CompareOp::LessThan, "9", "10"));
        assert!(compare_values(CompareOp::GreaterOrEqual, "10.2.1", "10.2"));
        assert!(compare_values(CompareOp::Equals, "https://a", "https://a"));
        assert!(!compare_values(CompareOp::GreaterThan, "beta", "alpha"));
    }

    #[test]
    fn registry_rule_reads_value_case_insensitively() {
        let obs = ObservationSet::new().with_registry_value(
            RegistryHive::Hklm,
            r"software\vendor\app",
            Some("version"),
            "5.2.0",
        );
        assert!(evaluate_rule(&registry_rule(CompareOp::Exists, None), &obs));
        assert!(evaluate_rule(
            &registry_rule(CompareOp::GreaterOrEqual, Some("5.0")),
            &obs
        ));
        assert!(!evaluate_rule(
            &registry_rule(CompareOp::LessThan, Some("5.0")),
            &obs
        ));

        let hkcu = DetectionRule::RegistryValue(RegistryRule {
            hive: RegistryHive::Hkcu,
            key: r"SOFTWARE\Vendor\App".to_string(),
            value_name: Some("Version".to_string()),
            operator: CompareOp::Exists,
            expected: None,
        });
        assert!(!evaluate_rule(&hkcu, &obs));
    }

    #[test]
    fn any_mode_short_circuits_on_first_match() {
        // 第二条规则命中后，第三条规则不会被观测。
        struct Counting {
            inner: ObservationSet,
            process_queries: std::cell::Cell<usize>,
        }
        impl Observations for Counting {
            fn file(&self, path: &str) -> Option<FileFacts> {
                self.inner.file(path)
            }
            fn registry_value(&self, h: RegistryHive, k: &str, v: Option<&str>) -> Option<String> {
                self.inner.registry_value(h, k, v)
            }
            fn process_running(&self, name: &str) -> bool {
                self.process_queries.set(self.process_queries.get() + 1);
                self.inner.process_running(name)
            }
            fn custom_result(&self, id: &str) -> Option<bool> {
                self.inner.custom_result(id)
            }
        }

        let obs = Counting {
            inner: ObservationSet::new().with_registry_value(
                RegistryHive::Hklm,
                r"SOFTWARE\Vendor\App",
                Some("Version"),
                "1.0",
            ),
            process_queries: std::cell::Cell::new(0),
        };
        let rules = [
            file_rule(r"C:\missing.exe", None, None),
            registry_rule(CompareOp::Exists, None),
            DetectionRule::ProcessRunning(ProcessRule {
                process_name: "app.exe".to_string(),
            }),
        ];
        assert_eq!(evaluate_rules(&rules, CombinationMode::Any, &obs), Ok(true));
        assert_eq!(obs.process_queries.get(), 0);
    }

    #[test]
    fn process_names_match_with_or_without_extension() {
        let obs = ObservationSet::new().with_process("FBServer.EXE");
        let rule = |name: &str| {
            DetectionRule::ProcessRunning(ProcessRule {
                process_name: name.to_string(),
            })
        };
        assert!(evaluate_rule(&rule("fbserver.exe"), &obs));
        assert!(evaluate_rule(&rule("fbserver"), &obs));
        assert!(!evaluate_rule(&rule("fbguard.exe"), &obs));
    }

    #[test]
    fn custom_script_uses_injected_result() {
        let rule = DetectionRule::CustomScript(CustomScriptRule {
            id: "service".to_string(),
            script: "Get-Service FirebirdServer".to_string(),
        });
        assert!(evaluate_rule(&rule, &ObservationSet::new().with_custom("service", true)));
        assert!(!evaluate_rule(&rule, &ObservationSet::new().with_custom("service", false)));
        assert!(!evaluate_rule(&rule, &ObservationSet::new()));
    }

    #[test]
    fn explain_reports_every_rule() {
        let spec = DetectionSpec {
            mode: CombinationMode::All,
            rules: vec![
                file_rule(r"C:\missing.exe", None, None),
                registry_rule(CompareOp::Exists, None),
            ],
        };
        let obs = ObservationSet::new().with_registry_value(
            RegistryHive::Hklm,
            r"SOFTWARE\Vendor\App",
            Some("Version"),
            "1.0",
        );
        let verdicts = explain(&spec, &obs);
        assert_eq!(verdicts.len(), 2);
        assert!(!verdicts[0].matched);
        assert!(verdicts[1].matched);
        assert_eq!(verdicts[1].kind, "registry_value");
    }

    #[test]
    fn keys_differing_only_in_case_resolve_the_same_way_every_load() {
        let json = r#"{
            "files": {
                "C:\\App\\app.exe": { "version": "1.0" },
                "c:/app/APP.EXE": { "version": "3.0" }
            },
            "registry": {
                "HKLM\\SOFTWARE\\Vendor\\App": { "Version": "1.0" },
                "hklm\\software\\vendor\\app\\": { "version": "3.0", "Edition": "pro" }
            }
        }"#;
        let rules = [
            file_rule(r"C:\App\app.exe", Some("2.0"), None),
            registry_rule(CompareOp::GreaterOrEqual, Some("2.0")),
        ];

        let first: ObservationSet = serde_json::from_str(json).unwrap();
        let expected = explain(
            &DetectionSpec {
                mode: CombinationMode::All,
                rules: rules.to_vec(),
            },
            &first,
        );
        assert!(expected.iter().all(|v| v.matched));
        for _ in 0..200 {
            let obs: ObservationSet = serde_json::from_str(json).unwrap();
            assert_eq!(obs, first);
            let verdicts = explain(
                &DetectionSpec {
                    mode: CombinationMode::All,
                    rules: rules.to_vec(),
                },
                &obs,
            );
            assert_eq!(verdicts, expected);
        }

        // 规范化后排在最后的原始键生效；同一注册表键下的值合并。
        assert_eq!(
            first.file(r"C:\APP\app.exe").and_then(|f| f.version),
            Some("3.0".to_string())
        );
        assert_eq!(
            first.registry_value(RegistryHive::Hklm, r"Software\Vendor\App", Some("EDITION")),
            Some("pro".to_string())
        );
        assert_eq!(
            first.registry_value(RegistryHive::Hklm, r"SOFTWARE\Vendor\App", Some("Version")),
            Some("3.0".to_string())
        );
    }

    #[test]
    fn builder_keys_are_normalized_like_loaded_keys() {
        let built = ObservationSet::new()
            .with_file(r"C:\App\app.exe", Some("2.0"))
            .with_registry_value(RegistryHive::Hklm, r"SOFTWARE\Vendor", Some("Version"), "2.0");
        let loaded: ObservationSet = serde_json::from_str(
            r#"{
                "files": { "c:/app/app.exe": { "version": "2.0" } },
                "registry": { "HKLM\\software\\vendor": { "VERSION": "2.0" } }
            }"#,
        )
        .unwrap();
        assert_eq!(built, loaded);
    }

    #[test]
    fn snapshot_deserializes_from_json() {
        let json = r#"{
            "files": { "C:\\App\\app.exe": { "version": "2.1.0" } },
            "registry": { "HKLM\\SOFTWARE\\Vendor\\App": { "": "installed" } },
            "processes": ["app.exe"],
            "custom": { "svc": true }
        }"#;
        let obs: ObservationSet = serde_json::from_str(json).unwrap();
        assert_eq!(
            obs.registry_value(RegistryHive::Hklm, r"SOFTWARE\Vendor\App", None),
            Some("installed".to_string())
        );
        assert!(obs.process_running("app"));
        assert_eq!(obs.custom_result("svc"), Some(true));
    }
}
