//! 安装程序退出码分类。
//!
//! 固定映射：
//! - `0`：成功
//! - `3010`：成功，需要重启
//! - `1707`：已安装（视为成功）
//! - 其他：失败
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use serde::{Deserialize, Serialize};

/// 退出码分类。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResultClass {
    Success,
    SuccessRebootPending,
    AlreadyInstalled,
    Failure,
}

impl ResultClass {
    /// 除 `Failure` 外均视为成功。
    pub fn is_success(self) -> bool {
        !matches!(self, ResultClass::Failure)
    }

    /// 是否需要重启。
    pub fn requires_reboot(self) -> bool {
        matches!(self, ResultClass::SuccessRebootPending)
    }
}

/// 单个退出码映射。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultCode {
    pub code: i32,
    pub class: ResultClass,
}

/// 退出码分类表（随每个安装步骤输出，供执行方使用）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultCodes {
    /// 已知退出码；未列出的退出码一律为 `Failure`。
    pub known: Vec<ResultCode>,
}

impl Default for ResultCodes {
    fn default() -> Self {
        Self {
            known: vec![
                ResultCode {
                    code: 0,
                    class: ResultClass::Success,
                },
                ResultCode {
                    code: 3010,
                    class: ResultClass::SuccessRebootPending,
                },
                ResultCode {
                    code: 1707,
                    class: ResultClass::AlreadyInstalled,
                },
            ],
        }
    }
}

impl ResultCodes {
    /// 对退出码分类。
    pub fn classify(&self, code: i32) -> ResultClass {
        self.known
            .iter()
            .find(|entry| entry.code == code)
            .map(|entry| entry.class)
            .unwrap_or(ResultClass::Failure)
    }
}

/// 按默认分类表对退出码分类。
pub fn classify(code: i32) -> ResultClass {
    ResultCodes::default().classify(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_are_classified() {
        assert_eq!(classify(0), ResultClass::Success);
        assert_eq!(classify(3010), ResultClass::SuccessRebootPending);
        assert_eq!(classify(1707), ResultClass::AlreadyInstalled);
    }

    #[test]
    fn unknown_codes_fail() {
        for code in [1, -1, 1603, 1618, 3011] {
            assert_eq!(classify(code), ResultClass::Failure, "code {code}");
            assert!(!classify(code).is_success());
        }
    }

    #[test]
    fn success_classes() {
        assert!(ResultClass::Success.is_success());
        assert!(ResultClass::AlreadyInstalled.is_success());
        assert!(ResultClass::SuccessRebootPending.is_success());
        assert!(ResultClass::SuccessRebootPending.requires_reboot());
        assert!(!ResultClass::Success.requires_reboot());
    }

    #[test]
    fn table_serializes_snake_case() {
        let json = serde_json::to_value(ResultCodes::default()).unwrap();
        assert_eq!(json["known"][1]["code"], 3010);
        assert_eq!(json["known"][1]["class"], "success_reboot_pending");
    }
}
