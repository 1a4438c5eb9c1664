//! 版本号解析与比较。
//!
//! 规则：
//! - 以语义化版本（`semver`）的优先级规则比较，预发布版本低于正式版本
//! - 解析宽松：允许前导 `v`，允许 1~3 段数字（缺失段补 0），
//!   允许 Windows 文件版本的第 4 段（修订号），修订号在 patch 之后参与比较
//! - 构建元数据（`+xxx`）不参与比较
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::{BuildMetadata, Version};
use thiserror::Error;

/// 版本号解析错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("无法解析版本号: {raw}")]
pub struct VersionParseError {
    pub raw: String,
}

/// 可比较的版本号。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppVersion {
    semver: Version,
    revision: u64,
}

impl AppVersion {
    /// 宽松解析版本字符串。
    ///
    /// 参数：
    /// - `raw`：版本字符串，如 `2.1`、`v2.1.0-beta.1`、`10.0.19041.1`
    ///
    /// 异常处理：
    /// - 空串、非数字段、超过 4 段数字时返回 [`VersionParseError`]
    pub fn parse(raw: &str) -> Result<Self, VersionParseError> {
        let err = || VersionParseError {
            raw: raw.to_string(),
        };
        let trimmed = raw.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(err());
        }

        // 数字核心与预发布/构建后缀分开处理，后缀交给 semver 校验。
        let split_at = trimmed
            .find(|c: char| c == '-' || c == '+')
            .unwrap_or(trimmed.len());
        let (core, suffix) = trimmed.split_at(split_at);
        let parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(err());
        }
        let mut numbers = [0u64; 4];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            *slot = part.parse().map_err(|_| err())?;
        }

        let normalized = format!("{}.{}.{}{}", numbers[0], numbers[1], numbers[2], suffix);
        let mut semver = Version::parse(&normalized).map_err(|_| err())?;
        // 构建元数据只校验格式，不保留，相等性与顺序保持一致。
        semver.build = BuildMetadata::EMPTY;
        Ok(Self {
            semver,
            revision: numbers[3],
        })
    }

    /// 语义化版本部分。
    pub fn semver(&self) -> &Version {
        &self.semver
    }

    /// Windows 文件版本的第 4 段（无则为 0）。
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl Ord for AppVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = &self.semver;
        let b = &other.semver;
        (a.major, a.minor, a.patch)
            .cmp(&(b.major, b.minor, b.patch))
            .then_with(|| self.revision.cmp(&other.revision))
            .then_with(|| a.pre.cmp(&b.pre))
    }
}

impl PartialOrd for AppVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for AppVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = &self.semver;
        write!(f, "{}.{}.{}", v.major, v.minor, v.patch)?;
        if self.revision != 0 {
            write!(f, ".{}", self.revision)?;
        }
        if !v.pre.is_empty() {
            write!(f, "-{}", v.pre)?;
        }
        Ok(())
    }
}

/// 比较两个版本字符串。
///
/// 返回值：
/// - `Some(ordering)`：两者均可解析
/// - `None`：任一无法解析
pub fn compare(a: &str, b: &str) -> Option<Ordering> {
    match (AppVersion::parse(a), AppVersion::parse(b)) {
        (Ok(a), Ok(b)) => Some(a.cmp(&b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_versions_with_zero_padding() {
        assert_eq!(compare("2.1", "2.1.0"), Some(Ordering::Equal));
        assert_eq!(compare("3", "3.0.0"), Some(Ordering::Equal));
        assert_eq!(compare("v1.4.2", "1.4.2"), Some(Ordering::Equal));
    }

    #[test]
    fn windows_revision_orders_after_patch() {
        assert_eq!(compare("10.0.19041.1", "10.0.19041.0"), Some(Ordering::Greater));
        assert_eq!(compare("10.0.19041.0", "10.0.19041"), Some(Ordering::Equal));
        assert_eq!(compare("1.2.3.10", "1.2.3.9"), Some(Ordering::Greater));
        assert_eq!(compare("1.2.4.0", "1.2.3.99"), Some(Ordering::Greater));
    }

    #[test]
    fn prerelease_is_lower_than_release() {
        assert_eq!(compare("2.0.0-beta.1", "2.0.0"), Some(Ordering::Less));
        assert_eq!(compare("2.0.0-beta.2", "2.0.0-beta.10"), Some(Ordering::Less));
    }

    #[test]
    fn build_metadata_is_ignored() {
        assert_eq!(compare("1.0.0+build.5", "1.0.0"), Some(Ordering::Equal));
    }

    #[test]
    fn equality_agrees_with_ordering_when_build_differs() {
        let tagged = AppVersion::parse("1.0.0+b").unwrap();
        let plain = AppVersion::parse("1.0.0").unwrap();
        assert_eq!(tagged.cmp(&plain), Ordering::Equal);
        assert_eq!(tagged, plain);
        assert!(tagged.semver().build.is_empty());
        assert!(AppVersion::parse("1.0.0+").is_err());
    }

    #[test]
    fn rejects_malformed_versions() {
        for raw in ["", "abc", "1..2", "1.2.3.4.5", "1.x", "1.2.3-"] {
            assert!(AppVersion::parse(raw).is_err(), "{raw} should be rejected");
        }
        assert_eq!(compare("1.0", "garbage"), None);
    }

    #[test]
    fn display_round_trips_revision() {
        let v = AppVersion::parse("10.0.19041.1").unwrap();
        assert_eq!(v.to_string(), "10.0.19041.1");
        assert_eq!(v.revision(), 1);
        assert_eq!(v.semver().major, 10);
    }
}
