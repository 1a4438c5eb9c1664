//! 检测规则中的路径解析。
//!
//! 规则：
//! - `%VAR%` 形式的环境变量引用按当前进程环境展开，未定义的变量原样保留
//! - 展开后仍为相对路径时，以探测器的基准目录拼接
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

/// 按给定查找函数展开 `%VAR%` 引用。
///
/// 参数：
/// - `raw`：原始字符串
/// - `lookup`：变量名 -> 变量值
///
/// 返回值：
/// - 展开后的字符串；未闭合的 `%` 与未定义的变量保持原样
pub fn expand_with<F>(raw: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(len) = after.find('%') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..len];
        match (!name.is_empty()).then(|| lookup(name)).flatten() {
            Some(value) => {
                out.push_str(&value);
                rest = &after[len + 1..];
            }
            None => {
                // 保留左侧 `%`，右侧 `%` 可能是下一个引用的开头。
                out.push('%');
                out.push_str(name);
                rest = &after[len..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// 按当前进程环境展开 `%VAR%` 引用。
pub fn expand_env_vars(raw: &str) -> String {
    expand_with(raw, |name| std::env::var(name).ok())
}

/// 将规则中的路径解析为实际路径。
///
/// 参数：
/// - `base`：相对路径的基准目录（通常为安装根目录，可为空）
/// - `raw`：规则中的路径字符串（可含 `%VAR%`）
///
/// 返回值：
/// - 展开后为绝对路径或未提供基准目录：直接返回
/// - 展开后为相对路径：返回 `base.join(path)`
///
/// 异常处理：
/// - `raw` 为空字符串时返回错误
pub fn resolve_path(base: Option<&Path>, raw: &str) -> Result<PathBuf> {
    if raw.trim().is_empty() {
        return Err(anyhow!("空路径"));
    }
    let p = PathBuf::from(expand_env_vars(raw));
    match base {
        Some(base) if !p.is_absolute() => Ok(base.join(p)),
        _ => Ok(p),
    }
}
