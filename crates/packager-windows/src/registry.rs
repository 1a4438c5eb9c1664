//! 注册表值读取（检测规则使用）。
//!
//! 读取规则：
//! - 始终读取 64 位视图（`KEY_WOW64_64KEY`），与 64 位安装程序写入的位置一致
//! - `REG_SZ`/`REG_EXPAND_SZ` 原样返回，`REG_MULTI_SZ` 以换行拼接
//! - `REG_DWORD`/`REG_QWORD` 以十进制字符串返回
//! - 键或值不存在返回 `Ok(None)`；其他类型（如 `REG_BINARY`）同样视为不存在
//!
//! 权限要求：
//! - 读取大多数键不需要管理员权限；`HKU` 下其他用户的键可能受限
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use anyhow::Result;
use packager_core::profile::RegistryHive;

/// 读取注册表值。
///
/// 参数：
/// - `hive`：根键
/// - `key`：子键路径（不含根键）
/// - `value_name`：值名；为空时读取默认值
///
/// 返回值：
/// - `Ok(Some(data))`：值存在且为可比较的类型
/// - `Ok(None)`：键/值不存在，或值类型不可比较
///
/// 异常处理：
/// - 权限不足等非“不存在”错误会返回错误
#[cfg(windows)]
pub fn read_value(hive: RegistryHive, key: &str, value_name: Option<&str>) -> Result<Option<String>> {
    use std::io::ErrorKind;

    use anyhow::Context;
    use winreg::enums::{
        RegType, HKEY_CLASSES_ROOT, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, HKEY_USERS, KEY_READ,
        KEY_WOW64_64KEY,
    };
    use winreg::RegKey;

    let root = RegKey::predef(match hive {
        RegistryHive::Hklm => HKEY_LOCAL_MACHINE,
        RegistryHive::Hkcu => HKEY_CURRENT_USER,
        RegistryHive::Hkcr => HKEY_CLASSES_ROOT,
        RegistryHive::Hku => HKEY_USERS,
    });
    let path = key.trim_matches('\\');
    let sub = match root.open_subkey_with_flags(path, KEY_READ | KEY_WOW64_64KEY) {
        Ok(k) => k,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("打开注册表键失败: {}\\{path}", hive.short_name()))
        }
    };

    let name = value_name.unwrap_or_default();
    let raw = match sub.get_raw_value(name) {
        Ok(v) => v,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("读取注册表值失败: {name}")),
    };

    let data = match raw.vtype {
        RegType::REG_SZ | RegType::REG_EXPAND_SZ => Some(sub.get_value::<String, _>(name)?),
        RegType::REG_MULTI_SZ => Some(sub.get_value::<Vec<String>, _>(name)?.join("\n")),
        RegType::REG_DWORD => Some(sub.get_value::<u32, _>(name)?.to_string()),
        RegType::REG_QWORD => Some(sub.get_value::<u64, _>(name)?.to_string()),
        _ => {
            tracing::debug!("注册表值类型不可比较: {name} ({:?})", raw.vtype);
            None
        }
    };
    Ok(data)
}

/// 非 Windows 平台没有注册表，任何值都视为不存在。
#[cfg(not(windows))]
pub fn read_value(hive: RegistryHive, key: &str, value_name: Option<&str>) -> Result<Option<String>> {
    tracing::debug!(
        "当前平台不支持注册表读取: {}\\{key} {}",
        hive.short_name(),
        value_name.unwrap_or_default()
    );
    Ok(None)
}
