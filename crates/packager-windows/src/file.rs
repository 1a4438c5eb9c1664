//! 文件存在性与文件版本读取。
//!
//! 说明：
//! - 文件版本取自版本资源中的 `VS_FIXEDFILEINFO`（`dwFileVersionMS/LS`），
//!   格式为 `major.minor.build.revision`
//! - 没有版本资源的文件（脚本、数据文件等）版本为空
//! - 非 Windows 平台只判断存在性，版本始终为空
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::path::Path;

use packager_core::detection::FileFacts;

/// 读取文件观测结果。
///
/// 返回值：
/// - `Some(facts)`：文件存在（目录不算）
/// - `None`：文件不存在或无法访问
pub fn file_facts(path: &Path) -> Option<FileFacts> {
    if !path.is_file() {
        return None;
    }
    Some(FileFacts {
        version: file_version(path),
    })
}

/// 读取文件版本号。
#[cfg(windows)]
pub fn file_version(path: &Path) -> Option<String> {
    use std::ffi::c_void;
    use std::os::windows::ffi::OsStrExt;

    use windows::core::{w, PCWSTR};
    use windows::Win32::Storage::FileSystem::{
        GetFileVersionInfoSizeW, GetFileVersionInfoW, VerQueryValueW, VS_FIXEDFILEINFO,
    };

    let wide: Vec<u16> = path.as_os_str().encode_wide().chain(Some(0)).collect();
    let name = PCWSTR(wide.as_ptr());

    unsafe {
        let size = GetFileVersionInfoSizeW(name, None);
        if size == 0 {
            return None;
        }
        let mut block = vec![0u8; size as usize];
        if GetFileVersionInfoW(name, 0, size, block.as_mut_ptr() as *mut c_void).is_err() {
            tracing::debug!("读取版本资源失败: {}", path.display());
            return None;
        }

        let mut info: *mut c_void = std::ptr::null_mut();
        let mut len = 0u32;
        let found = VerQueryValueW(
            block.as_ptr() as *const c_void,
            w!("\\"),
            &mut info,
            &mut len,
        );
        if !found.as_bool() || info.is_null() || (len as usize) < std::mem::size_of::<VS_FIXEDFILEINFO>() {
            return None;
        }
        let fixed = &*(info as *const VS_FIXEDFILEINFO);
        Some(format!(
            "{}.{}.{}.{}",
            fixed.dwFileVersionMS >> 16,
            fixed.dwFileVersionMS & 0xffff,
            fixed.dwFileVersionLS >> 16,
            fixed.dwFileVersionLS & 0xffff
        ))
    }
}

/// 非 Windows 平台没有版本资源。
#[cfg(not(windows))]
pub fn file_version(_path: &Path) -> Option<String> {
    None
}
