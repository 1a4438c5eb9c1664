//! 进程列表快照（用于 `process_running` 检测规则）。
//!
//! 匹配策略：
//! - 按进程名匹配（忽略路径与大小写）
//! - `.exe` 后缀可有可无：`fbserver` 与 `FBServer.exe` 视为同一进程
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use sysinfo::{ProcessRefreshKind, RefreshKind, System};
use tracing::debug;

/// 某一时刻正在运行的进程名集合。
#[derive(Debug, Clone, Default)]
pub struct ProcessSnapshot {
    names: Vec<String>,
}

impl ProcessSnapshot {
    /// 采集当前进程列表。
    pub fn capture() -> Self {
        let mut system = System::new_with_specifics(
            RefreshKind::new().with_processes(ProcessRefreshKind::new()),
        );
        system.refresh_processes();
        let names: Vec<String> = system
            .processes()
            .values()
            .map(|p| normalize(p.name()))
            .filter(|n| !n.is_empty())
            .collect();
        debug!("采集进程列表: {} 个", names.len());
        Self { names }
    }

    /// 由给定名称构造快照（用于测试与离线数据）。
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names.into_iter().map(|n| normalize(n.as_ref())).collect(),
        }
    }

    /// 指定进程是否在快照中。
    pub fn contains(&self, process_name: &str) -> bool {
        let needle = normalize(process_name);
        !needle.is_empty() && self.names.iter().any(|n| *n == needle)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// 小写并去掉路径与 `.exe` 后缀。
fn normalize(name: &str) -> String {
    let file = name
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or(name)
        .trim()
        .to_ascii_lowercase();
    match file.strip_suffix(".exe") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => file,
    }
}
