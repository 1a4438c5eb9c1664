//! 实时系统探测器：将本机状态作为检测求值的观测来源。
//!
//! 行为：
//! - 文件路径中的 `%VAR%` 先展开，相对路径以基准目录拼接
//! - 注册表读取失败（权限不足等）记录警告并视为不存在
//! - 进程列表在首次查询时采集一次，同一探测器内复用
//! - 自定义脚本不在本地执行，其结果由调用方注入
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::cell::OnceCell;
use std::collections::HashMap;
use std::path::PathBuf;

use packager_core::detection::{FileFacts, Observations};
use packager_core::profile::RegistryHive;
use tracing::{debug, warn};

use crate::file::file_facts;
use crate::paths::resolve_path;
use crate::process::ProcessSnapshot;
use crate::registry::read_value;

/// 本机实时探测器。
#[derive(Debug, Default)]
pub struct SystemProbe {
    base_dir: Option<PathBuf>,
    custom: HashMap<String, bool>,
    processes: OnceCell<ProcessSnapshot>,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置相对路径的基准目录。
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// 注入自定义检测脚本的结果。
    pub fn with_custom_results<I>(mut self, results: I) -> Self
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        self.custom.extend(results);
        self
    }

    fn snapshot(&self) -> &ProcessSnapshot {
        self.processes.get_or_init(ProcessSnapshot::capture)
    }
}

impl Observations for SystemProbe {
    fn file(&self, path: &str) -> Option<FileFacts> {
        let resolved = match resolve_path(self.base_dir.as_deref(), path) {
            Ok(p) => p,
            Err(e) => {
                warn!("检测路径无效: {path}: {e:#}");
                return None;
            }
        };
        let facts = file_facts(&resolved);
        debug!("文件探测: {} -> {facts:?}", resolved.display());
        facts
    }

    fn registry_value(&self, hive: RegistryHive, key: &str, value_name: Option<&str>) -> Option<String> {
        match read_value(hive, key, value_name) {
            Ok(v) => v,
            Err(e) => {
                warn!("注册表读取失败，按不存在处理: {e:#}");
                None
            }
        }
    }

    fn process_running(&self, process_name: &str) -> bool {
        self.snapshot().contains(process_name)
    }

    fn custom_result(&self, id: &str) -> Option<bool> {
        self.custom.get(id).copied()
    }
}
