//! Windows 系统观测（文件版本、注册表、进程）。
//!
//! 目标：
//! - 为规划核心的检测求值提供实时观测来源（[`probe::SystemProbe`]）
//! - 将 Win32 细节集中在本 crate，核心库保持纯计算
//!
//! 平台说明：
//! - 注册表与文件版本读取仅在 Windows 上可用；其他平台上视为“不存在”
//! - 文件存在性与进程列表在所有平台上可用
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

pub mod file;
pub mod paths;
pub mod probe;
pub mod process;
pub mod registry;

pub use probe::SystemProbe;
