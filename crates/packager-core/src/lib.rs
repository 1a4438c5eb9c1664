//! 应用部署规划核心库（纯计算、无 IO）。
//!
//! 功能：
//! - 定义应用描述文件（profile）的数据模型与结构校验
//! - 按 `depends_on` 解析安装器的安装顺序（拓扑排序 + 环检测）
//! - 按检测规则与组合方式计算“是否已安装”
//! - 生成标准卸载 + 带条件回退的强制清理步骤
//! - 将以上结果组装为与平台无关的部署计划（[`plan::Plan`]）
//!
//! 约定：
//! - 本库不访问文件系统、注册表、网络或进程表；外部观测结果通过 [`detection::Observations`] 注入
//! - 所有类型在构造后不可变，可在任意线程复用
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

pub mod detection;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod plan;
pub mod profile;
pub mod result_code;
pub mod uninstall;
pub mod validate;
pub mod version;

pub use error::{CycleError, DetectionError, PipelineError, PolicyShapeError, StructuralError, Violation};
pub use pipeline::{render, ResolvedProfile, ValidatedProfile};
pub use plan::Plan;
pub use profile::ApplicationProfile;
pub use validate::{validate, ValidationReport};
