//! # 数据模型模块
//!
//! 定义输入文件、项目、远程配置与运行环境的数据模型。
//!
//! ## 依赖关系
//! - 被 `pipeline/`, `remote/` 和 `commands/` 使用
//! - 子模块: input, run_kind, project, profile, environment

pub mod environment;
pub mod input;
pub mod profile;
pub mod project;
pub mod run_kind;

pub use environment::RunEnvironment;
pub use profile::{ProfileRegistry, RemoteProfile};
pub use project::{DirectoryProject, Project, ProjectStatus, StageFile};
pub use run_kind::RunKind;
