//! # 流水线模块
//!
//! 定义每种计算类型的子任务序列：程序、运行条件、输入编辑、文件名与后续动作。
//!
//! ## 依赖关系
//! - 被 `remote/session.rs`, `commands/` 使用
//! - 子模块: command, normalize, stage, definition

pub mod command;
pub mod definition;
pub mod normalize;
pub mod stage;

pub use command::{build_command, CommandKind};
pub use definition::{apply_post_actions, resolve};
pub use stage::Stage;
