//! # 批量处理模块
//!
//! 一次命令提交多个项目。
//!
//! ## 功能
//! - 展开项目路径与 glob 模式
//! - 并行提交
//! - 进度反馈与统计
//!
//! ## 依赖关系
//! - 被 `commands/submit.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::ProjectCollector;
pub use runner::{BatchRunner, ProcessResult};
