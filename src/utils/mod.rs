//! # 工具函数模块
//!
//! 提供美化输出、进度条、日志初始化与调度系统模板。
//!
//! ## 依赖关系
//! - 被 `commands/`, `models/profile.rs` 与 `main.rs` 使用
//! - 子模块: output, progress, logging, scheduler

pub mod logging;
pub mod output;
pub mod progress;
pub mod scheduler;
