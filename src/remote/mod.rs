//! # 远程提交模块
//!
//! 模板替换、作业脚本、传输接口与提交会话。
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 子模块: template, script, transport, openssh, session

pub mod openssh;
pub mod script;
pub mod session;
pub mod template;
pub mod transport;

pub use openssh::OpenSshTransport;
pub use session::{RemoteSession, SessionOptions, SubmissionReport, UploadPolicy};
