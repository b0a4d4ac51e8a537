//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `batch/`, `pipeline/`, `remote/`, `models/`, `utils/`
//! - 子模块: init, submit, stages, profile

pub mod init;
pub mod profile;
pub mod stages;
pub mod submit;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init(args) => init::execute(args),
        Commands::Submit(args) => submit::execute(args),
        Commands::Stages(args) => stages::execute(args),
        Commands::Profile(args) => profile::execute(args),
    }
}
