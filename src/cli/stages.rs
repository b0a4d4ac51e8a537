//! # stages 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/stages.rs`

use super::RunKindArg;
use clap::Args;
use std::path::PathBuf;

/// stages 子命令参数
#[derive(Args, Debug)]
pub struct StagesArgs {
    /// Project directory
    pub project: PathBuf,

    /// Calculation to inspect
    #[arg(long, value_enum)]
    pub run: RunKindArg,

    /// Local directory holding pseudopotential files
    #[arg(long, env = "QEREMOTE_PSEUDO_DIR", default_value = "pseudo")]
    pub pseudo_dir: PathBuf,
}
