//! # init 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/init.rs`

use clap::Args;
use std::path::PathBuf;

/// init 子命令参数
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Project directory to create
    pub directory: PathBuf,

    /// Project name written to input titles (default: directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// QE prefix, also the job script name
    #[arg(long, default_value = "espresso")]
    pub prefix: String,

    // ─────────────────────────────────────────────────────────────
    // Base inputs
    // ─────────────────────────────────────────────────────────────
    /// Base input for single-point SCF
    #[arg(long)]
    pub scf: Option<PathBuf>,

    /// Base input for geometry optimization
    #[arg(long)]
    pub relax: Option<PathBuf>,

    /// Base input for molecular dynamics
    #[arg(long)]
    pub md: Option<PathBuf>,

    /// Base input for density of states
    #[arg(long)]
    pub dos: Option<PathBuf>,

    /// Base input for band structure
    #[arg(long)]
    pub band: Option<PathBuf>,
}
