//! # submit 子命令 CLI 定义
//!
//! 批量提交项目到远程主机
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/submit.rs`

use super::RunKindArg;
use clap::Args;
use std::path::PathBuf;

/// submit 子命令参数
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Project directories or glob patterns (directories containing project.json)
    #[arg(required = true)]
    pub projects: Vec<String>,

    /// Title of the remote profile to use
    #[arg(long)]
    pub profile: String,

    /// Calculation to run
    #[arg(long, value_enum)]
    pub run: RunKindArg,

    /// Search project directories recursively
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    // ─────────────────────────────────────────────────────────────
    // Parallelism
    // ─────────────────────────────────────────────────────────────
    /// Number of MPI processes
    #[arg(long, default_value_t = 1)]
    pub np: i64,

    /// Number of OpenMP threads
    #[arg(long, default_value_t = 1)]
    pub nthreads: i64,

    /// Number of projects submitted in parallel (0 = CPU count)
    #[arg(short, long, default_value_t = 4)]
    pub jobs: usize,

    // ─────────────────────────────────────────────────────────────
    // Environment
    // ─────────────────────────────────────────────────────────────
    /// Profile registry file
    #[arg(long, env = "QEREMOTE_PROFILES", default_value = "profiles.json")]
    pub profiles: PathBuf,

    /// Local directory holding pseudopotential files
    #[arg(long, env = "QEREMOTE_PSEUDO_DIR", default_value = "pseudo")]
    pub pseudo_dir: PathBuf,

    /// Value written to pseudo_dir in the generated inputs
    #[arg(long, env = "QEREMOTE_PSEUDO_SEARCH_PATH", default_value = "./")]
    pub pseudo_search_path: String,

    // ─────────────────────────────────────────────────────────────
    // Execution control
    // ─────────────────────────────────────────────────────────────
    /// Abort a submission when any file fails to upload
    #[arg(long, default_value_t = false)]
    pub strict_upload: bool,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Seconds to wait for the job command before cancelling it (0 = no limit)
    #[arg(long, default_value_t = 600)]
    pub wait_timeout: u64,

    /// Write a CSV summary of all submissions
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Only write inputs and job scripts, do not connect
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}
