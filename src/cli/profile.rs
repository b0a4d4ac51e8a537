//! # profile 子命令 CLI 定义
//!
//! 远程配置的增删查与作业脚本预览
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/profile.rs`

use crate::utils::scheduler::Scheduler;
use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

/// profile 子命令参数
#[derive(Args, Debug)]
pub struct ProfileArgs {
    /// Profile registry file
    #[arg(long, global = true, env = "QEREMOTE_PROFILES", default_value = "profiles.json")]
    pub profiles: PathBuf,

    #[command(subcommand)]
    pub command: ProfileCommands,
}

/// profile 的子命令
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List all profiles
    List,

    /// Show one profile
    Show {
        /// Profile title
        title: String,
    },

    /// Add a new profile
    Add(AddProfileArgs),

    /// Remove a profile
    Remove {
        /// Profile title
        title: String,
    },

    /// Print the job script a profile would produce
    Render {
        /// Profile title
        title: String,

        /// Number of MPI processes
        #[arg(long, default_value_t = 1)]
        np: i64,

        /// Number of OpenMP threads
        #[arg(long, default_value_t = 1)]
        nthreads: i64,
    },
}

/// 调度系统选择
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum SchedulerArg {
    /// PBS (qsub)
    Pbs,
    /// Slurm (sbatch)
    Slurm,
}

impl From<SchedulerArg> for Scheduler {
    fn from(arg: SchedulerArg) -> Self {
        match arg {
            SchedulerArg::Pbs => Scheduler::Pbs,
            SchedulerArg::Slurm => Scheduler::Slurm,
        }
    }
}

/// profile add 参数
#[derive(Args, Debug)]
pub struct AddProfileArgs {
    /// Unique profile title
    pub title: String,

    /// Remote host name or address
    #[arg(long)]
    pub host: String,

    /// Login user
    #[arg(long)]
    pub user: String,

    /// SSH port
    #[arg(long, default_value_t = 22)]
    pub port: u16,

    /// Private key file
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Login password (fallback when a key is also given)
    #[arg(long)]
    pub password: Option<String>,

    /// Remote working directory
    #[arg(long)]
    pub workdir: Option<String>,

    /// Environment setup lines inserted into the job script
    #[arg(long)]
    pub modules: Option<String>,

    /// Job scheduler templates to start from
    #[arg(long, value_enum, default_value = "pbs")]
    pub scheduler: SchedulerArg,
}
