//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `init`: 新建项目目录
//! - `submit`: 把项目的计算流水线提交到远程主机
//! - `stages`: 查看某计算类型解析后的子任务
//! - `profile`: 管理远程配置（嵌套子命令）
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: init, submit, stages, profile

pub mod init;
pub mod profile;
pub mod stages;
pub mod submit;

use crate::models::RunKind;
use clap::{Parser, Subcommand, ValueEnum};

/// qeremote - Quantum ESPRESSO 远程提交工具
#[derive(Parser)]
#[command(name = "qeremote")]
#[command(version)]
#[command(about = "Submit Quantum ESPRESSO pipelines to remote clusters over SSH", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Create a project directory from QE input files
    Init(init::InitArgs),

    /// Stage and submit calculations of one or more projects
    Submit(submit::SubmitArgs),

    /// Show the resolved stages of a calculation
    Stages(stages::StagesArgs),

    /// Manage remote host profiles
    Profile(profile::ProfileArgs),
}

/// 计算类型选择
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum RunKindArg {
    /// Single-point SCF
    Scf,
    /// Geometry optimization
    Relax,
    /// Molecular dynamics
    Md,
    /// Density of states (scf, nscf, dos, projwfc)
    Dos,
    /// Band structure (scf, bands, bands.x, second spin channel)
    Band,
}

impl From<RunKindArg> for RunKind {
    fn from(arg: RunKindArg) -> Self {
        match arg {
            RunKindArg::Scf => RunKind::SingleEnergy,
            RunKindArg::Relax => RunKind::Relax,
            RunKindArg::Md => RunKind::MolecularDynamics,
            RunKindArg::Dos => RunKind::DensityOfStates,
            RunKindArg::Band => RunKind::BandStructure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_submit() {
        let cli = Cli::try_parse_from([
            "qeremote", "-vv", "submit", "proj-a", "proj-b", "--profile", "hpc", "--run", "band",
            "--np", "16",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);

        let Commands::Submit(args) = cli.command else {
            panic!("expected submit");
        };
        assert_eq!(args.projects, vec!["proj-a", "proj-b"]);
        assert_eq!(RunKind::from(args.run), RunKind::BandStructure);
        assert_eq!(args.np, 16);
        assert!(!args.dry_run);
        assert_eq!(args.wait_timeout, 600);
    }

    #[test]
    fn test_parse_init() {
        let cli = Cli::try_parse_from([
            "qeremote", "init", "runs/si", "--prefix", "si", "--scf", "si.scf.in",
        ])
        .unwrap();

        let Commands::Init(args) = cli.command else {
            panic!("expected init");
        };
        assert_eq!(args.prefix, "si");
        assert_eq!(args.scf.as_deref(), Some(std::path::Path::new("si.scf.in")));
        assert!(args.name.is_none());
    }
}
