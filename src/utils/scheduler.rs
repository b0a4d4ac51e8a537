//! # 作业调度系统默认模板
//!
//! 新建远程配置时使用的默认提交命令与作业脚本模板（PBS 与 Slurm）。
//! 模板中的占位符由 `remote/template.rs` 替换。
//!
//! ## 依赖关系
//! - 被 `models/profile.rs`, `cli/profile.rs` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};

/// 调度系统
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scheduler {
    #[default]
    Pbs,
    Slurm,
}

impl Scheduler {
    /// 提交命令模板
    pub fn job_command(&self) -> String {
        match self {
            Scheduler::Pbs => "qsub ${JOB_SCRIPT}".to_string(),
            Scheduler::Slurm => "sbatch ${JOB_SCRIPT}".to_string(),
        }
    }

    /// 作业脚本模板
    pub fn job_script(&self) -> String {
        match self {
            Scheduler::Pbs => pbs_job_script(),
            Scheduler::Slurm => slurm_job_script(),
        }
    }
}

fn pbs_job_script() -> String {
    r#"#!/bin/sh
#PBS -q QUEUE
#PBS -l select=1:ncpus=${NCPU}:mpiprocs=${NMPI}:ompthreads=${NOMP}
#PBS -l walltime=0:30:00
#PBS -W group_list=GROUP

if [ ! -z "${PBS_O_WORKDIR}" ]; then
  cd ${PBS_O_WORKDIR}
fi

# Load required modules
${MODULE_COMMANDS}

${QUANTUM_ESPRESSO_COMMAND}

"#
    .to_string()
}

fn slurm_job_script() -> String {
    r#"#!/bin/bash
#SBATCH --partition PARTITION
#SBATCH --nodes=1
#SBATCH --ntasks=${NMPI}
#SBATCH --cpus-per-task=${NOMP}
#SBATCH --time 24:00:00
#SBATCH -o %x.out
#SBATCH -e %x.err

set -uo pipefail

if [ -n "${SLURM_SUBMIT_DIR:-}" ]; then
  cd "${SLURM_SUBMIT_DIR}"
fi

export OMP_NUM_THREADS=${NOMP}

# Load required modules
${MODULE_COMMANDS}

${QUANTUM_ESPRESSO_COMMAND}

echo "Timings:"
sacct -o JobID,Submit,Start,End,CPUTime,State -j $SLURM_JOBID
"#
    .to_string()
}
