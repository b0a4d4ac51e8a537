//! # 计算类型
//!
//! 每种计算类型对应一条固定的子任务流水线。
//!
//! ## 依赖关系
//! - 被 `pipeline/`, `models/project.rs`, `cli/` 使用

use serde::{Deserialize, Serialize};

/// 计算类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunKind {
    SingleEnergy,
    Relax,
    MolecularDynamics,
    DensityOfStates,
    BandStructure,
}

impl RunKind {
    pub const ALL: [RunKind; 5] = [
        RunKind::SingleEnergy,
        RunKind::Relax,
        RunKind::MolecularDynamics,
        RunKind::DensityOfStates,
        RunKind::BandStructure,
    ];

    /// 写入输入文件 title 的标签
    pub fn label(&self) -> &'static str {
        match self {
            RunKind::SingleEnergy => "SCF",
            RunKind::Relax => "Optimize",
            RunKind::MolecularDynamics => "MD",
            RunKind::DensityOfStates => "DOS",
            RunKind::BandStructure => "Band",
        }
    }

    /// 项目中基础输入文件的名称（`inputs/<stem>.in`）
    pub fn input_stem(&self) -> &'static str {
        match self {
            RunKind::SingleEnergy => "scf",
            RunKind::Relax => "opt",
            RunKind::MolecularDynamics => "md",
            RunKind::DensityOfStates => "dos",
            RunKind::BandStructure => "band",
        }
    }
}

impl std::fmt::Display for RunKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
