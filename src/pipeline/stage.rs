//! # 子任务描述
//!
//! 一个子任务由以下部分组成：
//! - 可执行程序类型
//! - 运行条件（对项目状态与编辑后输入的判断）
//! - 输入编辑器（由基础输入生成本步输入）
//! - 文件名（输入 / 日志 / 错误）
//! - 结果解析器（只作描述，由结果读取端使用）
//! - 后续动作（提交被接受后对项目状态的修改）
//!
//! 条件与编辑器都是纯函数；后续动作只在 `pipeline/definition.rs`
//! 的 `apply_post_actions` 中执行。
//!
//! ## 依赖关系
//! - 被 `pipeline/definition.rs`, `remote/session.rs`, `commands/stages.rs` 使用
//! - 使用 `pipeline/command.rs`, `pipeline/normalize.rs`, `models/`

use super::command::CommandKind;
use super::normalize;
use crate::models::input::{QeInput, QeValue, NAMELIST_BANDS, NAMELIST_SYSTEM};
use crate::models::{Project, ProjectStatus, RunEnvironment, RunKind};
use serde::Serialize;

// ─────────────────────────────────────────────────────────────
// 运行条件
// ─────────────────────────────────────────────────────────────

/// 子任务运行条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Condition {
    /// 总是运行
    Always,
    /// 已有 SCF 或结构优化结果时跳过
    UnlessGroundState,
    /// 占据方式为 tetrahedra* 时跳过
    UnlessTetrahedra,
    /// 仅自旋极化（nspin = 2）时运行
    SpinPolarized,
}

impl Condition {
    pub fn evaluate(&self, status: &ProjectStatus, input: &QeInput) -> bool {
        match self {
            Condition::Always => true,
            Condition::UnlessGroundState => !status.has_ground_state(),
            Condition::UnlessTetrahedra => {
                let Some(system) = input.namelist(NAMELIST_SYSTEM) else {
                    return false;
                };
                let occupations = system
                    .get("occupations")
                    .map(|v| v.as_character())
                    .unwrap_or_default();
                !occupations.starts_with("tetrahedra")
            }
            Condition::SpinPolarized => {
                let nspin = input
                    .value(NAMELIST_SYSTEM, "nspin")
                    .and_then(|v| v.as_integer())
                    .unwrap_or(1);
                nspin == 2
            }
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Condition::Always => "always",
            Condition::UnlessGroundState => "no scf/opt yet",
            Condition::UnlessTetrahedra => "not tetrahedra",
            Condition::SpinPolarized => "nspin = 2",
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 输入编辑器
// ─────────────────────────────────────────────────────────────

/// 输入编辑器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputEditor {
    /// 原样使用基础输入
    PassThrough,
    /// 改用项目的 SCF 输入（重新规范化）
    ReplaceWithScf,
    /// 能带第二自旋分量：filband 末字符改为 2，spin_component = 2
    SecondSpinChannel,
}

impl InputEditor {
    /// 生成本步输入；所需输入不存在时返回 None
    pub fn apply(
        &self,
        base: &QeInput,
        project: &dyn Project,
        run: RunKind,
        env: &RunEnvironment,
    ) -> Option<QeInput> {
        match self {
            InputEditor::PassThrough => Some(base.clone()),
            InputEditor::ReplaceWithScf => {
                normalize::prepare_input(project, RunKind::SingleEnergy, run, env)
            }
            InputEditor::SecondSpinChannel => {
                let mut input = base.clone();
                if let Some(bands) = input.namelist_mut(NAMELIST_BANDS) {
                    let filband = bands
                        .get("filband")
                        .map(|v| v.as_character())
                        .unwrap_or_default();
                    if !filband.is_empty() {
                        let mut stem = filband;
                        stem.pop();
                        stem.push('2');
                        bands.set("filband", QeValue::character(&stem));
                    }
                    bands.set("spin_component", QeValue::integer(2));
                }
                Some(input)
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 结果解析器与后续动作
// ─────────────────────────────────────────────────────────────

/// 子任务输出的解析方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResultParser {
    /// SCF 能量与收敛
    Scf,
    /// 费米能
    Fermi,
    /// 结构轨迹（md = true 时为分子动力学）
    Geometry { md: bool },
    /// 能带路径与 k 点标签
    BandPath,
    /// 不解析
    Void,
}

impl std::fmt::Display for ResultParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultParser::Scf => write!(f, "scf"),
            ResultParser::Fermi => write!(f, "fermi"),
            ResultParser::Geometry { md: false } => write!(f, "geometry"),
            ResultParser::Geometry { md: true } => write!(f, "geometry(md)"),
            ResultParser::BandPath => write!(f, "band-path"),
            ResultParser::Void => write!(f, "-"),
        }
    }
}

/// 提交被接受后执行的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PostAction {
    Nothing,
    /// 记录某计算类型的完成状态
    RecordStatus(RunKind),
    /// 把 k 点标签复制到项目的能带路径
    CopyBandLabels,
}

impl std::fmt::Display for PostAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostAction::Nothing => write!(f, "-"),
            PostAction::RecordStatus(run) => write!(f, "record {}", run),
            PostAction::CopyBandLabels => write!(f, "copy band labels"),
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 子任务
// ─────────────────────────────────────────────────────────────

/// 解析到具体项目后的子任务
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage {
    /// 在流水线中的序号（从 0 开始）
    pub index: usize,
    pub tag: &'static str,
    pub command: CommandKind,
    pub condition: Condition,
    pub editor: InputEditor,
    pub input_file: String,
    pub log_file: String,
    pub error_file: String,
    pub parser: ResultParser,
    pub post_action: PostAction,
}

impl Stage {
    /// 编辑输入并检查运行条件；跳过时返回 None
    pub fn prepare(
        &self,
        base: &QeInput,
        project: &dyn Project,
        run: RunKind,
        env: &RunEnvironment,
    ) -> Option<QeInput> {
        let input = self.editor.apply(base, project, run, env)?;
        if self.condition.evaluate(&project.status(), &input) {
            Some(input)
        } else {
            None
        }
    }
}
