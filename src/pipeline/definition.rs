//! # 流水线定义
//!
//! 每种计算类型对应一张固定的子任务表。表按列存放六个并列数组
//! （程序、条件、编辑器、标签、解析器、后续动作），解析时逐行组装成 `Stage`。
//!
//! | 计算类型 | 子任务 |
//! |---|---|
//! | SCF / Relax / MD | pw.x |
//! | DOS | pw.x(scf), pw.x(nscf), dos.x, projwfc.x |
//! | Band | pw.x(scf), pw.x(bands), bands.x(up), bands.x(down) |
//!
//! ## 依赖关系
//! - 被 `remote/session.rs`, `commands/stages.rs` 使用
//! - 使用 `pipeline/stage.rs`, `pipeline/command.rs`, `models/`

use super::command::CommandKind;
use super::stage::{Condition, InputEditor, PostAction, ResultParser, Stage};
use crate::error::{QeRemoteError, Result};
use crate::models::project::{BandPaths, ProjectProperty};
use crate::models::{Project, RunKind, StageFile};
use tracing::debug;

/// 一种计算类型的子任务表
#[derive(Debug, Clone, Copy)]
pub struct PipelineShape {
    pub commands: &'static [CommandKind],
    pub conditions: &'static [Condition],
    pub editors: &'static [InputEditor],
    pub tags: &'static [&'static str],
    pub parsers: &'static [ResultParser],
    pub post_actions: &'static [PostAction],
}

impl PipelineShape {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// 六列长度必须一致
    fn validate(&self, run: RunKind) -> Result<()> {
        let n = self.commands.len();
        let columns = [
            ("conditions", self.conditions.len()),
            ("editors", self.editors.len()),
            ("tags", self.tags.len()),
            ("parsers", self.parsers.len()),
            ("post actions", self.post_actions.len()),
        ];
        for (name, len) in columns {
            if len != n {
                return Err(QeRemoteError::MalformedPipeline {
                    run: run.to_string(),
                    reason: format!("{} {} for {} commands", len, name, n),
                });
            }
        }
        if self.is_empty() {
            return Err(QeRemoteError::MalformedPipeline {
                run: run.to_string(),
                reason: "no stages".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
// 子任务表
// ─────────────────────────────────────────────────────────────

const SCF: PipelineShape = PipelineShape {
    commands: &[CommandKind::PwScf],
    conditions: &[Condition::Always],
    editors: &[InputEditor::PassThrough],
    tags: &["scf"],
    parsers: &[ResultParser::Scf],
    post_actions: &[PostAction::Nothing],
};

const RELAX: PipelineShape = PipelineShape {
    commands: &[CommandKind::PwScf],
    conditions: &[Condition::Always],
    editors: &[InputEditor::PassThrough],
    tags: &["opt"],
    parsers: &[ResultParser::Geometry { md: false }],
    post_actions: &[PostAction::Nothing],
};

const MD: PipelineShape = PipelineShape {
    commands: &[CommandKind::PwScf],
    conditions: &[Condition::Always],
    editors: &[InputEditor::PassThrough],
    tags: &["md"],
    parsers: &[ResultParser::Geometry { md: true }],
    post_actions: &[PostAction::Nothing],
};

const DOS: PipelineShape = PipelineShape {
    commands: &[
        CommandKind::PwScf,
        CommandKind::PwScf,
        CommandKind::Dos,
        CommandKind::Projwfc,
    ],
    conditions: &[
        Condition::UnlessGroundState,
        Condition::Always,
        Condition::Always,
        Condition::UnlessTetrahedra,
    ],
    editors: &[
        InputEditor::ReplaceWithScf,
        InputEditor::PassThrough,
        InputEditor::PassThrough,
        InputEditor::PassThrough,
    ],
    tags: &["scf", "nscf", "dos", "pdos"],
    parsers: &[
        ResultParser::Scf,
        ResultParser::Fermi,
        ResultParser::Void,
        ResultParser::Void,
    ],
    post_actions: &[
        PostAction::RecordStatus(RunKind::SingleEnergy),
        PostAction::Nothing,
        PostAction::Nothing,
        PostAction::Nothing,
    ],
};

const BAND: PipelineShape = PipelineShape {
    commands: &[
        CommandKind::PwScf,
        CommandKind::PwScf,
        CommandKind::Bands,
        CommandKind::Bands,
    ],
    conditions: &[
        Condition::UnlessGroundState,
        Condition::Always,
        Condition::Always,
        Condition::SpinPolarized,
    ],
    editors: &[
        InputEditor::ReplaceWithScf,
        InputEditor::PassThrough,
        InputEditor::PassThrough,
        InputEditor::SecondSpinChannel,
    ],
    tags: &["scf", "bands", "band.up", "band.down"],
    parsers: &[
        ResultParser::Scf,
        ResultParser::Void,
        ResultParser::BandPath,
        ResultParser::Void,
    ],
    post_actions: &[
        PostAction::RecordStatus(RunKind::SingleEnergy),
        PostAction::Nothing,
        PostAction::CopyBandLabels,
        PostAction::Nothing,
    ],
};

/// 计算类型对应的子任务表
pub fn shape(run: RunKind) -> PipelineShape {
    match run {
        RunKind::SingleEnergy => SCF,
        RunKind::Relax => RELAX,
        RunKind::MolecularDynamics => MD,
        RunKind::DensityOfStates => DOS,
        RunKind::BandStructure => BAND,
    }
}

/// 把子任务表解析到具体项目，生成带文件名的子任务列表
pub fn resolve(run: RunKind, project: &dyn Project) -> Result<Vec<Stage>> {
    resolve_shape(run, &shape(run), project)
}

pub fn resolve_shape(
    run: RunKind,
    shape: &PipelineShape,
    project: &dyn Project,
) -> Result<Vec<Stage>> {
    shape.validate(run)?;

    let stages: Vec<Stage> = (0..shape.len())
        .map(|i| {
            let tag = shape.tags[i];
            Stage {
                index: i,
                tag,
                command: shape.commands[i],
                condition: shape.conditions[i],
                editor: shape.editors[i],
                input_file: project.stage_file_name(tag, StageFile::Input),
                log_file: project.stage_file_name(tag, StageFile::Log),
                error_file: project.stage_file_name(tag, StageFile::Error),
                parser: shape.parsers[i],
                post_action: shape.post_actions[i],
            }
        })
        .collect();

    debug!(run = %run, stages = stages.len(), "pipeline resolved");
    Ok(stages)
}

// ─────────────────────────────────────────────────────────────
// 后续动作
// ─────────────────────────────────────────────────────────────

/// 高对称点字母代码转换
pub fn band_label(letter: &str) -> String {
    if letter.eq_ignore_ascii_case("gG") {
        "Γ".to_string()
    } else if letter.eq_ignore_ascii_case("gS") {
        "Σ".to_string()
    } else if letter.eq_ignore_ascii_case("gS1") {
        "Σ1".to_string()
    } else {
        letter.to_string()
    }
}

/// 把 k 点标签复制到能带路径
///
/// 能带路径为空，或 k 点数少于已存路径点数时不做修改。返回是否修改。
pub fn copy_band_labels(letters: &[Option<String>], band_paths: &mut BandPaths) -> bool {
    let num_points = band_paths.num_points();
    if num_points < 1 || letters.len() < num_points {
        return false;
    }

    for (i, letter) in letters.iter().take(num_points).enumerate() {
        if let Some(letter) = letter.as_deref().filter(|l| !l.is_empty()) {
            band_paths.set_label(i, &band_label(letter));
        }
    }
    true
}

/// 执行已调度子任务的后续动作，以及计算类型本身的状态记录
///
/// 所有修改在同一个临界区内完成。
pub fn apply_post_actions(run: RunKind, scheduled: &[Stage], project: &dyn Project) -> Result<()> {
    let letters: Option<Vec<Option<String>>> = if scheduled
        .iter()
        .any(|s| s.post_action == PostAction::CopyBandLabels)
    {
        project
            .base_input(RunKind::BandStructure)
            .map(|input| input.k_points().into_iter().map(|k| k.letter).collect())
            .filter(|letters: &Vec<Option<String>>| !letters.is_empty())
    } else {
        None
    };

    project.update_property(&mut |property: &mut ProjectProperty| {
        for stage in scheduled {
            match stage.post_action {
                PostAction::Nothing => {}
                PostAction::RecordStatus(kind) => property.status.record(kind),
                PostAction::CopyBandLabels => {
                    if let Some(letters) = &letters {
                        if !copy_band_labels(letters, &mut property.band_paths) {
                            debug!(
                                kpoints = letters.len(),
                                points = property.band_paths.num_points(),
                                "band labels not copied"
                            );
                        }
                    }
                }
            }
        }
        property.status.record(run);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::{BandPathPoint, DirectoryProject, ProjectManifest};
    use crate::parsers::pwscf::parse_qe_input;

    fn project(dir: &std::path::Path) -> DirectoryProject {
        DirectoryProject::init(
            dir,
            &ProjectManifest {
                name: "si".to_string(),
                prefix: "si".to_string(),
            },
        )
        .unwrap()
    }

    fn band_paths(n: usize) -> BandPaths {
        BandPaths {
            points: (0..n)
                .map(|i| BandPathPoint {
                    coord: [i as f64, 0.0, 0.0],
                    label: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_stage_counts_and_commands() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path());

        for run in [RunKind::SingleEnergy, RunKind::Relax, RunKind::MolecularDynamics] {
            let stages = resolve(run, &project).unwrap();
            assert_eq!(stages.len(), 1);
            assert_eq!(stages[0].command, CommandKind::PwScf);
            assert_eq!(stages[0].condition, Condition::Always);
        }

        let dos: Vec<_> = resolve(RunKind::DensityOfStates, &project)
            .unwrap()
            .iter()
            .map(|s| s.command)
            .collect();
        assert_eq!(
            dos,
            vec![
                CommandKind::PwScf,
                CommandKind::PwScf,
                CommandKind::Dos,
                CommandKind::Projwfc
            ]
        );

        let band: Vec<_> = resolve(RunKind::BandStructure, &project)
            .unwrap()
            .iter()
            .map(|s| s.command)
            .collect();
        assert_eq!(
            band,
            vec![
                CommandKind::PwScf,
                CommandKind::PwScf,
                CommandKind::Bands,
                CommandKind::Bands
            ]
        );
    }

    #[test]
    fn test_stage_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path());

        let stages = resolve(RunKind::BandStructure, &project).unwrap();
        let inputs: Vec<_> = stages.iter().map(|s| s.input_file.as_str()).collect();
        assert_eq!(
            inputs,
            vec!["si.scf.in", "si.bands.in", "si.band.up.in", "si.band.down.in"]
        );
        assert_eq!(stages[2].log_file, "si.band.up.log");
        assert_eq!(stages[3].error_file, "si.band.down.err");

        let relax = resolve(RunKind::Relax, &project).unwrap();
        assert_eq!(relax[0].input_file, "si.opt.in");
    }

    #[test]
    fn test_mismatched_columns_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path());

        let broken = PipelineShape {
            tags: &["scf", "nscf"],
            ..SCF
        };
        let err = resolve_shape(RunKind::SingleEnergy, &broken, &project).unwrap_err();
        assert!(matches!(err, QeRemoteError::MalformedPipeline { .. }));
    }

    #[test]
    fn test_all_shapes_are_consistent() {
        for run in RunKind::ALL {
            assert!(shape(run).validate(run).is_ok());
        }
    }

    #[test]
    fn test_band_label_mapping() {
        assert_eq!(band_label("gG"), "Γ");
        assert_eq!(band_label("GG"), "Γ");
        assert_eq!(band_label("gs"), "Σ");
        assert_eq!(band_label("GS1"), "Σ1");
        assert_eq!(band_label("X"), "X");
    }

    #[test]
    fn test_copy_band_labels() {
        let mut paths = band_paths(3);
        let letters = vec![Some("gG".to_string()), None, Some("gS1".to_string())];

        assert!(copy_band_labels(&letters, &mut paths));
        assert_eq!(paths.label(0), Some("Γ"));
        assert_eq!(paths.label(1), None);
        assert_eq!(paths.label(2), Some("Σ1"));
    }

    #[test]
    fn test_copy_band_labels_stops_on_fewer_kpoints() {
        let mut paths = band_paths(3);
        let before = paths.clone();
        let letters = vec![Some("gG".to_string()), Some("X".to_string())];

        assert!(!copy_band_labels(&letters, &mut paths));
        assert_eq!(paths, before);

        let mut empty = BandPaths::default();
        assert!(!copy_band_labels(&letters, &mut empty));
    }

    #[test]
    fn test_post_actions_for_band_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = project(dir.path());
        let band = parse_qe_input(
            "&BANDS\n/\nK_POINTS {tpiba_b}\n3\n0 0 0 20 !gG\n0.5 0 0 20 !X\n0.5 0.5 0 1 !gs\n",
        )
        .unwrap();
        project.set_base_input(RunKind::BandStructure, band).unwrap();
        project
            .update_property(&mut |p| p.band_paths = band_paths(3))
            .unwrap();

        let stages = resolve(RunKind::BandStructure, &project).unwrap();
        apply_post_actions(RunKind::BandStructure, &stages, &project).unwrap();

        let property = project.property();
        assert_eq!(property.status.scf_count, 1);
        assert!(property.status.band_done);
        assert_eq!(property.band_paths.label(0), Some("Γ"));
        assert_eq!(property.band_paths.label(1), Some("X"));
        assert_eq!(property.band_paths.label(2), Some("Σ"));
    }

    #[test]
    fn test_skipped_stages_have_no_post_action() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path());

        let stages = resolve(RunKind::DensityOfStates, &project).unwrap();
        // 第一步被跳过
        apply_post_actions(RunKind::DensityOfStates, &stages[1..], &project).unwrap();

        let status = project.property().status;
        assert_eq!(status.scf_count, 0);
        assert_eq!(status.dos_count, 1);
    }
}
