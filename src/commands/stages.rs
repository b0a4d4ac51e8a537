//! # stages 命令实现
//!
//! 显示某计算类型在指定项目上解析出的子任务，以及每个子任务在当前
//! 项目状态下是否会运行。不写任何文件。
//!
//! ## 依赖关系
//! - 使用 `cli/stages.rs` 定义的参数
//! - 使用 `pipeline/`, `remote/session.rs`, `models/`, `utils/output.rs`

use crate::cli::stages::StagesArgs;
use crate::error::Result;
use crate::models::{DirectoryProject, Project, RunEnvironment, RunKind};
use crate::pipeline::{self, normalize, Stage};
use crate::remote::session::stage_command;
use crate::utils::output;

use tabled::{Table, Tabled};

/// 子任务表格行
#[derive(Debug, Clone, Tabled)]
struct StageRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Tag")]
    tag: String,
    #[tabled(rename = "Command")]
    command: String,
    #[tabled(rename = "Condition")]
    condition: String,
    #[tabled(rename = "Runs")]
    runs: String,
    #[tabled(rename = "Input")]
    input: String,
    #[tabled(rename = "Parser")]
    parser: String,
    #[tabled(rename = "After submit")]
    post_action: String,
}

/// 执行 stages 命令
pub fn execute(args: StagesArgs) -> Result<()> {
    let run = RunKind::from(args.run);
    let project = DirectoryProject::open(&args.project)?;
    let env = RunEnvironment::new(args.pseudo_dir.clone());

    output::print_header(&format!("{} Stages of '{}'", run, project.name()));

    let status = project.status();
    output::print_info(&format!(
        "Status: scf {}, opt {}, md {}, dos {}, band {}",
        status.scf_count, status.opt_done, status.md_count, status.dos_count, status.band_done
    ));

    let rows = stage_rows(&project, run, &env)?;
    println!("{}", Table::new(&rows));

    if run == RunKind::BandStructure {
        let points = band_path_labels(&project);
        if points.is_empty() {
            output::print_info("No band path recorded yet");
        } else {
            output::print_info(&format!("Band path: {}", points.join(" ")));
        }
    }

    let scheduled = rows.iter().filter(|r| r.runs == "yes").count();
    output::print_done(&format!("{} of {} stage(s) would run", scheduled, rows.len()));
    Ok(())
}

fn stage_rows(project: &dyn Project, run: RunKind, env: &RunEnvironment) -> Result<Vec<StageRow>> {
    let stages = pipeline::resolve(run, project)?;
    let base = normalize::prepare_input(project, run, run, env);
    if base.is_none() {
        output::print_warning(&format!("Project has no {} input", run));
    }

    Ok(stages
        .iter()
        .map(|stage| {
            let runs = match &base {
                Some(base) => {
                    if stage.prepare(base, project, run, env).is_some() {
                        "yes"
                    } else {
                        "skip"
                    }
                }
                None => "no input",
            };
            stage_row(stage, runs, env)
        })
        .collect())
}

/// 能带路径各点的标签；未标记的点显示为 `.`
fn band_path_labels(project: &dyn Project) -> Vec<String> {
    let paths = project.band_paths();
    (0..paths.num_points())
        .map(|i| paths.label(i).unwrap_or(".").to_string())
        .collect()
}

fn stage_row(stage: &Stage, runs: &str, env: &RunEnvironment) -> StageRow {
    StageRow {
        index: stage.index + 1,
        tag: stage.tag.to_string(),
        command: stage_command(stage, env.num_processes).unwrap_or_else(|_| "-".to_string()),
        condition: stage.condition.describe().to_string(),
        runs: runs.to_string(),
        input: stage.input_file.clone(),
        parser: stage.parser.to_string(),
        post_action: stage.post_action.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::{BandPathPoint, BandPaths, ProjectManifest};
    use crate::parsers::pwscf::parse_qe_input;

    #[test]
    fn test_dos_rows_follow_project_state() {
        let tmp = tempfile::tempdir().unwrap();
        let mut project = DirectoryProject::init(
            tmp.path(),
            &ProjectManifest {
                name: "al".to_string(),
                prefix: "al".to_string(),
            },
        )
        .unwrap();
        let env = RunEnvironment::new(tmp.path());

        let rows = stage_rows(&project, RunKind::DensityOfStates, &env).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.runs == "no input"));

        let text = "&CONTROL\n calculation='nscf'\n/\n&SYSTEM\n occupations='tetrahedra'\n/\n";
        project
            .set_base_input(RunKind::SingleEnergy, parse_qe_input(text).unwrap())
            .unwrap();
        project
            .set_base_input(RunKind::DensityOfStates, parse_qe_input(text).unwrap())
            .unwrap();

        let rows = stage_rows(&project, RunKind::DensityOfStates, &env).unwrap();
        let runs: Vec<&str> = rows.iter().map(|r| r.runs.as_str()).collect();
        // 没有 SCF 结果时先跑 scf；tetrahedra 占据下跳过 projwfc.x
        assert_eq!(runs, vec!["yes", "yes", "yes", "skip"]);
        assert_eq!(rows[0].input, "al.scf.in");
        assert_eq!(rows[2].command, "dos.x -in al.dos.in </dev/null 1>al.dos.log 2>al.dos.err");
    }

    #[test]
    fn test_band_path_labels() {
        let tmp = tempfile::tempdir().unwrap();
        let project = DirectoryProject::init(
            tmp.path(),
            &ProjectManifest {
                name: "si".to_string(),
                prefix: "si".to_string(),
            },
        )
        .unwrap();
        assert!(band_path_labels(&project).is_empty());

        let point = |label: Option<&str>| BandPathPoint {
            coord: [0.0; 3],
            label: label.map(str::to_string),
        };
        project
            .update_property(&mut |p| {
                p.band_paths = BandPaths {
                    points: vec![point(Some("Γ")), point(None), point(Some("X"))],
                }
            })
            .unwrap();

        assert_eq!(band_path_labels(&project), vec!["Γ", ".", "X"]);
    }
}
