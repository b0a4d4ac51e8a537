//! # submit 命令实现
//!
//! 把一个或多个项目的计算流水线提交到远程主机。
//!
//! ## 功能
//! - 展开项目路径（glob / 递归）
//! - 每个项目一个提交会话，多个项目并行
//! - `--dry-run` 只写出输入文件与作业脚本
//! - 汇总表格与可选 CSV 报告
//!
//! ## 依赖关系
//! - 使用 `cli/submit.rs` 定义的参数
//! - 使用 `batch/`, `remote/`, `models/`, `utils/output.rs`

use crate::batch::{BatchRunner, ProcessResult, ProjectCollector};
use crate::cli::submit::SubmitArgs;
use crate::error::{QeRemoteError, Result};
use crate::models::{DirectoryProject, ProfileRegistry, RemoteProfile, RunEnvironment, RunKind};
use crate::remote::session::StagedJob;
use crate::remote::transport::CancelToken;
use crate::remote::{OpenSshTransport, RemoteSession, SessionOptions, SubmissionReport, UploadPolicy};
use crate::utils::{output, progress};

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tabled::{Table, Tabled};
use tracing::debug;

/// 单个项目的处理结果
#[derive(Debug)]
enum Outcome {
    Submitted(SubmissionReport),
    Staged(StagedJob),
    Failed(String),
}

/// 一个项目的记录
#[derive(Debug)]
struct ProjectOutcome {
    project: PathBuf,
    outcome: Outcome,
}

/// 终端汇总表格行
#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Script")]
    script: String,
    #[tabled(rename = "Stages")]
    stages: String,
    #[tabled(rename = "Uploaded")]
    uploaded: String,
    #[tabled(rename = "Result")]
    result: String,
}

/// CSV 报告行
#[derive(Debug, Serialize)]
struct ReportRow {
    project: String,
    run: String,
    host: String,
    script: String,
    stages: String,
    uploaded: usize,
    failed_uploads: String,
    exit_status: Option<i32>,
    result: String,
    status_error: String,
}

/// 执行 submit 命令
pub fn execute(args: SubmitArgs) -> Result<()> {
    let run = RunKind::from(args.run);
    output::print_header(&format!("Submit {} Calculation", run));

    // 远程配置
    let registry = ProfileRegistry::load(&args.profiles)?;
    let profile = registry.get(&args.profile)?;
    output::print_info(&format!(
        "Using profile '{}' ({})",
        profile,
        profile.host.as_deref().unwrap_or("no host")
    ));

    // 项目列表
    let projects = ProjectCollector::new(args.projects.clone())
        .recursive(args.recursive)
        .collect()?;
    if projects.is_empty() {
        return Err(QeRemoteError::InvalidArgument(
            "No project directories found (a project contains project.json)".to_string(),
        ));
    }
    output::print_info(&format!("Found {} project(s)", projects.len()));

    let mut env =
        RunEnvironment::new(args.pseudo_dir.clone()).with_parallelism(args.np, args.nthreads);
    env.pseudo_search_path = Some(args.pseudo_search_path.clone());

    let options = SessionOptions {
        connect_timeout: Duration::from_secs(args.timeout.max(1)),
        upload_policy: if args.strict_upload {
            UploadPolicy::Strict
        } else {
            UploadPolicy::BestEffort
        },
        ..SessionOptions::default()
    };

    if args.dry_run {
        output::print_warning("Dry run: inputs and job scripts are written, nothing is submitted");
    }

    // 并行提交
    let outcomes = Mutex::new(Vec::new());
    let single = projects.len() == 1;
    let runner = BatchRunner::new(args.jobs).with_progress(!single);
    debug!(projects = projects.len(), jobs = runner.jobs(), "starting batch");

    let result = runner.run(&projects, |dir| {
        let mut options = options.clone();
        if args.wait_timeout > 0 {
            options.cancel = CancelToken::with_deadline(Duration::from_secs(args.wait_timeout));
        }
        let outcome = process_project(dir, profile, &env, run, &options, args.dry_run, single);
        let result = match &outcome {
            Outcome::Submitted(_) => ProcessResult::Success(dir.display().to_string()),
            Outcome::Staged(_) => ProcessResult::Skipped(dir.display().to_string()),
            Outcome::Failed(e) => ProcessResult::Failed(dir.display().to_string(), e.clone()),
        };
        if let Ok(mut list) = outcomes.lock() {
            list.push(ProjectOutcome {
                project: dir.clone(),
                outcome,
            });
        }
        result
    });

    let mut outcomes = outcomes
        .into_inner()
        .map_err(|_| QeRemoteError::Other("outcome list poisoned".to_string()))?;
    outcomes.sort_by(|a, b| a.project.cmp(&b.project));

    // 详情
    for item in &outcomes {
        print_outcome(item);
    }

    // 汇总
    output::print_header("Summary");
    let rows: Vec<SummaryRow> = outcomes.iter().map(summary_row).collect();
    println!("{}", Table::new(&rows));
    println!();

    if let Some(path) = &args.report {
        save_report(&outcomes, run, profile, path)?;
        output::print_success(&format!("Report saved to '{}'", path.display()));
    }

    output::print_separator();
    if args.dry_run {
        output::print_done(&format!("Staged {} project(s)", result.skipped));
    } else {
        output::print_done(&format!(
            "Submitted {}, failed {}",
            result.success, result.failed
        ));
    }

    if result.failed > 0 {
        return Err(QeRemoteError::Other(format!(
            "{} of {} submission(s) failed",
            result.failed,
            result.total()
        )));
    }

    Ok(())
}

/// 处理一个项目
fn process_project(
    dir: &Path,
    profile: &RemoteProfile,
    env: &RunEnvironment,
    run: RunKind,
    options: &SessionOptions,
    dry_run: bool,
    show_spinner: bool,
) -> Outcome {
    let project = match DirectoryProject::open(dir) {
        Ok(p) => p,
        Err(e) => return Outcome::Failed(e.to_string()),
    };

    let mut session = RemoteSession::new(&project, profile, env, run, options.clone());

    if dry_run {
        return match session.stage() {
            Ok(staged) => Outcome::Staged(staged),
            Err(e) => Outcome::Failed(e.to_string()),
        };
    }

    let spinner = show_spinner.then(|| {
        progress::create_spinner(&format!("Submitting {} to {}", project_label(dir), profile))
    });

    let result = session.submit(&OpenSshTransport::new());

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    debug!(project = %dir.display(), state = ?session.state(), "session finished");

    match result {
        Ok(report) => Outcome::Submitted(report),
        Err(e) => Outcome::Failed(e.to_string()),
    }
}

fn print_outcome(item: &ProjectOutcome) {
    let name = project_label(&item.project);
    match &item.outcome {
        Outcome::Submitted(report) => {
            output::print_success(&format!("{}: {} submitted", name, report.script_name));
            for file in &report.failed_uploads {
                output::print_warning(&format!("{}: failed to upload {}", name, file));
            }
            let reply = report.stdout.trim();
            if !reply.is_empty() {
                output::print_info(&format!("{}: {}", name, reply));
            }
            let stderr = report.stderr.trim();
            if !stderr.is_empty() {
                output::print_warning(&format!("{}: {}", name, stderr));
            }
            if let Some(e) = &report.status_error {
                output::print_warning(&format!("{}: project status not saved: {}", name, e));
            }
        }
        Outcome::Staged(staged) => {
            output::print_info(&format!("{}: {}", name, staged.script.display()));
            for (stage, command) in staged.scheduled.iter().zip(&staged.commands) {
                output::print_stage(stage.tag, command);
            }
            for tag in &staged.skipped {
                output::print_skip(&format!("{} {}", name, tag));
            }
        }
        Outcome::Failed(e) => output::print_error(&format!("{}: {}", name, e)),
    }
}

fn summary_row(item: &ProjectOutcome) -> SummaryRow {
    let project = project_label(&item.project);
    match &item.outcome {
        Outcome::Submitted(report) => SummaryRow {
            project,
            script: report.script_name.clone(),
            stages: report.stages.join(" "),
            uploaded: report.uploaded.to_string(),
            result: "submitted".to_string(),
        },
        Outcome::Staged(staged) => SummaryRow {
            project,
            script: staged.script_name.clone(),
            stages: staged.scheduled.iter().map(|s| s.tag).collect::<Vec<_>>().join(" "),
            uploaded: "-".to_string(),
            result: "staged".to_string(),
        },
        Outcome::Failed(e) => SummaryRow {
            project,
            script: "-".to_string(),
            stages: "-".to_string(),
            uploaded: "-".to_string(),
            result: format!("failed: {}", e),
        },
    }
}

/// 保存 CSV 报告
fn save_report(
    outcomes: &[ProjectOutcome],
    run: RunKind,
    profile: &RemoteProfile,
    path: &Path,
) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    for item in outcomes {
        wtr.serialize(report_row(item, run, profile))?;
    }

    wtr.flush().map_err(|e| QeRemoteError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

fn report_row(item: &ProjectOutcome, run: RunKind, profile: &RemoteProfile) -> ReportRow {
    let mut row = ReportRow {
        project: item.project.display().to_string(),
        run: run.to_string(),
        host: profile.host.clone().unwrap_or_default(),
        script: String::new(),
        stages: String::new(),
        uploaded: 0,
        failed_uploads: String::new(),
        exit_status: None,
        result: String::new(),
        status_error: String::new(),
    };

    match &item.outcome {
        Outcome::Submitted(report) => {
            row.run = report.run.to_string();
            row.host = report.host.clone();
            row.script = report.script_name.clone();
            row.stages = report.stages.join(" ");
            row.uploaded = report.uploaded;
            row.failed_uploads = report.failed_uploads.join(" ");
            row.exit_status = Some(report.exit_status);
            row.result = "submitted".to_string();
            row.status_error = report.status_error.clone().unwrap_or_default();
        }
        Outcome::Staged(staged) => {
            row.script = staged.script_name.clone();
            row.stages = staged.scheduled.iter().map(|s| s.tag).collect::<Vec<_>>().join(" ");
            row.result = "staged".to_string();
        }
        Outcome::Failed(e) => {
            row.result = format!("failed: {}", e);
        }
    }
    row
}

fn project_label(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| dir.display().to_string())
}
