//! # 远程提交会话
//!
//! 一次提交的完整流程：
//!
//! ```text
//! Idle → Staged → Connected → Uploaded → Submitted → Succeeded
//!   └──────┴─────────┴──────────┴───────────┴──────→ Failed
//! ```
//!
//! 1. 准备：解析流水线，逐个子任务编辑输入、检查条件、写出输入文件，
//!    收集赝势文件（按绝对路径去重），生成一个作业脚本
//! 2. 连接：校验 host / user / 私钥，建立连接
//! 3. 上传：脚本 → 输入文件 → 赝势文件
//! 4. 提交：执行提交命令，轮询输出直到命令结束
//! 5. 断开：任何出口都只断开一次（`ConnectionGuard`）
//!
//! 提交成功（退出码 0）后执行子任务的后续动作并记录项目状态。
//! 失败不保留中间状态，重试需要重新创建会话。
//!
//! ## 依赖关系
//! - 被 `commands/submit.rs` 使用
//! - 使用 `pipeline/`, `remote/transport.rs`, `remote/script.rs`, `models/`

use super::script;
use super::transport::{CancelToken, ConnectParams, Connection, ConnectionGuard, Credential, ExecHandle, Transport};
use crate::error::{QeRemoteError, Result};
use crate::models::{Project, RemoteProfile, RunEnvironment, RunKind};
use crate::parsers::pwscf;
use crate::pipeline::normalize;
use crate::pipeline::{self, build_command, Stage};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 命令模板中的输入文件名占位
const INPUT_NAME_PLACEHOLDER: &str = "__INP_NAME__";

// ─────────────────────────────────────────────────────────────
// 选项与状态
// ─────────────────────────────────────────────────────────────

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Staged,
    Connected,
    Uploaded,
    Submitted,
    Succeeded,
    Failed,
}

impl SessionState {
    /// 正常流程中的下一个状态
    fn next(&self) -> Option<SessionState> {
        match self {
            SessionState::Idle => Some(SessionState::Staged),
            SessionState::Staged => Some(SessionState::Connected),
            SessionState::Connected => Some(SessionState::Uploaded),
            SessionState::Uploaded => Some(SessionState::Submitted),
            SessionState::Submitted => Some(SessionState::Succeeded),
            SessionState::Succeeded | SessionState::Failed => None,
        }
    }
}

/// 上传失败时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadPolicy {
    /// 记录后跳过该文件
    #[default]
    BestEffort,
    /// 任何文件失败即中止
    Strict,
}

/// 会话选项
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub upload_policy: UploadPolicy,
    pub cancel: CancelToken,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            poll_interval: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(30),
            upload_policy: UploadPolicy::BestEffort,
            cancel: CancelToken::new(),
        }
    }
}

/// 准备阶段的产物
#[derive(Debug, Clone)]
pub struct StagedJob {
    pub script: PathBuf,
    pub script_name: String,
    /// 写出的输入文件，按子任务顺序
    pub inputs: Vec<PathBuf>,
    /// 赝势文件，按绝对路径去重
    pub resources: BTreeSet<PathBuf>,
    /// 脚本中的命令行
    pub commands: Vec<String>,
    /// 实际调度的子任务
    pub scheduled: Vec<Stage>,
    /// 被跳过的子任务标签
    pub skipped: Vec<&'static str>,
}

impl StagedJob {
    /// 上传顺序：脚本、输入文件、赝势文件
    pub fn upload_order(&self) -> Vec<&Path> {
        std::iter::once(self.script.as_path())
            .chain(self.inputs.iter().map(|p| p.as_path()))
            .chain(self.resources.iter().map(|p| p.as_path()))
            .collect()
    }
}

/// 提交结果
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub run: RunKind,
    pub host: String,
    pub script_name: String,
    pub stages: Vec<&'static str>,
    pub uploaded: usize,
    pub failed_uploads: Vec<String>,
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
    /// 作业已被接受但项目状态未能保存时的错误
    pub status_error: Option<String>,
}

// ─────────────────────────────────────────────────────────────
// 会话
// ─────────────────────────────────────────────────────────────

/// 一次提交
pub struct RemoteSession<'a> {
    project: &'a dyn Project,
    profile: &'a RemoteProfile,
    env: &'a RunEnvironment,
    run: RunKind,
    options: SessionOptions,
    state: SessionState,
}

impl<'a> RemoteSession<'a> {
    pub fn new(
        project: &'a dyn Project,
        profile: &'a RemoteProfile,
        env: &'a RunEnvironment,
        run: RunKind,
        options: SessionOptions,
    ) -> Self {
        RemoteSession {
            project,
            profile,
            env,
            run,
            options,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn advance(&mut self, to: SessionState) -> Result<()> {
        if self.state.next() != Some(to) {
            return Err(QeRemoteError::Other(format!(
                "invalid session transition {:?} -> {:?}",
                self.state, to
            )));
        }
        debug!(from = ?self.state, to = ?to, "session state");
        self.state = to;
        Ok(())
    }

    /// 完整提交流程；失败时状态为 Failed
    pub fn submit(&mut self, transport: &dyn Transport) -> Result<SubmissionReport> {
        let result = self
            .connect_params()
            .and_then(|params| {
                let staged = self.stage()?;
                self.execute(transport, &params, &staged)
            });

        match &result {
            Ok(report) => {
                info!(
                    project = %self.project.name(),
                    run = %self.run,
                    script = %report.script_name,
                    "job submitted"
                );
            }
            Err(e) => {
                warn!(project = %self.project.name(), run = %self.run, error = %e, "submission failed");
                self.state = SessionState::Failed;
            }
        }
        result
    }

    // ─────────────────────────────────────────────────────────
    // 准备
    // ─────────────────────────────────────────────────────────

    /// 写出输入文件与作业脚本
    pub fn stage(&mut self) -> Result<StagedJob> {
        let project = self.project;
        let env = self.env;
        let run = self.run;

        let directory = project.directory().to_path_buf();
        if !directory.is_dir() {
            return Err(QeRemoteError::DirectoryNotFound {
                path: directory.display().to_string(),
            });
        }

        let stages = pipeline::resolve(run, project)?;
        let base = normalize::prepare_input(project, run, run, env).ok_or_else(|| {
            QeRemoteError::MissingBaseInput {
                run: run.to_string(),
            }
        })?;

        remove_stale(&directory.join(project.exit_file_name()));

        let mut inputs = Vec::new();
        let mut resources = BTreeSet::new();
        let mut commands = Vec::new();
        let mut scheduled = Vec::new();
        let mut skipped = Vec::new();

        for stage in stages {
            let Some(input) = stage.prepare(&base, project, run, env) else {
                debug!(stage = stage.tag, "stage skipped");
                skipped.push(stage.tag);
                continue;
            };

            let command = stage_command(&stage, env.num_processes)?;

            let input_path = directory.join(&stage.input_file);
            if let Err(e) = fs::write(&input_path, pwscf::to_input_string(&input)) {
                warn!(file = %input_path.display(), error = %e, "failed to write input file");
                skipped.push(stage.tag);
                continue;
            }
            remove_stale(&directory.join(&stage.log_file));
            remove_stale(&directory.join(&stage.error_file));

            for species in input.atomic_species() {
                let path = env.pseudo_file(&species.pseudo_file);
                if path.is_file() {
                    resources.insert(fs::canonicalize(&path).unwrap_or(path));
                } else {
                    warn!(species = %species.label, file = %path.display(), "pseudopotential not found");
                }
            }

            debug!(stage = stage.tag, command = %command, "stage scheduled");
            commands.push(command);
            inputs.push(input_path);
            scheduled.push(stage);
        }

        if commands.is_empty() {
            return Err(QeRemoteError::NothingToSubmit {
                run: run.to_string(),
            });
        }

        let content =
            self.profile
                .render_job_script(&commands, env.num_processes, env.num_threads);
        let script = script::write_job_script(&directory, project.prefix(), &content)?;
        let script_name = file_name(&script);

        self.advance(SessionState::Staged)?;

        Ok(StagedJob {
            script,
            script_name,
            inputs,
            resources,
            commands,
            scheduled,
            skipped,
        })
    }

    // ─────────────────────────────────────────────────────────
    // 连接、上传、提交
    // ─────────────────────────────────────────────────────────

    /// 由配置生成连接参数；配置不完整时失败
    pub fn connect_params(&self) -> Result<ConnectParams> {
        let profile = self.profile;
        let missing = |field: &'static str| QeRemoteError::MissingProfileField {
            title: profile.title().to_string(),
            field,
        };

        let host = nonblank(&profile.host).ok_or_else(|| missing("host"))?;
        let user = nonblank(&profile.user).ok_or_else(|| missing("user"))?;
        let password = nonblank(&profile.password);

        let credential = match nonblank(&profile.key_path) {
            Some(key_path) => {
                let path = PathBuf::from(&key_path);
                if !path.is_file() {
                    return Err(QeRemoteError::KeyFileNotFound { path: key_path });
                }
                Credential::PrivateKey { path, password }
            }
            None => password.map(Credential::Password).unwrap_or(Credential::None),
        };

        Ok(ConnectParams {
            host,
            port: profile.port_number(),
            user,
            credential,
            timeout: self.options.connect_timeout,
            work_directory: nonblank(&profile.work_directory),
        })
    }

    /// 连接、上传并提交已准备好的作业
    pub fn execute(
        &mut self,
        transport: &dyn Transport,
        params: &ConnectParams,
        staged: &StagedJob,
    ) -> Result<SubmissionReport> {
        info!(host = %params.target(), "connecting");
        let connection = transport.connect(params)?;
        let mut guard = ConnectionGuard::new(connection, params.target());
        self.advance(SessionState::Connected)?;

        let (uploaded, failed_uploads) = self.upload(guard.connection(), staged)?;
        self.advance(SessionState::Uploaded)?;

        let command = self.profile.render_job_command(&staged.script_name);
        let (exit_status, stdout, stderr) = self.run_job(guard.connection(), &command)?;
        self.advance(SessionState::Submitted)?;
        guard.close();

        if !stdout.trim().is_empty() {
            info!(output = %stdout.trim(), "job command output");
        }
        if exit_status != 0 {
            return Err(QeRemoteError::RemoteExit {
                command,
                status: exit_status,
                stderr: stderr.trim().to_string(),
            });
        }

        // 退出码为 0 即视为成功；状态保存失败只记录
        let saved = pipeline::apply_post_actions(self.run, &staged.scheduled, self.project);
        let status_error = match saved {
            Ok(()) => None,
            Err(e) => {
                warn!(
                    project = %self.project.name(),
                    error = %e,
                    "job accepted but project status not saved"
                );
                Some(e.to_string())
            }
        };
        self.advance(SessionState::Succeeded)?;

        Ok(SubmissionReport {
            run: self.run,
            host: params.target(),
            script_name: staged.script_name.clone(),
            stages: staged.scheduled.iter().map(|s| s.tag).collect(),
            uploaded,
            failed_uploads,
            exit_status,
            stdout,
            stderr,
            status_error,
        })
    }

    /// 上传全部文件，返回成功数与失败文件名
    fn upload(
        &self,
        connection: &mut dyn Connection,
        staged: &StagedJob,
    ) -> Result<(usize, Vec<String>)> {
        let mut channel = connection.open_file_channel()?;
        let mut uploaded = 0;
        let mut failed = Vec::new();

        for path in staged.upload_order() {
            let name = file_name(path);
            match channel.send(path, &name) {
                Ok(()) => {
                    debug!(file = %name, "uploaded");
                    uploaded += 1;
                }
                Err(e) => match self.options.upload_policy {
                    UploadPolicy::Strict => {
                        channel.close();
                        return Err(e);
                    }
                    UploadPolicy::BestEffort => {
                        warn!(file = %name, error = %e, "upload failed, skipping");
                        failed.push(name);
                    }
                },
            }
        }

        channel.close();
        Ok((uploaded, failed))
    }

    /// 执行提交命令，轮询输出直到命令结束
    fn run_job(
        &self,
        connection: &mut dyn Connection,
        command: &str,
    ) -> Result<(i32, String, String)> {
        info!(command = %command, "submitting");
        let mut exec = connection.open_exec(command)?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let result = self.poll(exec.as_mut(), command, &mut stdout, &mut stderr);
        exec.close();
        result?;

        let status = exec.exit_status().unwrap_or(-1);
        debug!(status, "job command finished");
        Ok((
            status,
            String::from_utf8_lossy(&stdout).to_string(),
            String::from_utf8_lossy(&stderr).to_string(),
        ))
    }

    fn poll(
        &self,
        exec: &mut dyn ExecHandle,
        command: &str,
        stdout: &mut Vec<u8>,
        stderr: &mut Vec<u8>,
    ) -> Result<()> {
        loop {
            stdout.extend(exec.read_stdout());
            stderr.extend(exec.read_stderr());

            if exec.is_closed() {
                break;
            }
            if self.options.cancel.is_cancelled() {
                return Err(QeRemoteError::Cancelled {
                    command: command.to_string(),
                });
            }
            thread::sleep(self.options.poll_interval);
        }

        // 结束后剩余的输出
        stdout.extend(exec.read_stdout());
        stderr.extend(exec.read_stderr());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
// 辅助函数
// ─────────────────────────────────────────────────────────────

/// 子任务命令行：`<exe args> </dev/null 1><log> 2><err>`
///
/// 任一文件名为空时返回 `BlankFileName`。
pub fn stage_command(stage: &Stage, num_processes: i64) -> Result<String> {
    let blank = |file: &'static str| QeRemoteError::BlankFileName {
        command: format!("{} stage '{}'", stage.command, stage.tag),
        file,
    };
    let input_name = nonblank_str(&stage.input_file).ok_or_else(|| blank("input"))?;
    let log_name = nonblank_str(&stage.log_file).ok_or_else(|| blank("log"))?;
    let error_name = nonblank_str(&stage.error_file).ok_or_else(|| blank("error"))?;

    let args = build_command(stage.command, INPUT_NAME_PLACEHOLDER, num_processes)?;
    let line = args
        .iter()
        .map(|token| {
            if token == INPUT_NAME_PLACEHOLDER {
                input_name
            } else {
                token.as_str()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    Ok(format!(
        "{} </dev/null 1>{} 2>{}",
        line, log_name, error_name
    ))
}

fn nonblank_str(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|v| !v.is_empty())
}

fn remove_stale(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!(file = %path.display(), error = %e, "failed to remove stale file");
        }
    }
}

fn nonblank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::{DirectoryProject, ProjectManifest};
    use crate::parsers::pwscf::parse_qe_input;
    use crate::utils::scheduler::Scheduler;
    use crate::remote::transport::mock::MockTransport;

    const SCF_INPUT: &str = "&CONTROL\n calculation='scf'\n/\n&SYSTEM\n ibrav=2, nat=2, ntyp=1\n/\n\
                             ATOMIC_SPECIES\nSi 28.086 Si.pbe-n-rrkjus_psl.1.0.0.UPF\n";

    struct Fixture {
        _dir: tempfile::TempDir,
        project: DirectoryProject,
        env: RunEnvironment,
        profile: RemoteProfile,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let project_dir = dir.path().join("si");
        let pseudo_dir = dir.path().join("pseudo");
        fs::create_dir_all(&pseudo_dir).unwrap();
        fs::write(pseudo_dir.join("Si.pbe-n-rrkjus_psl.1.0.0.UPF"), "<UPF/>").unwrap();

        let mut project = DirectoryProject::init(
            &project_dir,
            &ProjectManifest {
                name: "silicon".to_string(),
                prefix: "si".to_string(),
            },
        )
        .unwrap();
        let scf = parse_qe_input(SCF_INPUT).unwrap();
        project.set_base_input(RunKind::SingleEnergy, scf.clone()).unwrap();

        let mut dos = scf.clone();
        dos.namelists.push(crate::models::input::Namelist::new("DOS"));
        project.set_base_input(RunKind::DensityOfStates, dos).unwrap();

        let mut profile = RemoteProfile::with_scheduler("hpc", Scheduler::Pbs).unwrap();
        profile.host = Some("login.hpc".to_string());
        profile.user = Some("me".to_string());
        profile.job_script = "#!/bin/bash\n${MODULE_COMMANDS}\n${QUANTUM_ESPRESSO_COMMAND}\n".to_string();

        let mut env = RunEnvironment::new(&pseudo_dir).with_parallelism(4, 1);
        env.pseudo_search_path = Some("./".to_string());

        Fixture {
            _dir: dir,
            project,
            env,
            profile,
        }
    }

    fn options() -> SessionOptions {
        SessionOptions {
            poll_interval: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_energy_end_to_end() {
        let f = fixture();
        let transport = MockTransport::default();
        let mut session =
            RemoteSession::new(&f.project, &f.profile, &f.env, RunKind::SingleEnergy, options());

        let report = session.submit(&transport).unwrap();
        assert_eq!(session.state(), SessionState::Succeeded);
        assert_eq!(report.script_name, "si.bash");
        assert_eq!(report.stages, vec!["scf"]);
        assert_eq!(report.exit_status, 0);

        let log = transport.log();
        assert_eq!(log.connects, 1);
        assert_eq!(log.disconnects, 1);
        assert_eq!(
            log.uploads,
            vec!["si.bash", "si.scf.in", "Si.pbe-n-rrkjus_psl.1.0.0.UPF"]
        );
        assert_eq!(log.commands, vec!["qsub si.bash"]);
        drop(log);

        let script = fs::read_to_string(f.project.directory().join("si.bash")).unwrap();
        assert!(script.contains(
            "mpirun -np 4 pw.x -in si.scf.in </dev/null 1>si.scf.log 2>si.scf.err"
        ));
        assert_eq!(f.project.property().status.scf_count, 1);
    }

    #[test]
    fn test_stage_writes_inputs_and_cleans_stale_files() {
        let f = fixture();
        let dir = f.project.directory().to_path_buf();
        fs::write(dir.join("si.EXIT"), "").unwrap();
        fs::write(dir.join("si.scf.log"), "old").unwrap();

        let mut session =
            RemoteSession::new(&f.project, &f.profile, &f.env, RunKind::SingleEnergy, options());
        let staged = session.stage().unwrap();

        assert_eq!(session.state(), SessionState::Staged);
        assert!(!dir.join("si.EXIT").exists());
        assert!(!dir.join("si.scf.log").exists());

        let written = pwscf::parse_qe_input_file(&dir.join("si.scf.in")).unwrap();
        assert_eq!(written.value("CONTROL", "title").unwrap().as_character(), "silicon(SCF)");
        assert_eq!(written.value("CONTROL", "pseudo_dir").unwrap().as_character(), "./");
        assert_eq!(staged.upload_order().len(), 3);
    }

    #[test]
    fn test_dos_pipeline_deduplicates_pseudopotentials() {
        let f = fixture();
        let mut session = RemoteSession::new(
            &f.project,
            &f.profile,
            &f.env,
            RunKind::DensityOfStates,
            options(),
        );
        let staged = session.stage().unwrap();

        // 四个子任务引用同一个赝势文件
        assert_eq!(staged.inputs.len(), 4);
        assert_eq!(staged.resources.len(), 1);
        assert_eq!(staged.commands.len(), 4);
        assert!(staged.commands[2].starts_with("mpirun -np 4 dos.x -in si.dos.in"));
    }

    #[test]
    fn test_dos_pipeline_skips_scf_when_done() {
        let f = fixture();
        f.project
            .update_property(&mut |p| p.status.record(RunKind::SingleEnergy))
            .unwrap();

        let transport = MockTransport::default();
        let mut session = RemoteSession::new(
            &f.project,
            &f.profile,
            &f.env,
            RunKind::DensityOfStates,
            options(),
        );
        let report = session.submit(&transport).unwrap();

        assert_eq!(report.stages, vec!["nscf", "dos", "pdos"]);
        let status = f.project.property().status;
        assert_eq!(status.scf_count, 1);
        assert_eq!(status.dos_count, 1);
    }

    #[test]
    fn test_missing_host_fails_before_connecting() {
        let mut f = fixture();
        f.profile.host = Some("  ".to_string());
        let transport = MockTransport::default();

        let mut session =
            RemoteSession::new(&f.project, &f.profile, &f.env, RunKind::SingleEnergy, options());
        let err = session.submit(&transport).unwrap_err();

        assert!(matches!(
            err,
            QeRemoteError::MissingProfileField { field: "host", .. }
        ));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(transport.log().connects, 0);
    }

    #[test]
    fn test_missing_key_file_is_not_a_password_fallback() {
        let mut f = fixture();
        f.profile.password = Some("secret".to_string());
        f.profile.key_path = Some("/nonexistent/id_rsa".to_string());

        let session =
            RemoteSession::new(&f.project, &f.profile, &f.env, RunKind::SingleEnergy, options());
        assert!(matches!(
            session.connect_params(),
            Err(QeRemoteError::KeyFileNotFound { .. })
        ));
    }

    #[test]
    fn test_credential_selection() {
        let mut f = fixture();
        f.profile.password = Some("secret".to_string());
        f.profile.work_directory = Some(" /scratch/me ".to_string());
        let session =
            RemoteSession::new(&f.project, &f.profile, &f.env, RunKind::SingleEnergy, options());
        let params = session.connect_params().unwrap();
        assert_eq!(params.credential, Credential::Password("secret".to_string()));
        assert_eq!(params.work_directory.as_deref(), Some("/scratch/me"));

        let key = f.project.directory().join("id_ed25519");
        fs::write(&key, "key").unwrap();
        f.profile.key_path = Some(key.display().to_string());
        let session =
            RemoteSession::new(&f.project, &f.profile, &f.env, RunKind::SingleEnergy, options());
        assert_eq!(
            session.connect_params().unwrap().credential,
            Credential::PrivateKey {
                path: key,
                password: Some("secret".to_string())
            }
        );
    }

    #[test]
    fn test_connect_failure_reports_transport_error() {
        let f = fixture();
        let transport = MockTransport {
            fail_connect: true,
            ..Default::default()
        };
        let mut session =
            RemoteSession::new(&f.project, &f.profile, &f.env, RunKind::SingleEnergy, options());

        let err = session.submit(&transport).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
        assert_eq!(transport.log().disconnects, 0);
        assert_eq!(f.project.property().status.scf_count, 0);
    }

    #[test]
    fn test_best_effort_upload_skips_failed_file() {
        let f = fixture();
        let transport = MockTransport {
            fail_upload: Some("si.scf.in".to_string()),
            ..Default::default()
        };
        let mut session =
            RemoteSession::new(&f.project, &f.profile, &f.env, RunKind::SingleEnergy, options());

        let report = session.submit(&transport).unwrap();
        assert_eq!(report.failed_uploads, vec!["si.scf.in"]);
        assert_eq!(report.uploaded, 2);
        assert_eq!(transport.log().commands.len(), 1);
    }

    #[test]
    fn test_strict_upload_aborts_and_disconnects() {
        let f = fixture();
        let transport = MockTransport {
            fail_upload: Some("si.scf.in".to_string()),
            ..Default::default()
        };
        let mut options = options();
        options.upload_policy = UploadPolicy::Strict;
        let mut session =
            RemoteSession::new(&f.project, &f.profile, &f.env, RunKind::SingleEnergy, options);

        let err = session.submit(&transport).unwrap_err();
        assert!(matches!(err, QeRemoteError::UploadFailed { .. }));

        let log = transport.log();
        assert!(log.commands.is_empty());
        assert_eq!(log.disconnects, 1);
    }

    #[test]
    fn test_nonzero_exit_is_remote_failure() {
        let f = fixture();
        let transport = MockTransport {
            exit_status: 1,
            ..Default::default()
        };
        let mut session =
            RemoteSession::new(&f.project, &f.profile, &f.env, RunKind::SingleEnergy, options());

        let err = session.submit(&transport).unwrap_err();
        assert!(matches!(err, QeRemoteError::RemoteExit { status: 1, .. }));
        assert_eq!(transport.log().disconnects, 1);
        assert_eq!(f.project.property().status.scf_count, 0);
    }

    #[test]
    fn test_cancellation_stops_polling_and_disconnects() {
        let f = fixture();
        let transport = MockTransport {
            never_close: true,
            ..Default::default()
        };
        let options = options();
        options.cancel.cancel();
        let mut session =
            RemoteSession::new(&f.project, &f.profile, &f.env, RunKind::SingleEnergy, options);

        let err = session.submit(&transport).unwrap_err();
        assert!(matches!(err, QeRemoteError::Cancelled { .. }));
        assert_eq!(transport.log().disconnects, 1);
    }

    #[test]
    fn test_wait_deadline_cancels_running_job() {
        let f = fixture();
        let transport = MockTransport {
            never_close: true,
            ..Default::default()
        };
        let options = SessionOptions {
            cancel: CancelToken::with_deadline(Duration::from_millis(20)),
            ..options()
        };
        let mut session =
            RemoteSession::new(&f.project, &f.profile, &f.env, RunKind::SingleEnergy, options);

        let err = session.submit(&transport).unwrap_err();
        assert!(matches!(err, QeRemoteError::Cancelled { .. }));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(transport.log().commands.len(), 1);
    }

    #[test]
    fn test_missing_base_input() {
        let f = fixture();
        let mut session =
            RemoteSession::new(&f.project, &f.profile, &f.env, RunKind::Relax, options());
        assert!(matches!(
            session.stage(),
            Err(QeRemoteError::MissingBaseInput { .. })
        ));
    }

    #[test]
    fn test_stage_command_line() {
        let f = fixture();
        let stages = pipeline::resolve(RunKind::BandStructure, &f.project).unwrap();
        assert_eq!(
            stage_command(&stages[2], 1).unwrap(),
            "bands.x -in si.band.up.in </dev/null 1>si.band.up.log 2>si.band.up.err"
        );
    }

    #[test]
    fn test_blank_stage_file_name_is_pipeline_error() {
        let f = fixture();
        let mut stages = pipeline::resolve(RunKind::SingleEnergy, &f.project).unwrap();
        stages[0].log_file = "  ".to_string();

        let err = stage_command(&stages[0], 4).unwrap_err();
        assert!(matches!(err, QeRemoteError::BlankFileName { file: "log", .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::Pipeline);
    }

    #[test]
    fn test_unsaved_status_does_not_fail_accepted_job() {
        let f = fixture();
        // 状态文件被目录占据，保存必然失败
        let status_path = f.project.directory().join(crate::models::project::STATUS_FILE);
        let _ = fs::remove_file(&status_path);
        fs::create_dir_all(&status_path).unwrap();

        let transport = MockTransport::default();
        let mut session =
            RemoteSession::new(&f.project, &f.profile, &f.env, RunKind::SingleEnergy, options());
        let report = session.submit(&transport).unwrap();

        assert_eq!(session.state(), SessionState::Succeeded);
        assert_eq!(report.exit_status, 0);
        assert!(report.status_error.is_some());
        assert_eq!(transport.log().commands, vec!["qsub si.bash"]);
        assert_eq!(f.project.property().status.scf_count, 0);
    }
}
