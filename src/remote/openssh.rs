//! # OpenSSH 传输实现
//!
//! 调用系统的 `ssh` 程序实现 `Transport`：
//! - 连接：执行一次探测命令 `true`
//! - 上传：`ssh ... "cat > <remote>"`，本地文件作为标准输入
//! - 执行：子进程 + 读取线程，通过 channel 提供非阻塞读取
//!
//! 密码认证通过 `sshpass -e` 完成，密码放在 `SSHPASS` 环境变量中。
//!
//! ## 依赖关系
//! - 被 `commands/submit.rs` 使用
//! - 使用 `remote/transport.rs`

use super::transport::{ConnectParams, Connection, Credential, ExecHandle, FileChannel, Transport};
use crate::error::{QeRemoteError, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use tracing::{debug, info};

const PROBE_COMMAND: &str = "true";

/// 基于系统 ssh 的传输
#[derive(Debug, Clone)]
pub struct OpenSshTransport {
    ssh_program: String,
}

impl Default for OpenSshTransport {
    fn default() -> Self {
        OpenSshTransport {
            ssh_program: "ssh".to_string(),
        }
    }
}

impl OpenSshTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for OpenSshTransport {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>> {
        let connection = OpenSshConnection {
            ssh_program: self.ssh_program.clone(),
            params: params.clone(),
        };

        let output = connection
            .command(PROBE_COMMAND)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| QeRemoteError::ConnectFailed {
                target: params.target(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(QeRemoteError::ConnectFailed {
                target: params.target(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(host = %params.target(), "connected");
        Ok(Box::new(connection))
    }
}

#[derive(Clone)]
struct OpenSshConnection {
    ssh_program: String,
    params: ConnectParams,
}

impl OpenSshConnection {
    /// 构造执行远程命令的 ssh 进程
    fn command(&self, remote_command: &str) -> Command {
        let params = &self.params;

        let mut cmd = match &params.credential {
            Credential::Password(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.env("SSHPASS", password).arg("-e").arg(&self.ssh_program);
                cmd
            }
            Credential::PrivateKey {
                password: Some(password),
                ..
            } => {
                let mut cmd = Command::new("sshpass");
                cmd.env("SSHPASS", password).arg("-e").arg(&self.ssh_program);
                cmd
            }
            _ => Command::new(&self.ssh_program),
        };

        if let Credential::PrivateKey { path, password } = &params.credential {
            cmd.arg("-i").arg(path);
            // 有密码时允许私钥失败后回退到密码认证
            if password.is_none() {
                cmd.args(["-o", "BatchMode=yes"]);
            }
        }

        cmd.arg("-p").arg(params.port.to_string());
        cmd.arg("-o")
            .arg(format!("ConnectTimeout={}", params.timeout.as_secs().max(1)));
        cmd.args(["-o", "StrictHostKeyChecking=accept-new"]);
        cmd.arg(format!("{}@{}", params.user, params.host));
        cmd.arg(remote_command);
        cmd
    }

    /// 在工作目录下执行
    fn in_work_directory(&self, command: &str) -> String {
        match self.work_directory() {
            Some(dir) => format!("cd {} && {}", shell_quote(dir), command),
            None => command.to_string(),
        }
    }

    fn work_directory(&self) -> Option<&str> {
        self.params
            .work_directory
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

impl Connection for OpenSshConnection {
    fn open_file_channel(&mut self) -> Result<Box<dyn FileChannel>> {
        Ok(Box::new(OpenSshFileChannel {
            connection: self.clone(),
        }))
    }

    fn open_exec(&mut self, command: &str) -> Result<Box<dyn ExecHandle>> {
        let remote_command = self.in_work_directory(command);
        debug!(command = %remote_command, "exec");

        let mut child = self
            .command(&remote_command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| QeRemoteError::ExecFailed {
                command: command.to_string(),
                reason: e.to_string(),
            })?;

        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        Ok(Box::new(OpenSshExec {
            child,
            stdout: StreamBuffer::new(stdout),
            stderr: StreamBuffer::new(stderr),
            status: None,
        }))
    }

    fn disconnect(&mut self) {
        // 每个操作都是独立的 ssh 进程，没有常驻会话
        debug!(host = %self.params.target(), "session closed");
    }
}

// ─────────────────────────────────────────────────────────────
// 上传
// ─────────────────────────────────────────────────────────────

struct OpenSshFileChannel {
    connection: OpenSshConnection,
}

impl FileChannel for OpenSshFileChannel {
    fn send(&mut self, local: &Path, remote_name: &str) -> Result<()> {
        let upload_error = |reason: String| QeRemoteError::UploadFailed {
            file: local.display().to_string(),
            reason,
        };

        let file = File::open(local).map_err(|e| upload_error(e.to_string()))?;
        let remote_command = match self.connection.work_directory() {
            Some(dir) => format!(
                "mkdir -p {} && cat > {}",
                shell_quote(dir),
                shell_quote(&format!("{}/{}", dir.trim_end_matches('/'), remote_name))
            ),
            None => format!("cat > {}", shell_quote(remote_name)),
        };

        let output = self
            .connection
            .command(&remote_command)
            .stdin(file)
            .output()
            .map_err(|e| upload_error(e.to_string()))?;

        if !output.status.success() {
            return Err(upload_error(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        debug!(file = %remote_name, "uploaded");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
// 远程命令
// ─────────────────────────────────────────────────────────────

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// 读取线程的输出缓冲
struct StreamBuffer {
    rx: Option<Receiver<Vec<u8>>>,
    pending: Vec<u8>,
}

impl StreamBuffer {
    fn new(rx: Option<Receiver<Vec<u8>>>) -> Self {
        StreamBuffer {
            rx,
            pending: Vec::new(),
        }
    }

    /// 取出已到达的数据；读取线程结束后 rx 置空
    fn pump(&mut self) {
        let Some(rx) = &self.rx else {
            return;
        };
        loop {
            match rx.try_recv() {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.rx = None;
                    break;
                }
            }
        }
    }

    fn take(&mut self) -> Vec<u8> {
        self.pump();
        std::mem::take(&mut self.pending)
    }

    fn is_done(&self) -> bool {
        self.rx.is_none()
    }
}

struct OpenSshExec {
    child: Child,
    stdout: StreamBuffer,
    stderr: StreamBuffer,
    status: Option<i32>,
}

impl ExecHandle for OpenSshExec {
    fn read_stdout(&mut self) -> Vec<u8> {
        self.stdout.take()
    }

    fn read_stderr(&mut self) -> Vec<u8> {
        self.stderr.take()
    }

    fn is_closed(&mut self) -> bool {
        self.stdout.pump();
        self.stderr.pump();

        if self.status.is_none() {
            if let Ok(Some(status)) = self.child.try_wait() {
                self.status = Some(status.code().unwrap_or(-1));
            }
        }

        self.status.is_some() && self.stdout.is_done() && self.stderr.is_done()
    }

    fn exit_status(&mut self) -> Option<i32> {
        self.status
    }

    fn close(&mut self) {
        if self.status.is_none() {
            let _ = self.child.kill();
            if let Ok(status) = self.child.wait() {
                self.status = Some(status.code().unwrap_or(-1));
            }
        }
    }
}

impl Drop for OpenSshExec {
    fn drop(&mut self) {
        self.close();
    }
}

/// 单引号包裹，转义内部的单引号
pub fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn connection(credential: Credential, work_directory: Option<&str>) -> OpenSshConnection {
        OpenSshConnection {
            ssh_program: "ssh".to_string(),
            params: ConnectParams {
                host: "login.hpc".to_string(),
                port: 2222,
                user: "me".to_string(),
                credential,
                timeout: Duration::from_secs(30),
                work_directory: work_directory.map(|d| d.to_string()),
            },
        }
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_key_auth_uses_batch_mode() {
        let conn = connection(
            Credential::PrivateKey {
                path: "/home/me/.ssh/id_ed25519".into(),
                password: None,
            },
            None,
        );
        let cmd = conn.command("true");
        assert_eq!(cmd.get_program(), "ssh");

        let args = args_of(&cmd);
        assert!(args.contains(&"-i".to_string()));
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=30".to_string()));
        assert_eq!(args[args.len() - 2], "me@login.hpc");
        assert_eq!(args[args.len() - 1], "true");
    }

    #[test]
    fn test_password_auth_uses_sshpass() {
        let conn = connection(Credential::Password("secret".to_string()), None);
        let cmd = conn.command("true");
        assert_eq!(cmd.get_program(), "sshpass");

        let args = args_of(&cmd);
        assert_eq!(args[0], "-e");
        assert_eq!(args[1], "ssh");
        assert!(!args.contains(&"BatchMode=yes".to_string()));
        // 密码不出现在命令行中
        assert!(!args.iter().any(|a| a.contains("secret")));
    }

    #[test]
    fn test_work_directory_prefix() {
        let conn = connection(Credential::None, Some(" /scratch/me's run "));
        assert_eq!(
            conn.in_work_directory("qsub si.sh"),
            "cd '/scratch/me'\\''s run' && qsub si.sh"
        );

        let conn = connection(Credential::None, Some("  "));
        assert_eq!(conn.in_work_directory("qsub si.sh"), "qsub si.sh");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }
}
