//! # 传输层接口
//!
//! 提交会话通过这里的 trait 访问远程主机：建立连接、上传文件、执行命令。
//! 具体实现见 `remote/openssh.rs`；测试使用 `mock::MockTransport`。
//!
//! 所有调用都是阻塞的。`ExecHandle` 的读取是非阻塞的可用性检查，
//! 由会话按固定间隔轮询。
//!
//! ## 依赖关系
//! - 被 `remote/session.rs`, `remote/openssh.rs` 使用
//! - 无外部模块依赖

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// 认证方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// 私钥认证；password 为私钥被拒绝时回退使用的登录密码
    PrivateKey {
        path: PathBuf,
        password: Option<String>,
    },
    Password(String),
    /// 交由 ssh agent / 默认配置
    None,
}

/// 连接参数
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub credential: Credential,
    pub timeout: Duration,
    /// 远程工作目录；上传与执行都在该目录下进行
    pub work_directory: Option<String>,
}

impl ConnectParams {
    /// `user@host:port`，用于日志与错误信息
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

/// 传输能力
pub trait Transport: Send + Sync {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>>;
}

/// 已建立的连接
pub trait Connection: Send {
    fn open_file_channel(&mut self) -> Result<Box<dyn FileChannel>>;

    fn open_exec(&mut self, command: &str) -> Result<Box<dyn ExecHandle>>;

    fn disconnect(&mut self);
}

/// 文件上传通道
pub trait FileChannel: Send {
    /// 上传本地文件，远程文件名为 `remote_name`
    fn send(&mut self, local: &Path, remote_name: &str) -> Result<()>;

    fn close(&mut self) {}
}

/// 远程命令句柄
pub trait ExecHandle: Send {
    /// 读取当前已到达的标准输出（可能为空）
    fn read_stdout(&mut self) -> Vec<u8>;

    fn read_stderr(&mut self) -> Vec<u8>;

    fn is_closed(&mut self) -> bool;

    /// 命令结束后的退出码
    fn exit_status(&mut self) -> Option<i32>;

    fn close(&mut self) {}
}

// ─────────────────────────────────────────────────────────────
// 连接守卫与取消标记
// ─────────────────────────────────────────────────────────────

/// 连接守卫：离开作用域时断开连接，且只断开一次
pub struct ConnectionGuard {
    connection: Box<dyn Connection>,
    target: String,
    closed: bool,
}

impl ConnectionGuard {
    pub fn new(connection: Box<dyn Connection>, target: impl Into<String>) -> Self {
        ConnectionGuard {
            connection,
            target: target.into(),
            closed: false,
        }
    }

    pub fn connection(&mut self) -> &mut dyn Connection {
        self.connection.as_mut()
    }

    /// 显式断开
    pub fn close(mut self) {
        self.disconnect();
    }

    fn disconnect(&mut self) {
        if !self.closed {
            self.closed = true;
            self.connection.disconnect();
            debug!(host = %self.target, "disconnected");
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// 协作式取消标记，可跨线程共享
///
/// 设置了截止时间的标记在到期后的第一次检查时自动取消。
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从现在起 `timeout` 后到期
    pub fn with_deadline(timeout: Duration) -> Self {
        CancelToken {
            flag: Arc::default(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if !self.flag.load(Ordering::SeqCst)
            && self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
        {
            debug!("deadline reached, cancelling");
            self.cancel();
        }
        self.flag.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────
// 测试用传输
// ─────────────────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    fn params() -> ConnectParams {
        ConnectParams {
            host: "hpc".to_string(),
            port: 22,
            user: "me".to_string(),
            credential: Credential::None,
            timeout: Duration::from_secs(5),
            work_directory: None,
        }
    }

    #[test]
    fn test_guard_disconnects_once() {
        let transport = MockTransport::default();
        let connection = transport.connect(&params()).unwrap();
        {
            let guard = ConnectionGuard::new(connection, "hpc");
            guard.close();
        }
        assert_eq!(transport.log().disconnects, 1);

        let connection = transport.connect(&params()).unwrap();
        drop(ConnectionGuard::new(connection, "hpc"));
        assert_eq!(transport.log().disconnects, 2);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!token.is_cancelled());
        other.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_deadline_cancels_token() {
        let expired = CancelToken::with_deadline(Duration::ZERO);
        let shared = expired.clone();
        assert!(expired.is_cancelled());
        assert!(shared.is_cancelled());

        let pending = CancelToken::with_deadline(Duration::from_secs(3600));
        assert!(!pending.is_cancelled());
    }

    #[test]
    fn test_target() {
        assert_eq!(params().target(), "me@hpc:22");
    }
}
