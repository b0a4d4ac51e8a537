//! # 统一错误处理模块
//!
//! 定义 qeremote 的所有错误类型，使用 `thiserror` 派生。
//! 错误按提交流程分类：配置、流水线、文件 I/O、传输、远程退出码。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// 错误类别，供调用方区分失败阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Pipeline,
    Io,
    Transport,
    RemoteExit,
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Pipeline => "pipeline",
            ErrorKind::Io => "io",
            ErrorKind::Transport => "transport",
            ErrorKind::RemoteExit => "remote-exit",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// qeremote 统一错误类型
#[derive(Error, Debug)]
pub enum QeRemoteError {
    // ─────────────────────────────────────────────────────────────
    // 配置错误（连接之前即失败）
    // ─────────────────────────────────────────────────────────────
    #[error("Remote profile title must not be empty")]
    EmptyProfileTitle,

    #[error("Remote profile '{title}': {field} is not specified")]
    MissingProfileField { title: String, field: &'static str },

    #[error("Private key file not found: {path}")]
    KeyFileNotFound { path: String },

    #[error("Remote profile not found: {title}")]
    ProfileNotFound { title: String },

    #[error("Remote profile already exists: {title}")]
    DuplicateProfile { title: String },

    // ─────────────────────────────────────────────────────────────
    // 流水线错误
    // ─────────────────────────────────────────────────────────────
    #[error("Malformed pipeline for {run}: {reason}")]
    MalformedPipeline { run: String, reason: String },

    #[error("Project has no base input for {run}")]
    MissingBaseInput { run: String },

    #[error("No stage of the {run} pipeline produced an input file")]
    NothingToSubmit { run: String },

    #[error("Blank {file} file name for {command}")]
    BlankFileName { command: String, file: &'static str },

    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 传输错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to connect to {target}: {reason}")]
    ConnectFailed { target: String, reason: String },

    #[error("Failed to upload {file}: {reason}")]
    UploadFailed { file: String, reason: String },

    #[error("Failed to execute remote command '{command}': {reason}")]
    ExecFailed { command: String, reason: String },

    #[error("Remote command was cancelled: {command}")]
    Cancelled { command: String },

    // ─────────────────────────────────────────────────────────────
    // 远程退出码
    // ─────────────────────────────────────────────────────────────
    #[error("Remote command '{command}' exited with status {status}\n{stderr}")]
    RemoteExit {
        command: String,
        status: i32,
        stderr: String,
    },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} input: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 序列化错误
    // ─────────────────────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

impl QeRemoteError {
    /// 错误所属类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            QeRemoteError::EmptyProfileTitle
            | QeRemoteError::MissingProfileField { .. }
            | QeRemoteError::KeyFileNotFound { .. }
            | QeRemoteError::ProfileNotFound { .. }
            | QeRemoteError::DuplicateProfile { .. }
            | QeRemoteError::InvalidArgument(_) => ErrorKind::Configuration,

            QeRemoteError::MalformedPipeline { .. }
            | QeRemoteError::MissingBaseInput { .. }
            | QeRemoteError::NothingToSubmit { .. }
            | QeRemoteError::BlankFileName { .. } => ErrorKind::Pipeline,

            QeRemoteError::FileReadError { .. }
            | QeRemoteError::FileWriteError { .. }
            | QeRemoteError::DirectoryNotFound { .. }
            | QeRemoteError::ParseError { .. }
            | QeRemoteError::Json(_)
            | QeRemoteError::Csv(_) => ErrorKind::Io,

            QeRemoteError::ConnectFailed { .. }
            | QeRemoteError::UploadFailed { .. }
            | QeRemoteError::ExecFailed { .. }
            | QeRemoteError::Cancelled { .. } => ErrorKind::Transport,

            QeRemoteError::RemoteExit { .. } => ErrorKind::RemoteExit,

            QeRemoteError::Other(_) => ErrorKind::Other,
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, QeRemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_grouping() {
        let err = QeRemoteError::KeyFileNotFound {
            path: "/nope/id_rsa".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = QeRemoteError::RemoteExit {
            command: "qsub job.sh".to_string(),
            status: 1,
            stderr: String::new(),
        };
        assert_eq!(err.kind(), ErrorKind::RemoteExit);
        assert!(err.to_string().contains("status 1"));
    }
}
