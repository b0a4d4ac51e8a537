//! # 可执行程序命令行构造
//!
//! 根据子任务类型、输入文件名与进程数生成 QE 程序的参数列表。
//!
//! ## 依赖关系
//! - 被 `pipeline/stage.rs`, `remote/session.rs`, `commands/profile.rs` 使用
//! - 使用 `error.rs`

use crate::error::{QeRemoteError, Result};
use serde::Serialize;

/// QE 可执行程序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandKind {
    /// pw.x（scf / nscf / bands / relax / md）
    PwScf,
    /// dos.x
    Dos,
    /// projwfc.x
    Projwfc,
    /// bands.x
    Bands,
}

impl CommandKind {
    pub fn executable(&self) -> &'static str {
        match self {
            CommandKind::PwScf => "pw.x",
            CommandKind::Dos => "dos.x",
            CommandKind::Projwfc => "projwfc.x",
            CommandKind::Bands => "bands.x",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.executable())
    }
}

/// 生成参数列表；进程数大于 1 时用 `mpirun -np` 启动
pub fn build_command(
    kind: CommandKind,
    input_name: &str,
    num_processes: i64,
) -> Result<Vec<String>> {
    let input_name = input_name.trim();
    if input_name.is_empty() {
        return Err(QeRemoteError::BlankFileName {
            command: kind.executable().to_string(),
            file: "input",
        });
    }

    let num_processes = num_processes.max(1);
    let mut args = Vec::new();

    if num_processes > 1 {
        args.push("mpirun".to_string());
        args.push("-np".to_string());
        args.push(num_processes.to_string());
    }

    args.push(kind.executable().to_string());
    args.push("-in".to_string());
    args.push(input_name.to_string());

    Ok(args)
}
