//! # qeremote - Quantum ESPRESSO 远程提交工具
//!
//! 把一次计算（SCF、结构优化、分子动力学、态密度、能带）展开成
//! 多个 QE 子任务，写出输入文件与一个作业脚本，通过 SSH 上传并提交
//! 到远程主机的作业调度系统。
//!
//! ## 子命令
//! - `init`    - 新建项目
//! - `submit`  - 准备并提交项目
//! - `stages`  - 查看解析后的子任务
//! - `profile` - 管理远程配置
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── batch/     (批量并行)
//!   │     ├── remote/    (提交会话与 SSH 传输)
//!   │     ├── pipeline/  (子任务流水线)
//!   │     ├── parsers/   (QE 输入读写)
//!   │     └── models/    (数据模型)
//!   ├── utils/      (日志、输出、进度条)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod error;
mod models;
mod parsers;
mod pipeline;
mod remote;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    utils::logging::init(cli.verbose);

    if let Err(e) = commands::run(cli.command) {
        tracing::debug!(kind = %e.kind(), "command failed");
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
