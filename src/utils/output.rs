//! # 终端输出
//!
//! 统一的带标记输出：`[OK]`、`[ERR]`、`[WARN]`、`[*]`、`[SKIP]`、`[DONE]`。
//! 错误写到 stderr，其余写到 stdout。
//!
//! ## 依赖关系
//! - 被 `commands/` 与 `main.rs` 使用
//! - 使用 `colored` crate

use colored::{ColoredString, Colorize};

const RULE_WIDTH: usize = 60;

fn tagged(tag: ColoredString, msg: &str) {
    println!("{} {}", tag, msg);
}

pub fn print_success(msg: &str) {
    tagged("[OK]".green().bold(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

pub fn print_warning(msg: &str) {
    tagged("[WARN]".yellow().bold(), msg);
}

pub fn print_info(msg: &str) {
    tagged("[*]".blue().bold(), msg);
}

/// 被跳过的子任务或项目
pub fn print_skip(msg: &str) {
    tagged("[SKIP]".dimmed(), msg);
}

pub fn print_done(msg: &str) {
    tagged("[DONE]".green().bold(), msg);
}

/// 子任务：标签 -> 命令行
pub fn print_stage(tag: &str, command: &str) {
    let line = format!("{} {} {}", tag.dimmed(), "->".cyan(), command);
    tagged("[OK]".green().bold(), &line);
}

/// 对齐的 `名称 值`；值为空时显示 `-`
pub fn print_field(name: &str, value: Option<&str>) {
    let value = value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or("-");
    println!("  {} {}", format!("{:<16}", name).bold(), value);
}

/// 标题栏
pub fn print_header(title: &str) {
    let rule = "─".repeat(RULE_WIDTH).dimmed();
    println!("\n{}\n  {}\n{}\n", rule, title.bold(), rule);
}

pub fn print_separator() {
    println!("{}", "─".repeat(RULE_WIDTH).dimmed());
}
