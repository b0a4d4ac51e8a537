//! # 日志初始化
//!
//! 安装 `tracing-subscriber`：fmt 层输出到 stderr，过滤级别来自
//! `RUST_LOG`；未设置时由 `-v` 次数决定（默认 warn）。
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `-v` 次数对应的默认过滤级别
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    // 重复初始化（例如测试中）时忽略
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(0), "warn");
        assert_eq!(default_directive(2), "debug");
        assert_eq!(default_directive(9), "trace");
    }
}
