//! 日志初始化
//!
//! 控制台输出 + 可选的日志文件（追加写入，不带颜色）。
//! 过滤级别优先读取 `RUST_LOG`，否则按 verbose 选择 debug / info。

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

/// 只输出到控制台
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(env_filter(false))
        .with(fmt::layer().with_target(false))
        .try_init();
}

/// 输出到控制台，同时追加到 `log_file`
pub fn init_with_log_file(log_file: &Path, verbose: bool) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()?;
    Ok(())
}
