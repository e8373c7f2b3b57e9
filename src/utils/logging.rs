use anyhow::Result;
/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::fs;
use tracing::info;

use crate::config::Config;

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
///
/// # 返回
/// 返回是否成功初始化
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n网站适老化审计日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 双队列审计模式（浏览器独占）");
    info!("📁 任务目录: {}", config.jobs_folder);
    info!("📁 完整报告: {}", config.full_reports_dir);
    info!("📁 快速报告: {}", config.lite_reports_dir);
    match config.job_timeout() {
        Some(limit) => info!("⏱️ 单任务上限: {}s", limit.as_secs()),
        None => info!("⏱️ 单任务上限: 不限制"),
    }
    info!("{}", "=".repeat(60));
}

/// 记录任务加载信息
///
/// # 参数
/// - `full`: 完整审计任务数
/// - `quick`: 快速扫描任务数
pub fn log_jobs_loaded(full: usize, quick: usize) {
    info!("✓ 找到 {} 个任务", full + quick);
    info!("📋 完整审计 {} 个，快速扫描 {} 个", full, quick);
    info!("💡 同一时刻只有一个任务使用浏览器\n");
}

/// 一次运行的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    /// 提交前被拒绝（邮箱或 URL 为空）
    pub rejected: usize,
    pub full_completed: usize,
    pub full_failed: usize,
    pub quick_completed: usize,
    pub quick_failed: usize,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.full_completed + self.quick_completed
    }

    pub fn failed(&self) -> usize {
        self.rejected + self.full_failed + self.quick_failed
    }
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 本次运行的汇总
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(summary: &RunSummary, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部任务完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", summary.succeeded(), summary.total);
    info!(
        "   完整审计 {} 个，快速扫描 {} 个",
        summary.full_completed, summary.quick_completed
    );
    info!("❌ 失败: {}", summary.failed());
    if summary.rejected > 0 {
        info!("   其中 {} 个请求被拒绝", summary.rejected);
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("适老化审计报告", 3), "适老化...");
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn test_run_summary_totals() {
        let summary = RunSummary {
            total: 6,
            rejected: 1,
            full_completed: 2,
            full_failed: 1,
            quick_completed: 1,
            quick_failed: 1,
        };
        assert_eq!(summary.succeeded(), 3);
        assert_eq!(summary.failed(), 3);
    }

    #[test]
    fn test_init_log_file_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        init_log_file(path.to_str().unwrap()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&"=".repeat(60)));
        assert!(content.contains("网站适老化审计日志"));
    }
}
