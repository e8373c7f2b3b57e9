use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// Chrome / Chromium 可执行文件路径（为空时由 chromiumoxide 自动探测）
    pub chrome_path: Option<String>,
    /// lighthouse CLI 路径
    pub lighthouse_bin: String,
    /// 完整审计使用的 Lighthouse 配置文件
    pub lighthouse_config_full: String,
    /// 快速扫描使用的 Lighthouse 配置文件
    pub lighthouse_config_lite: String,
    /// 任务请求 TOML 文件存放目录
    pub jobs_folder: String,
    /// 临时工作目录（每个任务一个子目录）
    pub scratch_dir: String,
    /// 完整审计报告输出目录
    pub full_reports_dir: String,
    /// 快速扫描报告输出目录
    pub lite_reports_dir: String,
    /// 完成信号推送地址（为空时只记录日志）
    pub status_endpoint: Option<String>,
    /// 类别权重覆盖文件（TOML）
    pub category_file: Option<String>,
    // --- 链接收集配置 ---
    pub max_links: usize,
    pub max_depth: usize,
    pub link_delay_ms: u64,
    pub link_timeout_ms: u64,
    pub link_max_retries: usize,
    // --- 超时配置 ---
    /// 单次 Lighthouse 审计的超时（秒）
    pub audit_timeout_secs: u64,
    /// 单个任务的硬上限（秒），0 表示不限制
    pub job_timeout_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chrome_path: None,
            lighthouse_bin: "lighthouse".to_string(),
            lighthouse_config_full: "lighthouse/custom-config.js".to_string(),
            lighthouse_config_lite: "lighthouse/custom-config-lite.js".to_string(),
            jobs_folder: "jobs".to_string(),
            scratch_dir: "reports".to_string(),
            full_reports_dir: "reports-full".to_string(),
            lite_reports_dir: "reports-lite".to_string(),
            status_endpoint: None,
            category_file: None,
            max_links: 10,
            max_depth: 2,
            link_delay_ms: 2000,
            link_timeout_ms: 15000,
            link_max_retries: 3,
            audit_timeout_secs: 300,
            job_timeout_secs: 3 * 60 * 60,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    /// 从环境变量读取配置，未设置的项使用默认值
    ///
    /// 数值或布尔变量格式错误时返回 `ConfigError::EnvVarParseFailed`
    pub fn from_env() -> AppResult<Self> {
        let default = Self::default();
        Ok(Self {
            chrome_path: env_opt("CHROME_PATH").or(default.chrome_path),
            lighthouse_bin: std::env::var("LIGHTHOUSE_BIN").unwrap_or(default.lighthouse_bin),
            lighthouse_config_full: std::env::var("LIGHTHOUSE_CONFIG_FULL").unwrap_or(default.lighthouse_config_full),
            lighthouse_config_lite: std::env::var("LIGHTHOUSE_CONFIG_LITE").unwrap_or(default.lighthouse_config_lite),
            jobs_folder: std::env::var("JOBS_FOLDER").unwrap_or(default.jobs_folder),
            scratch_dir: std::env::var("SCRATCH_DIR").unwrap_or(default.scratch_dir),
            full_reports_dir: std::env::var("FULL_REPORTS_DIR").unwrap_or(default.full_reports_dir),
            lite_reports_dir: std::env::var("LITE_REPORTS_DIR").unwrap_or(default.lite_reports_dir),
            status_endpoint: env_opt("STATUS_ENDPOINT").or(default.status_endpoint),
            category_file: env_opt("CATEGORY_FILE").or(default.category_file),
            max_links: env_parse("MAX_LINKS", default.max_links, "usize")?,
            max_depth: env_parse("MAX_DEPTH", default.max_depth, "usize")?,
            link_delay_ms: env_parse("LINK_DELAY_MS", default.link_delay_ms, "u64")?,
            link_timeout_ms: env_parse("LINK_TIMEOUT_MS", default.link_timeout_ms, "u64")?,
            link_max_retries: env_parse("LINK_MAX_RETRIES", default.link_max_retries, "usize")?,
            audit_timeout_secs: env_parse("AUDIT_TIMEOUT_SECS", default.audit_timeout_secs, "u64")?,
            job_timeout_secs: env_parse("JOB_TIMEOUT_SECS", default.job_timeout_secs, "u64")?,
            verbose_logging: env_parse("VERBOSE_LOGGING", default.verbose_logging, "bool")?,
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        })
    }

    /// 单个任务的硬上限，`None` 表示不限制
    pub fn job_timeout(&self) -> Option<Duration> {
        (self.job_timeout_secs > 0).then(|| Duration::from_secs(self.job_timeout_secs))
    }

    pub fn audit_timeout(&self) -> Duration {
        Duration::from_secs(self.audit_timeout_secs)
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T, expected_type: &str) -> AppResult<T> {
    parse_value(name, env_opt(name), default, expected_type)
}

fn parse_value<T: FromStr>(
    name: &str,
    raw: Option<String>,
    default: T,
    expected_type: &str,
) -> AppResult<T> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::env_parse_failed(name, value, expected_type)),
    }
}
