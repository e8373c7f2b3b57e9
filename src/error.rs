use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 浏览器相关错误
    Browser(BrowserError),
    /// 外部审计（Lighthouse）错误
    Audit(AuditError),
    /// 文件操作错误
    File(FileError),
    /// 评分错误
    Scoring(ScoringError),
    /// 链接收集错误
    Link(crate::services::link_collector::LinkCollectError),
    /// 报告生成错误
    Report(ReportError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Browser(e) => write!(f, "浏览器错误: {}", e),
            AppError::Audit(e) => write!(f, "审计错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Scoring(e) => write!(f, "评分错误: {}", e),
            AppError::Link(e) => write!(f, "链接收集错误: {}", e),
            AppError::Report(e) => write!(f, "报告错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Browser(e) => Some(e),
            AppError::Audit(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Scoring(e) => Some(e),
            AppError::Link(e) => Some(e),
            AppError::Report(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 浏览器相关错误
#[derive(Debug)]
pub enum BrowserError {
    /// 启动浏览器失败
    LaunchFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 导航失败
    NavigationFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 执行脚本失败
    ScriptExecutionFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 浏览器配置失败
    ConfigurationFailed { message: String },
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserError::LaunchFailed { source } => write!(f, "启动无头浏览器失败: {}", source),
            BrowserError::NavigationFailed { url, source } => {
                write!(f, "导航到 {} 失败: {}", url, source)
            }
            BrowserError::ScriptExecutionFailed { source } => {
                write!(f, "执行脚本失败: {}", source)
            }
            BrowserError::ConfigurationFailed { message } => {
                write!(f, "浏览器配置失败: {}", message)
            }
        }
    }
}

impl std::error::Error for BrowserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrowserError::LaunchFailed { source }
            | BrowserError::NavigationFailed { source, .. }
            | BrowserError::ScriptExecutionFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            BrowserError::ConfigurationFailed { .. } => None,
        }
    }
}

/// 外部审计错误
///
/// 区分"页面加载失败"这类瞬时错误，与评分为 0 的系统性错误（见 `ScoringError`）
#[derive(Debug)]
pub enum AuditError {
    /// URL 为空
    MissingUrl,
    /// 页面返回非 200 状态码
    BadStatus { url: String, status: u16 },
    /// 导航或审计超时
    TimedOut { url: String, seconds: u64 },
    /// Lighthouse 进程失败
    LighthouseFailed { code: Option<i32>, stderr: String },
    /// Lighthouse 未生成报告文件
    ReportMissing { path: String },
    /// 浏览器层错误
    Browser(BrowserError),
}

impl AuditError {
    /// 是否值得使用进阶策略重试（403 或超时）
    pub fn is_escalatable(&self) -> bool {
        matches!(
            self,
            AuditError::BadStatus { status: 403, .. } | AuditError::TimedOut { .. }
        )
    }
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditError::MissingUrl => write!(f, "URL is required."),
            AuditError::BadStatus { url, status } => {
                write!(f, "Failed to load page {}: Status code {}", url, status)
            }
            AuditError::TimedOut { url, seconds } => {
                write!(f, "Navigation to {} timed out after {}s", url, seconds)
            }
            AuditError::LighthouseFailed { code, stderr } => {
                write!(f, "Lighthouse 进程退出 (code={:?}): {}", code, stderr)
            }
            AuditError::ReportMissing { path } => write!(f, "Lighthouse 未生成报告: {}", path),
            AuditError::Browser(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AuditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuditError::Browser(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BrowserError> for AuditError {
    fn from(err: BrowserError) -> Self {
        AuditError::Browser(err)
    }
}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 文件不存在
    NotFound { path: String },
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 删除文件失败
    DeleteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 解析失败（JSON / TOML / 图片）
    ParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::NotFound { path } => write!(f, "文件不存在: {}", path),
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::DeleteFailed { path, source } => {
                write!(f, "删除文件失败 ({}): {}", path, source)
            }
            FileError::ParseFailed { path, source } => {
                write!(f, "解析失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::DeleteFailed { source, .. }
            | FileError::ParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            FileError::NotFound { .. } => None,
        }
    }
}

/// 评分错误
///
/// 作为 `ScoreData.error` 的哨兵值返回，而不是向上抛出
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum ScoringError {
    /// 配置中找不到该类别
    CategoryNotFound { category: String },
    /// 审计引用列表为空
    NoAuditRefs,
    /// 总权重为 0
    ZeroTotalWeight,
}

impl fmt::Display for ScoringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringError::CategoryNotFound { category } => {
                write!(f, "Category '{}' not found", category)
            }
            ScoringError::NoAuditRefs => write!(f, "No audit references"),
            ScoringError::ZeroTotalWeight => write!(f, "Zero total weight"),
        }
    }
}

impl std::error::Error for ScoringError {}

/// 报告生成错误
#[derive(Debug)]
pub enum ReportError {
    /// 报告 JSON 缺少必要字段
    MissingField { field: &'static str },
    /// 截图缺失或无法解码
    ScreenshotUnavailable { reason: String },
    /// 渲染文档失败
    RenderFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::MissingField { field } => write!(f, "报告缺少字段: {}", field),
            ReportError::ScreenshotUnavailable { reason } => {
                write!(f, "报告中没有可用的整页截图: {}", reason)
            }
            ReportError::RenderFailed { path, source } => {
                write!(f, "渲染文档失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::RenderFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 任务请求无效
    InvalidJobRequest { reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
            ConfigError::InvalidJobRequest { reason } => write!(f, "任务请求无效: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::File(FileError::ParseFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::ParseFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::File(FileError::ParseFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Other(format!("HTTP 请求失败: {}", err))
    }
}

impl From<crate::services::link_collector::LinkCollectError> for AppError {
    fn from(err: crate::services::link_collector::LinkCollectError) -> Self {
        AppError::Link(err)
    }
}

impl From<AuditError> for AppError {
    fn from(err: AuditError) -> Self {
        AppError::Audit(err)
    }
}

impl From<ScoringError> for AppError {
    fn from(err: ScoringError) -> Self {
        AppError::Scoring(err)
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        AppError::Report(err)
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 文件不存在
    pub fn file_not_found(path: impl Into<String>) -> Self {
        AppError::File(FileError::NotFound { path: path.into() })
    }

    /// 创建文件删除错误
    pub fn file_delete_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::DeleteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建解析错误
    pub fn parse_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ParseFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建环境变量解析错误
    pub fn env_parse_failed(
        var_name: impl Into<String>,
        value: impl Into<String>,
        expected_type: impl Into<String>,
    ) -> Self {
        AppError::Config(ConfigError::EnvVarParseFailed {
            var_name: var_name.into(),
            value: value.into(),
            expected_type: expected_type.into(),
        })
    }

    /// 创建无效任务请求错误
    pub fn invalid_job(reason: impl Into<String>) -> Self {
        AppError::Config(ConfigError::InvalidJobRequest {
            reason: reason.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
