//! Lighthouse 审计 - 业务能力层
//!
//! 对外只暴露 `AuditRunner::run_audit`：给一个 URL 和设备，返回 JSON 报告路径。
//! 内部先用标准策略跑一次；仅当失败原因是 403 或超时时，换进阶策略再跑一次。

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::browser::{free_port, launch_headless_browser, BrowserSession, LaunchOptions};
use crate::config::Config;
use crate::error::{AppError, AuditError, BrowserError};
use crate::infrastructure::JsExecutor;
use crate::models::job::Device;

/// 页面导航超时
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

const STANDARD_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36";
const ADVANCED_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";
const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.91 Mobile Safari/537.36";

/// Cookie 横幅"接受"按钮，按可靠程度排列
pub const COOKIE_SELECTORS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    "#CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll",
    "#hs-eu-confirmation-button",
    "#cookie_action_close_header",
    "#cookie-accept",
    "#accept-cookies",
    "#accept_cookie",
    "#cookie-notice-accept",
    "#accept-all-cookies",
    "#wt-cli-accept-all-btn",
    "[data-testid=\"cookie-policy-manage-dialog-accept-button\"]",
    "[data-cy=\"cookie-accept\"]",
    "[data-qa=\"accept-cookies\"]",
    "[data-cookie-accept]",
    "[data-action=\"accept\"]",
    "[data-action=\"accept-all\"]",
    "[data-accept-action]",
    "[data-role=\"accept-cookies\"]",
    "button[aria-label*=\"accept\" i]",
    "button[aria-label*=\"agree\" i]",
    "button[aria-label*=\"consent\" i]",
    "button[aria-label*=\"allow\" i]",
    "[class*=\"cookieNotification__agree-button\"]",
    "[class*=\"iubenda-cs-accept-btn\"]",
    "[class*=\"cmplz-accept\"]",
    "[class*=\"cookie-btn-accept-all\"]",
    "[class*=\"cookie-accept\"]",
    "[class*=\"cookie_accept\"]",
    "[class*=\"cookie__accept\"]",
    "[class*=\"accept-all\"]",
    "[class*=\"acceptAll\"]",
    "[class*=\"acceptContainer\"]",
    "[class*=\"consent-accept\"]",
    "[class*=\"banner-accept\"]",
    "[class*=\"agree-button\"]",
    "[class*=\"accept-button\"]",
    "[class*=\"CallToAction\"]",
    "//button[contains(., \"Accept all\")]",
    "//button[contains(., \"Accept All\")]",
    "//button[contains(., \"ACCEPT ALL\")]",
    "//button[contains(., \"ALLOW ALL\")]",
    "//button[contains(., \"Allow all\")]",
    "//button[contains(., \"Agree to all\")]",
    "//button[contains(., \"I accept\")]",
    "//button[contains(., \"I agree\")]",
    "//button[contains(., \"Got it\")]",
    "//button[contains(., \"Okay\")]",
    "//button[contains(., \"OK\")]",
    "//button[contains(., \"Understood\")]",
    "//a[contains(., \"Accept\")]",
    "//button[contains(., \"Accept\")]",
];

/// 审计使用的 Lighthouse 配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditProfile {
    /// 完整审计（含自定义审计项）
    Full,
    /// 快速扫描（仅内置审计）
    Lite,
}

/// 一次审计请求
#[derive(Debug, Clone)]
pub struct AuditRequest {
    pub url: String,
    pub device: Device,
    pub profile: AuditProfile,
    /// JSON 报告写入的目录
    pub output_dir: PathBuf,
}

/// 审计成功后的产物
#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    pub report_path: PathBuf,
}

/// 外部审计能力
#[async_trait]
pub trait AuditRunner: Send + Sync {
    async fn run_audit(&self, request: &AuditRequest) -> Result<AuditReport, AuditError>;
}

/// 尝试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Standard,
    Advanced,
}

impl Strategy {
    fn name(self) -> &'static str {
        match self {
            Strategy::Standard => "Standard",
            Strategy::Advanced => "Advanced",
        }
    }
}

/// 通过 headless Chrome + lighthouse CLI 执行审计
pub struct LighthouseRunner {
    chrome_path: Option<String>,
    lighthouse_bin: String,
    config_full: String,
    config_lite: String,
    audit_timeout: Duration,
}

impl LighthouseRunner {
    pub fn new(config: &Config) -> Self {
        Self {
            chrome_path: config.chrome_path.clone(),
            lighthouse_bin: config.lighthouse_bin.clone(),
            config_full: config.lighthouse_config_full.clone(),
            config_lite: config.lighthouse_config_lite.clone(),
            audit_timeout: config.audit_timeout(),
        }
    }

    fn config_path(&self, profile: AuditProfile) -> &str {
        match profile {
            AuditProfile::Full => &self.config_full,
            AuditProfile::Lite => &self.config_lite,
        }
    }

    async fn perform(
        &self,
        url: &str,
        request: &AuditRequest,
        strategy: Strategy,
    ) -> Result<AuditReport, AuditError> {
        info!(
            "🚀 [{} 策略] 开始 {} 审计: {}",
            strategy.name(),
            request.device,
            url
        );

        let port = free_port().map_err(into_audit_error)?;
        let session = launch_headless_browser(&launch_options(
            self.chrome_path.clone(),
            port,
            request.device,
            strategy,
        ))
        .await
        .map_err(into_audit_error)?;

        let result = self.drive(&session, url, request, strategy).await;
        session.close().await;
        result
    }

    async fn drive(
        &self,
        session: &BrowserSession,
        url: &str,
        request: &AuditRequest,
        strategy: Strategy,
    ) -> Result<AuditReport, AuditError> {
        let page = session.new_page("about:blank").await.map_err(into_audit_error)?;
        let user_agent = user_agent(request.device, strategy);
        if let Err(e) = page.set_user_agent(user_agent).await {
            warn!("设置 User-Agent 失败: {}", e);
        }

        match tokio::time::timeout(NAVIGATION_TIMEOUT, page.goto(url)).await {
            Err(_) => {
                return Err(AuditError::TimedOut {
                    url: url.to_string(),
                    seconds: NAVIGATION_TIMEOUT.as_secs(),
                })
            }
            Ok(Err(e)) => {
                return Err(AuditError::Browser(BrowserError::NavigationFailed {
                    url: url.to_string(),
                    source: Box::new(e),
                }))
            }
            Ok(Ok(_)) => {}
        }

        let executor = JsExecutor::new(page);
        let status = executor.navigation_status().await.map_err(into_audit_error)?;
        if status != 200 {
            return Err(AuditError::BadStatus {
                url: url.to_string(),
                status,
            });
        }
        info!("✅ 页面加载成功");

        dismiss_cookie_banner(&executor).await;

        let report_path = request.output_dir.join(report_file_name(url));
        self.run_lighthouse(url, session.port(), request, &report_path)
            .await?;

        Ok(AuditReport { report_path })
    }

    async fn run_lighthouse(
        &self,
        url: &str,
        port: u16,
        request: &AuditRequest,
        report_path: &Path,
    ) -> Result<(), AuditError> {
        let args = lighthouse_args(
            url,
            port,
            request.device,
            self.config_path(request.profile),
            report_path,
        );
        debug!("{} {}", self.lighthouse_bin, args.join(" "));

        let child = Command::new(&self.lighthouse_bin)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AuditError::LighthouseFailed {
                code: None,
                stderr: e.to_string(),
            })?;

        let output = match tokio::time::timeout(self.audit_timeout, child.wait_with_output()).await
        {
            Err(_) => {
                return Err(AuditError::TimedOut {
                    url: url.to_string(),
                    seconds: self.audit_timeout.as_secs(),
                })
            }
            Ok(Err(e)) => {
                return Err(AuditError::LighthouseFailed {
                    code: None,
                    stderr: e.to_string(),
                })
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(AuditError::LighthouseFailed {
                code: output.status.code(),
                stderr: tail,
            });
        }

        if !tokio::fs::try_exists(report_path).await.unwrap_or(false) {
            return Err(AuditError::ReportMissing {
                path: report_path.display().to_string(),
            });
        }

        info!("✅ Lighthouse 报告已保存: {}", report_path.display());
        Ok(())
    }
}

#[async_trait]
impl AuditRunner for LighthouseRunner {
    async fn run_audit(&self, request: &AuditRequest) -> Result<AuditReport, AuditError> {
        if request.url.trim().is_empty() {
            return Err(AuditError::MissingUrl);
        }
        let url = normalize_url(&request.url);

        match self.perform(&url, request, Strategy::Standard).await {
            Ok(report) => Ok(report),
            Err(e) if e.is_escalatable() => {
                warn!("标准策略失败: {}，改用进阶策略重试...", e);
                self.perform(&url, request, Strategy::Advanced)
                    .await
                    .map_err(|final_error| {
                        error!("进阶策略也失败: {}", final_error);
                        final_error
                    })
            }
            Err(e) => {
                error!("标准策略失败: {}", e);
                Err(e)
            }
        }
    }
}

/// 缺少协议时补上 `https://`
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// `report-<host-with-dashes>-<unix-ms>.json`
pub fn report_file_name(url: &str) -> String {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.replace('.', "-")))
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "report-{}-{}.json",
        host,
        chrono::Utc::now().timestamp_millis()
    )
}

fn launch_options(
    chrome_path: Option<String>,
    port: u16,
    device: Device,
    strategy: Strategy,
) -> LaunchOptions {
    let mut options = LaunchOptions::new(chrome_path, port);
    options.window_size = match (device, strategy) {
        (Device::Mobile, _) => (393, 851),
        (Device::Desktop, Strategy::Standard) => (1280, 800),
        (Device::Desktop, Strategy::Advanced) => (1920, 1080),
    };
    if strategy == Strategy::Advanced {
        options.extra_args = vec!["--single-process".to_string(), "--no-zygote".to_string()];
    }
    options
}

fn user_agent(device: Device, strategy: Strategy) -> &'static str {
    match (device, strategy) {
        (Device::Mobile, _) => MOBILE_USER_AGENT,
        (Device::Desktop, Strategy::Standard) => STANDARD_USER_AGENT,
        (Device::Desktop, Strategy::Advanced) => ADVANCED_USER_AGENT,
    }
}

/// 尽力关闭 Cookie 横幅，失败不影响审计
async fn dismiss_cookie_banner(executor: &JsExecutor) {
    info!("🕵️ 查找 Cookie 横幅...");
    match executor.click_first_visible(COOKIE_SELECTORS).await {
        Ok(Some(selector)) => {
            info!("✅ 已点击 Cookie 按钮: \"{}\"", selector);
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Ok(None) => info!("🤷 未发现 Cookie 横幅，继续审计"),
        Err(e) => debug!("处理 Cookie 横幅失败: {}", e),
    }
}

/// lighthouse CLI 参数
pub fn lighthouse_args(
    url: &str,
    port: u16,
    device: Device,
    config_path: &str,
    report_path: &Path,
) -> Vec<String> {
    let mut args = vec![
        url.to_string(),
        format!("--port={}", port),
        "--output=json".to_string(),
        format!("--output-path={}", report_path.display()),
        format!("--config-path={}", config_path),
        "--throttling-method=provided".to_string(),
        "--max-wait-for-load=150000".to_string(),
        "--quiet".to_string(),
    ];
    match device {
        Device::Desktop => args.extend([
            "--preset=desktop".to_string(),
            "--form-factor=desktop".to_string(),
            "--screenEmulation.mobile=false".to_string(),
            "--screenEmulation.width=1920".to_string(),
            "--screenEmulation.height=1080".to_string(),
            "--screenEmulation.deviceScaleFactor=1".to_string(),
        ]),
        Device::Mobile => args.extend([
            "--form-factor=mobile".to_string(),
            "--screenEmulation.mobile".to_string(),
        ]),
    }
    args
}

fn into_audit_error(err: AppError) -> AuditError {
    match err {
        AppError::Browser(e) => AuditError::Browser(e),
        AppError::Audit(e) => e,
        other => AuditError::LighthouseFailed {
            code: None,
            stderr: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_adds_scheme() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
        assert_eq!(normalize_url(" https://a.b/c "), "https://a.b/c");
    }

    #[test]
    fn test_report_file_name_uses_dashed_host() {
        let name = report_file_name("https://www.example.co.uk/about");
        assert!(name.starts_with("report-www-example-co-uk-"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn test_lighthouse_args_per_device() {
        let path = Path::new("/tmp/r.json");
        let desktop = lighthouse_args("https://a.b", 9222, Device::Desktop, "cfg.js", path);
        assert_eq!(desktop[0], "https://a.b");
        assert!(desktop.contains(&"--port=9222".to_string()));
        assert!(desktop.contains(&"--preset=desktop".to_string()));
        assert!(desktop.contains(&"--config-path=cfg.js".to_string()));
        assert!(desktop.contains(&"--output-path=/tmp/r.json".to_string()));

        let mobile = lighthouse_args("https://a.b", 9222, Device::Mobile, "cfg.js", path);
        assert!(mobile.contains(&"--form-factor=mobile".to_string()));
        assert!(!mobile.contains(&"--preset=desktop".to_string()));
    }

    #[test]
    fn test_advanced_strategy_adds_process_flags() {
        let standard = launch_options(None, 1, Device::Desktop, Strategy::Standard);
        let advanced = launch_options(None, 1, Device::Desktop, Strategy::Advanced);
        assert!(standard.extra_args.is_empty());
        assert!(advanced.extra_args.contains(&"--single-process".to_string()));
        assert_eq!(advanced.window_size, (1920, 1080));
    }

    #[tokio::test]
    async fn test_blank_url_is_rejected_without_browser() {
        let runner = LighthouseRunner::new(&Config::default());
        let request = AuditRequest {
            url: "  ".to_string(),
            device: Device::Desktop,
            profile: AuditProfile::Full,
            output_dir: PathBuf::from("."),
        };
        assert!(matches!(
            runner.run_audit(&request).await,
            Err(AuditError::MissingUrl)
        ));
    }
}
