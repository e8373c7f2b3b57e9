use std::net::TcpListener;
use std::path::Path;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult, BrowserError};

/// 所有启动方式共用的 Chrome 参数
const BASE_ARGS: [&str; 9] = [
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
];

/// 无头浏览器启动参数
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Chrome 可执行文件，`None` 时由 chromiumoxide 自动探测
    pub chrome_path: Option<String>,
    /// 远程调试端口（Lighthouse 需要连到同一个端口）
    pub port: u16,
    pub window_size: (u32, u32),
    pub extra_args: Vec<String>,
}

impl LaunchOptions {
    pub fn new(chrome_path: Option<String>, port: u16) -> Self {
        Self {
            chrome_path,
            port,
            window_size: (1280, 800),
            extra_args: Vec::new(),
        }
    }
}

/// 一次浏览器会话：浏览器进程 + 事件处理任务
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    port: u16,
}

impl BrowserSession {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// 创建新页面并导航
    pub async fn new_page(&self, url: &str) -> AppResult<Page> {
        self.browser.new_page(url).await.map_err(|e| {
            error!("创建页面失败: {}", e);
            AppError::Browser(BrowserError::NavigationFailed {
                url: url.to_string(),
                source: Box::new(e),
            })
        })
    }

    /// 关闭浏览器；失败只记录日志
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("关闭浏览器失败: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("等待浏览器进程退出失败: {}", e);
        }
        self.handler.abort();
        debug!("浏览器已关闭 (port {})", self.port);
    }
}

/// 向系统申请一个空闲端口
pub fn free_port() -> AppResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").map_err(|e| {
        AppError::Browser(BrowserError::LaunchFailed {
            source: Box::new(e),
        })
    })?;
    let port = listener
        .local_addr()
        .map_err(|e| {
            AppError::Browser(BrowserError::LaunchFailed {
                source: Box::new(e),
            })
        })?
        .port();
    Ok(port)
}

/// 启动无头浏览器
pub async fn launch_headless_browser(options: &LaunchOptions) -> AppResult<BrowserSession> {
    info!("🚀 启动无头浏览器 (port {})...", options.port);

    let mut args: Vec<String> = BASE_ARGS.iter().map(|a| a.to_string()).collect();
    args.extend(options.extra_args.iter().cloned());

    let mut builder = BrowserConfig::builder()
        .new_headless_mode()
        .port(options.port)
        .window_size(options.window_size.0, options.window_size.1)
        .args(args);
    if let Some(path) = &options.chrome_path {
        builder = builder.chrome_executable(Path::new(path));
    }

    let config = builder.build().map_err(|e| {
        error!("配置无头浏览器失败: {}", e);
        AppError::Browser(BrowserError::ConfigurationFailed { message: e })
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        AppError::Browser(BrowserError::LaunchFailed {
            source: Box::new(e),
        })
    })?;
    debug!("无头浏览器启动成功");

    // 在后台处理浏览器事件
    let handler = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    Ok(BrowserSession {
        browser,
        handler,
        port: options.port,
    })
}
