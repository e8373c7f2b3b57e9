//! 文档渲染能力
//!
//! 把自包含的 HTML 打印成 PDF。用 trait 隔开，内容编排可以脱离浏览器测试

use std::path::Path;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use tracing::debug;

use crate::browser::{free_port, launch_headless_browser, LaunchOptions};
use crate::error::{AppError, AppResult, ReportError};

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// 把 `html` 渲染为分页文档写入 `output`
    async fn render(&self, html: &str, output: &Path) -> AppResult<()>;
}

/// 通过 headless Chrome 的打印功能输出 PDF
pub struct ChromePdfRenderer {
    chrome_path: Option<String>,
}

impl ChromePdfRenderer {
    pub fn new(chrome_path: Option<String>) -> Self {
        Self { chrome_path }
    }
}

#[async_trait]
impl DocumentRenderer for ChromePdfRenderer {
    async fn render(&self, html: &str, output: &Path) -> AppResult<()> {
        let session =
            launch_headless_browser(&LaunchOptions::new(self.chrome_path.clone(), free_port()?))
                .await?;

        let result = async {
            let page = session.new_page("about:blank").await?;
            page.set_content(html).await?;
            let params = PrintToPdfParams {
                print_background: Some(true),
                prefer_css_page_size: Some(true),
                ..Default::default()
            };
            page.save_pdf(params, output).await?;
            Ok::<_, AppError>(())
        }
        .await;
        session.close().await;

        result.map_err(|e| {
            AppError::Report(ReportError::RenderFailed {
                path: output.display().to_string(),
                source: Box::new(e),
            })
        })?;
        debug!("PDF 已写入: {}", output.display());
        Ok(())
    }
}
