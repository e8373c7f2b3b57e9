//! 完成信号投递
//!
//! 后台任务的结果只能通过这里对外可见。投递失败只记录日志，不影响任务本身

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::models::job::{CompletionSignal, JobStatus};

#[async_trait]
pub trait StatusNotifier: Send + Sync {
    /// 投递完成信号（不返回错误）
    async fn notify(&self, signal: &CompletionSignal);
}

/// 记录日志，配置了地址时再 POST JSON
pub struct HttpStatusNotifier {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpStatusNotifier {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    async fn post(&self, endpoint: &str, signal: &CompletionSignal) -> Result<()> {
        self.client
            .post(endpoint)
            .json(signal)
            .send()
            .await
            .with_context(|| format!("无法连接状态服务 {}", endpoint))?
            .error_for_status()
            .context("状态服务返回错误")?;
        Ok(())
    }
}

#[async_trait]
impl StatusNotifier for HttpStatusNotifier {
    async fn notify(&self, signal: &CompletionSignal) {
        match signal.status {
            JobStatus::Completed => info!(
                "📬 [{}] 任务完成，报告目录: {}",
                signal.client_email,
                signal.folder_path.as_deref().unwrap_or("-")
            ),
            JobStatus::Failed => warn!(
                "📬 [{}] 任务失败: {}",
                signal.client_email,
                signal.error.as_deref().unwrap_or("unknown error")
            ),
        }

        let Some(endpoint) = &self.endpoint else {
            return;
        };
        if let Err(e) = self.post(endpoint, signal).await {
            warn!("⚠️  完成信号投递失败 [{}]: {:#}", signal.client_email, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint_is_only_logged() {
        let _ = tracing_subscriber::fmt::try_init();
        // 端口 9 (discard) 上没有 HTTP 服务
        let notifier = HttpStatusNotifier::new(Some("http://127.0.0.1:9/status".to_string()));
        notifier
            .notify(&CompletionSignal::completed("a@b.c", "reports-full/a@b.c"))
            .await;
    }

    #[tokio::test]
    async fn test_without_endpoint_only_logs() {
        let notifier = HttpStatusNotifier::new(None);
        notifier
            .notify(&CompletionSignal::failed("a@b.c", "seed unreachable"))
            .await;
    }
}
