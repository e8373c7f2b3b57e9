//! 完整审计任务 - 编排层
//!
//! 一个完整审计 = 收集站内链接 + 每个链接 × 每种设备跑一次审计流程。
//! 单个页面失败只会被跳过；只有种子页面不可达才算整个任务失败。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::job::{Device, Job};
use crate::orchestrator::scheduler::{processor, Processor};
use crate::services::lighthouse::AuditProfile;
use crate::services::link_collector::LinkCollector;
use crate::workflow::{AuditCtx, AuditOutcome, AuditPipeline};

/// 完整审计统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullAuditStats {
    pub links: usize,
    pub audited: usize,
    pub skipped: usize,
    pub gated: usize,
    pub documents: usize,
}

impl FullAuditStats {
    fn record(&mut self, outcome: &AuditOutcome) {
        self.audited += 1;
        match outcome {
            AuditOutcome::Documented { .. } => self.documents += 1,
            AuditOutcome::Gated => self.gated += 1,
            AuditOutcome::PageFailed { .. } | AuditOutcome::DocumentFailed { .. } => {
                self.skipped += 1
            }
        }
    }
}

/// 完整审计任务处理器
pub struct FullAuditJob {
    collector: Arc<LinkCollector>,
    pipeline: Arc<AuditPipeline>,
    scratch_root: PathBuf,
    reports_root: PathBuf,
}

impl FullAuditJob {
    pub fn new(
        collector: Arc<LinkCollector>,
        pipeline: Arc<AuditPipeline>,
        scratch_root: impl Into<PathBuf>,
        reports_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            collector,
            pipeline,
            scratch_root: scratch_root.into(),
            reports_root: reports_root.into(),
        }
    }

    pub fn from_config(
        config: &Config,
        collector: Arc<LinkCollector>,
        pipeline: Arc<AuditPipeline>,
    ) -> Self {
        Self::new(
            collector,
            pipeline,
            &config.scratch_dir,
            &config.full_reports_dir,
        )
    }

    /// 包装成调度器的处理函数
    pub fn into_processor(self: Arc<Self>) -> Processor<PathBuf> {
        processor(move |job: Job| {
            let this = self.clone();
            async move { this.run(job).await }
        })
    }

    /// 执行完整审计，返回报告目录
    pub async fn run(&self, job: Job) -> Result<PathBuf> {
        let report_folder = self.reports_root.join(&job.email);
        tokio::fs::create_dir_all(&report_folder)
            .await
            .with_context(|| format!("无法创建报告目录: {}", report_folder.display()))?;

        // 临时目录随 drop 删除，超时或 panic 也不例外
        let scratch = create_scratch_dir(&self.scratch_root, &job)?;
        info!("📁 临时目录: {}", scratch.path().display());

        let stats = self.audit_site(&job, scratch.path()).await?;

        info!("{}", "=".repeat(60));
        info!("✅ 完整审计完成: {}", job.email);
        info!("   链接数: {}", stats.links);
        info!("   审计次数: {}", stats.audited);
        info!("   生成文档: {}", stats.documents);
        info!("   跳过页面: {}", stats.skipped);
        info!("   零分拦截: {}", stats.gated);
        info!("   报告目录: {}", report_folder.display());
        info!("{}", "=".repeat(60));

        if let Err(e) = scratch.close() {
            warn!("⚠️ 删除临时目录失败: {}", e);
        }

        Ok(report_folder)
    }

    async fn audit_site(&self, job: &Job, scratch: &Path) -> Result<FullAuditStats> {
        let collected = self.collector.collect(&job.url).await?;
        for failure in &collected.failures {
            warn!("⚠️ 跳过无法访问的链接 {}: {}", failure.url, failure.error);
        }

        let mut stats = FullAuditStats {
            links: collected.links.len(),
            ..Default::default()
        };
        info!("🔗 共 {} 个页面待审计", stats.links);

        for (index, link) in collected.links.iter().enumerate() {
            info!("📄 [{}/{}] {}", index + 1, stats.links, link);
            for device in Device::ALL {
                let ctx = AuditCtx::new(
                    &job.email,
                    link,
                    device,
                    AuditProfile::Full,
                    scratch.to_path_buf(),
                    self.reports_root.clone(),
                );
                let record = self.pipeline.run(&ctx).await;
                if let Some(error) = record.error() {
                    warn!("{} ⏭️ 跳过: {}", ctx, error);
                }
                stats.record(&record.outcome);
            }
        }

        Ok(stats)
    }
}

/// 创建 `<scratch_root>/<sanitized-email>-<unix-ms>` 临时目录
pub(crate) fn create_scratch_dir(scratch_root: &Path, job: &Job) -> Result<TempDir> {
    std::fs::create_dir_all(scratch_root)
        .with_context(|| format!("无法创建临时根目录: {}", scratch_root.display()))?;

    let name = format!(
        "{}-{}",
        job.sanitized_email(),
        chrono::Utc::now().timestamp_millis()
    );
    tempfile::Builder::new()
        .prefix(&name)
        .rand_bytes(0)
        .tempdir_in(scratch_root)
        .with_context(|| format!("无法创建临时目录: {}", scratch_root.join(&name).display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppResult, AuditError};
    use crate::models::scoring::CategoryRegistry;
    use crate::services::document_renderer::DocumentRenderer;
    use crate::services::lighthouse::{AuditReport, AuditRequest, AuditRunner};
    use crate::services::link_collector::{CollectorOptions, LinkSource};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    struct FakeSite {
        pages: HashMap<String, Vec<String>>,
    }

    #[async_trait]
    impl LinkSource for FakeSite {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn extract(&self, url: &str) -> anyhow::Result<Vec<String>> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("connection refused"))
        }
    }

    /// 对 `/broken` 返回 404，其余页面给一份正常报告
    struct FakeRunner;

    #[async_trait]
    impl AuditRunner for FakeRunner {
        async fn run_audit(&self, request: &AuditRequest) -> Result<AuditReport, AuditError> {
            if request.url.ends_with("/broken") {
                return Err(AuditError::BadStatus {
                    url: request.url.clone(),
                    status: 404,
                });
            }
            let json = format!(
                r#"{{ "finalUrl": "{}", "configSettings": {{ "formFactor": "{}" }},
                     "audits": {{ "color-contrast": {{ "score": 1 }} }} }}"#,
                request.url, request.device
            );
            let path = request
                .output_dir
                .join(format!("{}.json", request.device));
            tokio::fs::write(&path, json).await.unwrap();
            Ok(AuditReport { report_path: path })
        }
    }

    struct FileRenderer;

    #[async_trait]
    impl DocumentRenderer for FileRenderer {
        async fn render(&self, html: &str, output: &Path) -> AppResult<()> {
            tokio::fs::write(output, html).await?;
            Ok(())
        }
    }

    fn job_runner(dir: &Path, pages: HashMap<String, Vec<String>>) -> FullAuditJob {
        let collector = LinkCollector::new(
            vec![Arc::new(FakeSite { pages })],
            CollectorOptions {
                max_links: 10,
                max_depth: 2,
                delay: Duration::ZERO,
                max_retries: 1,
            },
        );
        let pipeline = AuditPipeline::new(
            Arc::new(FakeRunner),
            Arc::new(FileRenderer),
            Arc::new(CategoryRegistry::builtin()),
        );
        FullAuditJob::new(
            Arc::new(collector),
            Arc::new(pipeline),
            dir.join("scratch"),
            dir.join("reports-full"),
        )
    }

    #[tokio::test]
    async fn test_full_audit_covers_every_page_and_device() {
        let _ = tracing_subscriber::fmt::try_init();
        let dir = tempfile::tempdir().unwrap();
        let pages = HashMap::from([
            (
                "https://site.com/".to_string(),
                vec![
                    "https://site.com/about".to_string(),
                    "https://site.com/broken".to_string(),
                ],
            ),
            ("https://site.com/about".to_string(), vec![]),
            ("https://site.com/broken".to_string(), vec![]),
        ]);
        let job = Job::full("owner@site.com", "https://site.com/");

        let folder = job_runner(dir.path(), pages).run(job).await.unwrap();

        assert_eq!(folder, dir.path().join("reports-full/owner@site.com"));
        let mut documents: Vec<String> = std::fs::read_dir(&folder)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        documents.sort();
        // 根页面和 /about 各两种设备，/broken 被跳过
        assert_eq!(documents.len(), 4);
        assert!(documents.iter().all(|name| name.ends_with(".pdf")));

        // 临时目录已删除
        let leftovers = std::fs::read_dir(dir.path().join("scratch")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_unreachable_seed_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let job = Job::full("owner@site.com", "https://down.com/");

        let err = job_runner(dir.path(), HashMap::new())
            .run(job)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("https://down.com/"));
        let leftovers = std::fs::read_dir(dir.path().join("scratch")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_stats_classify_outcomes() {
        let mut stats = FullAuditStats::default();
        stats.record(&AuditOutcome::Documented {
            document: PathBuf::from("a.pdf"),
            images: 2,
        });
        stats.record(&AuditOutcome::Gated);
        stats.record(&AuditOutcome::PageFailed {
            error: "timeout".into(),
        });

        assert_eq!(
            stats,
            FullAuditStats {
                links: 0,
                audited: 3,
                skipped: 1,
                gated: 1,
                documents: 1,
            }
        );
    }
}
