//! 快速扫描任务 - 编排层
//!
//! 只审计桌面端单个页面，使用精简配置，不做截图标注

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::job::{Device, Job, QuickScanOutcome};
use crate::orchestrator::full_audit::create_scratch_dir;
use crate::orchestrator::scheduler::{processor, Processor};
use crate::services::lighthouse::AuditProfile;
use crate::workflow::{AuditCtx, AuditOutcome, AuditPipeline};

pub struct QuickScanJob {
    pipeline: Arc<AuditPipeline>,
    scratch_root: PathBuf,
    reports_root: PathBuf,
}

impl QuickScanJob {
    pub fn new(
        pipeline: Arc<AuditPipeline>,
        scratch_root: impl Into<PathBuf>,
        reports_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            scratch_root: scratch_root.into(),
            reports_root: reports_root.into(),
        }
    }

    pub fn from_config(config: &Config, pipeline: Arc<AuditPipeline>) -> Self {
        Self::new(pipeline, &config.scratch_dir, &config.lite_reports_dir)
    }

    pub fn into_processor(self: Arc<Self>) -> Processor<QuickScanOutcome> {
        processor(move |job: Job| {
            let this = self.clone();
            async move { this.run(job).await }
        })
    }

    pub async fn run(&self, job: Job) -> Result<QuickScanOutcome> {
        let scratch = create_scratch_dir(&self.scratch_root, &job)?;

        let ctx = AuditCtx::new(
            &job.email,
            &job.url,
            Device::Desktop,
            AuditProfile::Lite,
            scratch.path().to_path_buf(),
            self.reports_root.clone(),
        );
        let record = self.pipeline.run(&ctx).await;

        if let Err(e) = scratch.close() {
            warn!("⚠️ 删除临时目录失败: {}", e);
        }

        match (&record.outcome, &record.score) {
            (AuditOutcome::Documented { document, .. }, Some(score)) => {
                info!(
                    "✅ 快速扫描完成: {} → {} (score {:.2})",
                    job.email,
                    document.display(),
                    score.final_score
                );
                Ok(QuickScanOutcome {
                    report_path: document.clone(),
                    score: score.final_score,
                })
            }
            _ => {
                let error = record
                    .error()
                    .unwrap_or_else(|| "quick scan produced no score".to_string());
                anyhow::bail!(error)
            }
        }
    }
}
