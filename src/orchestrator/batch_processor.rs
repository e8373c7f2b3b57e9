//! 批量任务处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责装配各层能力并把任务交给调度器。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：启动日志、加载类别覆盖、装配审计/渲染/链接收集/通知能力
//! 2. **批量加载**：扫描任务目录，加载所有任务请求（`Vec<Job>`）
//! 3. **提交调度**：完整审计后台执行，快速扫描等待结果
//! 4. **全局统计**：等调度器空闲后汇总所有任务的结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个页面的细节
//! - **并发交给调度器**：浏览器独占由 [`Scheduler`] 保证
//! - **向下委托**：委托 full_audit / quick_scan 处理单个任务

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::job::{CompletionSignal, Job, JobKind, JobStatus};
use crate::models::scoring::CategoryRegistry;
use crate::models::{load_all_job_requests, load_category_overrides};
use crate::orchestrator::full_audit::FullAuditJob;
use crate::orchestrator::quick_scan::QuickScanJob;
use crate::orchestrator::scheduler::{Scheduler, SchedulerError};
use crate::services::{
    ChromePdfRenderer, HttpStatusNotifier, LighthouseRunner, LinkCollector, StatusNotifier,
};
use crate::utils::logging::{
    log_jobs_loaded, log_startup, print_final_stats, truncate_text, RunSummary,
};
use crate::workflow::AuditPipeline;

/// 应用主结构
pub struct App {
    config: Config,
    scheduler: Scheduler,
    tally: Arc<TallyNotifier>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let registry = load_registry(&config).await?;

        let pipeline = Arc::new(AuditPipeline::new(
            Arc::new(LighthouseRunner::new(&config)),
            Arc::new(ChromePdfRenderer::new(config.chrome_path.clone())),
            Arc::new(registry),
        ));
        let collector = Arc::new(LinkCollector::from_config(&config));
        let tally = Arc::new(TallyNotifier::new(Arc::new(HttpStatusNotifier::new(
            config.status_endpoint.clone(),
        ))));

        let scheduler = Self::build_scheduler(&config, collector, pipeline, tally.clone());

        Ok(Self {
            config,
            scheduler,
            tally,
        })
    }

    /// 用给定能力装配调度器
    pub fn build_scheduler(
        config: &Config,
        collector: Arc<LinkCollector>,
        pipeline: Arc<AuditPipeline>,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Scheduler {
        let full = Arc::new(FullAuditJob::from_config(config, collector, pipeline.clone()));
        let quick = Arc::new(QuickScanJob::from_config(config, pipeline));
        Scheduler::new(
            full.into_processor(),
            quick.into_processor(),
            notifier,
            config.job_timeout(),
        )
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        // 加载所有待处理的任务
        let jobs = self.load_jobs().await?;

        if jobs.is_empty() {
            warn!("⚠️ 没有找到待处理的TOML文件，程序结束");
            return Ok(());
        }

        let full_count = jobs.iter().filter(|j| j.kind == JobKind::Full).count();
        log_jobs_loaded(full_count, jobs.len() - full_count);

        let summary = self.process_all_jobs(jobs).await;

        print_final_stats(&summary, &self.config.output_log_file);

        Ok(())
    }

    async fn load_jobs(&self) -> Result<Vec<Job>> {
        info!("\n📁 正在扫描待处理的任务...");
        load_all_job_requests(&self.config.jobs_folder).await
    }

    /// 提交所有任务并等待调度器空闲
    async fn process_all_jobs(&self, jobs: Vec<Job>) -> RunSummary {
        let mut stats = RunSummary {
            total: jobs.len(),
            ..Default::default()
        };
        let mut scans = Vec::new();

        for job in jobs {
            match job.kind {
                JobKind::Full => {
                    if let Err(e) = self.scheduler.submit_full_audit(job.clone()) {
                        error!("{} ❌ {}", job, e);
                        stats.rejected += 1;
                    }
                }
                JobKind::Quick => {
                    let email = job.email.clone();
                    scans.push((email, self.scheduler.submit_quick_scan(job)));
                }
            }
        }

        let pending = self.scheduler.pending();
        info!(
            "📋 已提交: 完整审计队列 {} 个，快速扫描队列 {} 个",
            pending.full, pending.quick
        );

        for (email, scan) in scans {
            match scan.await {
                Ok(outcome) => {
                    info!(
                        "⚡ [{}] 快速扫描得分 {:.0}，报告: {}",
                        email,
                        outcome.score,
                        outcome.report_path.display()
                    );
                    stats.quick_completed += 1;
                }
                Err(SchedulerError::Rejected(reason)) => {
                    error!("⚡ [{}] 请求被拒绝: {}", email, reason);
                    stats.rejected += 1;
                }
                Err(e) => {
                    error!("⚡ [{}] 快速扫描失败: {}", email, truncate_text(&e.to_string(), 300));
                    stats.quick_failed += 1;
                }
            }
        }

        self.scheduler.wait_idle().await;

        stats.full_completed = self.tally.completed.load(Ordering::SeqCst);
        stats.full_failed = self.tally.failed.load(Ordering::SeqCst);
        stats
    }
}

/// 统计完整审计的完成信号，再转发给真正的通知方
struct TallyNotifier {
    inner: Arc<dyn StatusNotifier>,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl TallyNotifier {
    fn new(inner: Arc<dyn StatusNotifier>) -> Self {
        Self {
            inner,
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StatusNotifier for TallyNotifier {
    async fn notify(&self, signal: &CompletionSignal) {
        match signal.status {
            JobStatus::Completed => self.completed.fetch_add(1, Ordering::SeqCst),
            JobStatus::Failed => self.failed.fetch_add(1, Ordering::SeqCst),
        };
        self.inner.notify(signal).await;
    }
}

/// 内置类别 + 可选覆盖文件
async fn load_registry(config: &Config) -> Result<CategoryRegistry> {
    let registry = CategoryRegistry::builtin();
    match &config.category_file {
        Some(path) => {
            info!("📑 加载类别覆盖: {}", path);
            let overrides = load_category_overrides(Path::new(path)).await?;
            Ok(registry.merge(overrides))
        }
        None => Ok(registry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        signals: Mutex<Vec<CompletionSignal>>,
    }

    #[async_trait]
    impl StatusNotifier for Recorder {
        async fn notify(&self, signal: &CompletionSignal) {
            self.signals.lock().unwrap().push(signal.clone());
        }
    }

    #[tokio::test]
    async fn test_tally_notifier_counts_and_forwards() {
        let recorder = Arc::new(Recorder::default());
        let tally = TallyNotifier::new(recorder.clone());

        tally
            .notify(&CompletionSignal::completed("a@b.c", "reports-full/a@b.c"))
            .await;
        tally.notify(&CompletionSignal::failed("x@y.z", "boom")).await;
        tally.notify(&CompletionSignal::failed("x@y.z", "boom")).await;

        assert_eq!(tally.completed.load(Ordering::SeqCst), 1);
        assert_eq!(tally.failed.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.signals.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_load_registry_merges_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("categories.toml");
        std::fs::write(
            &path,
            r#"
[categories.custom]
title = "Custom"
auditRefs = [{ id = "color-contrast", weight = 1.0 }]
"#,
        )
        .unwrap();
        let config = Config {
            category_file: Some(path.to_string_lossy().to_string()),
            ..Config::default()
        };

        let registry = load_registry(&config).await.unwrap();

        assert!(registry.get("custom").is_some());
        assert!(registry.get(crate::models::scoring::SENIOR_FRIENDLY).is_some());
    }
}
