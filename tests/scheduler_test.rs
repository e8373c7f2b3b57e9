//! 调度器 + 审计流程的端到端测试（不依赖真实浏览器）

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use senior_audit::error::{AppResult, AuditError};
use senior_audit::models::{CategoryRegistry, CompletionSignal, Job, JobStatus};
use senior_audit::orchestrator::{FullAuditJob, QuickScanJob, Scheduler};
use senior_audit::services::link_collector::CollectorOptions;
use senior_audit::services::{
    AuditReport, AuditRequest, AuditRunner, DocumentRenderer, LinkCollector, LinkSource,
    StatusNotifier,
};
use senior_audit::workflow::AuditPipeline;

/// 模拟"浏览器"：同时有两个调用方进来就记录冲突
#[derive(Default)]
struct FakeBrowser {
    in_use: AtomicUsize,
    overlaps: AtomicUsize,
    audits: AtomicUsize,
}

impl FakeBrowser {
    async fn hold(&self) {
        if self.in_use.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.in_use.fetch_sub(1, Ordering::SeqCst);
    }
}

struct FakeRunner(Arc<FakeBrowser>);

#[async_trait]
impl AuditRunner for FakeRunner {
    async fn run_audit(&self, request: &AuditRequest) -> Result<AuditReport, AuditError> {
        self.0.hold().await;
        self.0.audits.fetch_add(1, Ordering::SeqCst);
        let json = format!(
            r#"{{ "finalUrl": "{}", "configSettings": {{ "formFactor": "{}" }},
                 "audits": {{ "color-contrast": {{ "score": 0.9 }}, "viewport": {{ "score": 1 }} }} }}"#,
            request.url, request.device
        );
        let path = request.output_dir.join(format!(
            "{}-{}.json",
            request.url.len(),
            request.device
        ));
        tokio::fs::write(&path, json).await.unwrap();
        Ok(AuditReport { report_path: path })
    }
}

struct FakeRenderer(Arc<FakeBrowser>);

#[async_trait]
impl DocumentRenderer for FakeRenderer {
    async fn render(&self, html: &str, output: &Path) -> AppResult<()> {
        self.0.hold().await;
        tokio::fs::write(output, html).await?;
        Ok(())
    }
}

struct FakeSite;

#[async_trait]
impl LinkSource for FakeSite {
    fn name(&self) -> &'static str {
        "fake-site"
    }

    async fn extract(&self, url: &str) -> anyhow::Result<Vec<String>> {
        if url.contains("offline") {
            anyhow::bail!("connection refused");
        }
        let base = url.trim_end_matches('/');
        Ok(vec![format!("{}/contact", base), format!("{}/services", base)])
    }
}

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

fn build(dir: &Path, browser: Arc<FakeBrowser>, notifier: Arc<Recorder>) -> Scheduler {
    let pipeline = Arc::new(AuditPipeline::new(
        Arc::new(FakeRunner(browser.clone())),
        Arc::new(FakeRenderer(browser)),
        Arc::new(CategoryRegistry::builtin()),
    ));
    let collector = Arc::new(LinkCollector::new(
        vec![Arc::new(FakeSite)],
        CollectorOptions {
            max_links: 3,
            max_depth: 1,
            delay: Duration::ZERO,
            max_retries: 2,
        },
    ));
    let full = Arc::new(FullAuditJob::new(
        collector,
        pipeline.clone(),
        dir.join("scratch"),
        dir.join("reports-full"),
    ));
    let quick = Arc::new(QuickScanJob::new(
        pipeline,
        dir.join("scratch"),
        dir.join("reports-lite"),
    ));
    Scheduler::new(
        full.into_processor(),
        quick.into_processor(),
        notifier,
        Some(Duration::from_secs(60)),
    )
}

#[tokio::test]
async fn test_mixed_workload_never_shares_the_browser() {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(FakeBrowser::default());
    let notifier = Arc::new(Recorder::default());
    let scheduler = build(dir.path(), browser.clone(), notifier.clone());

    scheduler
        .submit_full_audit(Job::full("one@site.com", "https://one.com/"))
        .unwrap();
    let scan_a = scheduler.submit_quick_scan(Job::quick("a@shop.com", "https://shop.com/"));
    scheduler
        .submit_full_audit(Job::full("down@site.com", "https://offline.com/"))
        .unwrap();
    let scan_b = scheduler.submit_quick_scan(Job::quick("b@blog.com", "https://blog.com/"));

    let a = scan_a.await.unwrap();
    let b = scan_b.await.unwrap();
    scheduler.wait_idle().await;

    assert_eq!(browser.overlaps.load(Ordering::SeqCst), 0);
    // 完整审计：3 个页面 × 2 种设备；快速扫描：各 1 次
    assert_eq!(browser.audits.load(Ordering::SeqCst), 8);

    assert_eq!(
        a.report_path,
        dir.path().join("reports-lite/a@shop.com_lite/shop-com.pdf")
    );
    assert!(b.report_path.exists());

    let signals = notifier.signals.lock().unwrap().clone();
    assert_eq!(signals.len(), 2);
    let ok = signals
        .iter()
        .find(|s| s.client_email == "one@site.com")
        .unwrap();
    assert_eq!(ok.status, JobStatus::Completed);
    assert_eq!(
        ok.folder_path.as_deref().map(PathBuf::from),
        Some(dir.path().join("reports-full/one@site.com"))
    );
    let failed = signals
        .iter()
        .find(|s| s.client_email == "down@site.com")
        .unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("offline.com"));

    let documents = std::fs::read_dir(dir.path().join("reports-full/one@site.com"))
        .unwrap()
        .count();
    assert_eq!(documents, 6);
    assert_eq!(
        std::fs::read_dir(dir.path().join("scratch")).unwrap().count(),
        0
    );
}
