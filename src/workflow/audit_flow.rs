//! 审计流程 - 流程层
//!
//! 核心职责：定义"一个页面 × 一种设备"的完整处理流程
//!
//! 流程顺序：
//! 1. 外部审计 → JSON 报告
//! 2. 加权评分 → 零分闸门
//! 3. 标注截图（仅完整审计）
//! 4. 生成文档
//! 5. 删除 JSON 和图片（无论成功与否）

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::AppResult;
use crate::models::annotated_audit::AnnotatedAudit;
use crate::models::artifacts::ReportArtifactSet;
use crate::models::report::LighthouseReport;
use crate::models::scoring::{CategoryRegistry, ScoreData, SENIOR_FRIENDLY, SENIOR_FRIENDLY_LITE};
use crate::services::annotator;
use crate::services::document_renderer::DocumentRenderer;
use crate::services::lighthouse::{AuditProfile, AuditRequest, AuditRunner};
use crate::services::report_compiler::{self, DocumentPlan};
use crate::services::score_aggregator;
use crate::workflow::audit_ctx::AuditCtx;

/// 单次审计的结局
#[derive(Debug, Clone, PartialEq)]
pub enum AuditOutcome {
    /// 文档已生成
    Documented { document: PathBuf, images: usize },
    /// 页面加载或审计失败（瞬时错误，跳过该页面）
    PageFailed { error: String },
    /// 零分闸门：评分系统性失败，不生成任何产物
    Gated,
    /// 评分正常但文档生成失败
    DocumentFailed { error: String },
}

/// 一次 (url, device) 审计的记录
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub url: String,
    pub device: String,
    /// 临时 JSON 报告（记录生成时已删除）
    pub report_path: Option<PathBuf>,
    pub score: Option<ScoreData>,
    pub outcome: AuditOutcome,
}

impl AuditRecord {
    fn new(ctx: &AuditCtx, outcome: AuditOutcome) -> Self {
        Self {
            url: ctx.url.clone(),
            device: ctx.device.to_string(),
            report_path: None,
            score: None,
            outcome,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self.outcome, AuditOutcome::Documented { .. })
    }

    pub fn document(&self) -> Option<&Path> {
        match &self.outcome {
            AuditOutcome::Documented { document, .. } => Some(document),
            _ => None,
        }
    }

    /// 失败原因；零分闸门带上评分诊断信息
    pub fn error(&self) -> Option<String> {
        match &self.outcome {
            AuditOutcome::Documented { .. } => None,
            AuditOutcome::PageFailed { error } | AuditOutcome::DocumentFailed { error } => {
                Some(error.clone())
            }
            AuditOutcome::Gated => Some(gate_diagnostics(self.score.as_ref())),
        }
    }
}

/// 零分闸门的诊断文字
fn gate_diagnostics(score: Option<&ScoreData>) -> String {
    match score {
        Some(score) => {
            let cause = score
                .error
                .as_ref()
                .map(|e| format!(" ({})", e))
                .unwrap_or_default();
            format!(
                "Systemic scoring failure: final score is 0{} [total weighted score {:.2}, total weight {}, missing audits: {}]",
                cause,
                score.total_weighted_score,
                score.total_weight,
                if score.missing_audits.is_empty() {
                    "none".to_string()
                } else {
                    score.missing_audits.join(", ")
                }
            )
        }
        None => "Systemic scoring failure: final score is 0".to_string(),
    }
}

/// 审计流程
///
/// - 编排单个页面的审计、评分、标注、文档
/// - 不持有浏览器资源（由外部审计能力和文档渲染能力各自管理）
/// - 不认识队列和任务
pub struct AuditPipeline {
    runner: Arc<dyn AuditRunner>,
    renderer: Arc<dyn DocumentRenderer>,
    registry: Arc<CategoryRegistry>,
}

impl AuditPipeline {
    pub fn new(
        runner: Arc<dyn AuditRunner>,
        renderer: Arc<dyn DocumentRenderer>,
        registry: Arc<CategoryRegistry>,
    ) -> Self {
        Self {
            runner,
            renderer,
            registry,
        }
    }

    pub async fn run(&self, ctx: &AuditCtx) -> AuditRecord {
        info!("{} 🔍 开始审计...", ctx);

        // ========== 1. 外部审计 ==========
        let request = AuditRequest {
            url: ctx.url.clone(),
            device: ctx.device,
            profile: ctx.profile,
            output_dir: ctx.scratch_dir.clone(),
        };
        let report_path = match self.runner.run_audit(&request).await {
            Ok(report) => report.report_path,
            Err(e) => {
                warn!("{} ⚠️ 审计失败，跳过该页面: {}", ctx, e);
                return AuditRecord::new(
                    ctx,
                    AuditOutcome::PageFailed {
                        error: e.to_string(),
                    },
                );
            }
        };

        // ========== 2-4. 评分 / 闸门 / 产物 ==========
        let mut images = ReportArtifactSet::new();
        let mut record = self.process_report(ctx, &report_path, &mut images).await;
        record.report_path = Some(report_path.clone());

        // ========== 5. 清理 ==========
        let removed = images.cleanup().await;
        remove_report(&report_path).await;
        debug!("{} 已清理 JSON 报告和 {} 张图片", ctx, removed);

        record
    }

    async fn process_report(
        &self,
        ctx: &AuditCtx,
        report_path: &Path,
        images: &mut ReportArtifactSet,
    ) -> AuditRecord {
        let report = match LighthouseReport::load(report_path).await {
            Ok(report) => Arc::new(report),
            Err(e) => {
                error!("{} 无法读取审计报告: {}", ctx, e);
                return AuditRecord::new(
                    ctx,
                    AuditOutcome::PageFailed {
                        error: e.to_string(),
                    },
                );
            }
        };

        let category = category_for(ctx.profile);
        let score = score_aggregator::score_category(&self.registry, category, &report);

        if score.is_zero() {
            let mut record = AuditRecord::new(ctx, AuditOutcome::Gated);
            record.score = Some(score);
            error!("{} ❌ {}", ctx, gate_diagnostics(record.score.as_ref()));
            return record;
        }
        info!("{} 📊 得分: {:.0}", ctx, score.final_score);

        if ctx.profile == AuditProfile::Full {
            *images = annotate_all(ctx, report.clone(), report_path).await;
        }

        let outcome = match self.produce_document(ctx, &report, &score, images).await {
            Ok(document) => AuditOutcome::Documented {
                document,
                images: images.len(),
            },
            Err(e) => {
                error!("{} ❌ 文档生成失败: {}", ctx, e);
                AuditOutcome::DocumentFailed {
                    error: e.to_string(),
                }
            }
        };

        let mut record = AuditRecord::new(ctx, outcome);
        record.score = Some(score);
        record
    }

    async fn produce_document(
        &self,
        ctx: &AuditCtx,
        report: &LighthouseReport,
        score: &ScoreData,
        images: &ReportArtifactSet,
    ) -> AppResult<PathBuf> {
        let (plan, output): (DocumentPlan, PathBuf) = match ctx.profile {
            AuditProfile::Full => {
                let refs = self
                    .registry
                    .get(SENIOR_FRIENDLY)
                    .map(|c| c.audit_refs.as_slice())
                    .unwrap_or_default();
                (
                    report_compiler::plan_full_report(report, score, refs, images),
                    report_compiler::full_report_path(&ctx.output_root, &ctx.email, report),
                )
            }
            AuditProfile::Lite => (
                report_compiler::plan_lite_report(report, score),
                report_compiler::lite_report_path(&ctx.output_root, &ctx.email, report)?,
            ),
        };
        report_compiler::compile(self.renderer.as_ref(), &plan, &output).await
    }
}

fn category_for(profile: AuditProfile) -> &'static str {
    match profile {
        AuditProfile::Full => SENIOR_FRIENDLY,
        AuditProfile::Lite => SENIOR_FRIENDLY_LITE,
    }
}

/// 为五类审计生成标注图（在阻塞线程池中执行）
///
/// 截图缺失或单个审计失败只记录日志
async fn annotate_all(
    ctx: &AuditCtx,
    report: Arc<LighthouseReport>,
    report_path: &Path,
) -> ReportArtifactSet {
    let stem = report_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let dir = ctx.scratch_dir.clone();
    let label = ctx.to_string();

    let task = tokio::task::spawn_blocking(move || {
        let mut images = ReportArtifactSet::new();
        let screenshot = match report.decode_screenshot() {
            Ok(image) => image.to_rgba8(),
            Err(e) => {
                warn!("{} 截图不可用，跳过标注: {}", label, e);
                return images;
            }
        };

        for audit in AnnotatedAudit::ALL {
            let output = dir.join(format!("{}-{}.png", stem, audit.file_suffix()));
            match annotator::annotate_audit(audit, &report, &screenshot, &output) {
                Ok(outcome) => {
                    if let Some(path) = outcome.image_path {
                        images.insert(audit.audit_id(), path);
                    }
                }
                Err(e) => warn!("{} [{}] 标注失败: {}", label, audit, e),
            }
        }
        images
    });

    match task.await {
        Ok(images) => images,
        Err(e) => {
            error!("{} 标注任务异常退出: {}", ctx, e);
            ReportArtifactSet::new()
        }
    }
}

async fn remove_report(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("删除 JSON 报告失败 {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;
    use crate::models::job::Device;
    use crate::services::lighthouse::AuditReport;
    use async_trait::async_trait;
    use base64::Engine;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    /// 把固定 JSON 写进输出目录的假审计
    struct FakeRunner {
        json: Option<String>,
    }

    #[async_trait]
    impl AuditRunner for FakeRunner {
        async fn run_audit(&self, request: &AuditRequest) -> Result<AuditReport, AuditError> {
            let Some(json) = &self.json else {
                return Err(AuditError::BadStatus {
                    url: request.url.clone(),
                    status: 404,
                });
            };
            let path = request
                .output_dir
                .join(format!("report-{}.json", request.device));
            tokio::fs::write(&path, json).await.unwrap();
            Ok(AuditReport { report_path: path })
        }
    }

    /// 记录渲染调用并把 HTML 写到目标路径
    #[derive(Default)]
    struct FakeRenderer {
        rendered: Mutex<Vec<(PathBuf, String)>>,
    }

    #[async_trait]
    impl DocumentRenderer for FakeRenderer {
        async fn render(&self, html: &str, output: &Path) -> AppResult<()> {
            tokio::fs::write(output, html).await?;
            self.rendered
                .lock()
                .unwrap()
                .push((output.to_path_buf(), html.to_string()));
            Ok(())
        }
    }

    fn screenshot_data_url() -> String {
        let mut img = RgbaImage::from_pixel(200, 200, Rgba([255, 255, 255, 255]));
        // 左上角区域画棋盘格，保证视觉上有内容
        for y in 0..60 {
            for x in 0..60 {
                if (x / 5 + y / 5) % 2 == 0 {
                    img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
                }
            }
        }
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    fn report_json(contrast_score: f64, with_screenshot: bool) -> String {
        let screenshot = if with_screenshot {
            format!(
                r#", "fullPageScreenshot": {{ "screenshot": {{ "data": "{}" }} }}"#,
                screenshot_data_url()
            )
        } else {
            String::new()
        };
        format!(
            r#"{{
                "finalUrl": "https://example.com/pricing",
                "fetchTime": "2026-01-02T03:04:05.000Z",
                "configSettings": {{ "formFactor": "desktop" }},
                "audits": {{
                    "color-contrast": {{
                        "score": {},
                        "details": {{ "items": [
                            {{ "node": {{ "nodeLabel": "Buy", "boundingRect": {{ "left": 10, "top": 10, "width": 30, "height": 30 }} }} }},
                            {{ "node": {{ "nodeLabel": "Blank", "boundingRect": {{ "left": 120, "top": 120, "width": 30, "height": 30 }} }} }}
                        ] }}
                    }},
                    "viewport": {{ "score": 1 }}
                }}
                {}
            }}"#,
            contrast_score, screenshot
        )
    }

    fn ctx(dir: &Path, profile: AuditProfile) -> AuditCtx {
        let scratch = dir.join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();
        AuditCtx::new(
            "a@b.com",
            "https://example.com/pricing",
            Device::Desktop,
            profile,
            scratch,
            dir.join("out"),
        )
    }

    fn pipeline(json: Option<String>, renderer: Arc<FakeRenderer>) -> AuditPipeline {
        AuditPipeline::new(
            Arc::new(FakeRunner { json }),
            renderer,
            Arc::new(CategoryRegistry::builtin()),
        )
    }

    fn scratch_is_empty(ctx: &AuditCtx) -> bool {
        std::fs::read_dir(&ctx.scratch_dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_full_audit_produces_document_and_cleans_up() {
        let _ = tracing_subscriber::fmt::try_init();
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path(), AuditProfile::Full);
        let renderer = Arc::new(FakeRenderer::default());

        let record = pipeline(Some(report_json(0.5, true)), renderer.clone())
            .run(&ctx)
            .await;

        assert!(record.success(), "{:?}", record.error());
        let document = record.document().unwrap();
        assert_eq!(
            document,
            dir.path()
                .join("out/a@b.com/example.com-pricing-desktop.pdf")
                .as_path()
        );
        assert!(matches!(record.outcome, AuditOutcome::Documented { images: 1, .. }));

        // 标注图片已嵌入文档
        let rendered = renderer.rendered.lock().unwrap();
        assert!(rendered[0].1.contains("data:image/png;base64,"));
        assert!(rendered[0].1.contains("Visual Analysis: "));

        // JSON 和图片都已删除
        assert!(scratch_is_empty(&ctx));
    }

    #[tokio::test]
    async fn test_page_failure_is_recorded_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path(), AuditProfile::Full);
        let renderer = Arc::new(FakeRenderer::default());

        let record = pipeline(None, renderer.clone()).run(&ctx).await;

        assert!(!record.success());
        assert!(matches!(record.outcome, AuditOutcome::PageFailed { .. }));
        assert!(record.error().unwrap().contains("404"));
        assert!(renderer.rendered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_score_is_gated() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path(), AuditProfile::Full);
        let renderer = Arc::new(FakeRenderer::default());
        let json = r#"{ "finalUrl": "https://example.com", "audits": { "color-contrast": { "score": 0 } } }"#;

        let record = pipeline(Some(json.to_string()), renderer.clone())
            .run(&ctx)
            .await;

        assert_eq!(record.outcome, AuditOutcome::Gated);
        let message = record.error().unwrap();
        assert!(message.contains("Systemic scoring failure"));
        assert!(message.contains("target-size"));
        assert!(renderer.rendered.lock().unwrap().is_empty());
        assert!(scratch_is_empty(&ctx));
    }

    #[tokio::test]
    async fn test_lite_scan_skips_annotation() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path(), AuditProfile::Lite);
        let renderer = Arc::new(FakeRenderer::default());

        let record = pipeline(Some(report_json(1.0, true)), renderer.clone())
            .run(&ctx)
            .await;

        assert!(record.success());
        assert_eq!(
            record.document().unwrap(),
            dir.path().join("out/a@b.com_lite/example-com.pdf").as_path()
        );
        assert!(matches!(record.outcome, AuditOutcome::Documented { images: 0, .. }));
        assert!(scratch_is_empty(&ctx));
    }

    #[tokio::test]
    async fn test_missing_screenshot_still_documents() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path(), AuditProfile::Full);
        let renderer = Arc::new(FakeRenderer::default());

        let record = pipeline(Some(report_json(0.5, false)), renderer)
            .run(&ctx)
            .await;

        assert!(matches!(record.outcome, AuditOutcome::Documented { images: 0, .. }));
    }
}
