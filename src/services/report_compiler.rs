//! 报告编排 - 业务能力层
//!
//! 把一次审计的 JSON 和标注图片编排成"内容计划"（块序列），
//! 再渲染为自包含的 HTML 交给 [`DocumentRenderer`] 输出分页文档。
//!
//! - 完整报告：封面、分数计算、分类汇总、每个审计的详情 / 图片 / 表格
//! - 快速扫描报告：分数、关键检查项、高级版对比页

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AppResult, ReportError};
use crate::models::artifacts::ReportArtifactSet;
use crate::models::audit_info::{
    audit_info, audit_title, AccessibilityCategory, CategoryColors, AUDIT_INFO, LITE_AUDIT_INFO,
    PREMIUM_ADDITIONAL_AUDITS, PREMIUM_DETAILED_ANALYSIS, PREMIUM_VISUAL_FEATURES,
};
use crate::models::report::{AuditItem, AuditResult, LighthouseReport};
use crate::models::scoring::{AuditRef, ScoreData};
use crate::services::document_renderer::DocumentRenderer;
use crate::services::score_aggregator;

/// 详细表格每页行数
pub const ROWS_PER_PAGE: usize = 12;

const MISSION_TEXT: &str = "This comprehensive Silver Surfers audit evaluates website accessibility specifically from the perspective of elderly users. We focus on the unique challenges seniors face, including age-related vision changes, motor skill considerations, cognitive processing needs, and technology familiarity levels.";

const WEIGHTING_TEXT: &str = "The final score is a weighted average of individual audits. Audits that have a greater impact on the user experience for seniors are given a higher \"weight,\" meaning they contribute more to the final score.";

const LITE_FOOTER_TEXT: &str = "This lite version provides a basic overview of essential senior accessibility checks. The premium version includes comprehensive analysis, visual highlighting, detailed recommendations, and professional reporting features to help you create truly senior-friendly websites.";

const TEXT_DARK: &str = "#2C3E50";
const TEXT_MUTED: &str = "#7F8C8D";
const TEXT_FAINT: &str = "#95A5A6";

/// 内容计划中的一个块
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// 页首横幅
    Banner { title: String, subtitle: String },
    UrlBox { label: String, url: String },
    ScoreBadge {
        score: i64,
        color: &'static str,
        label: String,
    },
    Title(String),
    Heading { text: String, color: &'static str },
    Paragraph { text: String, color: &'static str },
    SectionHeader(AccessibilityCategory),
    ColorBar(AccessibilityCategory),
    ScoreBar {
        score: Option<f64>,
        label: String,
    },
    Callout(String),
    StatusLine {
        title: String,
        status: &'static str,
        color: &'static str,
        impact: String,
    },
    FeatureBox {
        title: String,
        bg: &'static str,
        border: &'static str,
        text: &'static str,
        items: Vec<String>,
    },
    Image { path: PathBuf, caption: String },
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        colors: CategoryColors,
    },
    PageBreak,
}

/// 一份文档的内容计划
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPlan {
    pub title: String,
    pub blocks: Vec<Block>,
}

impl DocumentPlan {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    fn heading(&mut self, text: impl Into<String>, color: &'static str) {
        self.push(Block::Heading {
            text: text.into(),
            color,
        });
    }

    fn paragraph(&mut self, text: impl Into<String>, color: &'static str) {
        self.push(Block::Paragraph {
            text: text.into(),
            color,
        });
    }

    pub fn page_count(&self) -> usize {
        1 + self
            .blocks
            .iter()
            .filter(|b| matches!(b, Block::PageBreak))
            .count()
    }
}

// ============================================================================
// 完整报告
// ============================================================================

/// 编排完整报告
///
/// `refs` 为完整类别的加权引用，既用于分数计算表，也决定审计章节的顺序
pub fn plan_full_report(
    report: &LighthouseReport,
    score: &ScoreData,
    refs: &[AuditRef],
    images: &ReportArtifactSet,
) -> DocumentPlan {
    let mut plan = DocumentPlan::new("Silver Surfers Accessibility Audit Report");

    // 封面
    plan.push(Block::Banner {
        title: "Silver Surfers".to_string(),
        subtitle: "Accessibility Audit Report".to_string(),
    });
    if let Some(url) = report.page_url() {
        plan.push(Block::UrlBox {
            label: "Website Analyzed:".to_string(),
            url: url.to_string(),
        });
    }
    plan.push(Block::ScoreBadge {
        score: score.rounded(),
        color: full_score_color(score.final_score),
        label: "Overall Silver Surfers Score".to_string(),
    });
    plan.paragraph(
        format!(
            "Report Generated: {}",
            format_timestamp(report.fetch_time.as_deref())
        ),
        TEXT_MUTED,
    );
    plan.heading("Our Mission: Digital Inclusion for Seniors", "#2980B9");
    plan.paragraph(MISSION_TEXT, TEXT_DARK);

    // 分数计算
    plan.push(Block::PageBreak);
    plan.push(Block::Title("How Your Score Was Calculated".to_string()));
    plan.paragraph(WEIGHTING_TEXT, TEXT_DARK);
    let rows = score_aggregator::breakdown(refs, &report.audits)
        .into_iter()
        .map(|line| {
            vec![
                audit_title(&line.id).to_string(),
                format!("{:.0}", line.score.unwrap_or(0.0) * 100.0),
                format_number(line.weight),
                format!("{:.2}", line.contribution),
            ]
        })
        .collect();
    plan.push(Block::Table {
        headers: strings(&["Audit Component", "Score", "Weight", "Weighted Contribution"]),
        rows,
        colors: AccessibilityCategory::Technical.colors(),
    });
    plan.heading(
        format!(
            "Final Calculation: {:.2} (Total Points) / {} (Total Weight) = {:.0}",
            score.total_weighted_score,
            format_number(score.total_weight),
            score.final_score
        ),
        "#2980B9",
    );

    // 分类汇总
    let grouped = group_by_category(report, refs);
    plan.push(Block::PageBreak);
    plan.push(Block::Title("Audit Summary by Category".to_string()));
    for (category, ids) in &grouped {
        plan.push(Block::SectionHeader(*category));
        for id in ids {
            let Some(result) = report.audits.get(*id) else {
                continue;
            };
            plan.paragraph(
                format!("• {}: {}", audit_title(id), summary_rating(result.score)),
                TEXT_DARK,
            );
        }
    }

    // 每个审计：详情、标注图片、详细表格
    for (_, ids) in &grouped {
        for id in ids {
            let Some(result) = report.audits.get(*id) else {
                continue;
            };
            debug!("编排审计章节: {}", id);
            plan_audit_detail(&mut plan, id, result);
            if let Some(path) = images.get(id) {
                plan_image_page(&mut plan, id, path);
            }
            plan_findings_tables(&mut plan, id, result);
        }
    }

    plan
}

/// 报告中出现且有说明文字的审计，按分类分组
///
/// 顺序：先按 `refs` 的顺序，其余按 ID 排序；分类按首次出现排序
fn group_by_category<'a>(
    report: &'a LighthouseReport,
    refs: &'a [AuditRef],
) -> Vec<(AccessibilityCategory, Vec<&'a str>)> {
    let mut ordered: Vec<&str> = refs.iter().map(|r| r.id.as_str()).collect();
    let mut extra: Vec<&str> = AUDIT_INFO
        .keys()
        .copied()
        .filter(|id| !ordered.contains(id))
        .collect();
    extra.sort_unstable();
    ordered.extend(extra);

    let mut grouped: Vec<(AccessibilityCategory, Vec<&str>)> = Vec::new();
    for id in ordered {
        let (Some(info), true) = (audit_info(id), report.audits.contains_key(id)) else {
            continue;
        };
        match grouped.iter_mut().find(|(c, _)| *c == info.category) {
            Some((_, ids)) => ids.push(id),
            None => grouped.push((info.category, vec![id])),
        }
    }
    grouped
}

fn plan_audit_detail(plan: &mut DocumentPlan, id: &str, result: &AuditResult) {
    let Some(info) = audit_info(id) else {
        return;
    };
    plan.push(Block::PageBreak);
    plan.push(Block::ColorBar(info.category));
    plan.push(Block::Title(info.title.to_string()));
    plan.push(Block::ScoreBar {
        score: result.score,
        label: "Silver Surfer Score".to_string(),
    });
    if let Some(description) = result.description.as_deref().filter(|d| !d.is_empty()) {
        plan.push(Block::Callout(strip_markdown_links(description)));
    }
    plan.heading("Why This Matters for Silver Surfers", "#E67E22");
    plan.paragraph(info.importance, TEXT_DARK);
    plan.heading("Impact on Silver Surfers", "#8E44AD");
    plan.paragraph(info.why, TEXT_DARK);
    if !info.recommendation.is_empty() {
        plan.heading("How to Improve for Silver Surfers", "#27AE60");
        plan.paragraph(info.recommendation, TEXT_DARK);
    }
    if let Some(display_value) = result.display_value.as_deref().filter(|d| !d.is_empty()) {
        plan.heading("Detailed Results", "#2980B9");
        plan.paragraph(display_value, TEXT_DARK);
    }
}

fn plan_image_page(plan: &mut DocumentPlan, id: &str, path: &Path) {
    plan.push(Block::PageBreak);
    if let Some(info) = audit_info(id) {
        plan.push(Block::ColorBar(info.category));
        plan.heading(format!("Visual Analysis: {}", info.title), TEXT_DARK);
    }
    plan.push(Block::Image {
        path: path.to_path_buf(),
        caption: audit_title(id).to_string(),
    });
}

fn plan_findings_tables(plan: &mut DocumentPlan, id: &str, result: &AuditResult) {
    let items = result.items();
    if items.is_empty() {
        return;
    }
    let info = audit_info(id);
    let colors = info
        .map(|i| i.category.colors())
        .unwrap_or_else(|| AccessibilityCategory::Technical.colors());
    let (headers, extract) = findings_columns(id);

    for (page, chunk) in items.chunks(ROWS_PER_PAGE).enumerate() {
        plan.push(Block::PageBreak);
        match (page, info) {
            (0, Some(info)) => {
                plan.push(Block::ColorBar(info.category));
                plan.heading(format!("Detailed Findings: {}", info.title), "#34495E");
            }
            (0, None) => {}
            _ => plan.heading(format!("{} (continued)", audit_title(id)), "#34495E"),
        }
        plan.push(Block::Table {
            headers: strings(&headers),
            rows: chunk.iter().map(|item| extract(item).to_vec()).collect(),
            colors,
        });
    }
}

type RowExtractor = fn(&AuditItem) -> [String; 3];

/// 每个审计的表格列
fn findings_columns(id: &str) -> ([&'static str; 3], RowExtractor) {
    match id {
        "text-font-audit" => (["Text Content", "Element Selector", "Reason"], |item| {
            [
                or_default(&[item.text_snippet.as_deref()], "N/A"),
                or_default(&[item.container_selector.as_deref()], "N/A"),
                "Font smaller than 16px - difficult for seniors to read".to_string(),
            ]
        }),
        "interactive-color-audit" => (
            ["Interactive Text", "Element Location", "Senior Accessibility Issue"],
            |item| {
                let node = item.node.as_ref();
                [
                    or_default(&[item.text.as_deref()], "Interactive Element"),
                    or_default(
                        &[
                            node.and_then(|n| n.selector.as_deref()),
                            node.and_then(|n| n.path.as_deref()),
                        ],
                        "N/A",
                    ),
                    or_default(
                        &[item.explanation.as_deref()],
                        "Insufficient visual distinction for elderly users",
                    ),
                ]
            },
        ),
        "layout-brittle-audit" => (
            ["Page Element", "Element Location", "Senior Impact"],
            |item| {
                let node = item.node.as_ref();
                [
                    or_default(
                        &[
                            node.and_then(|n| n.node_label.as_deref()),
                            node.and_then(|n| n.snippet.as_deref()),
                        ],
                        "Layout Element",
                    ),
                    or_default(
                        &[
                            node.and_then(|n| n.selector.as_deref()),
                            node.and_then(|n| n.path.as_deref()),
                        ],
                        "N/A",
                    ),
                    "Layout may break when seniors adjust text size for better readability"
                        .to_string(),
                ]
            },
        ),
        _ => (
            ["Element", "Location", "Senior Accessibility Issue"],
            |item| {
                let node = item.node.as_ref();
                [
                    or_default(
                        &[
                            node.and_then(|n| n.node_label.as_deref()),
                            item.node_label.as_deref(),
                        ],
                        "Page Element",
                    ),
                    or_default(
                        &[
                            node.and_then(|n| n.selector.as_deref()),
                            item.selector.as_deref(),
                        ],
                        "N/A",
                    ),
                    or_default(
                        &[
                            node.and_then(|n| n.explanation.as_deref()),
                            item.explanation.as_deref(),
                        ],
                        "May impact senior users",
                    ),
                ]
            },
        ),
    }
}

/// 第一个非空值，否则用默认值
fn or_default(candidates: &[Option<&str>], fallback: &str) -> String {
    candidates
        .iter()
        .flatten()
        .find(|s| !s.is_empty())
        .copied()
        .unwrap_or(fallback)
        .to_string()
}

// ============================================================================
// 快速扫描报告
// ============================================================================

pub fn plan_lite_report(report: &LighthouseReport, score: &ScoreData) -> DocumentPlan {
    let mut plan = DocumentPlan::new("Silver Surfers Report (Lite)");

    plan.push(Block::Banner {
        title: "Silver Surfers Report".to_string(),
        subtitle: "Lite Version - Essential Checks".to_string(),
    });
    if let Some(url) = report.page_url() {
        plan.paragraph(format!("Website: {}", url), TEXT_MUTED);
    }
    plan.push(Block::ScoreBadge {
        score: score.rounded(),
        color: lite_score_color(score.final_score),
        label: "Silver Surfers Score (Lite)".to_string(),
    });

    plan.heading("Key Areas Checked:", "#2980B9");
    for check in LITE_AUDIT_INFO {
        let Some(result) = report.audits.get(check.id) else {
            continue;
        };
        let (status, color) = lite_status(result.score);
        plan.push(Block::StatusLine {
            title: check.title.to_string(),
            status,
            color,
            impact: check.impact.to_string(),
        });
    }

    plan.push(Block::PageBreak);
    plan.push(Block::Banner {
        title: "Upgrade to Premium Silver Surfers".to_string(),
        subtitle: "Unlock the complete senior accessibility analysis".to_string(),
    });
    plan.heading("What You're Missing in the Lite Version:", "#E74C3C");
    plan.push(Block::FeatureBox {
        title: format!("{} Additional Critical Audits", PREMIUM_ADDITIONAL_AUDITS.len()),
        bg: "#FFEBEE",
        border: "#E74C3C",
        text: "#C62828",
        items: strings(PREMIUM_ADDITIONAL_AUDITS),
    });
    plan.push(Block::FeatureBox {
        title: "Visual Analysis & Screenshots".to_string(),
        bg: "#E3F2FD",
        border: "#1976D2",
        text: "#0D47A1",
        items: strings(PREMIUM_VISUAL_FEATURES),
    });
    plan.push(Block::FeatureBox {
        title: "Comprehensive Analysis & Recommendations".to_string(),
        bg: "#E8F5E8",
        border: "#388E3C",
        text: "#1B5E20",
        items: strings(PREMIUM_DETAILED_ANALYSIS),
    });
    plan.paragraph(LITE_FOOTER_TEXT, TEXT_FAINT);

    plan
}

// ============================================================================
// 评级与格式化
// ============================================================================

fn full_score_color(score: f64) -> &'static str {
    if score >= 90.0 {
        "#27AE60"
    } else if score >= 50.0 {
        "#F39C12"
    } else {
        "#E74C3C"
    }
}

fn lite_score_color(score: f64) -> &'static str {
    if score >= 70.0 {
        "#27AE60"
    } else if score >= 40.0 {
        "#F39C12"
    } else {
        "#E74C3C"
    }
}

fn summary_rating(score: Option<f64>) -> &'static str {
    match score {
        None => "N/A",
        Some(s) if s == 1.0 => "Excellent",
        Some(s) if s > 0.8 => "Good",
        Some(s) if s > 0.5 => "Needs Work",
        Some(_) => "Poor",
    }
}

/// 分数条的文字和颜色
pub fn score_band(score: Option<f64>) -> (&'static str, &'static str) {
    match score {
        None => ("Not Applicable", "#95A5A6"),
        Some(s) if s == 1.0 => ("Excellent for Seniors", "#27AE60"),
        Some(s) if s > 0.8 => ("Good for Seniors", "#2ECC71"),
        Some(s) if s > 0.5 => ("Moderate Issues", "#F39C12"),
        Some(_) => ("Needs Improvement", "#E74C3C"),
    }
}

fn lite_status(score: Option<f64>) -> (&'static str, &'static str) {
    match score {
        None => ("N/A", "#95A5A6"),
        Some(s) if s == 1.0 => ("PASS", "#27AE60"),
        Some(s) if s > 0.5 => ("NEEDS WORK", "#F39C12"),
        Some(_) => ("FAIL", "#E74C3C"),
    }
}

/// 整数不带小数点
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

/// `fetchTime` 格式化为 "October 19, 2026 at 3:04 PM"，无法解析时原样返回
fn format_timestamp(fetch_time: Option<&str>) -> String {
    match fetch_time {
        Some(raw) => chrono::DateTime::parse_from_rfc3339(raw)
            .map(|t| t.format("%B %-d, %Y at %-I:%M %p").to_string())
            .unwrap_or_else(|_| raw.to_string()),
        None => chrono::Local::now()
            .format("%B %-d, %Y at %-I:%M %p")
            .to_string(),
    }
}

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(.*?)\]\(.*?\)").expect("markdown link regex should compile")
});

/// 去掉 markdown 链接，只保留链接文字
pub fn strip_markdown_links(text: &str) -> String {
    MARKDOWN_LINK.replace_all(text, "$1").into_owned()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// 输出路径
// ============================================================================

/// 去掉协议，非 `[A-Za-z0-9.-]` 的字符替换为 `-` 并合并连续的 `-`
pub fn sanitize_url(url: &str) -> String {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    let mut out = String::with_capacity(without_scheme.len());
    for c in without_scheme.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out
}

/// 完整报告：`<dir>/<email>/<sanitized-url>-<device>.pdf`
pub fn full_report_path(dir: &Path, email: &str, report: &LighthouseReport) -> PathBuf {
    let url = report.page_url().unwrap_or("unknown-url");
    dir.join(email)
        .join(format!("{}-{}.pdf", sanitize_url(url), report.form_factor()))
}

/// 快速扫描报告：`<dir>/<email>_lite/<host-with-dashes>.pdf`
pub fn lite_report_path(dir: &Path, email: &str, report: &LighthouseReport) -> AppResult<PathBuf> {
    let host = report
        .page_url()
        .and_then(|u| Url::parse(u).ok())
        .and_then(|u| u.host_str().map(|h| h.replace('.', "-")))
        .ok_or(ReportError::MissingField { field: "finalUrl" })?;
    Ok(dir
        .join(format!("{}_lite", email))
        .join(format!("{}.pdf", host)))
}

// ============================================================================
// HTML 渲染
// ============================================================================

const STYLESHEET: &str = r#"
@page { size: A4; margin: 40px; }
body { font-family: Helvetica, Arial, sans-serif; color: #2C3E50; font-size: 11pt; margin: 0; }
.page-break { break-after: page; }
.banner { background: #34495E; color: white; text-align: center; padding: 24px 0; margin-bottom: 24px; }
.banner h1 { font-size: 30px; margin: 0 0 8px 0; }
.banner p { font-size: 20px; margin: 0; }
.url-box { background: #ECF0F1; border: 1px solid #BDC3C7; padding: 12px; margin-bottom: 16px; font-size: 14px; }
.badge { width: 120px; height: 120px; border-radius: 60px; margin: 16px auto 8px auto; color: white; font-size: 50px; font-weight: bold; line-height: 120px; text-align: center; }
.badge-label { text-align: center; font-weight: bold; font-size: 16px; margin-bottom: 24px; }
h1.title { font-size: 24px; text-align: center; }
.section-header { padding: 10px 15px; border-left: 4px solid; font-size: 20px; font-weight: bold; margin: 16px 0 8px 0; }
.color-bar { height: 8px; margin-bottom: 16px; }
.score-bar { display: flex; align-items: center; margin-bottom: 15px; }
.score-bar .track { width: 200px; height: 20px; background: #ECF0F1; }
.score-bar .fill { height: 20px; }
.score-bar span { margin-left: 15px; font-weight: bold; font-size: 12px; }
.callout { background: #F8F9FA; border: 1px solid #E9ECEF; color: #495057; padding: 10px; margin-bottom: 15px; font-size: 12px; }
.status { margin: 6px 0; }
.status .dot { display: inline-block; width: 6px; height: 6px; border-radius: 3px; margin-right: 8px; }
.status .impact { color: #666; font-size: 9pt; margin-left: 14px; }
.feature { padding: 8px 10px; border: 1px solid; font-weight: bold; font-size: 14px; margin-top: 12px; }
figure { margin: 0; text-align: center; }
figure img { max-width: 100%; max-height: 900px; }
table { width: 100%; border-collapse: collapse; font-size: 9pt; margin-bottom: 20px; }
th { padding: 10px 8px; border: 1px solid; font-size: 11px; }
td { padding: 8px; border: 1px solid #E0E0E0; word-break: break-all; }
tr:nth-child(odd) td { background: #FAFAFA; }
"#;

/// 把内容计划渲染为自包含的 HTML（图片以 base64 data URI 内嵌）
///
/// 图片读取失败时用一段说明文字代替
pub async fn render_html(plan: &DocumentPlan) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>");
    html.push_str(&escape(&plan.title));
    html.push_str("</title><style>");
    html.push_str(STYLESHEET);
    html.push_str("</style></head><body>\n");

    for block in &plan.blocks {
        match block {
            Block::Image { path, caption } => match tokio::fs::read(path).await {
                Ok(bytes) => html.push_str(&format!(
                    "<figure><img alt=\"{}\" src=\"data:image/png;base64,{}\"></figure>\n",
                    escape(caption),
                    BASE64.encode(bytes)
                )),
                Err(e) => {
                    warn!("读取标注图片失败 {}: {}", path.display(), e);
                    html.push_str(&format!(
                        "<p>Visual analysis image unavailable: {}</p>\n",
                        escape(&path.display().to_string())
                    ));
                }
            },
            other => html.push_str(&render_block(other)),
        }
    }

    html.push_str("</body></html>\n");
    html
}

fn render_block(block: &Block) -> String {
    match block {
        Block::Banner { title, subtitle } => format!(
            "<div class=\"banner\"><h1>{}</h1><p>{}</p></div>\n",
            escape(title),
            escape(subtitle)
        ),
        Block::UrlBox { label, url } => format!(
            "<div class=\"url-box\"><strong>{}</strong> {}</div>\n",
            escape(label),
            escape(url)
        ),
        Block::ScoreBadge {
            score,
            color,
            label,
        } => format!(
            "<div class=\"badge\" style=\"background:{}\">{}</div><div class=\"badge-label\">{}</div>\n",
            color,
            score,
            escape(label)
        ),
        Block::Title(text) => format!("<h1 class=\"title\">{}</h1>\n", escape(text)),
        Block::Heading { text, color } => {
            format!("<h2 style=\"color:{}\">{}</h2>\n", color, escape(text))
        }
        Block::Paragraph { text, color } => {
            format!("<p style=\"color:{}\">{}</p>\n", color, escape(text))
        }
        Block::SectionHeader(category) => {
            let c = category.colors();
            format!(
                "<div class=\"section-header\" style=\"background:{};border-color:{};color:{}\">{}</div>\n",
                c.bg,
                c.border,
                c.text,
                escape(category.title())
            )
        }
        Block::ColorBar(category) => format!(
            "<div class=\"color-bar\" style=\"background:{}\"></div>\n",
            category.colors().border
        ),
        Block::ScoreBar { score, label } => {
            let (text, color) = score_band(*score);
            let fill = score
                .map(|s| {
                    format!(
                        "<div class=\"fill\" style=\"width:{:.0}%;background:{}\"></div>",
                        s.max(0.05) * 100.0,
                        color
                    )
                })
                .unwrap_or_default();
            format!(
                "<div class=\"score-bar\"><div class=\"track\">{}</div><span>{}: {}</span></div>\n",
                fill,
                escape(label),
                text
            )
        }
        Block::Callout(text) => format!("<div class=\"callout\">{}</div>\n", escape(text)),
        Block::StatusLine {
            title,
            status,
            color,
            impact,
        } => format!(
            "<div class=\"status\"><span class=\"dot\" style=\"background:{}\"></span><strong>{}: {}</strong><div class=\"impact\">{}</div></div>\n",
            color,
            escape(title),
            status,
            escape(impact)
        ),
        Block::FeatureBox {
            title,
            bg,
            border,
            text,
            items,
        } => {
            let list: String = items
                .iter()
                .map(|i| format!("<li>{}</li>", escape(i)))
                .collect();
            format!(
                "<div class=\"feature\" style=\"background:{};border-color:{};color:{}\">{}</div><ul>{}</ul>\n",
                bg,
                border,
                text,
                escape(title),
                list
            )
        }
        Block::Table {
            headers,
            rows,
            colors,
        } => {
            let head: String = headers
                .iter()
                .map(|h| {
                    format!(
                        "<th style=\"background:{};border-color:{};color:{}\">{}</th>",
                        colors.bg,
                        colors.border,
                        colors.text,
                        escape(h)
                    )
                })
                .collect();
            let body: String = rows
                .iter()
                .map(|row| {
                    let cells: String = row
                        .iter()
                        .map(|cell| format!("<td>{}</td>", escape(cell)))
                        .collect();
                    format!("<tr>{}</tr>", cells)
                })
                .collect();
            format!(
                "<table><thead><tr>{}</tr></thead><tbody>{}</tbody></table>\n",
                head, body
            )
        }
        Block::PageBreak => "<div class=\"page-break\"></div>\n".to_string(),
        Block::Image { .. } => String::new(),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// 编排 + 输出
// ============================================================================

/// 渲染内容计划并写到 `output`（自动创建父目录）
pub async fn compile(
    renderer: &dyn DocumentRenderer,
    plan: &DocumentPlan,
    output: &Path,
) -> AppResult<PathBuf> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let html = render_html(plan).await;
    renderer.render(&html, output).await?;
    info!(
        "📄 报告已生成 ({} 页): {}",
        plan.page_count(),
        output.display()
    );
    Ok(output.to_path_buf())
}

/// 文档中出现的审计 ID（测试和日志用）
pub fn planned_audits(plan: &DocumentPlan) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for block in &plan.blocks {
        if let Block::Title(title) = block {
            if let Some((id, _)) = AUDIT_INFO.entries().find(|(_, info)| info.title == title.as_str()) {
                *counts.entry(id.to_string()).or_insert(0) += 1;
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::scoring::CategoryRegistry;
    use crate::models::scoring::SENIOR_FRIENDLY;
    use crate::services::score_aggregator::compute;

    fn sample_report() -> LighthouseReport {
        LighthouseReport::from_json(
            r#"{
                "finalUrl": "https://www.example.com/about/team?x=1",
                "fetchTime": "2026-03-04T15:04:05.000Z",
                "configSettings": { "formFactor": "mobile" },
                "audits": {
                    "color-contrast": {
                        "title": "Contrast",
                        "description": "Low contrast is hard to read. [Learn more](https://web.dev/contrast).",
                        "score": 0.5,
                        "displayValue": "3 elements",
                        "details": { "items": [
                            { "node": { "nodeLabel": "Buy now", "selector": "a.buy", "explanation": "ratio 2.1" } },
                            { "nodeLabel": "Footer", "selector": "footer p" }
                        ] }
                    },
                    "text-font-audit": {
                        "score": 1,
                        "details": { "items": [ { "textSnippet": "tiny", "containerSelector": "p.small" } ] }
                    },
                    "viewport": { "score": 1 },
                    "unknown-audit": { "score": 0 }
                }
            }"#,
        )
        .unwrap()
    }

    fn refs() -> Vec<AuditRef> {
        CategoryRegistry::builtin()
            .get(SENIOR_FRIENDLY)
            .unwrap()
            .audit_refs
            .clone()
    }

    #[test]
    fn test_strip_markdown_links() {
        assert_eq!(
            strip_markdown_links("See [the guide](https://x.y/z) and [docs](a)."),
            "See the guide and docs."
        );
        assert_eq!(strip_markdown_links("plain"), "plain");
    }

    #[test]
    fn test_sanitize_url_and_paths() {
        assert_eq!(
            sanitize_url("https://www.example.com/about/team?x=1"),
            "www.example.com-about-team-x-1"
        );
        assert_eq!(sanitize_url("http://a.b//c"), "a.b-c");

        let report = sample_report();
        assert_eq!(
            full_report_path(Path::new("reports-full"), "a@b.com", &report),
            PathBuf::from("reports-full/a@b.com/www.example.com-about-team-x-1-mobile.pdf")
        );
        assert_eq!(
            lite_report_path(Path::new("reports-lite"), "a@b.com", &report).unwrap(),
            PathBuf::from("reports-lite/a@b.com_lite/www-example-com.pdf")
        );
        assert!(lite_report_path(Path::new("x"), "a", &LighthouseReport::default()).is_err());
    }

    #[test]
    fn test_rating_bands() {
        assert_eq!(score_band(None).0, "Not Applicable");
        assert_eq!(score_band(Some(1.0)).0, "Excellent for Seniors");
        assert_eq!(score_band(Some(0.81)).0, "Good for Seniors");
        assert_eq!(score_band(Some(0.8)).0, "Moderate Issues");
        assert_eq!(score_band(Some(0.5)).0, "Needs Improvement");
        assert_eq!(lite_status(Some(0.6)).0, "NEEDS WORK");
        assert_eq!(lite_status(Some(0.5)).0, "FAIL");
        assert_eq!(lite_status(Some(0.0)).0, "FAIL");
        assert_eq!(summary_rating(Some(0.9)), "Good");
        assert_eq!(full_score_color(90.0), "#27AE60");
        assert_eq!(lite_score_color(69.9), "#F39C12");
    }

    #[test]
    fn test_full_plan_structure() {
        let report = sample_report();
        let refs = refs();
        let score = compute(&refs, &report.audits);
        let mut images = ReportArtifactSet::new();
        images.insert("color-contrast", PathBuf::from("/tmp/contrast.png"));

        let plan = plan_full_report(&report, &score, &refs, &images);

        // 只有收录说明的审计才有章节
        let audits = planned_audits(&plan);
        assert_eq!(audits.len(), 3);
        assert!(!audits.contains_key("unknown-audit"));

        let final_line = format!(
            "Final Calculation: {:.2} (Total Points) / 100 (Total Weight) = {:.0}",
            score.total_weighted_score, score.final_score
        );
        assert!(plan.blocks.iter().any(|b| matches!(b, Block::Heading { text, .. } if *text == final_line)));

        // 描述中的链接被去掉
        assert!(plan.blocks.iter().any(
            |b| matches!(b, Block::Callout(t) if t == "Low contrast is hard to read. Learn more.")
        ));

        // 图片只出现在有标注的审计
        let image_count = plan
            .blocks
            .iter()
            .filter(|b| matches!(b, Block::Image { .. }))
            .count();
        assert_eq!(image_count, 1);

        // 默认列提取：node 优先，其次 item 自身字段
        let contrast_rows = plan.blocks.iter().find_map(|b| match b {
            Block::Table { headers, rows, .. } if headers[0] == "Element" => Some(rows.clone()),
            _ => None,
        });
        assert_eq!(
            contrast_rows.unwrap(),
            vec![
                vec!["Buy now".to_string(), "a.buy".to_string(), "ratio 2.1".to_string()],
                vec![
                    "Footer".to_string(),
                    "footer p".to_string(),
                    "May impact senior users".to_string()
                ],
            ]
        );
    }

    #[test]
    fn test_findings_table_paginates_twelve_rows() {
        let items: Vec<String> = (0..25)
            .map(|i| format!(r#"{{ "textSnippet": "t{}", "containerSelector": "p" }}"#, i))
            .collect();
        let json = format!(
            r#"{{ "audits": {{ "text-font-audit": {{ "score": 0, "details": {{ "items": [{}] }} }} }} }}"#,
            items.join(",")
        );
        let report = LighthouseReport::from_json(&json).unwrap();

        let mut plan = DocumentPlan::new("t");
        plan_findings_tables(&mut plan, "text-font-audit", &report.audits["text-font-audit"]);

        let sizes: Vec<usize> = plan
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::Table { rows, .. } => Some(rows.len()),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![12, 12, 1]);
        let continued = plan
            .blocks
            .iter()
            .filter(|b| matches!(b, Block::Heading { text, .. } if text.ends_with("(continued)")))
            .count();
        assert_eq!(continued, 2);
    }

    #[test]
    fn test_lite_plan_lists_only_present_checks_in_order() {
        let report = sample_report();
        let score = ScoreData {
            final_score: 72.4,
            total_weighted_score: 0.0,
            total_weight: 0.0,
            error: None,
            missing_audits: Vec::new(),
        };
        let plan = plan_lite_report(&report, &score);

        let statuses: Vec<(String, &str)> = plan
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::StatusLine { title, status, .. } => Some((title.clone(), *status)),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("Color Contrast".to_string(), "FAIL"),
                ("Mobile Design".to_string(), "PASS"),
            ]
        );
        assert!(plan.blocks.iter().any(|b| matches!(
            b,
            Block::ScoreBadge { score: 72, color: "#27AE60", .. }
        )));
        assert_eq!(plan.page_count(), 2);
    }

    #[tokio::test]
    async fn test_render_html_embeds_images_and_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("x.png");
        std::fs::write(&png, b"\x89PNG").unwrap();

        let plan = DocumentPlan {
            title: "T".to_string(),
            blocks: vec![
                Block::Paragraph {
                    text: "<script>&".to_string(),
                    color: TEXT_DARK,
                },
                Block::Image {
                    path: png,
                    caption: "c".to_string(),
                },
                Block::Image {
                    path: dir.path().join("gone.png"),
                    caption: "g".to_string(),
                },
            ],
        };
        let html = render_html(&plan).await;

        assert!(html.contains("&lt;script&gt;&amp;"));
        assert!(html.contains("data:image/png;base64,iVBORw=="));
        assert!(html.contains("Visual analysis image unavailable"));
    }
}
