//! 加权评分 - 业务能力层
//!
//! 纯函数：给定类别的加权引用列表和报告中的审计结果，算出百分制总分。
//! 缺失或为 `null` 的审计按 0 分计入；除零不会 panic，而是返回错误哨兵。

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::ScoringError;
use crate::models::report::{AuditResult, LighthouseReport};
use crate::models::scoring::{AuditRef, CategoryRegistry, ScoreData};

/// 评分表中的一行（用于报告中的"分数计算"表格）
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreLine {
    pub id: String,
    /// 审计原始分，缺失时为 `None`
    pub score: Option<f64>,
    pub weight: f64,
    /// `score * weight`（缺失按 0）
    pub contribution: f64,
}

/// 计算加权总分
pub fn compute(refs: &[AuditRef], audits: &HashMap<String, AuditResult>) -> ScoreData {
    if refs.is_empty() {
        return ScoreData::failed(ScoringError::NoAuditRefs);
    }

    let lines = breakdown(refs, audits);
    let total_weighted_score: f64 = lines.iter().map(|l| l.contribution).sum();
    let total_weight: f64 = lines.iter().map(|l| l.weight).sum();
    let missing_audits: Vec<String> = refs
        .iter()
        .filter(|r| !audits.contains_key(&r.id))
        .map(|r| r.id.clone())
        .collect();

    if !missing_audits.is_empty() {
        debug!("报告中缺失 {} 个审计: {:?}", missing_audits.len(), missing_audits);
    }

    if total_weight == 0.0 {
        return ScoreData {
            missing_audits,
            ..ScoreData::failed(ScoringError::ZeroTotalWeight)
        };
    }

    ScoreData {
        final_score: total_weighted_score / total_weight * 100.0,
        total_weighted_score,
        total_weight,
        error: None,
        missing_audits,
    }
}

/// 逐条列出每个引用的得分和贡献
pub fn breakdown(refs: &[AuditRef], audits: &HashMap<String, AuditResult>) -> Vec<ScoreLine> {
    refs.iter()
        .map(|r| {
            let score = audits.get(&r.id).and_then(|a| a.score);
            ScoreLine {
                id: r.id.clone(),
                score,
                weight: r.weight,
                contribution: score.unwrap_or(0.0) * r.weight,
            }
        })
        .collect()
}

/// 按类别 ID 评分，类别不存在时返回 `CategoryNotFound` 哨兵
pub fn score_category(
    registry: &CategoryRegistry,
    category_id: &str,
    report: &LighthouseReport,
) -> ScoreData {
    match registry.get(category_id) {
        Some(category) => compute(&category.audit_refs, &report.audits),
        None => {
            warn!("类别 '{}' 不存在", category_id);
            ScoreData::failed(ScoringError::CategoryNotFound {
                category: category_id.to_string(),
            })
        }
    }
}
