use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ScoringError;

/// 完整审计使用的类别
pub const SENIOR_FRIENDLY: &str = "senior-friendly";
/// 快速扫描使用的类别
pub const SENIOR_FRIENDLY_LITE: &str = "senior-friendly-lite";

/// 类别中的一条加权审计引用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRef {
    pub id: String,
    pub weight: f64,
}

impl AuditRef {
    pub fn new(id: impl Into<String>, weight: f64) -> Self {
        Self {
            id: id.into(),
            weight,
        }
    }
}

/// 评分类别定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDefinition {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub audit_refs: Vec<AuditRef>,
}

/// 加权评分结果
///
/// `final_score == 0` 视为系统性失败信号，而不是合法的零分
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreData {
    pub final_score: f64,
    pub total_weighted_score: f64,
    pub total_weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ScoringError>,
    /// 报告中缺失的审计（按 0 分计入）
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_audits: Vec<String>,
}

impl ScoreData {
    /// 失败哨兵：全部为 0 并携带原因
    pub fn failed(error: ScoringError) -> Self {
        Self {
            final_score: 0.0,
            total_weighted_score: 0.0,
            total_weight: 0.0,
            error: Some(error),
            missing_audits: Vec::new(),
        }
    }

    /// 是否触发零分闸门
    pub fn is_zero(&self) -> bool {
        self.final_score == 0.0
    }

    /// 四舍五入后的整数分，用于展示
    pub fn rounded(&self) -> i64 {
        self.final_score.round() as i64
    }
}

/// 评分类别注册表（内置定义 + 可选覆盖）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRegistry {
    #[serde(default)]
    pub categories: HashMap<String, CategoryDefinition>,
}

impl CategoryRegistry {
    /// 内置的两个类别
    pub fn builtin() -> Self {
        let mut categories = HashMap::new();
        categories.insert(SENIOR_FRIENDLY.to_string(), senior_friendly());
        categories.insert(SENIOR_FRIENDLY_LITE.to_string(), senior_friendly_lite());
        Self { categories }
    }

    pub fn get(&self, id: &str) -> Option<&CategoryDefinition> {
        self.categories.get(id)
    }

    /// 用 `other` 中的同名类别覆盖当前定义
    pub fn merge(mut self, other: CategoryRegistry) -> Self {
        self.categories.extend(other.categories);
        self
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn senior_friendly() -> CategoryDefinition {
    let refs = [
        // 第一梯队：关键（权重 10）
        ("color-contrast", 10.0),
        ("target-size", 10.0),
        ("viewport", 10.0),
        ("cumulative-layout-shift", 10.0),
        ("text-font-audit", 10.0),
        ("layout-brittle-audit", 10.0),
        // 第二梯队：重要（权重 5）
        ("largest-contentful-paint", 5.0),
        ("total-blocking-time", 5.0),
        ("link-name", 5.0),
        ("button-name", 5.0),
        ("label", 5.0),
        ("interactive-color-audit", 5.0),
        // 第三梯队：基础（权重 2）
        ("is-on-https", 2.0),
        ("dom-size", 2.0),
        ("heading-order", 2.0),
        ("errors-in-console", 2.0),
        ("geolocation-on-start", 2.0),
    ];

    CategoryDefinition {
        title: "Senior Friendliness".to_string(),
        description: "A comprehensive score based on audits for readability, ease of use, and a stable, non-confusing experience.".to_string(),
        audit_refs: refs.iter().map(|(id, w)| AuditRef::new(*id, *w)).collect(),
    }
}

fn senior_friendly_lite() -> CategoryDefinition {
    let refs = [
        ("color-contrast", 5.0),
        ("target-size", 5.0),
        ("font-size", 5.0),
        ("viewport", 3.0),
        ("link-name", 3.0),
        ("button-name", 3.0),
        ("label", 3.0),
        ("heading-order", 2.0),
        ("is-on-https", 2.0),
        ("largest-contentful-paint", 1.0),
        ("cumulative-layout-shift", 1.0),
    ];

    CategoryDefinition {
        title: "Senior Accessibility (Lite)".to_string(),
        description: "Essential accessibility checks for senior users using built-in Lighthouse audits.".to_string(),
        audit_refs: refs.iter().map(|(id, w)| AuditRef::new(*id, *w)).collect(),
    }
}
