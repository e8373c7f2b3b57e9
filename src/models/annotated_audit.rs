//! 需要在截图上标注的五类审计
//!
//! 每一类审计把自己的"坐标从哪里取、标签怎么取、画什么颜色、走哪些过滤"
//! 作为数据携带，流程层不再按审计 ID 分支。

use image::Rgba;
use serde::Serialize;
use std::fmt;

use crate::models::geometry::{BoundingBox, BoxMetadata, Rect};
use crate::models::report::{AuditItem, AuditResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AnnotatedAudit {
    LayoutBrittle,
    InteractiveColor,
    ColorContrast,
    TargetSize,
    TextFont,
}

/// 坐标来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectSource {
    /// 明细行自带的 `rect`（自定义文字审计）
    ItemRect,
    /// 明细行 `node.boundingRect`（内置审计和其余自定义审计）
    NodeBoundingRect,
}

/// 标注绘制风格
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStyle {
    /// 按比例缩放并锐化，徽章下限 8px
    Scaled,
    /// 原图直接叠加，徽章下限 10px
    Plain,
}

impl AnnotatedAudit {
    /// 固定的处理顺序
    pub const ALL: [AnnotatedAudit; 5] = [
        AnnotatedAudit::LayoutBrittle,
        AnnotatedAudit::InteractiveColor,
        AnnotatedAudit::ColorContrast,
        AnnotatedAudit::TargetSize,
        AnnotatedAudit::TextFont,
    ];

    /// Lighthouse 报告中的审计 ID
    pub fn audit_id(self) -> &'static str {
        match self {
            AnnotatedAudit::LayoutBrittle => "layout-brittle-audit",
            AnnotatedAudit::InteractiveColor => "interactive-color-audit",
            AnnotatedAudit::ColorContrast => "color-contrast",
            AnnotatedAudit::TargetSize => "target-size",
            AnnotatedAudit::TextFont => "text-font-audit",
        }
    }

    pub fn from_audit_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.audit_id() == id)
    }

    /// 生成图片的文件名后缀
    pub fn file_suffix(self) -> &'static str {
        match self {
            AnnotatedAudit::LayoutBrittle => "layout-brittle",
            AnnotatedAudit::InteractiveColor => "interactive-color",
            AnnotatedAudit::ColorContrast => "color-contrast",
            AnnotatedAudit::TargetSize => "target-size",
            AnnotatedAudit::TextFont => "text-font",
        }
    }

    pub fn color(self) -> Rgba<u8> {
        match self {
            AnnotatedAudit::LayoutBrittle => Rgba([0, 0, 255, 255]),
            AnnotatedAudit::InteractiveColor => Rgba([255, 165, 0, 255]),
            AnnotatedAudit::ColorContrast => Rgba([255, 255, 0, 255]),
            AnnotatedAudit::TargetSize | AnnotatedAudit::TextFont => Rgba([255, 0, 0, 255]),
        }
    }

    pub fn rect_source(self) -> RectSource {
        match self {
            AnnotatedAudit::TextFont => RectSource::ItemRect,
            _ => RectSource::NodeBoundingRect,
        }
    }

    /// 是否剔除"包住其他框"的外层框
    pub fn filters_containers(self) -> bool {
        matches!(self, AnnotatedAudit::TextFont)
    }

    /// 是否剔除截图上视觉为空的框
    pub fn checks_visibility(self) -> bool {
        !matches!(self, AnnotatedAudit::LayoutBrittle)
    }

    pub fn render_style(self) -> RenderStyle {
        match self {
            AnnotatedAudit::LayoutBrittle | AnnotatedAudit::TextFont => RenderStyle::Scaled,
            _ => RenderStyle::Plain,
        }
    }

    /// 从审计结果中提取包围盒，保持明细表中的原始顺序
    pub fn extract_boxes(self, audit: &AuditResult) -> Vec<BoundingBox> {
        audit
            .items()
            .iter()
            .filter_map(|item| {
                let rect = self.rect_of(item)?;
                Some(BoundingBox::new(rect, self.metadata_of(item)))
            })
            .collect()
    }

    fn rect_of(self, item: &AuditItem) -> Option<Rect> {
        match self.rect_source() {
            RectSource::ItemRect => item.rect,
            RectSource::NodeBoundingRect => item.node.as_ref().and_then(|n| n.bounding_rect),
        }
    }

    fn metadata_of(self, item: &AuditItem) -> BoxMetadata {
        let node = item.node.as_ref();
        let label = match self {
            AnnotatedAudit::TextFont => item.text_snippet.clone(),
            AnnotatedAudit::InteractiveColor => item.text.clone(),
            _ => node.and_then(|n| n.node_label.clone()),
        };
        let selector = match self {
            AnnotatedAudit::TextFont => item.container_selector.clone(),
            _ => node.and_then(|n| n.selector.clone()),
        };

        BoxMetadata {
            label: normalize_whitespace(label.as_deref().unwrap_or_default()),
            selector,
            explanation: item
                .explanation
                .clone()
                .or_else(|| node.and_then(|n| n.explanation.clone())),
        }
    }
}

impl fmt::Display for AnnotatedAudit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.audit_id())
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
