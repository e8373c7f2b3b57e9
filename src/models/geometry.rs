use serde::{Deserialize, Serialize};

/// 页面坐标系中的矩形（单位：CSS 像素）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// 覆盖：四条边都包住 `other`（允许重合）
    pub fn covers(&self, other: &Rect) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    /// 包含：覆盖 `other` 且至少在一个维度上严格更大
    ///
    /// 两个完全相同的矩形互不包含
    pub fn contains(&self, other: &Rect) -> bool {
        self.covers(other) && (self.width > other.width || self.height > other.height)
    }
}

/// 被标记元素的附加信息（用于图例和日志）
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BoxMetadata {
    pub label: String,
    pub selector: Option<String>,
    pub explanation: Option<String>,
}

/// 单个被标记元素的包围盒
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundingBox {
    pub rect: Rect,
    pub metadata: BoxMetadata,
}

impl BoundingBox {
    pub fn new(rect: Rect, metadata: BoxMetadata) -> Self {
        Self { rect, metadata }
    }

    /// 只有坐标、没有附加信息的包围盒
    pub fn bare(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(Rect::new(left, top, width, height), BoxMetadata::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_requires_strictly_larger() {
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        let inner = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));

        let twin = outer;
        assert!(outer.covers(&twin));
        assert!(!outer.contains(&twin));
    }

    #[test]
    fn test_contains_with_shared_edge() {
        // 同宽、更高：只在一个维度更大也算包含
        let tall = Rect::new(0.0, 0.0, 50.0, 80.0);
        let short = Rect::new(0.0, 0.0, 50.0, 40.0);
        assert!(tall.contains(&short));
    }

    #[test]
    fn test_partial_overlap_is_not_containment() {
        let a = Rect::new(0.0, 0.0, 50.0, 50.0);
        let b = Rect::new(25.0, 25.0, 50.0, 50.0);
        assert!(!a.contains(&b));
        assert!(!b.contains(&a));
    }
}
