//! 包围盒过滤 - 业务能力层
//!
//! 两个互相独立的过滤阶段：
//! - 包含消除：外层框包住内层框时，去掉外层框，只保留最具体的那个
//! - 视觉区分：截图上对应区域几乎是纯色（空白、隐藏元素）时判定为"视觉为空"
//!
//! 两个阶段都保持输入顺序，标注编号依赖这个顺序。

use image::RgbaImage;
use tracing::{debug, warn};

use crate::models::geometry::{BoundingBox, Rect};

/// 像素标准差阈值（0~255 通道刻度），任一通道超过即视为有内容
pub const VISIBILITY_THRESHOLD: f64 = 5.0;

/// 一次过滤的结果：保留的和被剔除的都按原顺序返回
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
    pub kept: Vec<BoundingBox>,
    pub removed: Vec<BoundingBox>,
}

/// 包含消除
///
/// 对任意有序对 (A, B)，若 A 覆盖 B 且至少一个维度严格更大，则 A 被标记移除。
/// 完全相同的两个框互不包含，都会保留。
pub fn filter_containing_boxes(boxes: Vec<BoundingBox>) -> FilterOutcome {
    let marked: Vec<bool> = boxes
        .iter()
        .enumerate()
        .map(|(i, a)| {
            boxes
                .iter()
                .enumerate()
                .any(|(j, b)| i != j && a.rect.contains(&b.rect))
        })
        .collect();

    let mut outcome = FilterOutcome::default();
    for (bbox, remove) in boxes.into_iter().zip(marked) {
        if remove {
            outcome.removed.push(bbox);
        } else {
            outcome.kept.push(bbox);
        }
    }
    outcome
}

/// 判断矩形区域在截图上是否有可见内容
///
/// 宽或高小于 2、区域越界都判定为不可区分（宁可漏标，不会崩溃）
pub fn is_visually_distinct(image: &RgbaImage, rect: &Rect) -> bool {
    if !(rect.width >= 2.0 && rect.height >= 2.0) {
        return false;
    }

    let Some((x, y, w, h)) = sample_region(image, rect) else {
        warn!(
            "⚠️  无法分析 ({}, {}) 处的区域，视为空白",
            rect.left, rect.top
        );
        return false;
    };

    channel_stdevs(image, x, y, w, h)
        .iter()
        .any(|stdev| *stdev > VISIBILITY_THRESHOLD)
}

/// 按视觉区分把框分成"可见"和"视觉为空"两组
pub fn partition_visible(image: &RgbaImage, boxes: Vec<BoundingBox>) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();
    for bbox in boxes {
        if is_visually_distinct(image, &bbox.rect) {
            outcome.kept.push(bbox);
        } else {
            debug!("视觉为空: {:?} {}", bbox.rect, bbox.metadata.label);
            outcome.removed.push(bbox);
        }
    }
    outcome
}

/// 取样区域：左上角向下取整，宽高向上取整，必须完全落在图片内
fn sample_region(image: &RgbaImage, rect: &Rect) -> Option<(u32, u32, u32, u32)> {
    let left = rect.left.floor();
    let top = rect.top.floor();
    let width = rect.width.ceil();
    let height = rect.height.ceil();

    if !(left >= 0.0 && top >= 0.0) {
        return None;
    }
    if left + width > image.width() as f64 || top + height > image.height() as f64 {
        return None;
    }

    Some((left as u32, top as u32, width as u32, height as u32))
}

/// 区域内 R/G/B 三个通道的样本标准差
fn channel_stdevs(image: &RgbaImage, x: u32, y: u32, w: u32, h: u32) -> [f64; 3] {
    let mut sum = [0.0f64; 3];
    let mut sum_sq = [0.0f64; 3];

    for py in y..y + h {
        for px in x..x + w {
            let pixel = image.get_pixel(px, py);
            for c in 0..3 {
                let v = pixel[c] as f64;
                sum[c] += v;
                sum_sq[c] += v * v;
            }
        }
    }

    let n = (w as f64) * (h as f64);
    let mut stdevs = [0.0; 3];
    for c in 0..3 {
        let variance = (sum_sq[c] - sum[c] * sum[c] / n) / (n - 1.0);
        stdevs[c] = variance.max(0.0).sqrt();
    }
    stdevs
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn labels(boxes: &[BoundingBox]) -> Vec<f64> {
        boxes.iter().map(|b| b.rect.left).collect()
    }

    #[test]
    fn test_outer_box_is_removed() {
        let outer = BoundingBox::bare(0.0, 0.0, 100.0, 100.0);
        let inner = BoundingBox::bare(10.0, 10.0, 20.0, 20.0);

        let outcome = filter_containing_boxes(vec![outer.clone(), inner.clone()]);

        assert_eq!(outcome.kept, vec![inner]);
        assert_eq!(outcome.removed, vec![outer]);
    }

    #[test]
    fn test_nested_chain_keeps_innermost_only() {
        let boxes = vec![
            BoundingBox::bare(0.0, 0.0, 300.0, 300.0),
            BoundingBox::bare(5.0, 5.0, 50.0, 50.0),
            BoundingBox::bare(200.0, 200.0, 10.0, 10.0),
            BoundingBox::bare(1.0, 1.0, 200.0, 200.0),
        ];
        let outcome = filter_containing_boxes(boxes);

        assert_eq!(labels(&outcome.kept), vec![5.0, 200.0]);
        assert_eq!(labels(&outcome.removed), vec![0.0, 1.0]);
    }

    #[test]
    fn test_identical_boxes_are_both_kept() {
        let a = BoundingBox::bare(10.0, 10.0, 40.0, 40.0);
        let outcome = filter_containing_boxes(vec![a.clone(), a.clone()]);
        assert_eq!(outcome.kept.len(), 2);
        assert!(outcome.removed.is_empty());
    }

    #[test]
    fn test_containment_filter_is_idempotent() {
        let boxes = vec![
            BoundingBox::bare(0.0, 0.0, 100.0, 100.0),
            BoundingBox::bare(10.0, 10.0, 20.0, 20.0),
            BoundingBox::bare(10.0, 10.0, 20.0, 20.0),
            BoundingBox::bare(50.0, 0.0, 60.0, 30.0),
            BoundingBox::bare(55.0, 5.0, 10.0, 10.0),
            BoundingBox::bare(400.0, 400.0, 5.0, 5.0),
        ];
        let once = filter_containing_boxes(boxes);
        let twice = filter_containing_boxes(once.kept.clone());

        assert_eq!(twice.kept, once.kept);
        assert!(twice.removed.is_empty());
    }

    #[test]
    fn test_uniform_region_is_visually_empty() {
        let image = RgbaImage::from_pixel(50, 50, Rgba([240, 240, 240, 255]));
        assert!(!is_visually_distinct(&image, &Rect::new(5.0, 5.0, 30.0, 30.0)));
        assert!(!is_visually_distinct(&image, &Rect::new(0.0, 0.0, 2.0, 2.0)));
    }

    #[test]
    fn test_textured_region_is_distinct() {
        let mut image = RgbaImage::from_pixel(50, 50, Rgba([255, 255, 255, 255]));
        for x in 10..20 {
            image.put_pixel(x, 12, Rgba([0, 0, 0, 255]));
        }
        assert!(is_visually_distinct(&image, &Rect::new(8.0, 8.0, 15.0, 10.0)));
    }

    #[test]
    fn test_single_channel_variation_is_enough() {
        let mut image = RgbaImage::from_pixel(10, 10, Rgba([100, 100, 100, 255]));
        image.put_pixel(1, 1, Rgba([100, 100, 200, 255]));
        assert!(is_visually_distinct(&image, &Rect::new(0.0, 0.0, 4.0, 4.0)));
    }

    #[test]
    fn test_stdev_exactly_at_threshold_is_not_distinct() {
        // 100,100,100,110 的样本方差为 75/3 = 25，标准差正好是 5
        let mut image = RgbaImage::from_pixel(2, 2, Rgba([100, 100, 100, 255]));
        image.put_pixel(1, 1, Rgba([110, 110, 110, 255]));
        let rect = Rect::new(0.0, 0.0, 2.0, 2.0);

        assert_eq!(channel_stdevs(&image, 0, 0, 2, 2), [VISIBILITY_THRESHOLD; 3]);
        assert!(!is_visually_distinct(&image, &rect));

        image.put_pixel(1, 1, Rgba([111, 111, 111, 255]));
        assert!(is_visually_distinct(&image, &rect));
    }

    #[test]
    fn test_tiny_or_out_of_bounds_rects_are_not_distinct() {
        let mut image = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        image.put_pixel(0, 0, Rgba([255, 255, 255, 255]));

        assert!(!is_visually_distinct(&image, &Rect::new(0.0, 0.0, 1.5, 10.0)));
        assert!(!is_visually_distinct(&image, &Rect::new(0.0, 0.0, 10.0, 1.0)));
        assert!(!is_visually_distinct(&image, &Rect::new(15.0, 15.0, 10.0, 10.0)));
        assert!(!is_visually_distinct(&image, &Rect::new(-1.0, 0.0, 5.0, 5.0)));
    }

    #[test]
    fn test_partition_preserves_order() {
        let mut image = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
        for x in 60..70 {
            image.put_pixel(x, 65, Rgba([0, 0, 0, 255]));
        }
        image.put_pixel(5, 5, Rgba([0, 0, 0, 255]));

        let boxes = vec![
            BoundingBox::bare(0.0, 0.0, 10.0, 10.0),
            BoundingBox::bare(20.0, 20.0, 10.0, 10.0),
            BoundingBox::bare(55.0, 60.0, 20.0, 10.0),
        ];
        let outcome = partition_visible(&image, boxes);

        assert_eq!(labels(&outcome.kept), vec![0.0, 55.0]);
        assert_eq!(labels(&outcome.removed), vec![20.0]);
    }
}
