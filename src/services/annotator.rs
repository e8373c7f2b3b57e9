//! 截图标注 - 业务能力层
//!
//! 在整页截图上为每个问题元素画框并编号：
//! - 双层描边矩形（偏移 1px 的半透明黑色阴影 + 彩色边框）
//! - 左上角双层圆形徽章（阴影半径 +1）和白色粗体编号
//!
//! 缩放和锐化用 `image`，矢量绘制用 `tiny-skia`（抗锯齿），编号字形用 `fontdue` 光栅化。
//!
//! 编号按过滤后的列表顺序从 1 开始，不按位置排序。

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use fontdue::{Font, FontSettings, Metrics};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tiny_skia::{
    ColorU8, FillRule, IntSize, Paint, PathBuilder, Pixmap, PixmapPaint, Rect as SkiaRect,
    Stroke, Transform,
};
use tracing::{debug, info};

use crate::error::{AppError, AppResult, ReportError};
use crate::models::annotated_audit::{AnnotatedAudit, RenderStyle};
use crate::models::geometry::BoundingBox;
use crate::models::report::LighthouseReport;
use crate::services::box_filter;

const SHADOW: Rgba<u8> = Rgba([0, 0, 0, 128]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// 徽章编号字体（粗体无衬线）
const BADGE_FONT_BYTES: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

static BADGE_FONT: LazyLock<Result<Font, &'static str>> =
    LazyLock::new(|| Font::from_bytes(BADGE_FONT_BYTES, FontSettings::default()));

fn badge_font() -> AppResult<&'static Font> {
    BADGE_FONT
        .as_ref()
        .map_err(|e| AppError::Other(format!("加载徽章字体失败: {}", e)))
}

/// 绘制参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub style: RenderStyle,
    /// 输出图片相对原图的缩放倍数
    pub scale_factor: f64,
    /// 锐化强度，0 表示不锐化
    pub sharpen_amount: f32,
    pub box_thickness: f64,
}

impl RenderOptions {
    pub fn for_style(style: RenderStyle) -> Self {
        Self {
            style,
            scale_factor: 1.0,
            sharpen_amount: match style {
                RenderStyle::Scaled => 1.0,
                RenderStyle::Plain => 0.0,
            },
            box_thickness: 3.0,
        }
    }

    /// 徽章半径：理想值为框高的 80%，夹在 [下限, 20 * scale] 之间
    pub fn badge_radius(&self, scaled_height: f64) -> f64 {
        match self.style {
            RenderStyle::Scaled => {
                let min = (8.0 * self.scale_factor).round();
                let max = (20.0 * self.scale_factor).round();
                let ideal = (scaled_height * 0.8).round();
                ideal.min(max).max(min)
            }
            RenderStyle::Plain => (scaled_height * 0.8).min(20.0).max(10.0),
        }
    }
}

/// 在图片上标注所有框，返回新图片
pub fn render(
    source: &RgbaImage,
    boxes: &[BoundingBox],
    color: Rgba<u8>,
    options: &RenderOptions,
) -> AppResult<RgbaImage> {
    let scale = options.scale_factor;
    let base = match options.style {
        RenderStyle::Scaled => {
            let width = ((source.width() as f64) * scale).round().max(1.0) as u32;
            let height = ((source.height() as f64) * scale).round().max(1.0) as u32;
            let resized = if (width, height) == source.dimensions() {
                source.clone()
            } else {
                imageops::resize(source, width, height, FilterType::Lanczos3)
            };
            if options.sharpen_amount > 0.0 {
                imageops::unsharpen(&resized, options.sharpen_amount * 0.5, 0)
            } else {
                resized
            }
        }
        RenderStyle::Plain => source.clone(),
    };
    let font = badge_font()?;
    let mut canvas = to_pixmap(&base)?;

    for (index, bbox) in boxes.iter().enumerate() {
        let (x, y, w, h, thickness) = match options.style {
            RenderStyle::Scaled => (
                (bbox.rect.left * scale).round(),
                (bbox.rect.top * scale).round(),
                (bbox.rect.width * scale).round(),
                (bbox.rect.height * scale).round(),
                (options.box_thickness * scale).round(),
            ),
            RenderStyle::Plain => (
                bbox.rect.left,
                bbox.rect.top,
                bbox.rect.width,
                bbox.rect.height,
                options.box_thickness,
            ),
        };

        stroke_rect(&mut canvas, x + 1.0, y + 1.0, w, h, thickness, SHADOW);
        stroke_rect(&mut canvas, x, y, w, h, thickness, color);

        let radius = options.badge_radius(h);
        fill_circle(&mut canvas, x, y, radius + 1.0, SHADOW);
        fill_circle(&mut canvas, x, y, radius, color);
        draw_number(&mut canvas, font, x, y, (radius * 1.2).round(), index + 1, WHITE);
    }

    Ok(to_image(&canvas))
}

/// 单个审计的标注结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationOutcome {
    /// 生成的图片；没有可标注的框时为 `None`（"未发现问题"，不是错误）
    pub image_path: Option<PathBuf>,
    pub drawn: Vec<BoundingBox>,
    pub containers: Vec<BoundingBox>,
    pub visually_empty: Vec<BoundingBox>,
}

/// 按审计类别挑出最终要画的框
pub fn select_boxes(
    audit: AnnotatedAudit,
    report: &LighthouseReport,
    screenshot: &RgbaImage,
) -> AnnotationOutcome {
    let Some(result) = report.audits.get(audit.audit_id()) else {
        return AnnotationOutcome::default();
    };

    let mut boxes = audit.extract_boxes(result);
    let mut outcome = AnnotationOutcome::default();

    if audit.filters_containers() {
        let filtered = box_filter::filter_containing_boxes(boxes);
        boxes = filtered.kept;
        outcome.containers = filtered.removed;
    }
    if audit.checks_visibility() {
        let filtered = box_filter::partition_visible(screenshot, boxes);
        boxes = filtered.kept;
        outcome.visually_empty = filtered.removed;
    }

    outcome.drawn = boxes;
    outcome
}

/// 生成单个审计的标注图
///
/// 同步执行（图片编码是 CPU 密集操作），调用方负责放到阻塞线程池
pub fn annotate_audit(
    audit: AnnotatedAudit,
    report: &LighthouseReport,
    screenshot: &RgbaImage,
    output_path: &Path,
) -> AppResult<AnnotationOutcome> {
    let mut outcome = select_boxes(audit, report, screenshot);

    if !outcome.containers.is_empty() {
        debug!("[{}] 跳过 {} 个外层容器框", audit, outcome.containers.len());
    }
    if !outcome.visually_empty.is_empty() {
        debug!("[{}] 跳过 {} 个视觉为空的框", audit, outcome.visually_empty.len());
    }
    if outcome.drawn.is_empty() {
        info!("ℹ️ [{}] 过滤后没有需要标注的元素，不生成图片", audit);
        return Ok(outcome);
    }

    for (index, bbox) in outcome.drawn.iter().enumerate() {
        debug!(
            "[{}] #{} {} {}",
            audit,
            index + 1,
            bbox.metadata.label,
            bbox.metadata.selector.as_deref().unwrap_or_default()
        );
    }

    let options = RenderOptions::for_style(audit.render_style());
    let annotated = render(screenshot, &outcome.drawn, audit.color(), &options)?;
    annotated
        .save(output_path)
        .map_err(|e| AppError::file_write_failed(output_path.display().to_string(), e))?;

    info!(
        "🎨 [{}] 已标注 {} 个元素: {}",
        audit,
        outcome.drawn.len(),
        output_path.display()
    );
    outcome.image_path = Some(output_path.to_path_buf());
    Ok(outcome)
}

// ========== 绘制原语 ==========

fn paint(color: Rgba<u8>) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
    paint.anti_alias = true;
    paint
}

/// 描边矩形，线宽以边为中心向两侧展开
fn stroke_rect(
    canvas: &mut Pixmap,
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    thickness: f64,
    color: Rgba<u8>,
) {
    let Some(rect) = SkiaRect::from_xywh(x as f32, y as f32, w as f32, h as f32) else {
        return;
    };
    let path = PathBuilder::from_rect(rect);
    let stroke = Stroke {
        width: thickness as f32,
        ..Default::default()
    };
    canvas.stroke_path(&path, &paint(color), &stroke, Transform::identity(), None);
}

fn fill_circle(canvas: &mut Pixmap, cx: f64, cy: f64, radius: f64, color: Rgba<u8>) {
    if let Some(path) = PathBuilder::from_circle(cx as f32, cy as f32, radius as f32) {
        canvas.fill_path(
            &path,
            &paint(color),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
}

/// 以 (cx, cy) 为中心绘制编号：水平按字宽居中，垂直按数字墨迹居中
fn draw_number(
    canvas: &mut Pixmap,
    font: &Font,
    cx: f64,
    cy: f64,
    font_size: f64,
    number: usize,
    color: Rgba<u8>,
) {
    let glyphs: Vec<(Metrics, Vec<u8>)> = number
        .to_string()
        .chars()
        .map(|ch| font.rasterize(ch, font_size as f32))
        .collect();

    let width: f32 = glyphs.iter().map(|(m, _)| m.advance_width).sum();
    let top = glyphs
        .iter()
        .map(|(m, _)| m.height as i32 + m.ymin)
        .max()
        .unwrap_or(0);
    let bottom = glyphs.iter().map(|(m, _)| m.ymin).min().unwrap_or(0);
    let baseline = cy as f32 + (top + bottom) as f32 / 2.0;

    let mut pen_x = cx as f32 - width / 2.0;
    for (metrics, coverage) in &glyphs {
        if let Some(glyph) = glyph_pixmap(metrics, coverage, color) {
            let gx = (pen_x + metrics.xmin as f32).round() as i32;
            let gy = (baseline - (metrics.height as i32 + metrics.ymin) as f32).round() as i32;
            canvas.draw_pixmap(
                gx,
                gy,
                glyph.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }
        pen_x += metrics.advance_width;
    }
}

/// 字形覆盖率作为 alpha 的单色位图
fn glyph_pixmap(metrics: &Metrics, coverage: &[u8], color: Rgba<u8>) -> Option<Pixmap> {
    let mut glyph = Pixmap::new(metrics.width as u32, metrics.height as u32)?;
    for (pixel, alpha) in glyph.pixels_mut().iter_mut().zip(coverage) {
        *pixel = ColorU8::from_rgba(color[0], color[1], color[2], *alpha).premultiply();
    }
    Some(glyph)
}

fn to_pixmap(image: &RgbaImage) -> AppResult<Pixmap> {
    let invalid = || {
        AppError::Report(ReportError::ScreenshotUnavailable {
            reason: format!("无效的截图尺寸 {}x{}", image.width(), image.height()),
        })
    };
    let size = IntSize::from_wh(image.width(), image.height()).ok_or_else(invalid)?;
    let data = image
        .pixels()
        .flat_map(|p| {
            let c = ColorU8::from_rgba(p[0], p[1], p[2], p[3]).premultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    Pixmap::from_vec(data, size).ok_or_else(invalid)
}

fn to_image(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    image
}
