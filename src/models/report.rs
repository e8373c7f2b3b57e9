//! Lighthouse JSON 报告模型
//!
//! 只描述本系统读取的字段，其余字段全部忽略；所有字段都有默认值，
//! 缺字段的报告也能解析。

use base64::Engine;
use image::DynamicImage;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{AppError, AppResult, ReportError};
use crate::models::geometry::Rect;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseReport {
    #[serde(default)]
    pub audits: HashMap<String, AuditResult>,
    #[serde(default)]
    pub final_url: Option<String>,
    #[serde(default)]
    pub final_displayed_url: Option<String>,
    #[serde(default)]
    pub fetch_time: Option<String>,
    #[serde(default)]
    pub config_settings: Option<ConfigSettings>,
    #[serde(default)]
    pub full_page_screenshot: Option<FullPageScreenshot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSettings {
    #[serde(default)]
    pub form_factor: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FullPageScreenshot {
    #[serde(default)]
    pub screenshot: Option<Screenshot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Screenshot {
    /// `data:image/...;base64,` 格式的数据 URL
    #[serde(default)]
    pub data: String,
}

/// 单个审计项的结果
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// `[0, 1]`，不适用的审计为 `null`
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub display_value: Option<String>,
    #[serde(default)]
    pub details: Option<AuditDetails>,
}

impl AuditResult {
    pub fn items(&self) -> &[AuditItem] {
        self.details
            .as_ref()
            .map(|d| d.items.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditDetails {
    #[serde(default)]
    pub items: Vec<AuditItem>,
}

/// 审计明细表中的一行
///
/// 内置审计把坐标放在 `node.boundingRect`，自定义文字审计直接放在 `rect`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditItem {
    #[serde(default)]
    pub rect: Option<Rect>,
    #[serde(default)]
    pub node: Option<NodeInfo>,
    #[serde(default)]
    pub text_snippet: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub container_selector: Option<String>,
    #[serde(default)]
    pub container_tag: Option<String>,
    #[serde(default)]
    pub node_label: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    #[serde(default)]
    pub bounding_rect: Option<Rect>,
    #[serde(default)]
    pub node_label: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl LighthouseReport {
    /// 从文件加载报告
    pub async fn load(path: &Path) -> AppResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::file_not_found(path.display().to_string())
            } else {
                AppError::file_read_failed(path.display().to_string(), e)
            }
        })?;
        Self::from_json(&content)
            .map_err(|e| AppError::parse_failed(path.display().to_string(), e))
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// 最终页面 URL（兼容新旧两种字段名）
    pub fn page_url(&self) -> Option<&str> {
        self.final_url
            .as_deref()
            .or(self.final_displayed_url.as_deref())
    }

    pub fn form_factor(&self) -> &str {
        self.config_settings
            .as_ref()
            .and_then(|s| s.form_factor.as_deref())
            .unwrap_or("desktop")
    }

    /// 解码整页截图
    pub fn decode_screenshot(&self) -> AppResult<DynamicImage> {
        let data = self
            .full_page_screenshot
            .as_ref()
            .and_then(|s| s.screenshot.as_ref())
            .map(|s| s.data.as_str())
            .filter(|d| !d.is_empty())
            .ok_or(ReportError::MissingField {
                field: "fullPageScreenshot.screenshot.data",
            })?;

        let encoded = data.rsplit(',').next().unwrap_or(data);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| ReportError::ScreenshotUnavailable {
                reason: e.to_string(),
            })?;

        let image = image::load_from_memory(&bytes).map_err(|e| {
            ReportError::ScreenshotUnavailable {
                reason: e.to_string(),
            }
        })?;
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FileError;

    #[tokio::test]
    async fn test_load_missing_report_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let err = LighthouseReport::load(&path).await.unwrap_err();
        assert!(matches!(err, AppError::File(FileError::NotFound { .. })));

        std::fs::write(&path, "{ not json").unwrap();
        let err = LighthouseReport::load(&path).await.unwrap_err();
        assert!(matches!(err, AppError::File(FileError::ParseFailed { .. })));
    }

    #[test]
    fn test_parse_minimal_report() {
        let json = r#"{
            "finalUrl": "https://example.com/",
            "audits": {
                "color-contrast": { "score": 0.5, "details": { "items": [
                    { "node": { "boundingRect": { "left": 1, "top": 2, "width": 3, "height": 4, "right": 4, "bottom": 6 }, "nodeLabel": "Buy" } }
                ] } },
                "viewport": { "score": null }
            }
        }"#;
        let report = LighthouseReport::from_json(json).unwrap();
        assert_eq!(report.page_url(), Some("https://example.com/"));
        assert_eq!(report.form_factor(), "desktop");

        let contrast = &report.audits["color-contrast"];
        assert_eq!(contrast.score, Some(0.5));
        let rect = contrast.items()[0]
            .node
            .as_ref()
            .and_then(|n| n.bounding_rect)
            .unwrap();
        assert_eq!(rect, Rect::new(1.0, 2.0, 3.0, 4.0));

        assert_eq!(report.audits["viewport"].score, None);
        assert!(report.audits["viewport"].items().is_empty());
    }

    #[test]
    fn test_missing_screenshot_is_an_error() {
        let report = LighthouseReport::default();
        assert!(report.decode_screenshot().is_err());
    }

    #[test]
    fn test_decode_screenshot_data_url() {
        let mut png = Vec::new();
        image::RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let data = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&png)
        );
        let report = LighthouseReport {
            full_page_screenshot: Some(FullPageScreenshot {
                screenshot: Some(Screenshot { data }),
            }),
            ..Default::default()
        };

        let image = report.decode_screenshot().unwrap();
        assert_eq!((image.width(), image.height()), (4, 3));
    }
}
