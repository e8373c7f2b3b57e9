//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"的能力

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{AppError, AppResult, BrowserError};

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval() 能力和少量页面查询
/// - 不认识审计、任务、报告
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self
            .page
            .evaluate(js_code.into())
            .await
            .map_err(script_failed)?;
        let json_value = result.into_value().map_err(script_failed)?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value).map_err(script_failed)?;
        Ok(typed_value)
    }

    /// 主文档的 HTTP 状态码
    ///
    /// 浏览器拿不到状态码时（返回 0 或缺失）按 200 处理
    pub async fn navigation_status(&self) -> AppResult<u16> {
        let status: u16 = self
            .eval_as(
                r#"(() => {
                    const nav = performance.getEntriesByType('navigation')[0];
                    return nav && nav.responseStatus ? nav.responseStatus : 0;
                })()"#,
            )
            .await?;
        Ok(if status == 0 { 200 } else { status })
    }

    /// 按顺序尝试选择器，点击第一个可见元素
    ///
    /// 以 `//` 开头的按 XPath 处理，其余按 CSS 选择器处理。返回命中的选择器
    pub async fn click_first_visible(&self, selectors: &[&str]) -> AppResult<Option<String>> {
        let list = serde_json::to_string(selectors).map_err(script_failed)?;
        let script = format!(
            r#"(() => {{
                const selectors = {list};
                const visible = el => {{
                    if (!el) return false;
                    const style = window.getComputedStyle(el);
                    const rect = el.getBoundingClientRect();
                    return style.visibility !== 'hidden' && style.display !== 'none'
                        && rect.width > 0 && rect.height > 0;
                }};
                for (const selector of selectors) {{
                    let el = null;
                    try {{
                        el = selector.startsWith('//')
                            ? document.evaluate(selector, document, null,
                                XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue
                            : document.querySelector(selector);
                    }} catch (e) {{ continue; }}
                    if (visible(el)) {{
                        el.click();
                        return selector;
                    }}
                }}
                return '';
            }})()"#
        );
        let hit: String = self.eval_as(script).await?;
        Ok((!hit.is_empty()).then_some(hit))
    }

    /// 页面上所有 `a[href]` 的绝对地址
    pub async fn collect_hrefs(&self) -> AppResult<Vec<String>> {
        self.eval_as("Array.from(document.querySelectorAll('a[href]'), a => a.href)")
            .await
    }
}

fn script_failed(e: impl std::error::Error + Send + Sync + 'static) -> AppError {
    AppError::Browser(BrowserError::ScriptExecutionFailed {
        source: Box::new(e),
    })
}
