//! 站内链接收集 - 业务能力层
//!
//! 从种子 URL 出发做广度优先扩展，返回有界、去重、限深的同源链接列表。
//! - 总数上限在每次插入前检查
//! - 每个 URL 的提取最多重试 `max_retries` 次，两次尝试之间固定等待
//! - 只有种子 URL 重试耗尽才整体失败；其他 URL 失败只记录并排除

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{free_port, launch_headless_browser, LaunchOptions};
use crate::config::Config;
use crate::infrastructure::JsExecutor;

/// 静态资源扩展名，不计入页面链接
const ASSET_EXTENSIONS: [&str; 14] = [
    "css", "js", "png", "jpg", "jpeg", "gif", "svg", "ico", "pdf", "zip", "exe", "woff", "woff2",
    "ttf",
];

const LINK_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// 链接收集失败（只在种子 URL 无法处理时出现）
#[derive(Debug, thiserror::Error)]
pub enum LinkCollectError {
    #[error("invalid seed URL {url}: {reason}")]
    InvalidSeed { url: String, reason: String },

    #[error("The base URL {url} could not be processed after {attempts} attempts. Aborting. ({details})")]
    SeedUnreachable {
        url: String,
        attempts: usize,
        details: String,
    },
}

/// 单个页面的链接来源
#[async_trait]
pub trait LinkSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// 返回页面上已规范化的同源链接
    async fn extract(&self, url: &str) -> Result<Vec<String>>;
}

/// 收集参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectorOptions {
    pub max_links: usize,
    pub max_depth: usize,
    pub delay: Duration,
    pub max_retries: usize,
}

impl CollectorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_links: config.max_links,
            max_depth: config.max_depth,
            delay: Duration::from_millis(config.link_delay_ms),
            max_retries: config.link_max_retries.max(1),
        }
    }
}

/// 单个 URL 的失败记录
#[derive(Debug, Clone, PartialEq)]
pub struct LinkFailure {
    pub url: String,
    pub depth: usize,
    pub error: String,
}

/// 收集结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedLinks {
    /// 种子在前，按发现顺序排列
    pub links: Vec<String>,
    pub failures: Vec<LinkFailure>,
}

#[derive(Debug)]
struct QueueItem {
    url: String,
    depth: usize,
}

pub struct LinkCollector {
    sources: Vec<Arc<dyn LinkSource>>,
    options: CollectorOptions,
}

impl LinkCollector {
    /// 按顺序尝试 `sources`，前一个失败才用下一个
    pub fn new(sources: Vec<Arc<dyn LinkSource>>, options: CollectorOptions) -> Self {
        Self { sources, options }
    }

    /// 默认来源：先用 Chrome 渲染，失败再直接抓 HTML
    pub fn from_config(config: &Config) -> Self {
        let timeout = Duration::from_millis(config.link_timeout_ms);
        Self::new(
            vec![
                Arc::new(ChromeLinkSource::new(config.chrome_path.clone(), timeout)),
                Arc::new(HttpLinkSource::new(timeout)),
            ],
            CollectorOptions::from_config(config),
        )
    }

    pub async fn collect(&self, seed: &str) -> std::result::Result<CollectedLinks, LinkCollectError> {
        let seed_url = Url::parse(seed).map_err(|e| LinkCollectError::InvalidSeed {
            url: seed.to_string(),
            reason: e.to_string(),
        })?;

        info!("🔗 开始收集站内链接: {}", seed);
        info!(
            "最多 {} 个链接，最大深度 {}",
            self.options.max_links, self.options.max_depth
        );

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(seed.to_string());
        if let Some(canonical) = canonicalize(seed, &seed_url) {
            visited.insert(canonical);
        }

        let mut results = vec![QueueItem {
            url: seed.to_string(),
            depth: 0,
        }];
        let mut failures = Vec::new();
        let mut index = 0;

        while index < results.len() && results.len() < self.options.max_links {
            let (url, depth) = (results[index].url.clone(), results[index].depth);
            debug!("处理 #{} (depth {}): {}", index + 1, depth, url);

            if index > 0 {
                tokio::time::sleep(self.options.delay).await;
            }

            if depth >= self.options.max_depth {
                debug!("已达最大深度 {}，跳过", self.options.max_depth);
                index += 1;
                continue;
            }

            match self.extract_with_retries(&url).await {
                Ok(found) => {
                    for link in found {
                        if results.len() >= self.options.max_links {
                            break;
                        }
                        if visited.insert(link.clone()) {
                            results.push(QueueItem {
                                url: link,
                                depth: depth + 1,
                            });
                        }
                    }
                }
                Err(e) => {
                    if index == 0 {
                        return Err(LinkCollectError::SeedUnreachable {
                            url: url.clone(),
                            attempts: self.options.max_retries,
                            details: format!("{:#}", e),
                        });
                    }
                    warn!("⚠️  重试后仍无法处理 {}: {:#}", url, e);
                    failures.push(LinkFailure {
                        url,
                        depth,
                        error: format!("{:#}", e),
                    });
                }
            }

            index += 1;
        }

        let failed: HashSet<&str> = failures.iter().map(|f| f.url.as_str()).collect();
        let links: Vec<String> = results
            .iter()
            .map(|item| item.url.clone())
            .filter(|url| !failed.contains(url.as_str()))
            .take(self.options.max_links)
            .collect();

        info!(
            "✅ 链接收集完成: {} 个链接，{} 个失败",
            links.len(),
            failures.len()
        );
        Ok(CollectedLinks { links, failures })
    }

    async fn extract_with_retries(&self, url: &str) -> Result<Vec<String>> {
        let mut last_error = None;
        for attempt in 1..=self.options.max_retries {
            match self.extract_from_url(url).await {
                Ok(links) => return Ok(links),
                Err(e) => {
                    warn!(
                        "第 {}/{} 次提取失败 {}: {:#}",
                        attempt, self.options.max_retries, url, e
                    );
                    last_error = Some(e);
                    if attempt < self.options.max_retries {
                        tokio::time::sleep(self.options.delay).await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("没有可用的链接来源")))
    }

    async fn extract_from_url(&self, url: &str) -> Result<Vec<String>> {
        let mut errors = Vec::new();
        for source in &self.sources {
            match source.extract(url).await {
                Ok(links) => {
                    debug!("{} 找到 {} 个链接", source.name(), links.len());
                    return Ok(links);
                }
                Err(e) => {
                    debug!("{} 提取失败，尝试下一个来源: {:#}", source.name(), e);
                    errors.push(format!("{}: {:#}", source.name(), e));
                }
            }
        }
        anyhow::bail!("所有来源都无法提取 {} ({})", url, errors.join("; "))
    }
}

/// 规范化链接
///
/// 只保留与 `base` 同源的链接；去掉片段和查询参数、去掉末尾斜杠；
/// 排除站点根和静态资源
pub fn canonicalize(href: &str, base: &Url) -> Option<String> {
    let mut full = base.join(href.trim()).ok()?;
    if full.origin() != base.origin() || !full.origin().is_tuple() {
        return None;
    }
    full.set_fragment(None);
    full.set_query(None);

    let as_str = full.as_str();
    let clean = as_str.strip_suffix('/').unwrap_or(as_str);
    if clean == base.origin().ascii_serialization() {
        return None;
    }

    let lower = clean.to_ascii_lowercase();
    if ASSET_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
    {
        return None;
    }

    Some(clean.to_string())
}

/// 去重并保持首次出现的顺序
fn canonicalize_all<'a>(hrefs: impl IntoIterator<Item = &'a str>, base: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    hrefs
        .into_iter()
        .filter_map(|href| canonicalize(href, base))
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// 用 headless Chrome 渲染页面后读取链接
pub struct ChromeLinkSource {
    chrome_path: Option<String>,
    timeout: Duration,
}

impl ChromeLinkSource {
    pub fn new(chrome_path: Option<String>, timeout: Duration) -> Self {
        Self {
            chrome_path,
            timeout,
        }
    }
}

#[async_trait]
impl LinkSource for ChromeLinkSource {
    fn name(&self) -> &'static str {
        "chrome"
    }

    async fn extract(&self, url: &str) -> Result<Vec<String>> {
        let base = Url::parse(url).with_context(|| format!("无效的 URL: {}", url))?;
        let session =
            launch_headless_browser(&LaunchOptions::new(self.chrome_path.clone(), free_port()?))
                .await?;

        let result = async {
            let page = session.new_page("about:blank").await?;
            tokio::time::timeout(self.timeout, page.goto(url))
                .await
                .with_context(|| format!("加载 {} 超时", url))??;
            let executor = JsExecutor::new(page);
            let hrefs = executor.collect_hrefs().await?;
            Ok::<_, anyhow::Error>(hrefs)
        }
        .await;
        session.close().await;

        let hrefs = result?;
        Ok(canonicalize_all(hrefs.iter().map(String::as_str), &base))
    }
}

/// 直接抓取 HTML 并用正则提取 `href`
pub struct HttpLinkSource {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpLinkSource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl LinkSource for HttpLinkSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn extract(&self, url: &str) -> Result<Vec<String>> {
        let base = Url::parse(url).with_context(|| format!("无效的 URL: {}", url))?;
        let html = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, LINK_USER_AGENT)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(extract_hrefs(&html, &base))
    }
}

static ANCHOR_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["']([^"']*)["']"#)
        .expect("anchor regex should compile")
});

/// 从 HTML 文本中提取 `<a href>` 并规范化
pub fn extract_hrefs(html: &str, base: &Url) -> Vec<String> {
    let hrefs = ANCHOR_HREF
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str()));
    canonicalize_all(hrefs, base)
}
