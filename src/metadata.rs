//! Page metadata fetching and bookmark enrichment.
//!
//! [`fetch_metadata`] loads a page and pulls out a title, a description and
//! an icon URL. [`enrich_items`] runs it over a batch of bookmarks and fills
//! in whatever they are missing, then files uncategorized items with
//! [`navkit_core::categorize`].
//!
//! # Lookup order
//!
//! | Field | Sources, first non-empty wins |
//! |-------|-------------------------------|
//! | title | `og:title`, `twitter:title`, `<title>`, else the input URL |
//! | description | `og:description`, `twitter:description`, `meta description` |
//! | icon | apple-touch-icon(-precomposed), fluid-icon, sized icons, `icon`, `shortcut icon`, `msapplication-TileImage`, `og:image`, else `/favicon.ico` |
//!
//! Whitespace runs collapse to one space. Titles keep at most
//! [`TITLE_LIMIT`] characters and descriptions [`DESCRIPTION_LIMIT`].
//! Relative icon paths resolve against the page that was actually fetched.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use navkit_core::{categorize, CanonicalItem};
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::MetadataConfig;

pub const TITLE_LIMIT: usize = 100;
pub const DESCRIPTION_LIMIT: usize = 200;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const TITLE_SOURCES: &[(&str, &str)] = &[
    (r#"meta[property="og:title"]"#, "content"),
    (r#"meta[name="twitter:title"]"#, "content"),
];

const DESCRIPTION_SOURCES: &[(&str, &str)] = &[
    (r#"meta[property="og:description"]"#, "content"),
    (r#"meta[name="twitter:description"]"#, "content"),
    (r#"meta[name="description"]"#, "content"),
];

const ICON_SOURCES: &[(&str, &str)] = &[
    (r#"link[rel="apple-touch-icon-precomposed"]"#, "href"),
    (r#"link[rel="apple-touch-icon"]"#, "href"),
    (r#"link[rel="fluid-icon"]"#, "href"),
    (r#"link[rel="icon"][sizes="64x64"]"#, "href"),
    (r#"link[rel="icon"][sizes="32x32"]"#, "href"),
    (r#"link[rel="icon"]"#, "href"),
    (r#"link[rel="shortcut icon"]"#, "href"),
    (r#"meta[name="msapplication-TileImage"]"#, "content"),
    (r#"meta[property="og:image"]"#, "content"),
];

/// What a page says about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    /// Absolute URL, or a `data:` URI when the page inlines its icon.
    pub icon: String,
    /// The URL that answered, after any scheme fallback.
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataErrorKind {
    MissingUrl,
    Timeout,
    DnsFailed,
    ConnectionRefused,
    InvalidProtocol,
    /// Anything else, including non-2xx responses.
    FetchError,
}

impl MetadataErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingUrl => "MISSING_URL",
            Self::Timeout => "TIMEOUT",
            Self::DnsFailed => "DNS_FAILED",
            Self::ConnectionRefused => "CONNECTION_REFUSED",
            Self::InvalidProtocol => "INVALID_PROTOCOL",
            Self::FetchError => "FETCH_ERROR",
        }
    }

    /// Best-effort classification of a transport error message.
    pub fn from_detail(detail: &str) -> Self {
        let detail = detail.to_lowercase();
        if detail.contains("timed out") || detail.contains("timeout") {
            Self::Timeout
        } else if detail.contains("dns error")
            || detail.contains("failed to lookup address")
            || detail.contains("getaddrinfo")
            || detail.contains("name or service not known")
        {
            Self::DnsFailed
        } else if detail.contains("refused") {
            Self::ConnectionRefused
        } else if detail.contains("protocol") || detail.contains("scheme") {
            Self::InvalidProtocol
        } else {
            Self::FetchError
        }
    }
}

impl fmt::Display for MetadataErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} for {url}: {detail}")]
pub struct MetadataError {
    pub kind: MetadataErrorKind,
    pub url: String,
    pub detail: String,
}

impl MetadataError {
    pub fn new(kind: MetadataErrorKind, url: &str, detail: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.to_string(),
            detail: detail.into(),
        }
    }
}

/// A fetched page body and its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// Performs one GET. Callers enforce the timeout.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedPage, MetadataError>;
}

/// `reqwest`-backed fetcher sending a desktop browser user agent.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .context("Failed to build HTTP client for metadata fetches")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn get(&self, url: &str) -> Result<FetchedPage, MetadataError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| transport_error(url, &e))?;
        Ok(FetchedPage { status, body })
    }
}

fn transport_error(url: &str, e: &reqwest::Error) -> MetadataError {
    let detail = error_chain(e);
    let kind = if e.is_timeout() {
        MetadataErrorKind::Timeout
    } else if e.is_builder() {
        MetadataErrorKind::InvalidProtocol
    } else {
        MetadataErrorKind::from_detail(&detail)
    };
    MetadataError::new(kind, url, detail)
}

/// reqwest hides the interesting part (refused, dns) in the source chain.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut parts = vec![e.to_string()];
    let mut source = e.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

/// Fetch `raw_url` and extract its metadata.
///
/// A URL without a scheme is tried as `https://`; when an `https://` request
/// fails outright it is retried once over `http://`, and if that fails too
/// the original error is returned. Each attempt gets `timeout`.
pub async fn fetch_metadata(
    fetcher: &dyn PageFetcher,
    raw_url: &str,
    timeout: Duration,
) -> Result<PageMetadata, MetadataError> {
    let raw = raw_url.trim();
    if raw.is_empty() {
        return Err(MetadataError::new(
            MetadataErrorKind::MissingUrl,
            raw,
            "URL is required",
        ));
    }

    let target = with_scheme(raw);
    let (final_url, page) = match get_within(fetcher, &target, timeout).await {
        Ok(page) => (target, page),
        Err(first) => {
            let Some(fallback) = http_fallback(&target) else {
                return Err(first);
            };
            debug!(url = %target, error = %first, "https fetch failed, trying http");
            match get_within(fetcher, &fallback, timeout).await {
                Ok(page) => (fallback, page),
                Err(_) => return Err(first),
            }
        }
    };

    if !(200..300).contains(&page.status) {
        return Err(MetadataError::new(
            MetadataErrorKind::FetchError,
            &final_url,
            format!("HTTP {}", page.status),
        ));
    }
    Ok(extract_metadata(&page.body, &final_url, raw))
}

async fn get_within(
    fetcher: &dyn PageFetcher,
    url: &str,
    timeout: Duration,
) -> Result<FetchedPage, MetadataError> {
    match tokio::time::timeout(timeout, fetcher.get(url)).await {
        Ok(result) => result,
        Err(_) => Err(MetadataError::new(
            MetadataErrorKind::Timeout,
            url,
            format!("no response within {}ms", timeout.as_millis()),
        )),
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn has_http_scheme(url: &str) -> bool {
    strip_prefix_ignore_case(url, "http://").is_some()
        || strip_prefix_ignore_case(url, "https://").is_some()
}

fn with_scheme(raw: &str) -> String {
    if has_http_scheme(raw) {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    }
}

fn http_fallback(target: &str) -> Option<String> {
    strip_prefix_ignore_case(target, "https://").map(|rest| format!("http://{}", rest))
}

/// Extract metadata from an HTML document served at `page_url`.
///
/// `fallback_title` is used when the page has no usable title.
pub fn extract_metadata(html: &str, page_url: &str, fallback_title: &str) -> PageMetadata {
    let doc = Html::parse_document(html);

    let title = first_attr(&doc, TITLE_SOURCES)
        .or_else(|| first_text(&doc, "title"))
        .unwrap_or_else(|| fallback_title.to_string());
    let description = first_attr(&doc, DESCRIPTION_SOURCES).unwrap_or_default();
    let icon = first_attr(&doc, ICON_SOURCES)
        .map(|icon| resolve_icon(&icon, page_url))
        .unwrap_or_else(|| favicon_fallback(page_url));

    PageMetadata {
        title: truncate_chars(&collapse_whitespace(&title), TITLE_LIMIT),
        description: truncate_chars(&collapse_whitespace(&description), DESCRIPTION_LIMIT),
        icon,
        url: page_url.to_string(),
    }
}

fn first_attr(doc: &Html, sources: &[(&str, &str)]) -> Option<String> {
    sources.iter().find_map(|(selector, attr)| {
        let selector = Selector::parse(selector).ok()?;
        let value = doc.select(&selector).next()?.value().attr(attr)?;
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let text: String = doc.select(&selector).next()?.text().collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

/// Make an icon reference absolute against the page it came from.
///
/// Absolute `http(s)` URLs and `data:` URIs pass through. Protocol-relative
/// (`//cdn/x.png`), root-relative (`/x.png`) and relative (`x.png`) forms
/// resolve the way a browser would. An unresolvable reference is returned
/// unchanged.
pub fn resolve_icon(icon: &str, page_url: &str) -> String {
    let icon = icon.trim();
    if has_http_scheme(icon) || strip_prefix_ignore_case(icon, "data:").is_some() {
        return icon.to_string();
    }
    match Url::parse(page_url).and_then(|base| base.join(icon)) {
        Ok(resolved) => resolved.to_string(),
        Err(e) => {
            warn!(icon, page_url, error = %e, "could not resolve icon path");
            icon.to_string()
        }
    }
}

fn favicon_fallback(page_url: &str) -> String {
    Url::parse(page_url)
        .and_then(|base| base.join("/favicon.ico"))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| "/favicon.ico".to_string())
}

/// Fill a bookmark's missing description and icon. Returns whether it changed.
///
/// Titles, URLs and existing values are never overwritten.
pub fn apply_metadata(item: &mut CanonicalItem, meta: &PageMetadata) -> bool {
    let mut changed = false;
    if is_blank(&item.description) && !meta.description.is_empty() {
        item.description = Some(meta.description.clone());
        changed = true;
    }
    if is_blank(&item.icon) && !meta.icon.is_empty() {
        item.icon = Some(meta.icon.clone());
        changed = true;
    }
    changed
}

fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, |s| s.trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub concurrency: usize,
    pub timeout: Duration,
    pub batch_delay: Duration,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self::from(&MetadataConfig::default())
    }
}

impl From<&MetadataConfig> for EnrichOptions {
    fn from(config: &MetadataConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            timeout: Duration::from_secs(config.timeout_secs),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichSummary {
    /// Pages fetched successfully.
    pub fetched: usize,
    pub failed: usize,
    /// Items moved out of the default category.
    pub categorized: usize,
}

/// Fetch metadata for every item missing a description or an icon, fill
/// those fields in, then suggest categories for uncategorized items.
///
/// Fetches run in batches of `concurrency` with a pause between batches.
/// A failed fetch is logged and leaves the item as it was.
pub async fn enrich_items(
    fetcher: &dyn PageFetcher,
    items: &mut [CanonicalItem],
    options: &EnrichOptions,
) -> EnrichSummary {
    let pending: Vec<(usize, String)> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| is_blank(&item.description) || is_blank(&item.icon))
        .map(|(index, item)| (index, item.url.clone()))
        .collect();

    let mut summary = EnrichSummary::default();
    let concurrency = options.concurrency.max(1);
    let timeout = options.timeout;
    let batch_count = pending.len().div_ceil(concurrency);

    for (batch_index, batch) in pending.chunks(concurrency).enumerate() {
        let mut in_flight: FuturesUnordered<_> = batch
            .iter()
            .map(|(index, url)| async move { (*index, fetch_metadata(fetcher, url, timeout).await) })
            .collect();

        while let Some((index, outcome)) = in_flight.next().await {
            match outcome {
                Ok(meta) => {
                    apply_metadata(&mut items[index], &meta);
                    summary.fetched += 1;
                }
                Err(e) => {
                    warn!(url = %e.url, code = %e.kind, detail = %e.detail, "metadata fetch failed");
                    summary.failed += 1;
                }
            }
        }

        if batch_index + 1 < batch_count && !options.batch_delay.is_zero() {
            tokio::time::sleep(options.batch_delay).await;
        }
    }

    for item in items.iter_mut() {
        if categorize(item) {
            summary.categorized += 1;
        }
    }
    info!(
        fetched = summary.fetched,
        failed = summary.failed,
        categorized = summary.categorized,
        "enrichment finished"
    );
    summary
}
