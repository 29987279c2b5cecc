//! Notion-backed implementation of the remote record traits.
//!
//! Each bookmark is a page in one Notion database. Property mapping:
//!
//! | Item field | Notion property (read) | Notion property (write) |
//! |------------|------------------------|-------------------------|
//! | `title` | `Name` or `Title` (title) | `Name` |
//! | `url` | `URL` or `Link` (url) | `URL` |
//! | `category` | `Category` (select), else first `Tags` (multi_select) | `Category` |
//! | `sub_category` | `SubCategory` (select) | `SubCategory` |
//! | `description` | `Description` (rich_text) | `Description` |
//! | `icon` | page icon (emoji, external, or file) | page icon, external http(s) only |
//! | `created_at` | page `created_time` | n/a |
//!
//! The client is built explicitly from [`RemoteConfig`]; nothing is read
//! from the environment except through [`NotionClient::from_env`].

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use navkit_core::remote::{RecordCreator, RecordPatch, RecordSource, RecordUpdater};
use navkit_core::{CanonicalItem, NewRecord, DEFAULT_CATEGORY};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::RemoteConfig;

const PAGE_SIZE: u32 = 100;
const UNTITLED: &str = "Untitled";

#[derive(Debug, thiserror::Error)]
pub enum NotionError {
    #[error("request to Notion failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Notion API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

impl NotionError {
    /// Network failures, rate limits and server errors are worth retrying.
    fn is_transient(&self) -> bool {
        match self {
            NotionError::Transport(_) => true,
            NotionError::Api { status, .. } => *status == 429 || *status >= 500,
        }
    }

    fn is_icon_rejection(&self) -> bool {
        match self {
            NotionError::Api { code, message, .. } => {
                code == "validation_error" || message.to_lowercase().contains("icon")
            }
            NotionError::Transport(_) => false,
        }
    }
}

pub struct NotionClient {
    client: reqwest::Client,
    base_url: String,
    database_id: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl NotionClient {
    pub fn new(config: &RemoteConfig, api_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("Notion API key contains invalid header characters")?,
        );
        headers.insert(
            "notion-version",
            HeaderValue::from_str(&config.notion_version)
                .context("Invalid remote.notion_version")?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client for Notion")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            database_id: config.database_id.clone(),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Build a client, reading the API key from `config.api_key_env`.
    pub fn from_env(config: &RemoteConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).with_context(|| {
            format!(
                "{} environment variable not set (required by [remote])",
                config.api_key_env
            )
        })?;
        Self::new(config, &api_key)
    }

    /// Base unit of the linear backoff between attempts (`delay × attempt`).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, NotionError> {
        let resp = request.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<Value>().await?);
        }

        let body = resp.text().await.unwrap_or_default();
        let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        Err(NotionError::Api {
            status: status.as_u16(),
            code: parsed["code"].as_str().unwrap_or("unknown").to_string(),
            message: parsed["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or(body),
        })
    }

    async fn backoff(&self, attempt: u32) {
        tokio::time::sleep(self.retry_delay * attempt).await;
    }

    async fn query_page(&self, cursor: Option<&str>) -> Result<Value, NotionError> {
        let url = format!("{}/v1/databases/{}/query", self.base_url, self.database_id);
        let body = query_body(cursor);

        let mut attempt = 1;
        loop {
            match self.send(self.client.post(&url).json(&body)).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    warn!(attempt, max = self.max_retries, error = %e, "database query failed, retrying");
                    self.backoff(attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl RecordCreator for NotionClient {
    async fn create_record(&self, record: &NewRecord) -> Result<()> {
        let url = format!("{}/v1/pages", self.base_url);
        let mut with_icon = icon_payload(record.icon.as_deref()).is_some();

        let mut attempt = 1;
        loop {
            let body = create_body(&self.database_id, record, with_icon);
            let err = match self.send(self.client.post(&url).json(&body)).await {
                Ok(_) => {
                    debug!(title = %record.title, attempt, "page created");
                    return Ok(());
                }
                Err(e) => e,
            };

            if attempt >= self.max_retries {
                return Err(err).with_context(|| format!("failed to create '{}'", record.title));
            }
            if with_icon && err.is_icon_rejection() {
                warn!(title = %record.title, error = %err, "icon rejected, retrying without icon");
                with_icon = false;
                attempt += 1;
                continue;
            }
            if !err.is_transient() {
                return Err(err).with_context(|| format!("failed to create '{}'", record.title));
            }
            warn!(attempt, max = self.max_retries, error = %err, "create failed, retrying");
            self.backoff(attempt).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl RecordSource for NotionClient {
    async fn list_records(&self) -> Result<Vec<CanonicalItem>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .query_page(cursor.as_deref())
                .await
                .context("failed to query Notion database")?;

            if let Some(results) = page["results"].as_array() {
                items.extend(results.iter().filter_map(item_from_page));
            }

            match (page["has_more"].as_bool(), page["next_cursor"].as_str()) {
                (Some(true), Some(next)) => cursor = Some(next.to_string()),
                _ => break,
            }
        }

        debug!(count = items.len(), "loaded records from Notion");
        Ok(items)
    }
}

#[async_trait]
impl RecordUpdater for NotionClient {
    async fn update_record(&self, id: &str, patch: &RecordPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let url = format!("{}/v1/pages/{}", self.base_url, id);
        self.send(self.client.patch(&url).json(&patch_body(patch)))
            .await
            .with_context(|| format!("failed to update page {}", id))?;
        Ok(())
    }
}

fn query_body(cursor: Option<&str>) -> Value {
    let mut body = json!({ "page_size": PAGE_SIZE });
    if let Some(cursor) = cursor {
        body["start_cursor"] = json!(cursor);
    }
    body
}

/// External page icon for absolute http(s) URLs; anything else is not sent.
fn icon_payload(icon: Option<&str>) -> Option<Value> {
    let icon = icon?;
    if icon.starts_with("http://") || icon.starts_with("https://") {
        Some(json!({ "type": "external", "external": { "url": icon } }))
    } else {
        None
    }
}

fn title_property(text: &str) -> Value {
    json!({ "title": [{ "text": { "content": text } }] })
}

fn rich_text_property(text: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": text } }] })
}

fn select_property(name: &str) -> Value {
    json!({ "select": { "name": name } })
}

fn create_body(database_id: &str, record: &NewRecord, with_icon: bool) -> Value {
    let mut properties = json!({
        "Name": title_property(&record.title),
        "URL": { "url": record.url },
        "Category": select_property(&record.category),
        "Description": rich_text_property(record.description.as_deref().unwrap_or("")),
    });
    if let Some(sub) = record.sub_category.as_deref().filter(|s| !s.is_empty()) {
        properties["SubCategory"] = select_property(sub);
    }

    let mut body = json!({
        "parent": { "database_id": database_id },
        "properties": properties,
    });
    if with_icon {
        if let Some(icon) = icon_payload(record.icon.as_deref()) {
            body["icon"] = icon;
        }
    }
    body
}

fn patch_body(patch: &RecordPatch) -> Value {
    let mut properties = serde_json::Map::new();
    if let Some(title) = &patch.title {
        properties.insert("Name".into(), title_property(title));
    }
    if let Some(url) = &patch.url {
        properties.insert("URL".into(), json!({ "url": url }));
    }
    if let Some(category) = &patch.category {
        properties.insert("Category".into(), select_property(category));
    }
    if let Some(description) = &patch.description {
        properties.insert("Description".into(), rich_text_property(description));
    }

    let mut body = json!({ "properties": properties });
    if let Some(icon) = icon_payload(patch.icon.as_deref()) {
        body["icon"] = icon;
    }
    body
}

fn plain_text(prop: &Value, kind: &str) -> Option<String> {
    let text: String = prop[kind]
        .as_array()?
        .iter()
        .filter_map(|part| part["plain_text"].as_str())
        .collect();
    Some(text).filter(|t| !t.trim().is_empty())
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Map one database page to an item. Pages without an id or URL are skipped.
fn item_from_page(page: &Value) -> Option<CanonicalItem> {
    let id = non_empty(&page["id"])?;
    let props = &page["properties"];

    let url = non_empty(&props["URL"]["url"]).or_else(|| non_empty(&props["Link"]["url"]));
    let Some(url) = url else {
        warn!(page = %id, "page has no URL, skipping");
        return None;
    };

    let title = plain_text(&props["Name"], "title")
        .or_else(|| plain_text(&props["Title"], "title"))
        .unwrap_or_else(|| UNTITLED.to_string());
    let category = non_empty(&props["Category"]["select"]["name"])
        .or_else(|| non_empty(&props["Tags"]["multi_select"][0]["name"]))
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    let icon = match page["icon"]["type"].as_str() {
        Some("emoji") => non_empty(&page["icon"]["emoji"]),
        Some("external") => non_empty(&page["icon"]["external"]["url"]),
        Some("file") => non_empty(&page["icon"]["file"]["url"]),
        _ => None,
    };

    let mut item = CanonicalItem::new(title, url, category).with_id(id);
    item.sub_category = non_empty(&props["SubCategory"]["select"]["name"]);
    item.description = plain_text(&props["Description"], "rich_text");
    item.icon = icon;
    item.created_at = page["created_time"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    Some(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(icon: Option<&str>) -> NewRecord {
        NewRecord {
            title: "Rust".into(),
            url: "https://rust-lang.org".into(),
            category: "Dev".into(),
            sub_category: Some("Lang".into()),
            description: None,
            icon: icon.map(str::to_string),
        }
    }

    #[test]
    fn create_body_maps_properties() {
        let body = create_body("db1", &record(None), true);
        assert_eq!(body["parent"]["database_id"], "db1");
        let props = &body["properties"];
        assert_eq!(props["Name"]["title"][0]["text"]["content"], "Rust");
        assert_eq!(props["URL"]["url"], "https://rust-lang.org");
        assert_eq!(props["Category"]["select"]["name"], "Dev");
        assert_eq!(props["SubCategory"]["select"]["name"], "Lang");
        assert_eq!(props["Description"]["rich_text"][0]["text"]["content"], "");
        assert!(body.get("icon").is_none());
    }

    #[test]
    fn only_http_icons_are_sent() {
        let external = create_body("db", &record(Some("https://x.dev/favicon.ico")), true);
        assert_eq!(external["icon"]["external"]["url"], "https://x.dev/favicon.ico");

        let emoji = create_body("db", &record(Some("🦀")), true);
        assert!(emoji.get("icon").is_none());

        let relative = create_body("db", &record(Some("/favicon.ico")), true);
        assert!(relative.get("icon").is_none());

        let suppressed = create_body("db", &record(Some("https://x.dev/i.png")), false);
        assert!(suppressed.get("icon").is_none());
    }

    #[test]
    fn reads_page_with_fallback_properties() {
        let page = json!({
            "id": "page-1",
            "created_time": "2024-05-01T12:00:00.000Z",
            "icon": { "type": "emoji", "emoji": "📦" },
            "properties": {
                "Title": { "title": [{ "plain_text": "Crates" }, { "plain_text": ".io" }] },
                "Link": { "url": "https://crates.io" },
                "Tags": { "multi_select": [{ "name": "Dev" }, { "name": "Rust" }] },
                "Description": { "rich_text": [] }
            }
        });
        let item = item_from_page(&page).unwrap();
        assert_eq!(item.id, "page-1");
        assert_eq!(item.title, "Crates.io");
        assert_eq!(item.url, "https://crates.io");
        assert_eq!(item.category, "Dev");
        assert_eq!(item.icon.as_deref(), Some("📦"));
        assert!(item.description.is_none());
        assert!(item.created_at.is_some());
    }

    #[test]
    fn page_defaults_and_skips() {
        let bare = json!({
            "id": "p2",
            "properties": { "URL": { "url": "https://a.dev" } }
        });
        let item = item_from_page(&bare).unwrap();
        assert_eq!(item.title, UNTITLED);
        assert_eq!(item.category, DEFAULT_CATEGORY);

        let no_url = json!({ "id": "p3", "properties": { "Name": { "title": [] } } });
        assert!(item_from_page(&no_url).is_none());
    }

    #[test]
    fn patch_body_only_includes_set_fields() {
        let patch = RecordPatch {
            category: Some("Tools".into()),
            icon: Some("✨".into()),
            ..RecordPatch::default()
        };
        let body = patch_body(&patch);
        let props = body["properties"].as_object().unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props["Category"]["select"]["name"], "Tools");
        assert!(body.get("icon").is_none());
    }

    #[test]
    fn query_body_carries_cursor() {
        assert!(query_body(None).get("start_cursor").is_none());
        assert_eq!(query_body(Some("abc"))["start_cursor"], "abc");
        assert_eq!(query_body(None)["page_size"], 100);
    }

    #[test]
    fn error_classification() {
        let validation = NotionError::Api {
            status: 400,
            code: "validation_error".into(),
            message: "body.icon.external.url should be a valid URL".into(),
        };
        assert!(validation.is_icon_rejection());
        assert!(!validation.is_transient());

        let limited = NotionError::Api {
            status: 429,
            code: "rate_limited".into(),
            message: "slow down".into(),
        };
        assert!(limited.is_transient());
        assert!(!limited.is_icon_rejection());
    }
}
