//! Link health checking.
//!
//! URLs are probed in batches of `concurrency`; probes inside a batch run
//! concurrently and each completion is reported immediately. A fixed pause
//! separates consecutive batches so a large collection does not hammer a
//! single host.
//!
//! # Classification
//!
//! | Outcome | [`ProbeMode::Status`] | [`ProbeMode::ResponseReceived`] |
//! |---------|-----------------------|---------------------------------|
//! | 2xx / 3xx | valid | valid |
//! | 4xx / 5xx | invalid, `status_code` set | valid |
//! | timeout | invalid, error `"timeout"` | invalid, error `"timeout"` |
//! | network error | invalid, error text | invalid, error text |
//!
//! `ResponseReceived` is the degraded mode for environments where response
//! status codes are not observable; it only proves the host answered.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use navkit_core::CanonicalItem;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LinkCheckConfig;
use crate::progress::{ProgressEvent, ProgressReporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeMode {
    #[default]
    Status,
    ResponseReceived,
}

/// Result of checking one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStatus {
    pub url: String,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// What a single probe observed, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Response(u16),
    Timeout,
    Failed(String),
}

/// Performs one reachability request. The checker enforces the timeout.
#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

#[derive(Debug, Clone)]
pub struct LinkCheckOptions {
    pub concurrency: usize,
    pub timeout: Duration,
    pub batch_delay: Duration,
    pub mode: ProbeMode,
}

impl Default for LinkCheckOptions {
    fn default() -> Self {
        Self::from(&LinkCheckConfig::default())
    }
}

impl From<&LinkCheckConfig> for LinkCheckOptions {
    fn from(config: &LinkCheckConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            timeout: Duration::from_secs(config.timeout_secs),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            mode: config.mode,
        }
    }
}

/// HEAD-first HTTP probe backed by `reqwest`.
///
/// Servers that reject HEAD with 405 or 501 are retried once with GET.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("navkit-link-check/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for link checks")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LinkProbe for HttpProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let head = match self.client.head(url).send().await {
            Ok(resp) => resp.status(),
            Err(e) => return outcome_from_error(&e),
        };
        if head != StatusCode::METHOD_NOT_ALLOWED && head != StatusCode::NOT_IMPLEMENTED {
            return ProbeOutcome::Response(head.as_u16());
        }

        debug!(url, status = head.as_u16(), "HEAD rejected, retrying with GET");
        match self.client.get(url).send().await {
            Ok(resp) => ProbeOutcome::Response(resp.status().as_u16()),
            Err(e) => outcome_from_error(&e),
        }
    }
}

fn outcome_from_error(e: &reqwest::Error) -> ProbeOutcome {
    if e.is_timeout() {
        ProbeOutcome::Timeout
    } else {
        ProbeOutcome::Failed(e.to_string())
    }
}

/// Turn a raw outcome into a [`LinkStatus`].
pub fn classify(url: &str, outcome: ProbeOutcome, mode: ProbeMode) -> LinkStatus {
    let (is_valid, status_code, error) = match outcome {
        ProbeOutcome::Response(code) => {
            let ok = match mode {
                ProbeMode::Status => (200..400).contains(&code),
                ProbeMode::ResponseReceived => true,
            };
            (ok, Some(code), None)
        }
        ProbeOutcome::Timeout => (false, None, Some("timeout".to_string())),
        ProbeOutcome::Failed(message) => (false, None, Some(message)),
    };
    LinkStatus {
        url: url.to_string(),
        is_valid,
        status_code,
        error,
        checked_at: Utc::now(),
    }
}

/// Probe every URL and return one status per distinct URL.
///
/// Repeated URLs are probed once; `total` in progress events counts
/// distinct URLs. The map is complete when this returns.
pub async fn check_links(
    probe: &dyn LinkProbe,
    urls: &[String],
    options: &LinkCheckOptions,
    reporter: &dyn ProgressReporter,
) -> HashMap<String, LinkStatus> {
    let mut seen = HashSet::new();
    let unique: Vec<&str> = urls
        .iter()
        .map(String::as_str)
        .filter(|url| seen.insert(*url))
        .collect();

    let total = unique.len() as u64;
    let concurrency = options.concurrency.max(1);
    let mut results = HashMap::with_capacity(unique.len());
    let (mut current, mut valid, mut invalid) = (0u64, 0u64, 0u64);

    let batches: Vec<&[&str]> = unique.chunks(concurrency).collect();
    let batch_count = batches.len();

    for (index, batch) in batches.into_iter().enumerate() {
        let mut in_flight: FuturesUnordered<_> = batch
            .iter()
            .map(|&url| async move {
                let outcome = match tokio::time::timeout(options.timeout, probe.probe(url)).await {
                    Ok(outcome) => outcome,
                    Err(_) => ProbeOutcome::Timeout,
                };
                (url, outcome)
            })
            .collect();

        while let Some((url, outcome)) = in_flight.next().await {
            let status = classify(url, outcome, options.mode);
            current += 1;
            if status.is_valid {
                valid += 1;
            } else {
                invalid += 1;
            }
            reporter.report(ProgressEvent::LinkChecked {
                current,
                total,
                result: status.clone(),
                valid,
                invalid,
            });
            results.insert(url.to_string(), status);
        }

        if index + 1 < batch_count && !options.batch_delay.is_zero() {
            tokio::time::sleep(options.batch_delay).await;
        }
    }

    info!(total, valid, invalid, "link check finished");
    results
}

/// Aggregate counts over a finished check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkCheckSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
}

impl LinkCheckSummary {
    pub fn from_results(results: &HashMap<String, LinkStatus>) -> Self {
        let valid = results.values().filter(|s| s.is_valid).count();
        Self {
            total: results.len(),
            valid,
            invalid: results.len() - valid,
        }
    }
}

/// Ids of items whose URL was checked and found invalid, in input order.
///
/// Items whose URL is absent from `results` are left alone.
pub fn invalid_item_ids(items: &[CanonicalItem], results: &HashMap<String, LinkStatus>) -> Vec<String> {
    items
        .iter()
        .filter(|item| results.get(&item.url).is_some_and(|s| !s.is_valid))
        .map(|item| item.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mode_classifies_by_code() {
        let ok = classify("u", ProbeOutcome::Response(204), ProbeMode::Status);
        assert!(ok.is_valid);
        let redirect = classify("u", ProbeOutcome::Response(301), ProbeMode::Status);
        assert!(redirect.is_valid);
        let missing = classify("u", ProbeOutcome::Response(404), ProbeMode::Status);
        assert!(!missing.is_valid);
        assert_eq!(missing.status_code, Some(404));
        assert!(missing.error.is_none());
    }

    #[test]
    fn response_received_mode_accepts_any_status() {
        let s = classify("u", ProbeOutcome::Response(500), ProbeMode::ResponseReceived);
        assert!(s.is_valid);
        assert_eq!(s.status_code, Some(500));
    }

    #[test]
    fn timeout_and_failure_are_invalid_in_every_mode() {
        for mode in [ProbeMode::Status, ProbeMode::ResponseReceived] {
            let t = classify("u", ProbeOutcome::Timeout, mode);
            assert!(!t.is_valid);
            assert_eq!(t.error.as_deref(), Some("timeout"));
            let f = classify("u", ProbeOutcome::Failed("dns error".into()), mode);
            assert!(!f.is_valid);
            assert_eq!(f.error.as_deref(), Some("dns error"));
        }
    }

    #[test]
    fn invalid_ids_follow_item_order() {
        let items = vec![
            CanonicalItem::new("A", "https://a.dev", "X").with_id("a"),
            CanonicalItem::new("B", "https://b.dev", "X").with_id("b"),
            CanonicalItem::new("C", "https://c.dev", "X").with_id("c"),
            CanonicalItem::new("B2", "https://b.dev", "Y").with_id("b2"),
        ];
        let mut results = HashMap::new();
        results.insert(
            "https://a.dev".to_string(),
            classify("https://a.dev", ProbeOutcome::Response(200), ProbeMode::Status),
        );
        results.insert(
            "https://b.dev".to_string(),
            classify("https://b.dev", ProbeOutcome::Response(410), ProbeMode::Status),
        );
        assert_eq!(invalid_item_ids(&items, &results), vec!["b", "b2"]);

        let summary = LinkCheckSummary::from_results(&results);
        assert_eq!(
            summary,
            LinkCheckSummary {
                total: 2,
                valid: 1,
                invalid: 1
            }
        );
    }

    #[test]
    fn status_serializes_camel_case() {
        let s = classify("https://a.dev", ProbeOutcome::Response(404), ProbeMode::Status);
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["isValid"], false);
        assert_eq!(v["statusCode"], 404);
        assert!(v.get("error").is_none());
        assert!(v.get("checkedAt").is_some());
    }
}
