//! Integration tests for the batch importer and reconciliation.
//!
//! The remote store is replaced by in-memory fakes implementing the
//! capability traits, so these tests exercise batching, skipping, failure
//! accounting, and progress invariants without any network.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use navkit::importer::{batch_import, reconcile, BatchImportProgress, ImportOptions};
use navkit::progress::{NoProgress, ProgressEvent, ProgressReporter};
use navkit_core::remote::{RecordCreator, RecordSource};
use navkit_core::{find_duplicates, parse_file, CanonicalItem, NewRecord};

// ─── Fakes ──────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeCreator {
    created: Mutex<Vec<NewRecord>>,
    failing_titles: HashSet<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeCreator {
    fn failing(titles: &[&str]) -> Self {
        Self {
            failing_titles: titles.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn created_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .created
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.clone())
            .collect();
        urls.sort();
        urls
    }
}

#[async_trait]
impl RecordCreator for FakeCreator {
    async fn create_record(&self, record: &NewRecord) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_titles.contains(&record.title) {
            bail!("HTTP 500 for {}", record.title);
        }
        self.created.lock().unwrap().push(record.clone());
        Ok(())
    }
}

struct FakeSource(Result<Vec<CanonicalItem>, String>);

#[async_trait]
impl RecordSource for FakeSource {
    async fn list_records(&self) -> Result<Vec<CanonicalItem>> {
        match &self.0 {
            Ok(items) => Ok(items.clone()),
            Err(msg) => bail!("{}", msg),
        }
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<BatchImportProgress>>);

impl ProgressReporter for Recorder {
    fn report(&self, event: ProgressEvent) {
        if let ProgressEvent::Import(p) = event {
            self.0.lock().unwrap().push(p);
        }
    }
}

fn item(title: &str, url: &str) -> CanonicalItem {
    CanonicalItem::new(title, url, "Dev")
}

fn fast() -> ImportOptions {
    ImportOptions {
        batch_delay: Duration::ZERO,
        ..ImportOptions::default()
    }
}

// ─── Importer ───────────────────────────────────────────────────────

#[tokio::test]
async fn skips_items_already_present_remotely() {
    let creator = FakeCreator::default();
    let existing = vec![item("X", "http://x.com/")];
    let new_items = vec![item("X again", "https://x.com"), item("Y", "https://y.com")];

    let result = batch_import(&creator, &new_items, &existing, &fast(), &NoProgress).await;

    assert_eq!(result.total, 2);
    assert_eq!(result.skipped, 1);
    assert_eq!(result.success, 1);
    assert_eq!(result.failed, 0);
    assert_eq!(creator.created_urls(), vec!["https://y.com"]);
}

#[tokio::test]
async fn failures_are_counted_not_fatal() {
    let creator = FakeCreator::failing(&["B", "D"]);
    let new_items: Vec<CanonicalItem> = ["A", "B", "C", "D", "E"]
        .iter()
        .map(|t| item(t, &format!("https://{}.dev", t.to_lowercase())))
        .collect();

    let result = batch_import(&creator, &new_items, &[], &fast(), &NoProgress).await;

    assert_eq!(result.success, 3);
    assert_eq!(result.failed, 2);
    assert_eq!(result.success + result.failed + result.skipped, result.total);
    let mut failed: Vec<&str> = result.errors.iter().map(|e| e.title.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["B", "D"]);
    assert!(result.errors[0].message.contains("HTTP 500"));
}

#[tokio::test]
async fn progress_invariant_holds_at_every_observation() {
    let creator = FakeCreator::failing(&["fail"]);
    let existing = vec![item("old", "https://old.dev")];
    let new_items = vec![
        item("a", "https://a.dev"),
        item("old copy", "https://www.old.dev/"),
        item("fail", "https://fail.dev"),
        item("b", "https://b.dev"),
        item("c", "https://c.dev"),
        item("d", "https://d.dev"),
    ];
    let recorder = Recorder::default();

    let result = batch_import(&creator, &new_items, &existing, &fast(), &recorder).await;

    let events = recorder.0.lock().unwrap().clone();
    assert_eq!(events.len(), new_items.len());
    for (i, p) in events.iter().enumerate() {
        assert_eq!(p.current, i as u64 + 1);
        assert_eq!(p.total, 6);
        assert_eq!(p.success + p.failed + p.skipped, p.current);
    }
    let last = events.last().unwrap();
    assert_eq!((last.success, last.failed, last.skipped), (4, 1, 1));
    assert_eq!(result.success, last.success);
}

#[tokio::test]
async fn repeated_url_within_input_is_skipped_by_default() {
    let creator = FakeCreator::default();
    let new_items = vec![
        item("a", "https://a.dev"),
        item("a slash", "https://a.dev/"),
        item("b", "https://b.dev"),
    ];

    let result = batch_import(&creator, &new_items, &[], &fast(), &NoProgress).await;
    assert_eq!(result.skipped, 1);
    assert_eq!(result.success, 2);

    let creator = FakeCreator::default();
    let opts = ImportOptions {
        dedupe_within_batch: false,
        ..fast()
    };
    let result = batch_import(&creator, &new_items, &[], &opts, &NoProgress).await;
    assert_eq!(result.skipped, 0);
    assert_eq!(result.success, 3);
}

#[tokio::test]
async fn creates_never_exceed_concurrency() {
    let creator = FakeCreator::with_delay(Duration::from_millis(20));
    let new_items: Vec<CanonicalItem> = (0..10)
        .map(|i| item(&format!("item {i}"), &format!("https://site{i}.dev")))
        .collect();

    let result = batch_import(&creator, &new_items, &[], &fast(), &NoProgress).await;

    assert_eq!(result.success, 10);
    let max = creator.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 3, "saw {max} concurrent creates");
    assert!(max >= 2, "batch did not run concurrently");
}

#[tokio::test]
async fn pauses_between_batches() {
    let creator = FakeCreator::default();
    let new_items: Vec<CanonicalItem> = (0..7)
        .map(|i| item(&format!("item {i}"), &format!("https://site{i}.dev")))
        .collect();
    let opts = ImportOptions {
        concurrency: 3,
        batch_delay: Duration::from_millis(40),
        dedupe_within_batch: true,
    };

    let started = Instant::now();
    let result = batch_import(&creator, &new_items, &[], &opts, &NoProgress).await;

    // three batches, two pauses
    assert_eq!(result.success, 7);
    assert!(started.elapsed() >= Duration::from_millis(80));
}

#[tokio::test]
async fn empty_input_reports_nothing() {
    let creator = FakeCreator::default();
    let recorder = Recorder::default();
    let result = batch_import(&creator, &[], &[], &fast(), &recorder).await;
    assert_eq!(result.total, 0);
    assert!(result.errors.is_empty());
    assert!(recorder.0.lock().unwrap().is_empty());
}

// ─── Reconciliation ─────────────────────────────────────────────────

#[tokio::test]
async fn reconcile_uses_remote_records_as_baseline() {
    let creator = FakeCreator::default();
    let source = FakeSource(Ok(vec![item("Remote", "https://Example.com/a/")]));
    let new_items = vec![
        item("Local dup", "http://www.example.com/a"),
        item("Fresh", "https://example.com/b"),
    ];

    let result = reconcile(&creator, &source, &new_items, &fast(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(result.skipped, 1);
    assert_eq!(creator.created_urls(), vec!["https://example.com/b"]);
}

#[tokio::test]
async fn reconcile_aborts_when_baseline_unavailable() {
    let creator = FakeCreator::default();
    let source = FakeSource(Err("HTTP 401 unauthorized".into()));
    let new_items = vec![item("A", "https://a.dev")];

    let err = reconcile(&creator, &source, &new_items, &fast(), &NoProgress)
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("could not load existing records for reconciliation"));
    assert!(err.reason.contains("HTTP 401"));
    assert!(creator.created_urls().is_empty());
}

// ─── End to end ─────────────────────────────────────────────────────

#[tokio::test]
async fn csv_file_to_remote_with_duplicates_reported() {
    let csv = "ID,Title,URL,Category\n\
               1,Rust,https://rust-lang.org,Dev\n\
               2,Rust again,http://www.rust-lang.org/,Dev\n\
               3,Docs,https://docs.rs,Dev\n";
    let items = parse_file("bookmarks.CSV", csv.as_bytes()).unwrap();
    assert_eq!(items.len(), 3);

    let groups = find_duplicates(&items);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].normalized_key, "rust-lang.org");

    let creator = FakeCreator::default();
    let source = FakeSource(Ok(vec![item("Docs", "https://docs.rs/")]));
    let result = reconcile(&creator, &source, &items, &fast(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(result.success, 1);
    assert_eq!(result.skipped, 2);
    assert_eq!(creator.created_urls(), vec!["https://rust-lang.org"]);
}
