//! Batch reconciliation importer.
//!
//! Uploads parsed items to the remote store, skipping anything whose
//! normalized URL is already known. Creates are grouped into batches of
//! `concurrency`; a batch runs concurrently and consecutive batches are
//! separated by `batch_delay`.
//!
//! Per-item failures never abort a run. They are counted and collected in
//! [`BatchImportResult::errors`]. There is no rollback: a rerun after a
//! partial failure relies on the URL check to skip what already landed.
//!
//! ```text
//! new items ──▶ normalize ──▶ known? ──yes──▶ skipped
//!                               │
//!                               no
//!                               ▼
//!                        pending batch ──full──▶ create × N (concurrent)
//! ```

use std::collections::HashSet;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use navkit_core::remote::{RecordCreator, RecordSource};
use navkit_core::{normalize, CanonicalItem};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ImportConfig;
use crate::progress::{ProgressEvent, ProgressReporter};

/// Counters observed after every resolved item.
///
/// `success + failed + skipped == current` and `current <= total` hold at
/// every observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchImportProgress {
    pub current: u64,
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// One failed create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchImportResult {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub skipped: u64,
    pub errors: Vec<ItemError>,
}

impl BatchImportResult {
    /// Human-readable summary followed by at most `limit` error lines.
    pub fn error_digest(&self, limit: usize) -> String {
        let mut out = format!(
            "imported {} of {} items ({} failed, {} skipped)",
            self.success, self.total, self.failed, self.skipped
        );
        for err in self.errors.iter().take(limit) {
            out.push_str(&format!("\n- {}: {}", err.title, err.message));
        }
        if self.errors.len() > limit {
            out.push_str(&format!("\n... and {} more", self.errors.len() - limit));
        }
        out
    }
}

/// The existing-record baseline could not be built; nothing was uploaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not load existing records for reconciliation: {reason}")]
pub struct RunAbortError {
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub concurrency: usize,
    pub batch_delay: Duration,
    /// Skip later items in the same input whose URL was already scheduled.
    pub dedupe_within_batch: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from(&ImportConfig::default())
    }
}

impl From<&ImportConfig> for ImportOptions {
    fn from(config: &ImportConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            batch_delay: config.batch_delay(),
            dedupe_within_batch: config.dedupe_within_batch,
        }
    }
}

/// Counter state for one run, owned by the driving task.
struct Run<'a> {
    progress: BatchImportProgress,
    errors: Vec<ItemError>,
    batches_flushed: usize,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> Run<'a> {
    fn new(total: u64, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            progress: BatchImportProgress {
                total,
                ..BatchImportProgress::default()
            },
            errors: Vec::new(),
            batches_flushed: 0,
            reporter,
        }
    }

    fn skip(&mut self, item: &CanonicalItem) {
        debug!(url = %item.url, "already present, skipping");
        self.progress.skipped += 1;
        self.advance();
    }

    fn succeed(&mut self) {
        self.progress.success += 1;
        self.advance();
    }

    fn fail(&mut self, item: &CanonicalItem, err: &anyhow::Error) {
        let message = format!("{:#}", err);
        warn!(title = %item.title, error = %message, "create failed");
        self.progress.failed += 1;
        self.errors.push(ItemError {
            title: item.title.clone(),
            message,
        });
        self.advance();
    }

    fn advance(&mut self) {
        self.progress.current += 1;
        self.reporter.report(ProgressEvent::Import(self.progress));
    }

    /// Create every pending item concurrently, pausing first if an earlier
    /// batch already went out.
    async fn flush(
        &mut self,
        creator: &dyn RecordCreator,
        pending: &mut Vec<&CanonicalItem>,
        delay: Duration,
    ) {
        if pending.is_empty() {
            return;
        }
        if self.batches_flushed > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        debug!(batch = self.batches_flushed + 1, size = pending.len(), "flushing batch");

        let mut in_flight: FuturesUnordered<_> = pending
            .drain(..)
            .map(|item| async move {
                let record = item.to_new_record();
                let outcome = creator.create_record(&record).await;
                (item, outcome)
            })
            .collect();

        while let Some((item, outcome)) = in_flight.next().await {
            match outcome {
                Ok(()) => self.succeed(),
                Err(e) => self.fail(item, &e),
            }
        }
        self.batches_flushed += 1;
    }

    fn finish(self) -> BatchImportResult {
        BatchImportResult {
            total: self.progress.total,
            success: self.progress.success,
            failed: self.progress.failed,
            skipped: self.progress.skipped,
            errors: self.errors,
        }
    }
}

/// Upload `new_items`, skipping any whose normalized URL appears in
/// `existing_items`.
///
/// Always resolves every item: `success + failed + skipped == total`.
pub async fn batch_import(
    creator: &dyn RecordCreator,
    new_items: &[CanonicalItem],
    existing_items: &[CanonicalItem],
    options: &ImportOptions,
    reporter: &dyn ProgressReporter,
) -> BatchImportResult {
    let run_id = Uuid::new_v4();
    let concurrency = options.concurrency.max(1);
    info!(
        %run_id,
        items = new_items.len(),
        existing = existing_items.len(),
        concurrency,
        "starting batch import"
    );

    let mut known: HashSet<String> = existing_items.iter().map(|i| normalize(&i.url)).collect();
    let mut run = Run::new(new_items.len() as u64, reporter);
    let mut pending: Vec<&CanonicalItem> = Vec::with_capacity(concurrency);

    for item in new_items {
        let key = normalize(&item.url);
        if known.contains(&key) {
            run.skip(item);
            continue;
        }
        if options.dedupe_within_batch {
            known.insert(key);
        }
        pending.push(item);
        if pending.len() == concurrency {
            run.flush(creator, &mut pending, options.batch_delay).await;
        }
    }
    run.flush(creator, &mut pending, options.batch_delay).await;

    let result = run.finish();
    info!(
        %run_id,
        success = result.success,
        failed = result.failed,
        skipped = result.skipped,
        "batch import finished"
    );
    result
}

/// Load the current remote records, then import against them.
///
/// Only a failure to enumerate existing records aborts the run.
pub async fn reconcile(
    creator: &dyn RecordCreator,
    source: &dyn RecordSource,
    new_items: &[CanonicalItem],
    options: &ImportOptions,
    reporter: &dyn ProgressReporter,
) -> Result<BatchImportResult, RunAbortError> {
    let existing = source.list_records().await.map_err(|e| RunAbortError {
        reason: format!("{:#}", e),
    })?;
    Ok(batch_import(creator, new_items, &existing, options, reporter).await)
}
