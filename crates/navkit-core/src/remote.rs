//! Capability traits for the remote record store.
//!
//! The engine never talks to the hosted database directly. Callers inject
//! implementations of these traits; the importer and the reconciliation
//! path only depend on their success/failure contract.
//!
//! | Trait | Used by |
//! |-------|---------|
//! | [`RecordCreator`] | batch importer, one call per non-duplicate item |
//! | [`RecordSource`] | reconciliation baseline (existing records) |
//! | [`RecordUpdater`] | edits of an existing record |
//!
//! Implementations must be `Send + Sync`; creates from one batch run
//! concurrently against the same instance. Implementations do not
//! deduplicate: repeated calls for the same logical item create repeated
//! records.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CanonicalItem, NewRecord};

#[async_trait]
pub trait RecordCreator: Send + Sync {
    /// Create one record. Any error counts as a failed item.
    async fn create_record(&self, record: &NewRecord) -> Result<()>;
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Enumerate every record currently stored remotely.
    async fn list_records(&self) -> Result<Vec<CanonicalItem>>;
}

/// Partial update for an existing record; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub title: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.url.is_none()
            && self.category.is_none()
            && self.description.is_none()
            && self.icon.is_none()
    }
}

#[async_trait]
pub trait RecordUpdater: Send + Sync {
    async fn update_record(&self, id: &str, patch: &RecordPatch) -> Result<()>;
}
