//! # navkit
//!
//! Import/export and reconciliation engine for a bookmark navigator whose
//! source of truth lives in a hosted Notion database.
//!
//! The pure pieces (canonical model, URL normalizer, codecs, duplicate
//! detector) live in [`navkit_core`]; the most used types are re-exported
//! here. This crate adds everything that needs a runtime: HTTP, SQLite, timers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ .json .csv   │──▶│   codecs     │──▶│  canonical   │
//! │ .html file   │   │ (core)       │   │  items       │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                               │
//!              ┌────────────────┬───────────────┼───────────────┐
//!              ▼                ▼               ▼               ▼
//!        ┌───────────┐   ┌────────────┐  ┌────────────┐  ┌────────────┐
//!        │ duplicates│   │ link_check │  │  importer  │  │   stats    │
//!        └───────────┘   └────────────┘  └─────┬──────┘  └────────────┘
//!                                              ▼
//!                                       ┌────────────┐
//!                                       │   notion   │
//!                                       └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`progress`] | Progress events and stderr reporters |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Local schema creation |
//! | [`link_check`] | Concurrent link health probing |
//! | [`metadata`] | Page metadata fetching and bookmark enrichment |
//! | [`importer`] | Batch upload with URL reconciliation |
//! | [`notion`] | Notion REST client implementing the remote traits |
//! | [`stats`] | Daily snapshots and trends |
//! | [`import_cache`] | Resumable pending-import cache |
//! | [`transfer`] | Import from and export to files on disk |

pub use navkit_core::{
    find_duplicates, normalize, CanonicalItem, CodecError, Format, RecordCreator, RecordSource,
};

pub mod config;
pub mod db;
pub mod import_cache;
pub mod importer;
pub mod link_check;
pub mod logging;
pub mod metadata;
pub mod migrate;
pub mod notion;
pub mod progress;
pub mod stats;
pub mod transfer;
