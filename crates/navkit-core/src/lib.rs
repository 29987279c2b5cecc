//! # navkit core
//!
//! Shared, runtime-free logic for navkit: the canonical bookmark model,
//! URL normalization, the JSON / CSV / Netscape-HTML codecs, duplicate
//! detection, keyword category suggestion, and the capability traits a
//! remote record store implements.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Everything here
//! is synchronous except the [`remote`] traits, which only declare async
//! signatures.

pub mod codec;
pub mod duplicates;
pub mod error;
pub mod models;
pub mod normalize;
pub mod remote;
pub mod taxonomy;

pub use codec::{codec_for, parse_file, Codec, Format};
pub use duplicates::{
    duplicate_stats, find_duplicates, ids_to_remove, DuplicateGroup, DuplicateStats,
};
pub use error::{CodecError, Locator, ParseError, ValidationError};
pub use models::{CanonicalItem, NewRecord, DEFAULT_CATEGORY};
pub use normalize::normalize;
pub use remote::{RecordCreator, RecordPatch, RecordSource, RecordUpdater};
pub use taxonomy::{categorize, suggest_category, CategorySuggestion};
