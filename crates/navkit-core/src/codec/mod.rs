//! Bookmark file codecs.
//!
//! Three on-disk shapes are supported, each consumed by tools outside
//! navkit (browsers, spreadsheet apps), so their layout is fixed:
//!
//! | Format | Module | Notes |
//! |--------|--------|-------|
//! | JSON | [`json`] | Top-level array, 2-space pretty print |
//! | CSV | [`csv`] | UTF-8 BOM, fixed header, RFC 4180-style quoting |
//! | HTML | [`html`] | Netscape bookmark file, one folder per category |
//!
//! Format selection is by file extension only. An unknown extension fails
//! with [`CodecError::UnsupportedFormat`] instead of sniffing content.

pub mod csv;
pub mod html;
pub mod json;

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::CodecError;
use crate::models::CanonicalItem;

/// A supported bookmark file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Csv,
    Html,
}

impl Format {
    /// Map a bare extension (`"json"`, `".HTM"`) to a format.
    pub fn from_extension(ext: &str) -> Result<Self, CodecError> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            "html" | "htm" => Ok(Format::Html),
            _ => Err(CodecError::UnsupportedFormat(ext)),
        }
    }

    /// Pick the format from the extension of a file name or path.
    pub fn from_file_name(name: &str) -> Result<Self, CodecError> {
        let file = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
        match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Self::from_extension(ext),
            _ => Err(CodecError::UnsupportedFormat(file.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
            Format::Html => "html",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Csv => "text/csv;charset=utf-8",
            Format::Html => "text/html;charset=utf-8",
        }
    }

    /// Export file name stamped with `now`, e.g. `bookmarks-2024-05-01T09-30-00.csv`.
    pub fn export_file_name(&self, now: DateTime<Utc>) -> String {
        format!(
            "bookmarks-{}.{}",
            now.format("%Y-%m-%dT%H-%M-%S"),
            self.extension()
        )
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Json => "JSON",
            Format::Csv => "CSV",
            Format::Html => "HTML",
        })
    }
}

/// Bidirectional conversion between file bytes and canonical items.
pub trait Codec: Send + Sync {
    fn format(&self) -> Format;

    /// Parse a whole file. The first unrecoverable problem aborts the call.
    fn parse(&self, bytes: &[u8]) -> Result<Vec<CanonicalItem>, CodecError>;

    /// Serialize items into the format's on-disk shape.
    fn serialize(&self, items: &[CanonicalItem]) -> Vec<u8>;
}

/// The codec for `format`.
pub fn codec_for(format: Format) -> Box<dyn Codec> {
    match format {
        Format::Json => Box::new(json::JsonCodec),
        Format::Csv => Box::new(csv::CsvCodec),
        Format::Html => Box::new(html::HtmlCodec::default()),
    }
}

/// Select a codec by `file_name`'s extension and parse `bytes` with it.
pub fn parse_file(file_name: &str, bytes: &[u8]) -> Result<Vec<CanonicalItem>, CodecError> {
    let format = Format::from_file_name(file_name)?;
    codec_for(format).parse(bytes)
}

/// Decode file bytes as UTF-8, replacing invalid sequences and dropping a BOM.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}
