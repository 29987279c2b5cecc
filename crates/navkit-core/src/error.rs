//! Error types raised by the codecs and the shared record validator.
//!
//! Every error carries a [`Locator`] so a caller can point a user at the
//! offending array element, CSV row, or source position.

use std::fmt;

use thiserror::Error;

use crate::codec::Format;

/// Where in an input file a problem was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// 1-based element index in a JSON array.
    Index(usize),
    /// 1-based CSV data row (header excluded) and the file line it starts on.
    Row { row: usize, line: usize },
    /// 1-based line and column in the raw text.
    Position { line: usize, column: usize },
    /// The file as a whole.
    Document,
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Index(i) => write!(f, "item {}", i),
            Locator::Row { row, line } => write!(f, "row {} (line {})", row, line),
            Locator::Position { line, column } => write!(f, "line {}, column {}", line, column),
            Locator::Document => f.write_str("document"),
        }
    }
}

/// The input could not be turned into records at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{format} parse error at {locator}: {message}")]
pub struct ParseError {
    pub format: Format,
    pub locator: Locator,
    pub message: String,
}

impl ParseError {
    pub fn new(format: Format, locator: Locator, message: impl Into<String>) -> Self {
        Self {
            format,
            locator,
            message: message.into(),
        }
    }
}

/// A record was readable but lacks one of `title`, `url`, `category`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{locator} is missing required field(s): {}", .missing.join(", "))]
pub struct ValidationError {
    pub locator: Locator,
    pub missing: Vec<&'static str>,
}

/// Anything a codec entry point can fail with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("unsupported file format '{0}': expected .json, .csv, .html or .htm")]
    UnsupportedFormat(String),
}
