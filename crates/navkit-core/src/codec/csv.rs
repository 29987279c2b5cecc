//! CSV codec.
//!
//! The export starts with a UTF-8 byte-order mark so spreadsheet tools
//! detect the encoding, followed by a fixed header:
//!
//! ```text
//! ID,Title,URL,Category,SubCategory,Description,Icon
//! ```
//!
//! Columns are positional on import. The reader splits records over the
//! whole text rather than line-by-line, so a quoted field may contain
//! commas, doubled quotes, and newlines.

use super::{decode_text, Codec, Format};
use crate::error::{CodecError, Locator, ParseError};
use crate::models::{CanonicalItem, RawRecord};

pub const HEADER: [&str; 7] = [
    "ID",
    "Title",
    "URL",
    "Category",
    "SubCategory",
    "Description",
    "Icon",
];

const BOM: &str = "\u{feff}";

/// Minimum columns for a data row: id, title, url.
const MIN_FIELDS: usize = 3;

pub struct CsvCodec;

impl Codec for CsvCodec {
    fn format(&self) -> Format {
        Format::Csv
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<CanonicalItem>, CodecError> {
        let text = decode_text(bytes);
        let records = split_records(&text).map_err(|(row, line)| {
            // row 0 is the header, which has no data-row number
            let locator = if row == 0 {
                Locator::Position { line, column: 1 }
            } else {
                Locator::Row { row, line }
            };
            ParseError::new(Format::Csv, locator, "unterminated quoted field")
        })?;

        if records.len() < 2 {
            return Err(ParseError::new(
                Format::Csv,
                Locator::Document,
                "CSV file is empty or malformed",
            )
            .into());
        }

        let mut items = Vec::with_capacity(records.len() - 1);
        for (i, record) in records.into_iter().skip(1).enumerate() {
            let locator = Locator::Row {
                row: i + 1,
                line: record.line,
            };
            if record.fields.len() < MIN_FIELDS {
                return Err(ParseError::new(
                    Format::Csv,
                    locator,
                    format!(
                        "expected at least {} fields, found {}",
                        MIN_FIELDS,
                        record.fields.len()
                    ),
                )
                .into());
            }
            let mut fields = record.fields.into_iter();
            let raw = RawRecord {
                id: fields.next(),
                title: fields.next(),
                url: fields.next(),
                category: fields.next(),
                sub_category: fields.next(),
                description: fields.next(),
                icon: fields.next(),
                created_at: None,
            };
            items.push(raw.validate(locator)?);
        }
        Ok(items)
    }

    fn serialize(&self, items: &[CanonicalItem]) -> Vec<u8> {
        let mut lines = Vec::with_capacity(items.len() + 1);
        lines.push(HEADER.join(","));
        for item in items {
            let row = [
                Some(item.id.as_str()),
                Some(item.title.as_str()),
                Some(item.url.as_str()),
                Some(item.category.as_str()),
                item.sub_category.as_deref(),
                item.description.as_deref(),
                item.icon.as_deref(),
            ];
            lines.push(
                row.iter()
                    .map(|f| escape_field(f.unwrap_or("")))
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }
        let mut out = String::from(BOM);
        out.push_str(&lines.join("\n"));
        out.into_bytes()
    }
}

/// Quote a field if it contains a delimiter, quote, or line break.
pub fn escape_field(value: &str) -> String {
    if value.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One logical CSV record and the 1-based line it starts on.
#[derive(Debug, PartialEq)]
struct CsvRecord {
    fields: Vec<String>,
    line: usize,
}

/// Split text into records, honoring quotes across line breaks.
///
/// Blank lines are dropped. On an unterminated quote, returns the data-row
/// number (header is row 0) and start line of the broken record.
fn split_records(text: &str) -> Result<Vec<CsvRecord>, (usize, usize)> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                '\n' => {
                    field.push('\n');
                    line += 1;
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                fields.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut fields), record_line);
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err((records.len(), record_line));
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        push_record(&mut records, fields, record_line);
    }
    Ok(records)
}

fn push_record(records: &mut Vec<CsvRecord>, fields: Vec<String>, line: usize) {
    let blank = fields.len() == 1 && fields[0].trim().is_empty();
    if !blank {
        records.push(CsvRecord { fields, line });
    }
}
