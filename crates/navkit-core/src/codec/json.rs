//! JSON codec: a top-level array of item objects.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{decode_text, Codec, Format};
use crate::error::{CodecError, Locator, ParseError};
use crate::models::{CanonicalItem, RawRecord};

pub struct JsonCodec;

impl Codec for JsonCodec {
    fn format(&self) -> Format {
        Format::Json
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<CanonicalItem>, CodecError> {
        let text = decode_text(bytes);
        let value: Value = serde_json::from_str(&text).map_err(|e| {
            ParseError::new(
                Format::Json,
                Locator::Position {
                    line: e.line(),
                    column: e.column(),
                },
                e.to_string(),
            )
        })?;

        let elements = match value {
            Value::Array(elements) => elements,
            other => {
                return Err(ParseError::new(
                    Format::Json,
                    Locator::Document,
                    format!("expected a top-level array, found {}", kind_of(&other)),
                )
                .into())
            }
        };

        elements
            .iter()
            .enumerate()
            .map(|(i, element)| {
                raw_record(element)
                    .validate(Locator::Index(i + 1))
                    .map_err(CodecError::from)
            })
            .collect()
    }

    fn serialize(&self, items: &[CanonicalItem]) -> Vec<u8> {
        // serde_json's pretty printer indents with two spaces
        serde_json::to_vec_pretty(items).unwrap_or_default()
    }
}

fn raw_record(element: &Value) -> RawRecord {
    RawRecord {
        id: field(element, "id"),
        title: field(element, "title"),
        url: field(element, "url"),
        category: field(element, "category"),
        sub_category: field(element, "subCategory"),
        description: field(element, "description"),
        icon: field(element, "icon"),
        created_at: field(element, "createdAt")
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

/// Read a scalar field as a string. Numbers and booleans are stringified;
/// null, arrays and objects count as absent.
fn field(element: &Value, key: &str) -> Option<String> {
    match element.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
