//! Core data models shared by every navkit component.
//!
//! [`CanonicalItem`] is the one record shape that codecs produce, the
//! duplicate detector groups, and the importer reconciles. [`RawRecord`]
//! is the loosely-typed intermediate a codec fills in before the shared
//! validator turns it into a canonical item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Locator, ValidationError};

/// Category assigned to bookmarks that sit outside any folder.
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// One bookmark entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Emoji, absolute `http(s)` URL, or site-root-relative path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl CanonicalItem {
    /// Build an item with a freshly synthesized id and no optional fields.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: synthesize_id(),
            title: title.into(),
            url: url.into(),
            category: category.into(),
            sub_category: None,
            description: None,
            icon: None,
            created_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_sub_category(mut self, sub_category: impl Into<String>) -> Self {
        self.sub_category = Some(sub_category.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// The payload sent to a remote store: everything except identity.
    pub fn to_new_record(&self) -> NewRecord {
        NewRecord {
            title: self.title.clone(),
            url: self.url.clone(),
            category: self.category.clone(),
            sub_category: self.sub_category.clone(),
            description: self.description.clone(),
            icon: self.icon.clone(),
        }
    }
}

/// A bookmark about to be created remotely. The remote store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub title: String,
    pub url: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Unvalidated fields as a codec read them from a file.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl RawRecord {
    /// Check the mandatory fields and produce a [`CanonicalItem`].
    ///
    /// Empty strings count as missing. Optional fields that are empty are
    /// dropped, and a missing id is synthesized.
    pub fn validate(self, locator: Locator) -> Result<CanonicalItem, ValidationError> {
        let mut missing = Vec::new();
        if is_blank(&self.title) {
            missing.push("title");
        }
        if is_blank(&self.url) {
            missing.push("url");
        }
        if is_blank(&self.category) {
            missing.push("category");
        }
        if !missing.is_empty() {
            return Err(ValidationError { locator, missing });
        }

        Ok(CanonicalItem {
            id: non_empty(self.id).unwrap_or_else(synthesize_id),
            title: self.title.unwrap_or_default(),
            url: self.url.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            sub_category: non_empty(self.sub_category),
            description: non_empty(self.description),
            icon: non_empty(self.icon),
            created_at: self.created_at,
        })
    }
}

/// Generate an id for an item that has not been persisted remotely yet.
pub fn synthesize_id() -> String {
    format!("imported-{}", Uuid::new_v4().simple())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
