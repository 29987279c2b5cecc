//! Netscape bookmark file codec (the HTML format every browser exports).
//!
//! # Structure
//!
//! ```text
//! <DL><p>
//!     <DT><H3>Folder</H3>
//!     <DL><p>
//!         <DT><A HREF="https://..." ADD_DATE="..." ICON="...">Title</A>
//!         <DD>Optional description
//!     </DL><p>
//! </DL><p>
//! ```
//!
//! A folder's bookmark list shows up in two shapes in the wild: nested
//! inside the folder's `DT` (what an HTML5 parser produces from the usual
//! unclosed-tag export) or as the `DL` right after an explicitly closed
//! `</DT>`. The walker accepts both and consumes a sibling list exactly
//! once.
//!
//! Export writes one folder per category and keeps only category, title,
//! url, icon and `ADD_DATE`; sub-categories and descriptions do not survive
//! a round trip.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use super::{decode_text, Codec, Format};
use crate::error::{CodecError, Locator, ParseError};
use crate::models::{synthesize_id, CanonicalItem, DEFAULT_CATEGORY};

pub struct HtmlCodec {
    /// Text written into `<TITLE>` and `<H1>` on export.
    pub document_title: String,
}

impl Default for HtmlCodec {
    fn default() -> Self {
        Self {
            document_title: "Bookmarks".to_string(),
        }
    }
}

impl Codec for HtmlCodec {
    fn format(&self) -> Format {
        Format::Html
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<CanonicalItem>, CodecError> {
        let text = decode_text(bytes);
        let document = Html::parse_document(&text);

        let mut walk = Walk::default();
        if let Some(root) = find_first(document.root_element(), "dl") {
            walk.list(root, DEFAULT_CATEGORY);
        }

        debug!(
            bookmarks = walk.items.len(),
            folders = walk.folders,
            skipped = walk.skipped,
            "parsed bookmark file"
        );

        if walk.items.is_empty() {
            return Err(ParseError::new(Format::Html, Locator::Document, "no bookmarks found").into());
        }
        Ok(walk.items)
    }

    fn serialize(&self, items: &[CanonicalItem]) -> Vec<u8> {
        let title = escape(&self.document_title);
        let mut html = format!(
            "<!DOCTYPE NETSCAPE-Bookmark-file-1>\n\
             <!-- This is an automatically generated file.\n     \
             It will be read and overwritten.\n     \
             DO NOT EDIT! -->\n\
             <META HTTP-EQUIV=\"Content-Type\" CONTENT=\"text/html; charset=UTF-8\">\n\
             <TITLE>{title}</TITLE>\n\
             <H1>{title}</H1>\n\
             <DL><p>\n"
        );

        for (category, members) in group_by_category(items) {
            html.push_str(&format!("    <DT><H3>{}</H3>\n", escape(category)));
            html.push_str("    <DL><p>\n");
            for item in members {
                html.push_str(&format!("        <DT><A HREF=\"{}\"", escape(&item.url)));
                if let Some(created) = item.created_at {
                    html.push_str(&format!(" ADD_DATE=\"{}\"", created.timestamp()));
                }
                if let Some(icon) = item.icon.as_deref().filter(|i| !i.is_empty()) {
                    html.push_str(&format!(" ICON=\"{}\"", escape(icon)));
                }
                html.push_str(&format!(">{}</A>\n", escape(&item.title)));
            }
            html.push_str("    </DL><p>\n");
        }

        html.push_str("</DL><p>\n");
        html.into_bytes()
    }
}

#[derive(Default)]
struct Walk {
    items: Vec<CanonicalItem>,
    folders: usize,
    skipped: usize,
}

impl Walk {
    /// Walk the children of a `DL`, assigning bookmarks to `category`.
    fn list(&mut self, dl: ElementRef<'_>, category: &str) {
        let children: Vec<ElementRef<'_>> = dl.children().filter_map(ElementRef::wrap).collect();
        // set when the previous DT produced a bookmark, so a following DD can describe it
        let mut last_bookmark: Option<usize> = None;

        let mut i = 0;
        while i < children.len() {
            let child = children[i];
            match child.value().name() {
                "dt" => {
                    last_bookmark = None;
                    if let Some(h3) = find_first(child, "h3") {
                        let folder = text_of(h3);
                        let folder = if folder.is_empty() {
                            DEFAULT_CATEGORY.to_string()
                        } else {
                            folder
                        };
                        self.folders += 1;

                        if let Some(inner) = find_first(child, "dl") {
                            self.list(inner, &folder);
                        } else if let Some(next) = children
                            .get(i + 1)
                            .filter(|next| next.value().name() == "dl")
                        {
                            self.list(*next, &folder);
                            i += 1;
                        } else {
                            warn!(folder = %folder, "bookmark folder has no bookmark list");
                        }
                    } else if let Some(anchor) = find_first(child, "a") {
                        if self.anchor(anchor, category) {
                            last_bookmark = Some(self.items.len() - 1);
                        }
                    }
                }
                "dd" => {
                    if let Some(idx) = last_bookmark.take() {
                        let description = text_of(child);
                        if !description.is_empty() {
                            self.items[idx].description = Some(description);
                        }
                    }
                }
                "dl" => {
                    last_bookmark = None;
                    self.list(child, category);
                }
                _ => {}
            }
            i += 1;
        }
    }

    /// Record a bookmark anchor. Returns false when it was skipped.
    fn anchor(&mut self, a: ElementRef<'_>, category: &str) -> bool {
        let href = a.value().attr("href").unwrap_or("").trim();
        let title = text_of(a);
        if href.is_empty() || title.is_empty() {
            warn!(href, title = %title, "skipping bookmark without href or title");
            self.skipped += 1;
            return false;
        }

        let icon = a
            .value()
            .attr("icon")
            .filter(|icon| !icon.is_empty())
            .map(str::to_string);
        let created_at = a.value().attr("add_date").and_then(parse_add_date);

        self.items.push(CanonicalItem {
            id: synthesize_id(),
            title,
            url: href.to_string(),
            category: category.to_string(),
            sub_category: None,
            description: None,
            icon,
            created_at,
        });
        true
    }
}

/// First element named `name` at or below `el`, in document order.
fn find_first<'a>(el: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == name)
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// `ADD_DATE` is Unix seconds.
fn parse_add_date(raw: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

/// Group items by category, categories in first-seen order.
fn group_by_category(items: &[CanonicalItem]) -> Vec<(&str, Vec<&CanonicalItem>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&CanonicalItem>)> = Vec::new();
    for item in items {
        let slot = *index.entry(item.category.as_str()).or_insert_with(|| {
            groups.push((item.category.as_str(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(item);
    }
    groups
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
