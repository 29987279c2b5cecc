//! File-level import and export.
//!
//! Thin wrappers that pair the codecs with the filesystem: the format is
//! chosen from the file extension on import and encoded in the generated
//! file name on export.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use navkit_core::{codec_for, parse_file, CanonicalItem, Format};
use tracing::info;

/// Read and parse a bookmark file, picking the codec by extension.
pub fn import_path(path: &Path) -> Result<Vec<CanonicalItem>> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Not a file path: {}", path.display()))?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let items = parse_file(file_name, &bytes)
        .with_context(|| format!("Failed to import {}", path.display()))?;
    info!(path = %path.display(), count = items.len(), "imported bookmark file");
    Ok(items)
}

/// Serialize `items` into `dir` under a timestamped name and return the path.
pub fn export_to_dir(
    items: &[CanonicalItem],
    format: Format,
    dir: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;

    let path = dir.join(format.export_file_name(now));
    let bytes = codec_for(format).serialize(items);
    std::fs::write(&path, bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), count = items.len(), %format, "exported bookmarks");
    Ok(path)
}
