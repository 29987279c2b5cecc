//! Local cache of parsed items awaiting upload.
//!
//! Parsing a large bookmark export and uploading it are separate steps.
//! The cache keeps the most recently parsed file so an interrupted upload
//! can be resumed after a restart. Each [`ImportCache::store`] replaces the
//! previous contents; item order is preserved.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use navkit_core::CanonicalItem;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::config::Config;
use crate::{db, migrate};

/// Cached items plus the time they were stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImport {
    pub items: Vec<CanonicalItem>,
    pub cached_at: DateTime<Utc>,
}

pub struct ImportCache {
    pool: SqlitePool,
}

impl ImportCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Replace the cache with `items`.
    pub async fn store(&self, items: &[CanonicalItem]) -> Result<()> {
        let cached_at = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM pending_imports")
            .execute(&mut *tx)
            .await?;

        for (position, item) in items.iter().enumerate() {
            let json = serde_json::to_string(item)
                .with_context(|| format!("Failed to encode cached item {}", item.id))?;
            sqlx::query(
                "INSERT INTO pending_imports (position, item_id, item_json, cached_at) VALUES (?, ?, ?, ?)",
            )
            .bind(position as i64)
            .bind(&item.id)
            .bind(json)
            .bind(cached_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(count = items.len(), "cached pending import");
        Ok(())
    }

    /// The cached items, or `None` when nothing is pending.
    pub async fn load(&self) -> Result<Option<PendingImport>> {
        let rows = sqlx::query(
            "SELECT item_id, item_json, cached_at FROM pending_imports ORDER BY position",
        )
        .fetch_all(&self.pool)
        .await?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };
        let cached_at = Utc
            .timestamp_millis_opt(first.get("cached_at"))
            .single()
            .unwrap_or_default();

        let items = rows
            .iter()
            .map(|row| {
                let item_id: String = row.get("item_id");
                let json: String = row.get("item_json");
                serde_json::from_str::<CanonicalItem>(&json)
                    .with_context(|| format!("Corrupt cached item {}", item_id))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(PendingImport { items, cached_at }))
    }

    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM pending_imports")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
