use anyhow::Result;
use sqlx::SqlitePool;

/// Create the local tables. Safe to run repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per UTC day, newest kept, capped by the stats tracker
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stats_history (
            date TEXT PRIMARY KEY,
            total_items INTEGER NOT NULL,
            categories INTEGER NOT NULL,
            timestamp INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Parsed items awaiting upload, replaced wholesale on each store
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pending_imports (
            position INTEGER PRIMARY KEY,
            item_id TEXT NOT NULL,
            item_json TEXT NOT NULL,
            cached_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
