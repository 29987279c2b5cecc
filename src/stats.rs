//! Collection statistics over time.
//!
//! One snapshot per UTC calendar day is kept in `stats_history`; saving
//! twice on the same day overwrites. The log is capped at `max_history`
//! entries, oldest evicted first.
//!
//! Trends compare the live item count against older snapshots. With
//! [`TrendBasis::Recency`] the "yesterday" and "last week" bases are simply
//! the 2nd and 8th most recent snapshots, which drifts from calendar days
//! whenever a day was skipped. [`TrendBasis::Calendar`] looks up the exact
//! dates instead.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use navkit_core::CanonicalItem;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::config::Config;
use crate::{db, migrate};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// UTC calendar day, `YYYY-MM-DD`.
    pub date: String,
    pub total_items: u64,
    pub categories: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsTrend {
    pub daily_change: i64,
    pub weekly_change: i64,
    pub daily_percent: f64,
    pub weekly_percent: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrendBasis {
    /// Snapshot positions 1 and 7 in most-recent-first order.
    #[default]
    Recency,
    /// Snapshots dated exactly 1 and 7 days before today.
    Calendar,
}

pub struct StatsTracker {
    pool: SqlitePool,
    max_history: usize,
}

impl StatsTracker {
    pub fn new(pool: SqlitePool, max_history: usize) -> Self {
        Self {
            pool,
            max_history: max_history.max(1),
        }
    }

    /// Connect to the configured database and make sure the tables exist.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool, config.stats.max_history))
    }

    pub async fn save_snapshot(&self, items: &[CanonicalItem]) -> Result<StatsSnapshot> {
        self.save_snapshot_at(items, Utc::now()).await
    }

    /// Record today's counts as of `now`, replacing any snapshot for that day.
    pub async fn save_snapshot_at(
        &self,
        items: &[CanonicalItem],
        now: DateTime<Utc>,
    ) -> Result<StatsSnapshot> {
        let categories: HashSet<&str> = items.iter().map(|i| i.category.as_str()).collect();
        let snapshot = StatsSnapshot {
            date: now.format(DATE_FORMAT).to_string(),
            total_items: items.len() as u64,
            categories: categories.len() as u64,
            timestamp: now,
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO stats_history (date, total_items, categories, timestamp)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(date) DO UPDATE SET
                total_items = excluded.total_items,
                categories = excluded.categories,
                timestamp = excluded.timestamp
            "#,
        )
        .bind(&snapshot.date)
        .bind(snapshot.total_items as i64)
        .bind(snapshot.categories as i64)
        .bind(now.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        let evicted = sqlx::query(
            r#"
            DELETE FROM stats_history
            WHERE date NOT IN (
                SELECT date FROM stats_history ORDER BY date DESC LIMIT ?
            )
            "#,
        )
        .bind(self.max_history as i64)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tx.commit().await?;

        debug!(
            date = %snapshot.date,
            total = snapshot.total_items,
            categories = snapshot.categories,
            evicted,
            "saved stats snapshot"
        );
        Ok(snapshot)
    }

    /// All snapshots, most recent first.
    pub async fn history(&self) -> Result<Vec<StatsSnapshot>> {
        let rows = sqlx::query(
            "SELECT date, total_items, categories, timestamp FROM stats_history ORDER BY date DESC LIMIT ?",
        )
        .bind(self.max_history as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| StatsSnapshot {
                date: row.get("date"),
                total_items: row.get::<i64, _>("total_items").max(0) as u64,
                categories: row.get::<i64, _>("categories").max(0) as u64,
                timestamp: Utc
                    .timestamp_millis_opt(row.get("timestamp"))
                    .single()
                    .unwrap_or_default(),
            })
            .collect())
    }

    pub async fn calculate_trend(&self, items: &[CanonicalItem]) -> Result<StatsTrend> {
        self.calculate_trend_with(items, TrendBasis::Recency, Utc::now().date_naive())
            .await
    }

    pub async fn calculate_trend_with(
        &self,
        items: &[CanonicalItem],
        basis: TrendBasis,
        today: NaiveDate,
    ) -> Result<StatsTrend> {
        let history = self.history().await?;
        Ok(trend_from_history(items.len() as u64, &history, basis, today))
    }

    pub async fn clear_history(&self) -> Result<()> {
        sqlx::query("DELETE FROM stats_history")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn trend_from_history(
    current: u64,
    history: &[StatsSnapshot],
    basis: TrendBasis,
    today: NaiveDate,
) -> StatsTrend {
    if history.is_empty() {
        return StatsTrend::default();
    }

    let (day_base, week_base) = match basis {
        TrendBasis::Recency => (history.get(1), history.get(7)),
        TrendBasis::Calendar => {
            let on = |days: i64| {
                let date = (today - Duration::days(days)).format(DATE_FORMAT).to_string();
                history.iter().find(|s| s.date == date)
            };
            (on(1), on(7))
        }
    };

    let (daily_change, daily_percent) = change_against(current, day_base);
    let (weekly_change, weekly_percent) = change_against(current, week_base);
    StatsTrend {
        daily_change,
        weekly_change,
        daily_percent,
        weekly_percent,
    }
}

fn change_against(current: u64, base: Option<&StatsSnapshot>) -> (i64, f64) {
    let Some(base) = base else {
        return (0, 0.0);
    };
    let change = current as i64 - base.total_items as i64;
    let percent = if base.total_items > 0 {
        change as f64 / base.total_items as f64 * 100.0
    } else {
        0.0
    };
    (change, percent)
}

/// The `n` most recently created items.
///
/// Items with `created_at` come first, newest first. Items without one
/// follow in reverse input order, treating later entries as newer.
pub fn recent_items(items: &[CanonicalItem], n: usize) -> Vec<CanonicalItem> {
    let mut indexed: Vec<(usize, &CanonicalItem)> = items.iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| match (a.created_at, b.created_at) {
        (Some(ta), Some(tb)) => tb.cmp(&ta).then(ib.cmp(ia)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => ib.cmp(ia),
    });
    indexed
        .into_iter()
        .take(n)
        .map(|(_, item)| item.clone())
        .collect()
}
