//! Integration tests for local persistence and file transfer.
//!
//! Each test gets its own SQLite file in a temporary directory.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use navkit::config::{parse_config, Config};
use navkit::import_cache::ImportCache;
use navkit::stats::{StatsTracker, TrendBasis};
use navkit::transfer::{export_to_dir, import_path};
use navkit_core::{CanonicalItem, CodecError, Format};
use tempfile::TempDir;

fn config_in(dir: &TempDir, extra: &str) -> Config {
    let db = dir.path().join("data").join("navkit.sqlite");
    parse_config(&format!("[db]\npath = {:?}\n{}", db.display().to_string(), extra)).unwrap()
}

fn items(n: usize, categories: usize) -> Vec<CanonicalItem> {
    (0..n)
        .map(|i| {
            CanonicalItem::new(
                format!("item {i}"),
                format!("https://site{i}.dev"),
                format!("cat {}", i % categories.max(1)),
            )
        })
        .collect()
}

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

// ─── Stats tracker ──────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_is_one_per_day_and_overwrites() {
    let dir = TempDir::new().unwrap();
    let tracker = StatsTracker::open(&config_in(&dir, "")).await.unwrap();

    tracker.save_snapshot_at(&items(5, 2), at(2024, 6, 1, 9)).await.unwrap();
    let second = tracker
        .save_snapshot_at(&items(8, 3), at(2024, 6, 1, 18))
        .await
        .unwrap();

    let history = tracker.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0], second);
    assert_eq!(history[0].date, "2024-06-01");
    assert_eq!(history[0].total_items, 8);
    assert_eq!(history[0].categories, 3);
}

#[tokio::test]
async fn history_is_capped_most_recent_first() {
    let dir = TempDir::new().unwrap();
    let tracker = StatsTracker::open(&config_in(&dir, "[stats]\nmax_history = 30\n"))
        .await
        .unwrap();

    let start = at(2024, 1, 1, 12);
    for day in 0..35 {
        tracker
            .save_snapshot_at(&items(day + 1, 1), start + Duration::days(day as i64))
            .await
            .unwrap();
    }

    let history = tracker.history().await.unwrap();
    assert_eq!(history.len(), 30);
    assert_eq!(history[0].date, "2024-02-04");
    assert_eq!(history[0].total_items, 35);
    assert_eq!(history[29].date, "2024-01-06");
    assert!(history.windows(2).all(|w| w[0].date > w[1].date));
}

#[tokio::test]
async fn trend_against_stored_history() {
    let dir = TempDir::new().unwrap();
    let tracker = StatsTracker::open(&config_in(&dir, "")).await.unwrap();

    let empty = tracker.calculate_trend(&items(10, 1)).await.unwrap();
    assert_eq!(empty.daily_change, 0);
    assert_eq!(empty.weekly_percent, 0.0);

    // eight consecutive days ending 2024-03-08: totals 10, 20, ..., 80
    for day in 0..8u32 {
        tracker
            .save_snapshot_at(&items((day as usize + 1) * 10, 1), at(2024, 3, day + 1, 8))
            .await
            .unwrap();
    }
    let today = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
    let trend = tracker
        .calculate_trend_with(&items(84, 1), TrendBasis::Recency, today)
        .await
        .unwrap();
    assert_eq!(trend.daily_change, 14);
    assert!((trend.daily_percent - 20.0).abs() < 1e-9);
    assert_eq!(trend.weekly_change, 74);
    assert!((trend.weekly_percent - 740.0).abs() < 1e-9);

    let calendar = tracker
        .calculate_trend_with(&items(84, 1), TrendBasis::Calendar, today)
        .await
        .unwrap();
    assert_eq!(calendar.daily_change, 14);
    assert_eq!(calendar.weekly_change, 74);

    tracker.clear_history().await.unwrap();
    assert!(tracker.history().await.unwrap().is_empty());
}

// ─── Pending import cache ───────────────────────────────────────────

#[tokio::test]
async fn cache_round_trips_and_replaces() {
    let dir = TempDir::new().unwrap();
    let cache = ImportCache::open(&config_in(&dir, "")).await.unwrap();
    assert!(cache.load().await.unwrap().is_none());

    let first = vec![
        CanonicalItem::new("A", "https://a.dev", "Dev")
            .with_id("dup")
            .with_icon("🦀"),
        CanonicalItem::new("B", "https://b.dev", "Dev").with_id("dup"),
    ];
    cache.store(&first).await.unwrap();
    let loaded = cache.load().await.unwrap().unwrap();
    assert_eq!(loaded.items, first);

    let second = vec![CanonicalItem::new("C", "https://c.dev", "Tools")
        .with_description("replaces everything")];
    cache.store(&second).await.unwrap();
    assert_eq!(cache.load().await.unwrap().unwrap().items, second);

    cache.clear().await.unwrap();
    assert!(cache.load().await.unwrap().is_none());
}

#[tokio::test]
async fn cache_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, "");
    let stored = items(4, 2);
    ImportCache::open(&config).await.unwrap().store(&stored).await.unwrap();

    let reopened = ImportCache::open(&config).await.unwrap();
    assert_eq!(reopened.load().await.unwrap().unwrap().items, stored);
}

// ─── File transfer ──────────────────────────────────────────────────

#[test]
fn export_then_import_each_format() {
    let dir = TempDir::new().unwrap();
    let now = at(2024, 7, 4, 15);
    let source = vec![
        CanonicalItem::new(r#"Say "hi", world"#, "https://hi.dev?a=1&b=2", "Fun")
            .with_id("h1")
            .with_icon("https://hi.dev/favicon.ico"),
        CanonicalItem::new("Docs", "https://docs.rs", "Dev").with_id("d1"),
    ];

    for format in [Format::Json, Format::Csv, Format::Html] {
        let path = export_to_dir(&source, format, &dir.path().join("out"), now).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert_eq!(
            name,
            format!("bookmarks-2024-07-04T15-00-00.{}", format.extension())
        );

        let back = import_path(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].title, source[0].title);
        assert_eq!(back[0].url, source[0].url);
        assert_eq!(back[0].category, source[0].category);
        assert_eq!(back[0].icon, source[0].icon);
        if format != Format::Html {
            assert_eq!(back, source);
        }
    }
}

#[test]
fn import_rejects_unknown_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bookmarks.txt");
    std::fs::write(&path, "whatever").unwrap();

    let err = import_path(&path).unwrap_err();
    match err.downcast_ref::<CodecError>() {
        Some(CodecError::UnsupportedFormat(_)) => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn import_accepts_htm_browser_export() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Bookmarks.HTM");
    std::fs::write(
        &path,
        "<!DOCTYPE NETSCAPE-Bookmark-file-1>\n<DL><p>\n<DT><H3>Dev</H3>\n<DL><p>\n<DT><A HREF=\"https://rust-lang.org\">Rust</A>\n</DL><p>\n</DL>\n",
    )
    .unwrap();

    let items = import_path(&path).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].category, "Dev");
}
