//! The SQLite store answers every request exactly like the in-memory store
//! built from the same log.

mod common;

use common::{LogBuilder, shop};
use rewind_core::config::ServiceConfig;
use rewind_core::db::{self, SqliteStore};
use rewind_core::store::MemoryStore;
use rewind_core::store::log_file::write_log;
use rewind_core::{GroupBy, ShowOptions, SortDir, show};
use serde_json::json;
use tempfile::TempDir;

fn stores(log: &LogBuilder) -> (TempDir, MemoryStore, SqliteStore) {
    let dir = TempDir::new().expect("tempdir");
    let log_path = dir.path().join("events.jsonl");
    write_log(&log_path, &log.records()).expect("write log");

    let db_path = dir.path().join("rewind.sqlite3");
    let mut conn = db::open_store(&db_path).expect("open db");
    let stats = db::import_log(&mut conn, &log_path).expect("import");
    assert_eq!(stats.total(), log.records().len());
    drop(conn);

    let memory = MemoryStore::load(&log_path, ServiceConfig::default()).expect("load log");
    let sqlite = SqliteStore::open(&db_path, ServiceConfig::default()).expect("open store");
    (dir, memory, sqlite)
}

fn requests() -> Vec<(&'static str, ShowOptions)> {
    let counts = ShowOptions {
        counts_only: true,
        ..ShowOptions::default()
    };
    vec![
        ("/", ShowOptions::default()),
        ("orders", ShowOptions::default()),
        (
            "/",
            ShowOptions {
                timestamp: Some(25),
                ..ShowOptions::default()
            },
        ),
        (
            "/n/items/1",
            ShowOptions {
                timestamp: Some(63),
                ..ShowOptions::default()
            },
        ),
        ("/g/shop", ShowOptions::default()),
        ("/c/o*", ShowOptions::default()),
        ("/ng/*/1", ShowOptions::default()),
        ("/n/{orders,customers}/{1,2,3}", ShowOptions::default()),
        ("/c/orders", counts),
        (
            "/",
            ShowOptions {
                group_by: Some(GroupBy::Collection),
                sort: Some(SortDir::Desc),
                ..counts
            },
        ),
        (
            "/",
            ShowOptions {
                group_by: Some(GroupBy::Type),
                ..counts
            },
        ),
        (
            "/",
            ShowOptions {
                group_by: Some(GroupBy::Collection),
                group_sort: Some(SortDir::Desc),
                group_limit: Some(2),
                ..ShowOptions::default()
            },
        ),
        (
            "/",
            ShowOptions {
                sort: Some(SortDir::Desc),
                skip: Some(1),
                limit: Some(3),
                ..ShowOptions::default()
            },
        ),
    ]
}

#[test]
fn sqlite_matches_memory() {
    let (_dir, memory, sqlite) = stores(&shop());
    for (path, opts) in requests() {
        let expected = show(&memory, path, &opts).expect("memory");
        let actual = show(&sqlite, path, &opts).expect("sqlite");
        assert_eq!(actual, expected, "{path} {opts:?}");
    }
}

#[test]
fn sqlite_reports_broken_chains_like_memory() {
    let mut log = shop();
    log.orphan("orders/9", 70);
    let (_dir, memory, sqlite) = stores(&log);

    let expected = show(&memory, "/c/orders", &ShowOptions::default()).expect("memory");
    let actual = show(&sqlite, "/c/orders", &ShowOptions::default()).expect("sqlite");
    assert_eq!(actual.failures().len(), 1);
    assert_eq!(actual, expected);
}

#[test]
fn sqlite_keeps_undeclared_collections() {
    let mut log = shop();
    log.create("notes/1", 17, json!({"text": "hi"}));
    let (_dir, memory, sqlite) = stores(&log);

    let opts = ShowOptions {
        group_by: Some(GroupBy::Type),
        counts_only: true,
        ..ShowOptions::default()
    };
    assert_eq!(
        show(&sqlite, "/", &opts).expect("sqlite"),
        show(&memory, "/", &opts).expect("memory")
    );
}
