mod common;

use common::{LogBuilder, doc, ids, shop};
use rewind_core::error::ErrorCode;
use rewind_core::plan::Selection;
use rewind_core::scope::ScopeFilter;
use rewind_core::show::{Group, GroupTotal, NodeState};
use rewind_core::store::EventStore;
use rewind_core::{GroupBy, ShowOptions, ShowOutput, SortDir, show};
use serde_json::json;

fn run(log: &LogBuilder, path: &str, opts: &ShowOptions) -> ShowOutput {
    show(&log.memory_store(), path, opts).expect("show")
}

fn at(timestamp: i64) -> ShowOptions {
    ShowOptions {
        timestamp: Some(timestamp),
        ..ShowOptions::default()
    }
}

fn counts() -> ShowOptions {
    ShowOptions {
        counts_only: true,
        ..ShowOptions::default()
    }
}

fn totals(output: &ShowOutput) -> Vec<(Option<&str>, usize)> {
    match output {
        ShowOutput::GroupTotals { groups, .. } => groups
            .iter()
            .map(|GroupTotal { key, total }| (key.as_deref(), *total))
            .collect(),
        other => panic!("expected group totals, got {other:?}"),
    }
}

fn group_ids(output: &ShowOutput) -> Vec<(Option<&str>, Vec<String>)> {
    match output {
        ShowOutput::Groups { groups, .. } => groups
            .iter()
            .map(|Group { key, items }| {
                (key.as_deref(), items.iter().map(common::node_id).collect())
            })
            .collect(),
        other => panic!("expected groups, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

#[test]
fn database_scope_lists_each_live_node_once() {
    let out = run(&shop(), "/", &ShowOptions::default());
    assert_eq!(
        ids(&out),
        ["customers/1", "items/1", "orders/1", "orders/3", "orders/4", "placed/1"]
    );
    assert_eq!(doc(&out, "orders/1"), &json!({"_id": "orders/1", "total": 9, "paid": true}));
    assert_eq!(
        doc(&out, "customers/1"),
        &json!({"_id": "customers/1", "name": "ada l", "tags": ["vip"]})
    );
    assert_eq!(doc(&out, "items/1"), &json!({"_id": "items/1", "sku": "x", "qty": 5}));
}

#[test]
fn unscoped_path_reads_like_database_scope() {
    let log = shop();
    assert_eq!(
        run(&log, "orders", &ShowOptions::default()),
        run(&log, "/", &ShowOptions::default())
    );
}

#[test]
fn graph_scope_spans_member_collections() {
    let log = shop();
    let expected = ["customers/1", "orders/1", "orders/3", "orders/4", "placed/1"];
    assert_eq!(ids(&run(&log, "/g/shop", &ShowOptions::default())), expected);
    assert_eq!(ids(&run(&log, "/g/sh*", &ShowOptions::default())), expected);
}

#[test]
fn reserved_graph_is_not_addressable() {
    let out = run(&shop(), "/g/evstore_history", &ShowOptions::default());
    assert_eq!(out, ShowOutput::Documents(Vec::new()));
}

#[test]
fn collection_scope_with_glob() {
    let log = shop();
    assert_eq!(
        ids(&run(&log, "/c/o*", &ShowOptions::default())),
        ["orders/1", "orders/3", "orders/4"]
    );
    assert_eq!(
        ids(&run(&log, "/c/{items,placed}", &ShowOptions::default())),
        ["items/1", "placed/1"]
    );
}

#[test]
fn node_glob_scope() {
    let log = shop();
    assert_eq!(
        ids(&run(&log, "/ng/orders/*", &ShowOptions::default())),
        ["orders/1", "orders/3", "orders/4"]
    );
    assert_eq!(
        ids(&run(&log, "/ng/*/1", &ShowOptions::default())),
        ["customers/1", "items/1", "orders/1", "placed/1"]
    );
}

#[test]
fn node_exact_scope_skips_deleted_and_unknown() {
    let out = run(&shop(), "/n/{orders,ghost}/{1,2}", &ShowOptions::default());
    assert_eq!(ids(&out), ["orders/1"]);
}

#[test]
fn unknown_collection_is_empty_not_an_error() {
    let log = shop();
    assert_eq!(
        run(&log, "/c/nope", &ShowOptions::default()),
        ShowOutput::Documents(Vec::new())
    );
    assert_eq!(run(&log, "/c/nope", &counts()), ShowOutput::Total(0));
}

#[test]
fn malformed_scoped_path_is_a_bad_request() {
    let store = shop().memory_store();
    for path in ["/g/a/b", "/c/", "/ng/"] {
        let err = show(&store, path, &ShowOptions::default()).expect_err(path);
        assert_eq!(err.code(), ErrorCode::InvalidPathPattern, "{path}");
        assert!(err.code().is_bad_request());
    }
}

// ---------------------------------------------------------------------------
// Time bound
// ---------------------------------------------------------------------------

#[test]
fn time_bound_selects_state_as_of_then() {
    let out = run(&shop(), "/", &at(25));
    assert_eq!(
        ids(&out),
        ["customers/1", "items/1", "orders/1", "orders/3", "placed/1"]
    );
    assert_eq!(doc(&out, "orders/1"), &json!({"_id": "orders/1", "total": 7}));
    assert_eq!(doc(&out, "customers/1"), &json!({"_id": "customers/1", "name": "ada"}));
}

#[test]
fn time_bound_is_inclusive() {
    let log = shop();
    assert_eq!(
        doc(&run(&log, "/n/orders/1", &at(20)), "orders/1"),
        &json!({"_id": "orders/1", "total": 7})
    );
    assert_eq!(
        doc(&run(&log, "/n/orders/1", &at(19)), "orders/1"),
        &json!({"_id": "orders/1", "total": 5})
    );
}

#[test]
fn node_deleted_later_is_visible_before_deletion() {
    let log = shop();
    assert_eq!(ids(&run(&log, "/n/orders/2", &at(20))), ["orders/2"]);
    assert_eq!(ids(&run(&log, "/n/orders/2", &at(21))), Vec::<String>::new());
}

#[test]
fn bound_before_any_event_is_empty() {
    assert_eq!(
        run(&shop(), "/", &at(1)),
        ShowOutput::Documents(Vec::new())
    );
}

#[test]
fn later_snapshot_serves_a_reverse_chain() {
    let log = shop();
    let store = log.memory_store();

    let latest = store
        .latest_events(&Selection {
            filter: ScopeFilter::All,
            bound_us: 63,
        })
        .expect("select");
    let event = latest
        .iter()
        .find(|e| e.node == "items/1")
        .expect("items/1 selected");
    let path = store
        .shortest_chain(&event.last_snapshot, &event.id)
        .expect("search")
        .expect("connected");
    assert!(path[1].vertex.starts_with("evstore_snapshots/"), "{path:?}");

    let out = show(&store, "/n/items/1", &at(63)).expect("show");
    assert_eq!(doc(&out, "items/1"), &json!({"_id": "items/1", "sku": "x", "qty": 4}));
}

// ---------------------------------------------------------------------------
// Counting and grouping
// ---------------------------------------------------------------------------

#[test]
fn counts_only_returns_a_total() {
    let log = shop();
    assert_eq!(run(&log, "/c/orders", &counts()), ShowOutput::Total(3));
    assert_eq!(
        run(&log, "/c/orders", &ShowOptions { timestamp: Some(25), ..counts() }),
        ShowOutput::Total(2)
    );
    let json = serde_json::to_value(run(&log, "/", &counts())).expect("serialize");
    assert_eq!(json, json!({"total": 6}));
}

#[test]
fn grouped_counts_break_ties_by_key() {
    let log = shop();
    let by_collection = ShowOptions {
        group_by: Some(GroupBy::Collection),
        ..counts()
    };
    assert_eq!(
        totals(&run(&log, "/", &by_collection)),
        [
            (Some("customers"), 1),
            (Some("items"), 1),
            (Some("placed"), 1),
            (Some("orders"), 3)
        ]
    );

    let desc = ShowOptions {
        sort: Some(SortDir::Desc),
        ..by_collection
    };
    assert_eq!(
        totals(&run(&log, "/", &desc)),
        [
            (Some("orders"), 3),
            (Some("customers"), 1),
            (Some("items"), 1),
            (Some("placed"), 1)
        ]
    );
}

#[test]
fn grouped_counts_are_windowed() {
    let opts = ShowOptions {
        group_by: Some(GroupBy::Collection),
        sort: Some(SortDir::Desc),
        limit: Some(2),
        ..counts()
    };
    let out = run(&shop(), "/", &opts);
    assert_eq!(totals(&out), [(Some("orders"), 3), (Some("customers"), 1)]);
    assert_eq!(
        serde_json::to_value(&out).expect("serialize"),
        json!([
            {"collection": "orders", "total": 3},
            {"collection": "customers", "total": 1}
        ])
    );
}

#[test]
fn type_grouping_uses_collection_kind() {
    let opts = ShowOptions {
        group_by: Some(GroupBy::Type),
        ..counts()
    };
    assert_eq!(
        totals(&run(&shop(), "/", &opts)),
        [(Some("edge"), 1), (Some("vertex"), 5)]
    );
}

#[test]
fn undeclared_collection_groups_under_null_type() {
    let mut log = shop();
    log.create("notes/1", 17, json!({"text": "hi"}));
    let opts = ShowOptions {
        group_by: Some(GroupBy::Type),
        ..counts()
    };
    let out = run(&log, "/", &opts);
    assert_eq!(
        totals(&out),
        [(None, 1), (Some("edge"), 1), (Some("vertex"), 5)]
    );
    assert_eq!(
        serde_json::to_value(&out).expect("serialize")[0],
        json!({"type": null, "total": 1})
    );
}

#[test]
fn grouped_content_orders_items_within_groups() {
    let opts = ShowOptions {
        group_by: Some(GroupBy::Collection),
        group_sort: Some(SortDir::Desc),
        group_limit: Some(2),
        ..ShowOptions::default()
    };
    let out = run(&shop(), "/", &opts);
    assert_eq!(
        group_ids(&out),
        [
            (Some("customers"), vec!["customers/1".to_string()]),
            (Some("items"), vec!["items/1".to_string()]),
            (
                Some("orders"),
                vec!["orders/4".to_string(), "orders/3".to_string()]
            ),
            (Some("placed"), vec!["placed/1".to_string()]),
        ]
    );

    let json = serde_json::to_value(&out).expect("serialize");
    assert_eq!(json[2]["collection"], "orders");
    assert_eq!(json[2]["items"][0], json!({"_id": "orders/4", "total": 4}));
}

#[test]
fn group_skip_is_ignored_without_group_limit() {
    let grouped = ShowOptions {
        group_by: Some(GroupBy::Collection),
        group_sort: Some(SortDir::Desc),
        ..ShowOptions::default()
    };
    let skip_only = ShowOptions {
        group_skip: Some(1),
        ..grouped
    };
    let all = run(&shop(), "/c/orders", &grouped);
    assert_eq!(run(&shop(), "/c/orders", &skip_only), all);
    assert_eq!(
        group_ids(&all),
        [(
            Some("orders"),
            vec![
                "orders/4".to_string(),
                "orders/3".to_string(),
                "orders/1".to_string()
            ]
        )]
    );

    let skip_and_limit = ShowOptions {
        group_skip: Some(1),
        group_limit: Some(1),
        ..grouped
    };
    assert_eq!(
        group_ids(&run(&shop(), "/c/orders", &skip_and_limit)),
        [(Some("orders"), vec!["orders/3".to_string()])]
    );
}

#[test]
fn groups_themselves_are_sorted_and_windowed() {
    let opts = ShowOptions {
        group_by: Some(GroupBy::Collection),
        sort: Some(SortDir::Desc),
        limit: Some(1),
        ..ShowOptions::default()
    };
    let out = run(&shop(), "/", &opts);
    assert_eq!(
        group_ids(&out),
        [(Some("placed"), vec!["placed/1".to_string()])]
    );
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[test]
fn skip_and_limit_page_through_nodes() {
    let log = shop();
    let page = ShowOptions {
        sort: Some(SortDir::Desc),
        skip: Some(1),
        limit: Some(2),
        ..ShowOptions::default()
    };
    assert_eq!(ids(&run(&log, "/", &page)), ["orders/4", "orders/3"]);

    let tail = ShowOptions {
        skip: Some(4),
        ..ShowOptions::default()
    };
    assert_eq!(ids(&run(&log, "/", &tail)), ["orders/4", "placed/1"]);
}

#[test]
fn zero_limit_is_unbounded() {
    let opts = ShowOptions {
        skip: Some(0),
        limit: Some(0),
        ..ShowOptions::default()
    };
    assert_eq!(ids(&run(&shop(), "/", &opts)).len(), 6);
}

#[test]
fn skip_past_the_end_is_empty() {
    let opts = ShowOptions {
        skip: Some(50),
        ..ShowOptions::default()
    };
    assert_eq!(
        run(&shop(), "/", &opts),
        ShowOutput::Documents(Vec::new())
    );
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn broken_chain_fails_only_its_node() {
    let mut log = shop();
    log.orphan("orders/9", 70);

    let out = run(&log, "/c/orders", &ShowOptions::default());
    assert_eq!(ids(&out), ["orders/1", "orders/3", "orders/4", "orders/9"]);

    let failures = out.failures();
    assert_eq!(failures.len(), 1);
    match failures[0] {
        NodeState::Failed { id, error } => {
            assert_eq!(id, "orders/9");
            assert!(error.contains("E3001"), "{error}");
        }
        NodeState::Document(doc) => panic!("expected failure, got {doc}"),
    }

    let json = serde_json::to_value(&out).expect("serialize");
    assert_eq!(json[3]["_id"], "orders/9");
    assert!(json[3]["_error"].is_string());
}

#[test]
fn counting_ignores_broken_chains() {
    let mut log = shop();
    log.orphan("orders/9", 70);
    assert_eq!(run(&log, "/c/orders", &counts()), ShowOutput::Total(4));
}
