mod common;

use common::{node_id, shop};
use rewind_core::error::ErrorCode;
use rewind_core::show::NodeState;
use rewind_core::{FilterOptions, Predicate, ShowOptions, SortDir, filter, show};

fn ids(states: &[NodeState]) -> Vec<String> {
    states.iter().map(node_id).collect()
}

fn run(path: &str, opts: &FilterOptions, expression: &str) -> Vec<String> {
    let predicate = Predicate::parse(expression).expect("parse");
    let states = filter(&shop().memory_store(), path, opts, Some(&predicate)).expect("filter");
    ids(&states)
}

fn at(timestamp: i64) -> FilterOptions {
    FilterOptions {
        timestamp: Some(timestamp),
        ..FilterOptions::default()
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

#[test]
fn predicate_selects_current_documents() {
    assert_eq!(
        run("/c/orders", &FilterOptions::default(), "total > 3"),
        ["orders/1", "orders/4"]
    );
    assert_eq!(
        run("/c/orders", &FilterOptions::default(), "paid == true && total >= 9"),
        ["orders/1"]
    );
}

#[test]
fn predicate_sees_the_state_as_of_the_bound() {
    assert_eq!(run("/c/orders", &at(15), "total < 4"), ["orders/2", "orders/3"]);
    assert_eq!(run("/c/orders", &at(25), "total >= 7"), ["orders/1"]);
    assert!(run("/c/orders", &at(25), "paid").is_empty());
}

#[test]
fn predicate_reaches_nested_values_and_ids() {
    let all = FilterOptions::default();
    assert_eq!(run("/", &all, "'vip' in tags"), ["customers/1"]);
    assert_eq!(run("/", &all, "_id =~ '^orders/' and total % 2 == 0"), ["orders/4"]);
    assert_eq!(run("/g/shop", &all, "_to == 'orders/1'"), ["placed/1"]);
    assert_eq!(run("/", &all, "qty == 5 or name =~ '^ada'"), ["customers/1", "items/1"]);
}

#[test]
fn missing_predicate_returns_the_windowed_listing() {
    let store = shop().memory_store();
    let opts = FilterOptions {
        sort: Some(SortDir::Desc),
        pre_skip: Some(1),
        pre_limit: Some(3),
        ..FilterOptions::default()
    };
    let listed = show(&store, "/", &opts.show_options()).expect("show");
    let filtered = filter(&store, "/", &opts, None).expect("filter");
    assert_eq!(ids(&filtered), common::ids(&listed));
    assert_eq!(ids(&filtered), ["orders/4", "orders/3", "orders/1"]);
}

// ---------------------------------------------------------------------------
// Pre-window
// ---------------------------------------------------------------------------

#[test]
fn pre_window_applies_before_the_predicate() {
    let newest_two = FilterOptions {
        sort: Some(SortDir::Desc),
        pre_limit: Some(2),
        ..FilterOptions::default()
    };
    // orders/1 matches but falls outside the window.
    assert_eq!(run("/c/orders", &newest_two, "total > 3"), ["orders/4"]);

    let shifted = FilterOptions {
        pre_skip: Some(1),
        ..newest_two
    };
    assert_eq!(run("/c/orders", &shifted, "total > 3"), ["orders/1"]);
}

#[test]
fn zero_pre_limit_is_unbounded() {
    let opts = FilterOptions {
        pre_skip: Some(0),
        pre_limit: Some(0),
        ..FilterOptions::default()
    };
    assert_eq!(run("/", &opts, "true").len(), 6);
    assert!(run("/", &opts, "false").is_empty());
}

#[test]
fn pre_window_matches_show_pagination() {
    let store = shop().memory_store();
    let page = ShowOptions {
        sort: Some(SortDir::Asc),
        skip: Some(2),
        limit: Some(2),
        ..ShowOptions::default()
    };
    let opts = FilterOptions {
        sort: page.sort,
        pre_skip: page.skip,
        pre_limit: page.limit,
        ..FilterOptions::default()
    };
    let filtered = filter(&store, "/", &opts, None).expect("filter");
    assert_eq!(ids(&filtered), common::ids(&show(&store, "/", &page).expect("show")));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn failed_nodes_pass_through_the_predicate() {
    let mut log = shop();
    log.orphan("orders/9", 70);
    let predicate = Predicate::parse("total > 100").expect("parse");
    let states = filter(
        &log.memory_store(),
        "/c/orders",
        &FilterOptions::default(),
        Some(&predicate),
    )
    .expect("filter");
    assert_eq!(ids(&states), ["orders/9"]);
    assert!(states[0].is_failed());
}

#[test]
fn malformed_path_is_rejected() {
    let err = filter(&shop().memory_store(), "/g/a/b", &FilterOptions::default(), None)
        .expect_err("malformed");
    assert_eq!(err.code(), ErrorCode::InvalidPathPattern);
}
