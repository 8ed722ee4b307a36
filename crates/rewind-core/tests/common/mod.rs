#![allow(dead_code)]

use std::collections::HashMap;

use rewind_core::ShowOutput;
use rewind_core::config::ServiceConfig;
use rewind_core::diff::diff;
use rewind_core::model::{CollectionInfo, CollectionKind, Event, EventKind, GraphInfo};
use rewind_core::show::NodeState;
use rewind_core::store::MemoryStore;
use rewind_core::store::log_file::LogRecord;
use serde_json::{Value, json};

struct Cursor {
    event: String,
    state: Value,
    hops: i64,
    snapshot: String,
}

/// Writes a consistent event log: snapshots, events, links, and commands.
#[derive(Default)]
pub struct LogBuilder {
    records: Vec<LogRecord>,
    events: u32,
    snapshots: u32,
    nodes: HashMap<String, Cursor>,
}

impl LogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&mut self, name: &str, kind: CollectionKind) -> &mut Self {
        self.records.push(LogRecord::Collection(CollectionInfo {
            name: name.into(),
            kind,
        }));
        self
    }

    pub fn graph(&mut self, name: &str, collections: &[&str]) -> &mut Self {
        self.records.push(LogRecord::Graph(GraphInfo {
            name: name.into(),
            collections: collections.iter().map(|c| (*c).to_string()).collect(),
        }));
        self
    }

    fn next_event(&mut self) -> String {
        self.events += 1;
        format!("evstore_events/{}", self.events)
    }

    fn next_snapshot(&mut self) -> String {
        self.snapshots += 1;
        format!("evstore_snapshots/{}", self.snapshots)
    }

    fn push_event(
        &mut self,
        id: &str,
        node: &str,
        kind: EventKind,
        hops: i64,
        ctime: i64,
        snapshot: &str,
    ) {
        self.records.push(LogRecord::Event(Event {
            id: id.into(),
            node: node.into(),
            event: kind,
            hops_from_origin: hops,
            ctime,
            last_snapshot: snapshot.into(),
        }));
    }

    /// First event of a node, with a snapshot of its initial content.
    pub fn create(&mut self, node: &str, ctime: i64, data: Value) -> &mut Self {
        let data = with_id(node, data);
        let snapshot = self.next_snapshot();
        let event = self.next_event();
        self.records.push(LogRecord::Snapshot {
            id: snapshot.clone(),
            data: data.clone(),
        });
        self.push_event(&event, node, EventKind::Created, 1, ctime, &snapshot);
        self.records.push(LogRecord::EvtSsLink {
            from: event.clone(),
            to: snapshot.clone(),
        });
        self.nodes.insert(
            node.to_string(),
            Cursor {
                event,
                state: data,
                hops: 1,
                snapshot,
            },
        );
        self
    }

    fn advance(&mut self, node: &str, ctime: i64, kind: EventKind, data: Value) -> &mut Self {
        let event = self.next_event();
        let cursor = self.nodes.get(node).expect("node created first");
        let (prev_event, prev_state, hops, snapshot) = (
            cursor.event.clone(),
            cursor.state.clone(),
            cursor.hops + 1,
            cursor.snapshot.clone(),
        );
        self.push_event(&event, node, kind, hops, ctime, &snapshot);
        self.records.push(LogRecord::Command {
            from: prev_event,
            to: event.clone(),
            command: diff(&prev_state, &data),
        });
        let cursor = self.nodes.get_mut(node).expect("node created first");
        cursor.event = event;
        cursor.state = data;
        cursor.hops = hops;
        self
    }

    pub fn update(&mut self, node: &str, ctime: i64, data: Value) -> &mut Self {
        let data = with_id(node, data);
        self.advance(node, ctime, EventKind::Updated, data)
    }

    pub fn delete(&mut self, node: &str, ctime: i64) -> &mut Self {
        let state = self.nodes.get(node).expect("node created first").state.clone();
        self.advance(node, ctime, EventKind::Deleted, state)
    }

    /// Snapshot the node's current content, linked from its previous
    /// snapshot. Events written before this keep pointing at the old one.
    pub fn snapshot(&mut self, node: &str) -> &mut Self {
        let snapshot = self.next_snapshot();
        let cursor = self.nodes.get(node).expect("node created first");
        let (event, state, previous) = (
            cursor.event.clone(),
            cursor.state.clone(),
            cursor.snapshot.clone(),
        );
        self.records.push(LogRecord::Snapshot {
            id: snapshot.clone(),
            data: state,
        });
        self.records.push(LogRecord::EvtSsLink {
            from: event,
            to: snapshot.clone(),
        });
        self.records.push(LogRecord::SnapshotLink {
            from: previous,
            to: snapshot.clone(),
        });
        if let Some(cursor) = self.nodes.get_mut(node) {
            cursor.snapshot = snapshot;
        }
        self
    }

    /// An event whose snapshot reference leads nowhere.
    pub fn orphan(&mut self, node: &str, ctime: i64) -> &mut Self {
        let event = self.next_event();
        self.push_event(&event, node, EventKind::Created, 1, ctime, "evstore_snapshots/missing");
        self
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.clone()
    }

    pub fn memory_store(&self) -> MemoryStore {
        MemoryStore::from_records(ServiceConfig::default(), self.records())
    }
}

fn with_id(node: &str, mut data: Value) -> Value {
    if let Some(map) = data.as_object_mut() {
        map.insert("_id".into(), Value::String(node.to_string()));
    }
    data
}

/// The shop log used across integration tests.
///
/// Live at "now": customers/1, items/1, orders/1, orders/3, orders/4,
/// placed/1. orders/2 is deleted at t=21. evstore_commands/1 sits in a
/// service collection and is never visible. items/1 has a second snapshot
/// taken after its last update, so reads at t=63 walk a reverse chain.
pub fn shop() -> LogBuilder {
    let mut log = LogBuilder::new();
    log.collection("orders", CollectionKind::Vertex)
        .collection("customers", CollectionKind::Vertex)
        .collection("items", CollectionKind::Vertex)
        .collection("placed", CollectionKind::Edge)
        .collection("evstore_events", CollectionKind::Vertex)
        .graph("shop", &["orders", "customers", "placed"])
        .graph("evstore_history", &["evstore_events"]);

    log.create("orders/1", 10, json!({"total": 5}))
        .create("orders/2", 11, json!({"total": 1}))
        .create("orders/3", 12, json!({"total": 3}))
        .create("customers/1", 13, json!({"name": "ada"}))
        .create("placed/1", 14, json!({"_from": "customers/1", "_to": "orders/1"}))
        .create("items/1", 15, json!({"sku": "x", "qty": 0}))
        .create("evstore_commands/1", 16, json!({}))
        .update("orders/1", 20, json!({"total": 7}))
        .delete("orders/2", 21)
        .update("orders/1", 30, json!({"total": 9, "paid": true}))
        .update("customers/1", 40, json!({"name": "ada l", "tags": ["vip"]}))
        .create("orders/4", 50, json!({"total": 4}));

    for (i, ctime) in (60..65).enumerate() {
        log.update("items/1", ctime, json!({"sku": "x", "qty": i + 1}));
    }
    log.snapshot("items/1");
    log
}

/// Node ids of a document listing, in output order. Failed entries
/// contribute their `_id` too.
pub fn ids(output: &ShowOutput) -> Vec<String> {
    match output {
        ShowOutput::Documents(items) => items.iter().map(node_id).collect(),
        other => panic!("expected documents, got {other:?}"),
    }
}

pub fn node_id(state: &NodeState) -> String {
    match state {
        NodeState::Document(doc) => doc["_id"].as_str().unwrap_or_default().to_string(),
        NodeState::Failed { id, .. } => id.clone(),
    }
}

/// The document for `node` in a listing.
pub fn doc<'a>(output: &'a ShowOutput, node: &str) -> &'a Value {
    match output {
        ShowOutput::Documents(items) => items
            .iter()
            .filter_map(NodeState::document)
            .find(|d| d["_id"] == node)
            .unwrap_or_else(|| panic!("{node} missing from output")),
        other => panic!("expected documents, got {other:?}"),
    }
}
