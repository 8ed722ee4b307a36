//! In-memory event store.
//!
//! Holds the whole log in process: events in a flat list, snapshot content
//! in a map, and every history vertex in a `petgraph` directed graph whose
//! edges carry their [`EdgeKind`] and command. Useful for tests, small logs
//! loaded from JSON Lines, and as the reference the SQLite store is checked
//! against.

use anyhow::Result;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, instrument};

use super::chain::{self, Hop};
use super::log_file::{self, LogRecord};
use super::{EdgeKind, EventStore, select_latest};
use crate::config::ServiceConfig;
use crate::diff::Patch;
use crate::model::{Catalog, CollectionInfo, Event, GraphInfo};
use crate::plan::Selection;
use crate::reconstruct::{HopPath, Stop};

#[derive(Debug, Clone)]
struct Link {
    kind: EdgeKind,
    command: Patch,
}

/// An event log held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    service: ServiceConfig,
    collections: Vec<CollectionInfo>,
    graphs: Vec<GraphInfo>,
    events: Vec<Event>,
    snapshots: HashMap<String, Value>,
    history: DiGraph<String, Link>,
    vertices: HashMap<String, NodeIndex>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(service: ServiceConfig) -> Self {
        Self {
            service,
            ..Self::default()
        }
    }

    /// Build a store from parsed log records, in order.
    #[must_use]
    pub fn from_records(
        service: ServiceConfig,
        records: impl IntoIterator<Item = LogRecord>,
    ) -> Self {
        let mut store = Self::new(service);
        for record in records {
            store.apply(record);
        }
        store
    }

    /// Load a JSON Lines log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or holds a corrupt line.
    #[instrument(skip(service))]
    pub fn load(path: &Path, service: ServiceConfig) -> Result<Self> {
        let records = log_file::read_log(path)?;
        let store = Self::from_records(service, records);
        debug!(
            events = store.events.len(),
            vertices = store.history.node_count(),
            edges = store.history.edge_count(),
            "loaded event log"
        );
        Ok(store)
    }

    /// Add one log record.
    pub fn apply(&mut self, record: LogRecord) {
        match record {
            LogRecord::Collection(info) => self.add_collection(info),
            LogRecord::Graph(info) => self.add_graph(info),
            LogRecord::Event(event) => self.add_event(event),
            LogRecord::Snapshot { id, data } => self.add_snapshot(id, data),
            LogRecord::Command { from, to, command } => {
                self.add_edge(&from, &to, EdgeKind::Command, command);
            }
            LogRecord::EvtSsLink { from, to } => {
                self.add_edge(&from, &to, EdgeKind::EvtSsLink, Patch::new());
            }
            LogRecord::SnapshotLink { from, to } => {
                self.add_edge(&from, &to, EdgeKind::SnapshotLink, Patch::new());
            }
        }
    }

    pub fn add_collection(&mut self, info: CollectionInfo) {
        self.collections.retain(|c| c.name != info.name);
        self.collections.push(info);
    }

    pub fn add_graph(&mut self, info: GraphInfo) {
        self.graphs.retain(|g| g.name != info.name);
        self.graphs.push(info);
    }

    pub fn add_event(&mut self, event: Event) {
        self.vertex(&event.id);
        self.events.push(event);
    }

    pub fn add_snapshot(&mut self, id: String, data: Value) {
        self.vertex(&id);
        self.snapshots.insert(id, data);
    }

    pub fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind, command: Patch) {
        let a = self.vertex(from);
        let b = self.vertex(to);
        self.history.add_edge(a, b, Link { kind, command });
    }

    /// Number of events held.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    fn vertex(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.vertices.get(id) {
            return idx;
        }
        let idx = self.history.add_node(id.to_string());
        self.vertices.insert(id.to_string(), idx);
        idx
    }

    fn neighbors(&self, vertex: &str) -> Vec<Hop> {
        let Some(&idx) = self.vertices.get(vertex) else {
            return Vec::new();
        };
        let outbound = self
            .history
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| {
                Hop::new(self.history[edge.target()].clone(), edge.weight().command.clone())
            });
        let inbound = self
            .history
            .edges_directed(idx, Direction::Incoming)
            .filter(|edge| edge.weight().kind.traversable_inbound())
            .map(|edge| {
                Hop::new(self.history[edge.source()].clone(), edge.weight().command.clone())
            });
        outbound.chain(inbound).collect()
    }
}

impl EventStore for MemoryStore {
    fn service(&self) -> &ServiceConfig {
        &self.service
    }

    fn catalog(&self) -> Result<Catalog> {
        Ok(Catalog::new(
            self.collections.iter().cloned(),
            self.graphs.iter().cloned(),
            &self.service,
        ))
    }

    fn latest_events(&self, selection: &Selection) -> Result<Vec<Event>> {
        Ok(select_latest(&self.events, selection, &self.service))
    }

    fn shortest_chain(&self, from: &str, to: &str) -> Result<Option<HopPath>> {
        let hops = chain::shortest(from, to, |vertex| Ok(self.neighbors(vertex)))?;
        Ok(hops.map(|hops| {
            hops.into_iter()
                .map(|hop| {
                    let data = self.snapshots.get(&hop.vertex).cloned();
                    Stop::new(hop.vertex, data, hop.command)
                })
                .collect()
        }))
    }
}
