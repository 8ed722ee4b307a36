//! The event-store seam.
//!
//! Query execution needs three things from whatever holds the log: the
//! catalog, each selected node's latest event as of a time bound, and the
//! shortest chain of stops between a snapshot and an event. [`EventStore`]
//! names exactly those.
//!
//! ## Submodules
//!
//! - [`chain`]: breadth-first chain search shared by every store.
//! - [`log_file`]: JSON Lines log records.
//! - [`memory`]: in-memory store over a `petgraph` vertex graph.
//!
//! The SQLite-backed store lives in [`crate::db`].

pub mod chain;
pub mod log_file;
pub mod memory;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::config::ServiceConfig;
use crate::model::{Catalog, Event};
use crate::plan::Selection;
use crate::reconstruct::HopPath;

pub use memory::MemoryStore;

/// Read access to an event log.
pub trait EventStore {
    /// Bookkeeping names used by this store.
    fn service(&self) -> &ServiceConfig;

    /// User-visible collections and graphs.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn catalog(&self) -> Result<Catalog>;

    /// For every node admitted by `selection.filter`, its event with the
    /// highest positive `hops-from-origin` whose `ctime` is at or before
    /// `selection.bound_us`, sorted by node id.
    ///
    /// Deleted nodes are returned too; callers decide what to drop. Nodes in
    /// service collections never are.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn latest_events(&self, selection: &Selection) -> Result<Vec<Event>>;

    /// Shortest hop path from snapshot `from` to event `to`, or `None` if the
    /// two are not connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or holds a corrupt
    /// command.
    fn shortest_chain(&self, from: &str, to: &str) -> Result<Option<HopPath>>;
}

/// Kinds of edge in the history graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Diff between consecutive events of one node.
    Command,
    /// Event to the snapshot taken at it.
    EvtSsLink,
    /// Earlier snapshot to a later one.
    SnapshotLink,
}

impl EdgeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::EvtSsLink => "evt_ss_link",
            Self::SnapshotLink => "snapshot_link",
        }
    }

    /// Whether a chain search may walk this edge from `_to` back to `_from`.
    #[must_use]
    pub const fn traversable_inbound(self) -> bool {
        !matches!(self, Self::SnapshotLink)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "command" => Ok(Self::Command),
            "evt_ss_link" => Ok(Self::EvtSsLink),
            "snapshot_link" => Ok(Self::SnapshotLink),
            other => Err(format!("unknown edge kind '{other}'")),
        }
    }
}

/// Per-node latest selection over an in-memory event list.
///
/// Shared by stores that cannot push the selection down to a query engine.
pub fn select_latest<'a, I>(events: I, selection: &Selection, service: &ServiceConfig) -> Vec<Event>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut latest: BTreeMap<&str, &Event> = BTreeMap::new();
    for event in events {
        if !event.is_forward()
            || event.ctime > selection.bound_us
            || service.is_service_collection(event.collection())
            || !selection.filter.admits(&event.node)
        {
            continue;
        }
        latest
            .entry(event.node.as_str())
            .and_modify(|current| {
                if event.hops_from_origin > current.hops_from_origin {
                    *current = event;
                }
            })
            .or_insert(event);
    }
    latest.into_values().cloned().collect()
}
