//! Read-only store metadata: known collections and declared graphs.
//!
//! The catalog is built once per request (or cached and refreshed by the
//! caller) and never mutated while a query runs. Service collections and
//! reserved graphs are dropped at construction so that no scope can ever
//! address bookkeeping data.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::config::ServiceConfig;

/// Physical kind of a collection, used by the `type` group-by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// Document collection holding graph vertices.
    Vertex,
    /// Edge collection holding `_from`/`_to` documents.
    Edge,
}

impl CollectionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Edge => "edge",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertex" | "document" => Ok(Self::Vertex),
            "edge" => Ok(Self::Edge),
            other => Err(format!(
                "unknown collection kind '{other}': expected vertex or edge"
            )),
        }
    }
}

/// A collection declaration as stored in the log or database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub kind: CollectionKind,
}

/// A named graph and the collections it spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphInfo {
    pub name: String,
    #[serde(default)]
    pub collections: Vec<String>,
}

/// User-visible collections and graphs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    collections: BTreeMap<String, CollectionKind>,
    graphs: BTreeMap<String, BTreeSet<String>>,
}

impl Catalog {
    /// Build a catalog, excluding service collections and reserved graphs.
    ///
    /// Graph member lists are restricted to collections that survive the
    /// exclusion, so a graph can never leak a service collection into a
    /// graph-scope filter.
    #[must_use]
    pub fn new(
        collections: impl IntoIterator<Item = CollectionInfo>,
        graphs: impl IntoIterator<Item = GraphInfo>,
        service: &ServiceConfig,
    ) -> Self {
        let collections: BTreeMap<String, CollectionKind> = collections
            .into_iter()
            .filter(|c| !service.is_service_collection(&c.name))
            .map(|c| (c.name, c.kind))
            .collect();

        let graphs = graphs
            .into_iter()
            .filter(|g| !service.is_reserved_graph(&g.name))
            .map(|g| {
                let members = g
                    .collections
                    .into_iter()
                    .filter(|name| collections.contains_key(name))
                    .collect();
                (g.name, members)
            })
            .collect();

        Self {
            collections,
            graphs,
        }
    }

    /// Known user collection names, sorted.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Declared user graph names, sorted.
    pub fn graph_names(&self) -> impl Iterator<Item = &str> {
        self.graphs.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_known_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    #[must_use]
    pub fn collection_kind(&self, name: &str) -> Option<CollectionKind> {
        self.collections.get(name).copied()
    }

    /// Member collections of a graph, if the graph is declared.
    #[must_use]
    pub fn graph_collections(&self, graph: &str) -> Option<&BTreeSet<String>> {
        self.graphs.get(graph)
    }

    /// Collection name -> kind lookup table, handed to plans that group by
    /// collection type.
    #[must_use]
    pub fn collection_types(&self) -> BTreeMap<String, CollectionKind> {
        self.collections.clone()
    }
}
