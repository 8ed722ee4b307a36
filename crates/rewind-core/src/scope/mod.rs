//! Addressing paths to scopes and node filters.
//!
//! A path is classified into one of five scopes, tried in a fixed priority
//! order, and the scope's prefix is stripped to leave the *search pattern*:
//!
//! | scope        | shape      | search pattern matched against            |
//! |--------------|------------|-------------------------------------------|
//! | database     | `/`        | nothing, every live node qualifies        |
//! | graph        | `/g/*`     | declared graph names (glob)               |
//! | collection   | `/c/*`     | known collection names (glob)             |
//! | node-glob    | `/ng/**`   | full node ids (glob compiled to a regex)  |
//! | node-exact   | `/n/**`    | brace-expanded literal node ids           |
//!
//! ## Submodules
//!
//! - [`database`], [`graph`], [`collection`], [`node_glob`], [`node_exact`]:
//!   one filter builder per scope.

pub mod collection;
pub mod database;
pub mod graph;
pub mod node_exact;
pub mod node_glob;

use regex::bytes::Regex;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

use crate::error::ErrorCode;
use crate::model::{Catalog, collection_of};
use crate::pattern::PatternError;

/// Errors raised while resolving an addressing path.
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    /// The path carries a scope prefix but not that scope's shape.
    #[error("invalid {scope} path '{path}': expected {shape}")]
    InvalidShape {
        scope: ScopeKind,
        path: String,
        shape: &'static str,
    },

    /// The search pattern does not compile.
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

impl ScopeError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidPathPattern
    }
}

// ---------------------------------------------------------------------------
// ScopeKind
// ---------------------------------------------------------------------------

/// The closed set of addressing scopes, in resolution priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Database,
    Graph,
    Collection,
    NodeGlob,
    NodeExact,
}

impl ScopeKind {
    /// Every scope, highest priority first.
    pub const PRIORITY: [Self; 5] = [
        Self::Database,
        Self::Graph,
        Self::Collection,
        Self::NodeGlob,
        Self::NodeExact,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Graph => "graph",
            Self::Collection => "collection",
            Self::NodeGlob => "node-glob",
            Self::NodeExact => "node-exact",
        }
    }

    /// Fixed prefix stripped from the path to obtain the search pattern.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Database => "",
            Self::Graph => graph::PREFIX,
            Self::Collection => collection::PREFIX,
            Self::NodeGlob => node_glob::PREFIX,
            Self::NodeExact => node_exact::PREFIX,
        }
    }

    /// Human-readable path shape, used in error messages.
    #[must_use]
    pub const fn shape(self) -> &'static str {
        match self {
            Self::Database => "/",
            Self::Graph => "/g/<graph-glob>",
            Self::Collection => "/c/<collection-glob>",
            Self::NodeGlob => "/ng/<node-glob>",
            Self::NodeExact => "/n/<node-id-or-brace-list>",
        }
    }

    /// Whether `path` has exactly this scope's shape.
    #[must_use]
    pub fn matches(self, path: &str) -> bool {
        match self {
            Self::Database => database::matches(path),
            Self::Graph | Self::Collection => path
                .strip_prefix(self.prefix())
                .is_some_and(|rest| !rest.is_empty() && !rest.contains('/')),
            Self::NodeGlob | Self::NodeExact => path
                .strip_prefix(self.prefix())
                .is_some_and(|rest| !rest.is_empty()),
        }
    }

    /// Build the node filter for `search_pattern` under this scope.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Pattern`] when the search pattern does not
    /// compile for this scope.
    pub fn filter(
        self,
        search_pattern: &str,
        catalog: &Catalog,
    ) -> Result<ScopeFilter, ScopeError> {
        match self {
            Self::Database => Ok(database::filter()),
            Self::Graph => graph::filter(search_pattern, catalog),
            Self::Collection => collection::filter(search_pattern, catalog),
            Self::NodeGlob => node_glob::filter(search_pattern),
            Self::NodeExact => node_exact::filter(search_pattern, catalog),
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ScopeFilter
// ---------------------------------------------------------------------------

/// A compiled node-id glob, kept alongside its source for display.
#[derive(Debug, Clone)]
pub struct NodePattern {
    glob: String,
    regex: Regex,
}

impl NodePattern {
    #[must_use]
    pub const fn new(glob: String, regex: Regex) -> Self {
        Self { glob, regex }
    }

    #[must_use]
    pub fn glob(&self) -> &str {
        &self.glob
    }

    #[must_use]
    pub fn regex_source(&self) -> &str {
        self.regex.as_str()
    }

    #[must_use]
    pub fn is_match(&self, node: &str) -> bool {
        self.regex.is_match(node.as_bytes())
    }
}

impl PartialEq for NodePattern {
    fn eq(&self, other: &Self) -> bool {
        self.glob == other.glob && self.regex.as_str() == other.regex.as_str()
    }
}

impl Serialize for NodePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("NodePattern", 2)?;
        s.serialize_field("glob", &self.glob)?;
        s.serialize_field("regex", self.regex.as_str())?;
        s.end()
    }
}

/// Predicate over node ids produced by a scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScopeFilter {
    /// Every node qualifies.
    All,
    /// Nodes whose collection is in the set.
    Collections(BTreeSet<String>),
    /// Nodes whose full id matches the pattern.
    NodeRegex(NodePattern),
    /// Explicit id sets grouped by collection.
    NodeIds(BTreeMap<String, BTreeSet<String>>),
}

impl ScopeFilter {
    /// Whether `node` passes the filter.
    #[must_use]
    pub fn admits(&self, node: &str) -> bool {
        match self {
            Self::All => true,
            Self::Collections(names) => names.contains(collection_of(node)),
            Self::NodeRegex(pattern) => pattern.is_match(node),
            Self::NodeIds(groups) => groups
                .get(collection_of(node))
                .is_some_and(|ids| ids.contains(node)),
        }
    }

    /// Whether the filter can never admit anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::All | Self::NodeRegex(_) => false,
            Self::Collections(names) => names.is_empty(),
            Self::NodeIds(groups) => groups.values().all(BTreeSet::is_empty),
        }
    }

    /// Collections the filter restricts to, when it restricts by collection.
    #[must_use]
    pub fn collections(&self) -> Option<BTreeSet<&str>> {
        match self {
            Self::All | Self::NodeRegex(_) => None,
            Self::Collections(names) => Some(names.iter().map(String::as_str).collect()),
            Self::NodeIds(groups) => Some(groups.keys().map(String::as_str).collect()),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved {
    pub scope: ScopeKind,
    pub search_pattern: String,
    pub filter: ScopeFilter,
}

/// Classify `path`, strip its prefix, and compile the scope filter.
///
/// The first scope (in [`ScopeKind::PRIORITY`] order) whose shape matches
/// wins. A path that starts with a scope prefix but has the wrong shape
/// (`/c/`, `/g/a/b`) is rejected; any other path falls back to database
/// scope.
///
/// # Errors
///
/// Returns [`ScopeError`] for a malformed scoped path or a search pattern
/// that does not compile.
pub fn resolve(path: &str, catalog: &Catalog) -> Result<Resolved, ScopeError> {
    let scope = classify(path)?;
    let search_pattern = path
        .strip_prefix(scope.prefix())
        .unwrap_or(path)
        .to_string();
    let filter = scope.filter(&search_pattern, catalog)?;

    debug!(%scope, %search_pattern, "resolved addressing path");
    Ok(Resolved {
        scope,
        search_pattern,
        filter,
    })
}

fn classify(path: &str) -> Result<ScopeKind, ScopeError> {
    if let Some(scope) = ScopeKind::PRIORITY.into_iter().find(|s| s.matches(path)) {
        return Ok(scope);
    }

    // Longest prefix first so `/ng/` is not mistaken for another scope.
    let mut prefixed: Vec<ScopeKind> = ScopeKind::PRIORITY
        .into_iter()
        .filter(|s| !s.prefix().is_empty())
        .collect();
    prefixed.sort_by_key(|s| std::cmp::Reverse(s.prefix().len()));

    if let Some(scope) = prefixed.into_iter().find(|s| path.starts_with(s.prefix())) {
        return Err(ScopeError::InvalidShape {
            scope,
            path: path.to_string(),
            shape: scope.shape(),
        });
    }

    warn!(path, "path matches no scope; falling back to database scope");
    Ok(ScopeKind::Database)
}
