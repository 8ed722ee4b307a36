//! Event records and node identities.
//!
//! Every tracked document is a *node* addressed as `<collection>/<key>`.
//! Each mutation of a node appends one [`Event`]; a node's events are totally
//! ordered by `hops-from-origin`, and only positive hop counts are live
//! history (zero/negative entries are origin bookkeeping).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kinds of node mutation recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Node first appeared.
    Created,
    /// Node content changed.
    Updated,
    /// Node was removed; it is absent from any read at or after this event.
    Deleted,
    /// A previously deleted node came back.
    Restored,
}

/// Error returned when parsing an unknown event kind string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown event kind '{}': expected one of created, updated, deleted, restored",
            self.raw
        )
    }
}

impl std::error::Error for UnknownEventKind {}

impl EventKind {
    /// All known event kinds.
    pub const ALL: [Self; 4] = [Self::Created, Self::Updated, Self::Deleted, Self::Restored];

    /// Return the canonical lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Restored => "restored",
        }
    }

    /// Whether a node whose latest event is of this kind is visible to reads.
    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Deleted)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "deleted" => Ok(Self::Deleted),
            "restored" => Ok(Self::Restored),
            _ => Err(UnknownEventKind { raw: s.to_string() }),
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// One immutable entry in the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Vertex id of the event itself (`<events-collection>/<key>`).
    #[serde(rename = "_id")]
    pub id: String,

    /// Identity of the tracked node this event belongs to.
    pub node: String,

    /// What happened to the node.
    pub event: EventKind,

    /// Per-node version counter; only values `> 0` are live history.
    #[serde(rename = "hops-from-origin")]
    pub hops_from_origin: i64,

    /// Creation time in unix microseconds.
    pub ctime: i64,

    /// Vertex id of the nearest preceding snapshot.
    #[serde(rename = "last-snapshot")]
    pub last_snapshot: String,
}

impl Event {
    /// The collection the event's node belongs to.
    #[must_use]
    pub fn collection(&self) -> &str {
        collection_of(&self.node)
    }

    /// Whether this event is part of live (forward) history.
    #[must_use]
    pub const fn is_forward(&self) -> bool {
        self.hops_from_origin > 0
    }
}

/// Leading path segment of a `<collection>/<key>` identity.
///
/// An identity without a `/` is treated as a bare collection name.
#[must_use]
pub fn collection_of(id: &str) -> &str {
    id.split_once('/').map_or(id, |(collection, _)| collection)
}

/// Whether `id` lives in the given collection namespace.
#[must_use]
pub fn in_collection(id: &str, collection: &str) -> bool {
    id.strip_prefix(collection)
        .is_some_and(|rest| rest.starts_with('/'))
}
