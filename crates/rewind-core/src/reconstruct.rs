//! Rebuild node content from a snapshot-to-event hop path.
//!
//! A hop path is what the store's shortest-chain search returns: an ordered
//! list of [`Stop`]s, each carrying the vertex it reached, that vertex's
//! stored content (only snapshots have any), and the command on the edge
//! that led into it.
//!
//! Where the snapshot sits decides the direction:
//!
//! - **forward**: stop 0 is the snapshot. Stop 1 is the event it was taken
//!   at (reached over a link with no command), so commands from stop 2 on are
//!   applied as-is.
//! - **reverse**: stop 1 is a snapshot reached from the starting one. The
//!   chain from stop 3 on was walked against the command direction, so each
//!   command is inverted before it is applied.
//!
//! Both cases share one apply loop.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

use crate::diff::{self, DiffError, Patch};
use crate::error::ErrorCode;
use crate::model::in_collection;

/// One vertex on a hop path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    /// Vertex id (`<collection>/<key>`).
    pub vertex: String,
    /// Stored content; present on snapshots only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Command on the edge leading into this vertex; empty for link edges
    /// and for the first stop.
    #[serde(default)]
    pub command: Patch,
}

impl Stop {
    #[must_use]
    pub fn new(vertex: impl Into<String>, data: Option<Value>, command: Patch) -> Self {
        Self {
            vertex: vertex.into(),
            data,
            command,
        }
    }
}

/// Ordered stops from a snapshot to a target event.
pub type HopPath = Vec<Stop>;

/// Which way a hop path runs relative to its anchor snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// A hop path that cannot be turned into content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconstructError {
    #[error("hop path is empty")]
    EmptyPath,

    #[error("hop path starting at '{first}' has no snapshot stop")]
    MissingSnapshot { first: String },

    #[error("snapshot '{vertex}' carries no data")]
    MissingData { vertex: String },

    #[error("command into '{vertex}' failed: {source}")]
    Patch {
        vertex: String,
        #[source]
        source: DiffError,
    },
}

impl ReconstructError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyPath | Self::MissingSnapshot { .. } | Self::MissingData { .. } => {
                ErrorCode::MalformedHopPath
            }
            Self::Patch { .. } => ErrorCode::PatchApplyFailed,
        }
    }
}

/// Index and direction of the anchor snapshot.
///
/// # Errors
///
/// Returns [`ReconstructError::EmptyPath`] or
/// [`ReconstructError::MissingSnapshot`] when neither stop 0 nor stop 1 is
/// in `snapshot_ns`.
pub fn anchor(path: &[Stop], snapshot_ns: &str) -> Result<(usize, Direction), ReconstructError> {
    let first = path.first().ok_or(ReconstructError::EmptyPath)?;
    if path
        .get(1)
        .is_some_and(|stop| in_collection(&stop.vertex, snapshot_ns))
    {
        return Ok((1, Direction::Reverse));
    }
    if in_collection(&first.vertex, snapshot_ns) {
        return Ok((0, Direction::Forward));
    }
    Err(ReconstructError::MissingSnapshot {
        first: first.vertex.clone(),
    })
}

/// Rebuild the content at the last stop of `path`.
///
/// An anchor followed by no commands returns the anchor content unchanged.
///
/// # Errors
///
/// Returns [`ReconstructError`] when the path has no usable snapshot, the
/// snapshot has no data, or a command cannot be inverted or applied.
pub fn reconstruct(path: &[Stop], snapshot_ns: &str) -> Result<Value, ReconstructError> {
    let (idx, direction) = anchor(path, snapshot_ns)?;
    let snapshot = &path[idx];
    let base = snapshot
        .data
        .clone()
        .ok_or_else(|| ReconstructError::MissingData {
            vertex: snapshot.vertex.clone(),
        })?;

    let diffs = path
        .iter()
        .skip(idx + 2)
        .map(|stop| {
            let patch = match direction {
                Direction::Forward => Cow::Borrowed(&stop.command),
                Direction::Reverse => Cow::Owned(diff::invert(&stop.command).map_err(|source| {
                    ReconstructError::Patch {
                        vertex: stop.vertex.clone(),
                        source,
                    }
                })?),
            };
            Ok((stop.vertex.as_str(), patch))
        })
        .collect::<Result<Vec<_>, ReconstructError>>()?;

    diffs.into_iter().try_fold(base, |doc, (vertex, patch)| {
        diff::apply(&patch, doc).map_err(|source| ReconstructError::Patch {
            vertex: vertex.to_string(),
            source,
        })
    })
}

/// Reconstruct every path independently; one result per path, in order.
#[must_use]
pub fn reconstruct_all(
    paths: &[HopPath],
    snapshot_ns: &str,
) -> Vec<Result<Value, ReconstructError>> {
    paths
        .iter()
        .map(|path| reconstruct(path, snapshot_ns))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use serde_json::json;

    const NS: &str = "evstore_snapshots";

    fn snap(key: &str, data: Value) -> Stop {
        Stop::new(format!("{NS}/{key}"), Some(data), Patch::new())
    }

    fn event(key: &str, command: Patch) -> Stop {
        Stop::new(format!("evstore_events/{key}"), None, command)
    }

    #[test]
    fn snapshot_alone_is_identity() {
        let base = json!({"name": "a"});
        assert_eq!(reconstruct(&[snap("1", base.clone())], NS), Ok(base));
    }

    #[test]
    fn snapshot_and_its_event_is_identity() {
        let base = json!({"name": "a"});
        let path = vec![snap("1", base.clone()), event("1", Patch::new())];
        assert_eq!(reconstruct(&path, NS), Ok(base));
    }

    #[test]
    fn forward_chain_applies_in_order() {
        let s0 = json!({"n": 0});
        let s1 = json!({"n": 1});
        let s2 = json!({"n": 2, "done": true});
        let path = vec![
            snap("1", s0.clone()),
            event("1", Patch::new()),
            event("2", diff(&s0, &s1)),
            event("3", diff(&s1, &s2)),
        ];
        assert_eq!(anchor(&path, NS), Ok((0, Direction::Forward)));
        assert_eq!(reconstruct(&path, NS), Ok(s2));
    }

    #[test]
    fn reverse_chain_inverts_each_command() {
        let s0 = json!({"n": 0});
        let s1 = json!({"n": 1, "x": [1]});
        let s2 = json!({"n": 2});
        // Start snapshot, then the later snapshot taken at s2, then walk back.
        let path = vec![
            snap("1", json!({"stale": true})),
            snap("2", s2.clone()),
            event("3", Patch::new()),
            event("2", diff(&s1, &s2)),
            event("1", diff(&s0, &s1)),
        ];
        assert_eq!(anchor(&path, NS), Ok((1, Direction::Reverse)));
        assert_eq!(reconstruct(&path, NS), Ok(s0));
    }

    #[test]
    fn path_without_snapshot_is_malformed() {
        let path = vec![event("1", Patch::new()), event("2", Patch::new())];
        let err = reconstruct(&path, NS).expect_err("no snapshot");
        assert_eq!(
            err,
            ReconstructError::MissingSnapshot {
                first: "evstore_events/1".into()
            }
        );
        assert_eq!(err.code(), ErrorCode::MalformedHopPath);
        assert_eq!(reconstruct(&[], NS), Err(ReconstructError::EmptyPath));
    }

    #[test]
    fn snapshot_without_data_is_malformed() {
        let path = vec![Stop::new(format!("{NS}/1"), None, Patch::new())];
        assert!(matches!(
            reconstruct(&path, NS),
            Err(ReconstructError::MissingData { .. })
        ));
    }

    #[test]
    fn command_on_absent_key_propagates() {
        let path = vec![
            snap("1", json!({})),
            event("1", Patch::new()),
            event(
                "2",
                serde_json::from_value(json!([
                    {"op": "test", "path": "/gone", "value": 1},
                    {"op": "remove", "path": "/gone"}
                ]))
                .expect("patch"),
            ),
        ];
        let err = reconstruct(&path, NS).expect_err("absent key");
        assert_eq!(err.code(), ErrorCode::PatchApplyFailed);
        assert!(err.to_string().contains("evstore_events/2"));
    }

    #[test]
    fn batch_reports_each_path() {
        let good = vec![snap("1", json!({"a": 1}))];
        let bad = vec![event("9", Patch::new())];
        let results = reconstruct_all(&[good, bad], NS);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], Ok(json!({"a": 1})));
        assert!(results[1].is_err());
    }
}
