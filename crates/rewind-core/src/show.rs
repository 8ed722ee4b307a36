//! Point-in-time `show` requests.
//!
//! [`show`] resolves an addressing path, compiles a [`Plan`], and runs it
//! against an [`EventStore`]: selection first, then the plan's stages in
//! order. Only the reconstruct stage asks the store for hop paths, so a plan
//! without one never touches the diff chain.
//!
//! A node whose chain is missing or does not apply shows up in the output as
//! a [`NodeState::Failed`] entry; the rest of the batch is unaffected.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

use crate::error::ErrorCode;
use crate::model::time::now_us;
use crate::model::{Event, collection_of};
use crate::plan::{self, GroupBy, OutputShape, Plan, ShowOptions, SortDir, SortField, Stage, Window};
use crate::reconstruct::reconstruct;
use crate::scope::{self, ScopeError};
use crate::store::EventStore;

/// Errors that abort a whole request.
#[derive(Debug, thiserror::Error)]
pub enum ShowError {
    /// The addressing path is malformed.
    #[error(transparent)]
    Scope(#[from] ScopeError),

    /// The store failed; passed through unchanged.
    #[error(transparent)]
    Store(#[from] anyhow::Error),

    /// A stage met a working set it cannot handle (hand-built plan).
    #[error("stage '{stage}' cannot run on {found}")]
    StageMismatch {
        stage: &'static str,
        found: &'static str,
    },
}

impl ShowError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Scope(err) => err.code(),
            Self::Store(_) => ErrorCode::StoreUnavailable,
            Self::StageMismatch { .. } => ErrorCode::InternalUnexpected,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A node's reconstructed content, or why it could not be reconstructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    Document(Value),
    Failed { id: String, error: String },
}

impl NodeState {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub const fn document(&self) -> Option<&Value> {
        match self {
            Self::Document(doc) => Some(doc),
            Self::Failed { .. } => None,
        }
    }
}

impl Serialize for NodeState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Document(doc) => doc.serialize(serializer),
            Self::Failed { id, error } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("_id", id)?;
                map.serialize_entry("_error", error)?;
                map.end()
            }
        }
    }
}

/// One group of reconstructed nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// `None` when the key cannot be derived (e.g. an undeclared collection
    /// under `type` grouping).
    pub key: Option<String>,
    pub items: Vec<NodeState>,
}

/// One group's node count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTotal {
    pub key: Option<String>,
    pub total: usize,
}

/// Result of a `show` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowOutput {
    Documents(Vec<NodeState>),
    Total(usize),
    Groups { by: GroupBy, groups: Vec<Group> },
    GroupTotals { by: GroupBy, groups: Vec<GroupTotal> },
}

impl ShowOutput {
    /// Failed node entries anywhere in the output.
    #[must_use]
    pub fn failures(&self) -> Vec<&NodeState> {
        match self {
            Self::Documents(items) => items.iter().filter(|n| n.is_failed()).collect(),
            Self::Groups { groups, .. } => groups
                .iter()
                .flat_map(|g| g.items.iter())
                .filter(|n| n.is_failed())
                .collect(),
            Self::Total(_) | Self::GroupTotals { .. } => Vec::new(),
        }
    }
}

struct Keyed<'a, T: Serialize> {
    by: GroupBy,
    key: &'a Option<String>,
    field: &'static str,
    value: &'a T,
}

impl<T: Serialize> Serialize for Keyed<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.by.as_str(), self.key)?;
        map.serialize_entry(self.field, self.value)?;
        map.end()
    }
}

impl Serialize for ShowOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Documents(items) => items.serialize(serializer),
            Self::Total(total) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("total", total)?;
                map.end()
            }
            Self::Groups { by, groups } => {
                let mut seq = serializer.serialize_seq(Some(groups.len()))?;
                for group in groups {
                    seq.serialize_element(&Keyed {
                        by: *by,
                        key: &group.key,
                        field: "items",
                        value: &group.items,
                    })?;
                }
                seq.end()
            }
            Self::GroupTotals { by, groups } => {
                let mut seq = serializer.serialize_seq(Some(groups.len()))?;
                for group in groups {
                    seq.serialize_element(&Keyed {
                        by: *by,
                        key: &group.key,
                        field: "total",
                        value: &group.total,
                    })?;
                }
                seq.end()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Resolve `path` and compile it against the store's catalog.
///
/// # Errors
///
/// Returns [`ShowError::Scope`] for a malformed path and
/// [`ShowError::Store`] if the catalog cannot be read.
pub fn prepare<S: EventStore + ?Sized>(
    store: &S,
    path: &str,
    opts: &ShowOptions,
) -> Result<Plan, ShowError> {
    let catalog = store.catalog()?;
    let resolved = scope::resolve(path, &catalog)?;
    Ok(plan::compile(&resolved, opts, &catalog, now_us()))
}

/// Answer a `show` request.
///
/// # Errors
///
/// See [`prepare`] and [`execute`].
#[instrument(skip(store, opts))]
pub fn show<S: EventStore + ?Sized>(
    store: &S,
    path: &str,
    opts: &ShowOptions,
) -> Result<ShowOutput, ShowError> {
    let plan = prepare(store, path, opts)?;
    execute(&plan, store)
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

struct Record {
    event: Event,
    state: Option<NodeState>,
}

enum Working {
    Records(Vec<Record>),
    Groups(Vec<(Option<String>, Vec<Record>)>),
    Totals(Vec<(Option<String>, usize)>),
    Total(usize),
}

impl Working {
    const fn describe(&self) -> &'static str {
        match self {
            Self::Records(_) => "records",
            Self::Groups(_) => "groups",
            Self::Totals(_) => "group totals",
            Self::Total(_) => "a total",
        }
    }
}

/// Run a compiled plan.
///
/// # Errors
///
/// Returns [`ShowError::Store`] when the store fails. Per-node
/// reconstruction problems are reported inside the output instead.
pub fn execute<S: EventStore + ?Sized>(plan: &Plan, store: &S) -> Result<ShowOutput, ShowError> {
    let records: Vec<Record> = store
        .latest_events(&plan.selection)?
        .into_iter()
        .filter(|event| event.event.is_live())
        .map(|event| Record { event, state: None })
        .collect();
    debug!(selected = records.len(), bound_us = plan.selection.bound_us, "selection done");

    let mut working = Working::Records(records);
    for stage in &plan.stages {
        working = run_stage(stage, working, plan, store)?;
    }
    finish(working, plan.output)
}

fn run_stage<S: EventStore + ?Sized>(
    stage: &Stage,
    working: Working,
    plan: &Plan,
    store: &S,
) -> Result<Working, ShowError> {
    debug!(stage = ?stage.kind(), input = working.describe(), "running stage");
    match (stage, working) {
        (Stage::Reconstruct { node_order }, Working::Records(mut records)) => {
            if let Some(dir) = node_order {
                records.sort_by(|a, b| dir.apply(a.event.node.cmp(&b.event.node)));
            }
            let ns = store.service().snapshots.clone();
            for record in &mut records {
                record.state = Some(rebuild(store, &record.event, &ns)?);
            }
            Ok(Working::Records(records))
        }
        (Stage::Aggregate { group_by, count }, Working::Records(records)) => {
            Ok(aggregate(records, *group_by, *count, plan))
        }
        (
            Stage::SortSlice {
                field,
                dir,
                group_key_tie_break,
                window,
            },
            working,
        ) => sort_slice(working, *field, *dir, *group_key_tie_break, *window),
        (stage, working) => Err(ShowError::StageMismatch {
            stage: stage_name(stage),
            found: working.describe(),
        }),
    }
}

const fn stage_name(stage: &Stage) -> &'static str {
    match stage {
        Stage::Reconstruct { .. } => "reconstruct",
        Stage::Aggregate { .. } => "aggregate",
        Stage::SortSlice { .. } => "sort_slice",
    }
}

fn rebuild<S: EventStore + ?Sized>(
    store: &S,
    event: &Event,
    ns: &str,
) -> Result<NodeState, ShowError> {
    let failed = |error: String| {
        warn!(node = %event.node, event = %event.id, %error, "reconstruction failed");
        NodeState::Failed {
            id: event.node.clone(),
            error,
        }
    };

    let Some(path) = store.shortest_chain(&event.last_snapshot, &event.id)? else {
        return Ok(failed(format!(
            "{} [{}]: no chain from {} to {}",
            ErrorCode::MalformedHopPath.message(),
            ErrorCode::MalformedHopPath.code(),
            event.last_snapshot,
            event.id
        )));
    };
    Ok(match reconstruct(&path, ns) {
        Ok(doc) => NodeState::Document(doc),
        Err(err) => failed(format!("{} [{}]: {err}", err.code().message(), err.code().code())),
    })
}

fn group_key(event: &Event, by: GroupBy, plan: &Plan) -> Option<String> {
    let collection = collection_of(&event.node);
    match by {
        GroupBy::Collection => Some(collection.to_string()),
        GroupBy::Type => plan
            .collection_types
            .get(collection)
            .map(|kind| kind.as_str().to_string()),
    }
}

fn aggregate(records: Vec<Record>, group_by: Option<GroupBy>, count: bool, plan: &Plan) -> Working {
    let Some(by) = group_by else {
        return if count {
            Working::Total(records.len())
        } else {
            Working::Records(records)
        };
    };

    let mut groups: BTreeMap<Option<String>, Vec<Record>> = BTreeMap::new();
    for record in records {
        groups
            .entry(group_key(&record.event, by, plan))
            .or_default()
            .push(record);
    }

    if count {
        Working::Totals(groups.into_iter().map(|(k, v)| (k, v.len())).collect())
    } else {
        Working::Groups(groups.into_iter().collect())
    }
}

fn sort_slice(
    working: Working,
    field: SortField,
    dir: SortDir,
    group_key_tie_break: bool,
    window: Window,
) -> Result<Working, ShowError> {
    match (working, field) {
        (Working::Records(mut records), SortField::Node) => {
            records.sort_by(|a, b| dir.apply(a.event.node.cmp(&b.event.node)));
            Ok(Working::Records(window.apply(records)))
        }
        (Working::Groups(mut groups), SortField::GroupKey) => {
            groups.sort_by(|a, b| dir.apply(a.0.cmp(&b.0)));
            Ok(Working::Groups(window.apply(groups)))
        }
        (Working::Totals(mut totals), SortField::Total) => {
            totals.sort_by(|a, b| {
                let primary = dir.apply(a.1.cmp(&b.1));
                if group_key_tie_break {
                    primary.then_with(|| a.0.cmp(&b.0))
                } else {
                    primary
                }
            });
            Ok(Working::Totals(window.apply(totals)))
        }
        (working, _) => Err(ShowError::StageMismatch {
            stage: "sort_slice",
            found: working.describe(),
        }),
    }
}

fn into_states(records: Vec<Record>) -> Result<Vec<NodeState>, ShowError> {
    records
        .into_iter()
        .map(|record| {
            record.state.ok_or(ShowError::StageMismatch {
                stage: "output",
                found: "records that were never reconstructed",
            })
        })
        .collect()
}

fn finish(working: Working, output: OutputShape) -> Result<ShowOutput, ShowError> {
    match (output, working) {
        (OutputShape::Documents, Working::Records(records)) => {
            Ok(ShowOutput::Documents(into_states(records)?))
        }
        (OutputShape::Total, Working::Total(total)) => Ok(ShowOutput::Total(total)),
        (OutputShape::Groups { key, items }, Working::Groups(groups)) => {
            let groups: Vec<Group> = groups
                .into_iter()
                .map(|(group, records)| {
                    Ok(Group {
                        key: group,
                        items: items.apply(into_states(records)?),
                    })
                })
                .collect::<Result<_, ShowError>>()?;
            Ok(ShowOutput::Groups { by: key, groups })
        }
        (OutputShape::GroupTotals { key }, Working::Totals(totals)) => Ok(ShowOutput::GroupTotals {
            by: key,
            groups: totals
                .into_iter()
                .map(|(group, total)| GroupTotal { key: group, total })
                .collect(),
        }),
        (_, working) => Err(ShowError::StageMismatch {
            stage: "output",
            found: working.describe(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failed_nodes_serialize_with_id_and_error() {
        let output = ShowOutput::Documents(vec![
            NodeState::Document(json!({"a": 1})),
            NodeState::Failed {
                id: "orders/2".into(),
                error: "boom".into(),
            },
        ]);
        assert_eq!(
            serde_json::to_value(&output).expect("serialize"),
            json!([{"a": 1}, {"_id": "orders/2", "_error": "boom"}])
        );
        assert_eq!(output.failures().len(), 1);
    }

    #[test]
    fn output_shapes_serialize() {
        assert_eq!(
            serde_json::to_value(ShowOutput::Total(3)).expect("serialize"),
            json!({"total": 3})
        );
        assert_eq!(
            serde_json::to_value(ShowOutput::GroupTotals {
                by: GroupBy::Collection,
                groups: vec![GroupTotal {
                    key: Some("orders".into()),
                    total: 2
                }],
            })
            .expect("serialize"),
            json!([{"collection": "orders", "total": 2}])
        );
        assert_eq!(
            serde_json::to_value(ShowOutput::Groups {
                by: GroupBy::Type,
                groups: vec![Group {
                    key: None,
                    items: vec![NodeState::Document(json!(1))]
                }],
            })
            .expect("serialize"),
            json!([{"type": null, "items": [1]}])
        );
    }

    #[test]
    fn scope_errors_are_bad_requests() {
        let err = ShowError::from(ScopeError::InvalidShape {
            scope: crate::scope::ScopeKind::Graph,
            path: "/g/a/b".into(),
            shape: "/g/<graph-glob>",
        });
        assert!(err.code().is_bad_request());
        assert_eq!(
            ShowError::Store(anyhow::anyhow!("down")).code(),
            ErrorCode::StoreUnavailable
        );
    }
}
