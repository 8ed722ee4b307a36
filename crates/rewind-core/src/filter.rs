//! Point-in-time reads narrowed by a predicate over document content.
//!
//! A filter request runs the ungrouped `show` pipeline with a pre-window
//! (`pre_skip`/`pre_limit`) over the sorted node set, so at most one window
//! of nodes is ever reconstructed. The [`Predicate`] then runs on each
//! reconstructed document. Nodes that failed to reconstruct cannot be tested
//! and are passed through as [`NodeState::Failed`] entries.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::expr::Predicate;
use crate::plan::{Plan, ShowOptions, SortDir};
use crate::show::{self, NodeState, ShowError, ShowOutput};
use crate::store::EventStore;

/// Options accepted by a filter request.
///
/// `pre_skip`/`pre_limit` window the matched nodes before the predicate
/// runs, with the same "0 or absent means unbounded" rule as `show`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    /// Time bound in unix microseconds; `None` means now.
    pub timestamp: Option<i64>,
    pub sort: Option<SortDir>,
    pub pre_skip: Option<usize>,
    pub pre_limit: Option<usize>,
}

impl FilterOptions {
    /// The `show` request this filter narrows.
    #[must_use]
    pub fn show_options(&self) -> ShowOptions {
        ShowOptions {
            timestamp: self.timestamp,
            sort: self.sort,
            skip: self.pre_skip,
            limit: self.pre_limit,
            ..ShowOptions::default()
        }
    }
}

/// Compile the plan a filter request runs before its predicate.
///
/// # Errors
///
/// See [`show::prepare`].
pub fn prepare<S: EventStore + ?Sized>(
    store: &S,
    path: &str,
    opts: &FilterOptions,
) -> Result<Plan, ShowError> {
    show::prepare(store, path, &opts.show_options())
}

/// Answer a filter request. Without a predicate every windowed node state
/// is returned.
///
/// # Errors
///
/// Returns [`ShowError::Scope`] for a malformed path and
/// [`ShowError::Store`] when the store fails.
#[instrument(skip(store, opts, predicate))]
pub fn filter<S: EventStore + ?Sized>(
    store: &S,
    path: &str,
    opts: &FilterOptions,
    predicate: Option<&Predicate>,
) -> Result<Vec<NodeState>, ShowError> {
    let plan = prepare(store, path, opts)?;
    let ShowOutput::Documents(states) = show::execute(&plan, store)? else {
        return Err(ShowError::StageMismatch {
            stage: "filter",
            found: "grouped or counted output",
        });
    };

    let Some(predicate) = predicate else {
        return Ok(states);
    };
    let windowed = states.len();
    let kept: Vec<NodeState> = states
        .into_iter()
        .filter(|state| match state {
            NodeState::Document(doc) => predicate.matches(doc),
            NodeState::Failed { .. } => true,
        })
        .collect();
    debug!(windowed, kept = kept.len(), %predicate, "predicate applied");
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_window_maps_onto_show_pagination() {
        let opts = FilterOptions {
            timestamp: Some(5),
            sort: Some(SortDir::Desc),
            pre_skip: Some(1),
            pre_limit: Some(2),
        };
        assert_eq!(
            opts.show_options(),
            ShowOptions {
                timestamp: Some(5),
                sort: Some(SortDir::Desc),
                skip: Some(1),
                limit: Some(2),
                ..ShowOptions::default()
            }
        );
    }

    #[test]
    fn options_deserialize_from_camel_case() {
        let opts: FilterOptions =
            serde_json::from_str(r#"{"sort": "desc", "preSkip": 2, "preLimit": 0}"#)
                .expect("deserialize");
        assert_eq!(opts.pre_skip, Some(2));
        assert_eq!(opts.pre_limit, Some(0));
        assert_eq!(opts.sort, Some(SortDir::Desc));
    }
}
