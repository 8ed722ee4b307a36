//! Query plan compilation.
//!
//! A [`Plan`] is the declarative form of a `show` request: which nodes to
//! select, as of which time, followed by an ordered list of [`Stage`]s. The
//! stage order depends only on whether the request groups and whether it
//! counts (see [`stage_order`]); reconstruction, the expensive stage, is
//! omitted whenever the result is a count and otherwise pushed as late as the
//! output allows.
//!
//! Compilation is pure. Executing a plan is [`crate::show`]'s job.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::model::{Catalog, CollectionKind};
use crate::scope::{Resolved, ScopeFilter, ScopeKind};

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// Orient an ascending comparison result to this direction.
    #[must_use]
    pub const fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDir {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort direction '{other}': expected asc or desc")),
        }
    }
}

/// Grouping key for aggregated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    /// The node's collection name.
    Collection,
    /// The kind (`vertex`/`edge`) of the node's collection.
    Type,
}

impl GroupBy {
    /// Key name used in grouped output records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Type => "type",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "collection" => Ok(Self::Collection),
            "type" => Ok(Self::Type),
            other => Err(format!("unknown group-by key '{other}': expected collection or type")),
        }
    }
}

/// Options accepted by a `show` request.
///
/// Pagination values of `None` or `0` mean "unbounded".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowOptions {
    /// Time bound in unix microseconds; `None` means now.
    pub timestamp: Option<i64>,
    pub sort: Option<SortDir>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    pub group_by: Option<GroupBy>,
    #[serde(default)]
    pub counts_only: bool,
    pub group_sort: Option<SortDir>,
    pub group_skip: Option<usize>,
    pub group_limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Plan pieces
// ---------------------------------------------------------------------------

/// A skip/limit pair. A zero or absent value leaves that side unbounded.
/// Group items use [`Window::per_group`], which also drops a lone skip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Window {
    pub skip: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Window {
    #[must_use]
    pub fn new(skip: Option<usize>, limit: Option<usize>) -> Self {
        Self {
            skip: skip.unwrap_or(0),
            limit: limit.filter(|&n| n > 0),
        }
    }

    /// Window over the items inside each group. Unlike the top-level
    /// window, the skip only takes effect together with a limit.
    #[must_use]
    pub fn per_group(skip: Option<usize>, limit: Option<usize>) -> Self {
        match limit.filter(|&n| n > 0) {
            Some(limit) => Self {
                skip: skip.unwrap_or(0),
                limit: Some(limit),
            },
            None => Self::default(),
        }
    }

    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.skip == 0 && self.limit.is_none()
    }

    /// Keep the windowed slice of `items`.
    #[must_use]
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        if self.is_unbounded() {
            return items;
        }
        items
            .into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Identifies a stage independently of its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Reconstruct,
    Aggregate,
    SortSlice,
}

/// Stage order after selection for a (grouped, counting) request.
///
/// | grouped | counting | stages                                   |
/// |---------|----------|------------------------------------------|
/// | yes     | yes      | aggregate, sort/slice                    |
/// | yes     | no       | reconstruct, aggregate, sort/slice       |
/// | no      | yes      | aggregate                                |
/// | no      | no       | sort/slice, reconstruct                  |
#[must_use]
pub const fn stage_order(grouped: bool, counting: bool) -> &'static [StageKind] {
    use StageKind::{Aggregate, Reconstruct, SortSlice};
    match (grouped, counting) {
        (true, true) => &[Aggregate, SortSlice],
        (true, false) => &[Reconstruct, Aggregate, SortSlice],
        (false, true) => &[Aggregate],
        (false, false) => &[SortSlice, Reconstruct],
    }
}

/// What a sort/slice stage orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Node id of ungrouped records.
    Node,
    /// Group key of grouped records.
    GroupKey,
    /// Count of grouped totals.
    Total,
}

/// One retrieval stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    /// Locate each node's hop path and rebuild its document.
    Reconstruct {
        /// When grouped, records are ordered by node id first so that group
        /// items come out in this direction.
        #[serde(skip_serializing_if = "Option::is_none")]
        node_order: Option<SortDir>,
    },
    /// Group by key and/or collapse into counts.
    Aggregate {
        #[serde(skip_serializing_if = "Option::is_none")]
        group_by: Option<GroupBy>,
        count: bool,
    },
    /// Order and paginate records or groups.
    SortSlice {
        field: SortField,
        dir: SortDir,
        /// Ties on `field` fall back to the ascending group key.
        group_key_tie_break: bool,
        window: Window,
    },
}

impl Stage {
    #[must_use]
    pub const fn kind(&self) -> StageKind {
        match self {
            Self::Reconstruct { .. } => StageKind::Reconstruct,
            Self::Aggregate { .. } => StageKind::Aggregate,
            Self::SortSlice { .. } => StageKind::SortSlice,
        }
    }
}

/// Shape of the final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum OutputShape {
    /// Ordered documents.
    Documents,
    /// `{ "total": n }`.
    Total,
    /// `[{ "<key>": k, "items": [...] }]`, items windowed per group.
    Groups { key: GroupBy, items: Window },
    /// `[{ "<key>": k, "total": n }]`.
    GroupTotals { key: GroupBy },
}

/// Which events are selected before any stage runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub filter: ScopeFilter,
    /// Inclusive upper time bound, unix microseconds.
    pub bound_us: i64,
}

/// A compiled `show` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub scope: ScopeKind,
    pub search_pattern: String,
    pub selection: Selection,
    pub stages: Vec<Stage>,
    pub output: OutputShape,
    /// Collection kinds, present only when grouping by type.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub collection_types: BTreeMap<String, CollectionKind>,
}

impl Plan {
    #[must_use]
    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(Stage::kind).collect()
    }

    /// Whether executing this plan will reconstruct documents.
    #[must_use]
    pub fn reconstructs(&self) -> bool {
        self.stages.iter().any(|s| s.kind() == StageKind::Reconstruct)
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Compile a resolved scope and request options into a [`Plan`].
///
/// `now_us` is used as the time bound when the request carries none.
#[must_use]
pub fn compile(resolved: &Resolved, opts: &ShowOptions, catalog: &Catalog, now_us: i64) -> Plan {
    let grouped = opts.group_by.is_some();
    let counting = opts.counts_only;
    let sort = opts.sort.unwrap_or_default();

    let stages = stage_order(grouped, counting)
        .iter()
        .map(|kind| match kind {
            StageKind::Reconstruct => Stage::Reconstruct {
                node_order: grouped.then(|| opts.group_sort.unwrap_or_default()),
            },
            StageKind::Aggregate => Stage::Aggregate {
                group_by: opts.group_by,
                count: counting,
            },
            StageKind::SortSlice => {
                let field = match (grouped, counting) {
                    (_, true) => SortField::Total,
                    (true, false) => SortField::GroupKey,
                    (false, false) => SortField::Node,
                };
                Stage::SortSlice {
                    field,
                    dir: sort,
                    group_key_tie_break: grouped && counting,
                    window: Window::new(opts.skip, opts.limit),
                }
            }
        })
        .collect();

    let output = match (opts.group_by, counting) {
        (Some(key), true) => OutputShape::GroupTotals { key },
        (Some(key), false) => OutputShape::Groups {
            key,
            items: Window::per_group(opts.group_skip, opts.group_limit),
        },
        (None, true) => OutputShape::Total,
        (None, false) => OutputShape::Documents,
    };

    let collection_types = if opts.group_by == Some(GroupBy::Type) {
        catalog.collection_types()
    } else {
        BTreeMap::new()
    };

    Plan {
        scope: resolved.scope,
        search_pattern: resolved.search_pattern.clone(),
        selection: Selection {
            filter: resolved.filter.clone(),
            bound_us: opts.timestamp.unwrap_or(now_us),
        },
        stages,
        output,
        collection_types,
    }
}
