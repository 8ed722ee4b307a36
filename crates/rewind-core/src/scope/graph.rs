//! Graph scope: `/g/<glob>` over declared graph names.
//!
//! The filter is the union of the member collections of every matching
//! graph. Reserved bookkeeping graphs never appear in the catalog, so they
//! cannot match.

use std::collections::BTreeSet;

use super::{ScopeError, ScopeFilter};
use crate::model::Catalog;
use crate::pattern::glob_match;

pub const PREFIX: &str = "/g/";

pub(super) fn filter(search_pattern: &str, catalog: &Catalog) -> Result<ScopeFilter, ScopeError> {
    let graphs = glob_match(catalog.graph_names(), search_pattern)?;
    let collections: BTreeSet<String> = graphs
        .into_iter()
        .filter_map(|graph| catalog.graph_collections(graph))
        .flatten()
        .cloned()
        .collect();
    Ok(ScopeFilter::Collections(collections))
}
