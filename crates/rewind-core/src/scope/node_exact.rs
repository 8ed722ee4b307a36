//! Node-exact scope: `/n/<ids>` with brace expansion.
//!
//! The search pattern is expanded into literal node ids up front. Ids whose
//! leading segment is not a known collection are discarded, and the rest are
//! grouped by collection, so lookup cost follows the number of requested ids
//! rather than the size of the log.

use std::collections::{BTreeMap, BTreeSet};

use super::{ScopeError, ScopeFilter};
use crate::model::Catalog;
use crate::pattern::expand_braces;

pub const PREFIX: &str = "/n/";

pub(super) fn filter(search_pattern: &str, catalog: &Catalog) -> Result<ScopeFilter, ScopeError> {
    let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for id in expand_braces(search_pattern)? {
        let Some((collection, key)) = id.split_once('/') else {
            continue;
        };
        if key.is_empty() || !catalog.is_known_collection(collection) {
            continue;
        }
        groups.entry(collection.to_string()).or_default().insert(id);
    }
    Ok(ScopeFilter::NodeIds(groups))
}
