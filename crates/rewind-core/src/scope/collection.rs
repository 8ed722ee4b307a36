//! Collection scope: `/c/<glob>` over known collection names.

use super::{ScopeError, ScopeFilter};
use crate::model::Catalog;
use crate::pattern::glob_match;

pub const PREFIX: &str = "/c/";

pub(super) fn filter(search_pattern: &str, catalog: &Catalog) -> Result<ScopeFilter, ScopeError> {
    let matches = glob_match(catalog.collection_names(), search_pattern)?;
    Ok(ScopeFilter::Collections(
        matches.into_iter().map(str::to_string).collect(),
    ))
}
