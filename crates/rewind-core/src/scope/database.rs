//! Database scope: the root path, no filter.

use super::ScopeFilter;

pub(super) fn matches(path: &str) -> bool {
    path == "/"
}

pub(super) const fn filter() -> ScopeFilter {
    ScopeFilter::All
}
