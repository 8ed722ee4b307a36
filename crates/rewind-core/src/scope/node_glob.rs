//! Node-glob scope: `/ng/<glob>` matched against full node ids.

use super::{NodePattern, ScopeError, ScopeFilter};
use crate::pattern::glob_to_regex;

pub const PREFIX: &str = "/ng/";

pub(super) fn filter(search_pattern: &str) -> Result<ScopeFilter, ScopeError> {
    let regex = glob_to_regex(search_pattern)?;
    Ok(ScopeFilter::NodeRegex(NodePattern::new(
        search_pattern.to_string(),
        regex,
    )))
}
