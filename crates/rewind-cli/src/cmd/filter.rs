//! `rwd filter`: node contents as of a point in time, narrowed by a predicate.

use anyhow::Result;
use clap::Args;
use rewind_core::error::ErrorCode;
use rewind_core::{FilterOptions, Predicate, ShowOutput, SortDir, filter};
use tracing::warn;

use super::show::{write_pretty, write_text};
use super::{Context, StoreArgs, parse_at};
use crate::output::render_mode;

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Addressing path: /, /g/<graph>, /c/<collection>, /ng/<node-glob>, /n/<ids>.
    pub path: String,

    /// Predicate over document fields, e.g. "total > 5 && paid == true".
    /// Omit to keep every node in the window.
    pub expression: Option<String>,

    /// Point in time, RFC 3339 or unix seconds. Defaults to now.
    #[arg(long, value_name = "TIME")]
    pub at: Option<String>,

    /// Node id order, applied before the window.
    #[arg(long, value_name = "asc|desc")]
    pub sort: Option<SortDir>,

    /// Matched nodes to skip before the predicate runs; 0 skips none.
    #[arg(long, value_name = "N")]
    pub pre_skip: Option<usize>,

    /// Matched nodes to keep before the predicate runs; 0 keeps all.
    #[arg(long, value_name = "N")]
    pub pre_limit: Option<usize>,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl FilterArgs {
    pub fn options(&self, ctx: &Context) -> Result<FilterOptions> {
        Ok(FilterOptions {
            timestamp: parse_at(ctx, self.at.as_deref())?,
            sort: self.sort.or(Some(ctx.project.query.default_sort)),
            pre_skip: self.pre_skip,
            pre_limit: self.pre_limit,
        })
    }

    pub fn predicate(&self, ctx: &Context) -> Result<Option<Predicate>> {
        self.expression
            .as_deref()
            .map(Predicate::parse)
            .transpose()
            .map_err(|err| ctx.fail(ErrorCode::InvalidFilterExpression, err))
    }
}

/// Execute `rwd filter <PATH> [EXPRESSION]`.
pub fn run_filter(args: &FilterArgs, ctx: &Context) -> Result<()> {
    let predicate = args.predicate(ctx)?;
    let opts = args.options(ctx)?;
    let store = args.store.open(ctx)?;
    let states = filter(store.as_ref(), &args.path, &opts, predicate.as_ref())
        .map_err(|err| ctx.fail_show(err))?;

    let output = ShowOutput::Documents(states);
    let failures = output.failures().len();
    if failures > 0 {
        warn!(failures, path = %args.path, "some nodes could not be reconstructed");
    }
    render_mode(ctx.output, &output, write_text, write_pretty)
}
