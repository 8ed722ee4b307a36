//! `rwd plan`: the compiled query plan for a request, without running it.

use anyhow::Result;
use clap::Args;
use rewind_core::Plan;
use rewind_core::model::time::format_us;
use rewind_core::show::prepare;
use std::io::{self, Write};

use super::{Context, QueryArgs, StoreArgs};
use crate::output::{pretty_kv, pretty_rule, render_mode};

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    #[command(flatten)]
    pub store: StoreArgs,
}

pub fn run_plan(args: &PlanArgs, ctx: &Context) -> Result<()> {
    let opts = args.query.options(ctx)?;
    let store = args.store.open(ctx)?;
    let plan = prepare(store.as_ref(), &args.query.path, &opts).map_err(|err| ctx.fail_show(err))?;
    render_mode(ctx.output, &plan, write_text, write_pretty)
}

fn to_json<T: serde::Serialize>(value: &T) -> io::Result<String> {
    serde_json::to_string(value).map_err(io::Error::other)
}

// Text mode is the plan as one line of JSON.
fn write_text(plan: &Plan, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}", to_json(plan)?)
}

fn write_pretty(plan: &Plan, w: &mut dyn Write) -> io::Result<()> {
    pretty_kv(w, "scope", plan.scope.as_str())?;
    pretty_kv(w, "pattern", &plan.search_pattern)?;
    pretty_kv(w, "as of", format_us(plan.selection.bound_us))?;
    pretty_kv(w, "filter", to_json(&plan.selection.filter)?)?;
    pretty_rule(w)?;
    for (idx, stage) in plan.stages.iter().enumerate() {
        writeln!(w, "{}. {}", idx + 1, to_json(stage)?)?;
    }
    pretty_rule(w)?;
    pretty_kv(w, "output", to_json(&plan.output)?)?;
    if !plan.reconstructs() {
        writeln!(w, "(no documents are reconstructed)")?;
    }
    Ok(())
}
