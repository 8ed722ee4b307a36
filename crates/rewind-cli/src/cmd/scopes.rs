//! `rwd scopes`: how an addressing path is classified and what it selects.

use anyhow::Result;
use clap::Args;
use rewind_core::scope::{self, Resolved, ScopeFilter};
use rewind_core::ShowError;
use std::io::{self, Write};

use super::{Context, StoreArgs};
use crate::output::{pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct ScopesArgs {
    /// Addressing path to resolve.
    pub path: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

pub fn run_scopes(args: &ScopesArgs, ctx: &Context) -> Result<()> {
    let store = args.store.open(ctx)?;
    let catalog = store.catalog()?;
    let resolved = scope::resolve(&args.path, &catalog)
        .map_err(|err| ctx.fail_show(ShowError::from(err)))?;
    render_mode(ctx.output, &resolved, write_text, write_pretty)
}

fn describe(filter: &ScopeFilter) -> String {
    let list = |items: Vec<&str>| {
        if items.is_empty() {
            "(none)".to_string()
        } else {
            items.join(", ")
        }
    };
    match filter {
        ScopeFilter::All => "all nodes".to_string(),
        ScopeFilter::Collections(names) => {
            format!("collections {}", list(names.iter().map(String::as_str).collect()))
        }
        ScopeFilter::NodeRegex(pattern) => format!("node ids matching {}", pattern.regex_source()),
        ScopeFilter::NodeIds(groups) => format!(
            "node ids {}",
            list(groups.values().flatten().map(String::as_str).collect())
        ),
    }
}

fn write_text(resolved: &Resolved, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}",
        resolved.scope,
        resolved.search_pattern,
        describe(&resolved.filter)
    )
}

fn write_pretty(resolved: &Resolved, w: &mut dyn Write) -> io::Result<()> {
    pretty_kv(w, "scope", resolved.scope.as_str())?;
    pretty_kv(w, "pattern", &resolved.search_pattern)?;
    pretty_kv(w, "selects", describe(&resolved.filter))
}
