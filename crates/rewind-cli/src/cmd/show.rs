//! `rwd show`: node contents as of a point in time.

use anyhow::Result;
use clap::Args;
use rewind_core::show::{Group, GroupTotal, NodeState};
use rewind_core::{ShowOutput, show};
use serde_json::Value;
use std::io::{self, Write};
use tracing::warn;

use super::{Context, QueryArgs, StoreArgs};
use crate::output::{pretty_kv, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// Execute `rwd show <PATH>`.
///
/// Nodes that could not be reconstructed are printed in place and do not
/// fail the command.
pub fn run_show(args: &ShowArgs, ctx: &Context) -> Result<()> {
    let opts = args.query.options(ctx)?;
    let store = args.store.open(ctx)?;
    let output = show(store.as_ref(), &args.query.path, &opts).map_err(|err| ctx.fail_show(err))?;

    let failures = output.failures().len();
    if failures > 0 {
        warn!(failures, path = %args.query.path, "some nodes could not be reconstructed");
    }
    render_mode(ctx.output, &output, write_text, write_pretty)
}

fn group_label(key: Option<&str>) -> &str {
    key.unwrap_or("(none)")
}

fn text_node(w: &mut dyn Write, node: &NodeState) -> io::Result<()> {
    match node {
        NodeState::Document(doc) => writeln!(w, "{doc}"),
        NodeState::Failed { id, error } => writeln!(w, "!{id}\t{error}"),
    }
}

pub(super) fn write_text(output: &ShowOutput, w: &mut dyn Write) -> io::Result<()> {
    match output {
        ShowOutput::Documents(items) => {
            for node in items {
                text_node(w, node)?;
            }
        }
        ShowOutput::Total(total) => writeln!(w, "{total}")?,
        ShowOutput::Groups { groups, .. } => {
            for Group { key, items } in groups {
                writeln!(w, "#{}", group_label(key.as_deref()))?;
                for node in items {
                    text_node(w, node)?;
                }
            }
        }
        ShowOutput::GroupTotals { groups, .. } => {
            for GroupTotal { key, total } in groups {
                writeln!(w, "{}\t{total}", group_label(key.as_deref()))?;
            }
        }
    }
    Ok(())
}

fn node_title(doc: &Value) -> &str {
    doc.get("_id").and_then(Value::as_str).unwrap_or("(document)")
}

fn pretty_nodes(w: &mut dyn Write, items: &[NodeState]) -> io::Result<()> {
    for node in items {
        match node {
            NodeState::Document(doc) => {
                pretty_section(w, node_title(doc))?;
                let body = serde_json::to_string_pretty(doc).map_err(io::Error::other)?;
                writeln!(w, "{body}")?;
            }
            NodeState::Failed { id, error } => {
                pretty_section(w, &format!("{id} (failed)"))?;
                writeln!(w, "{error}")?;
            }
        }
        writeln!(w)?;
    }
    Ok(())
}

pub(super) fn write_pretty(output: &ShowOutput, w: &mut dyn Write) -> io::Result<()> {
    match output {
        ShowOutput::Documents(items) => {
            if items.is_empty() {
                writeln!(w, "No nodes matched.")?;
            }
            pretty_nodes(w, items)?;
        }
        ShowOutput::Total(total) => pretty_kv(w, "total", total.to_string())?,
        ShowOutput::Groups { by, groups } => {
            for Group { key, items } in groups {
                writeln!(w, "{by}: {} ({} shown)", group_label(key.as_deref()), items.len())?;
                pretty_rule(w)?;
                pretty_nodes(w, items)?;
            }
        }
        ShowOutput::GroupTotals { by, groups } => {
            writeln!(w, "{:<24} total", by.as_str())?;
            pretty_rule(w)?;
            for GroupTotal { key, total } in groups {
                writeln!(w, "{:<24} {total}", group_label(key.as_deref()))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::GroupBy;
    use serde_json::json;

    fn text(output: &ShowOutput) -> String {
        let mut buf = Vec::new();
        write_text(output, &mut buf).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn text_lists_one_document_per_line() {
        let output = ShowOutput::Documents(vec![
            NodeState::Document(json!({"_id": "orders/1", "total": 7})),
            NodeState::Failed {
                id: "orders/9".into(),
                error: "no chain".into(),
            },
        ]);
        assert_eq!(
            text(&output),
            "{\"_id\":\"orders/1\",\"total\":7}\n!orders/9\tno chain\n"
        );
    }

    #[test]
    fn text_group_totals_are_tab_separated() {
        let output = ShowOutput::GroupTotals {
            by: GroupBy::Type,
            groups: vec![
                GroupTotal {
                    key: None,
                    total: 1,
                },
                GroupTotal {
                    key: Some("vertex".into()),
                    total: 4,
                },
            ],
        };
        assert_eq!(text(&output), "(none)\t1\nvertex\t4\n");
    }

    #[test]
    fn pretty_names_each_document() {
        let output = ShowOutput::Documents(vec![NodeState::Document(json!({"_id": "orders/1"}))]);
        let mut buf = Vec::new();
        write_pretty(&output, &mut buf).expect("render");
        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(rendered.starts_with("orders/1\n"));
    }
}
