//! Load a JSON Lines log into a store database.

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use serde::Serialize;
use std::path::Path;
use tracing::{info, instrument};

use crate::model::time::now_us;
use crate::store::EdgeKind;
use crate::store::log_file::{self, LogRecord};

/// Row counts written by one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub collections: usize,
    pub graphs: usize,
    pub events: usize,
    pub snapshots: usize,
    pub edges: usize,
}

impl ImportStats {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.collections + self.graphs + self.events + self.snapshots + self.edges
    }
}

/// Read the log at `path` and import it.
///
/// # Errors
///
/// Returns an error if the log cannot be read or the import fails.
#[instrument(skip(conn))]
pub fn import_log(conn: &mut Connection, path: &Path) -> Result<ImportStats> {
    let records = log_file::read_log(path)?;
    import_records(conn, &records)
}

/// Write `records` in a single transaction. Re-importing a record replaces
/// the stored row.
///
/// # Errors
///
/// Returns an error if any insert fails; nothing is written in that case.
pub fn import_records(conn: &mut Connection, records: &[LogRecord]) -> Result<ImportStats> {
    let tx = conn.transaction().context("begin import transaction")?;
    let mut stats = ImportStats::default();

    for record in records {
        match record {
            LogRecord::Collection(info) => {
                tx.execute(
                    "INSERT OR REPLACE INTO collections (name, kind) VALUES (?1, ?2)",
                    params![info.name, info.kind.as_str()],
                )
                .with_context(|| format!("import collection {}", info.name))?;
                stats.collections += 1;
            }
            LogRecord::Graph(info) => {
                tx.execute(
                    "INSERT OR REPLACE INTO graphs (name) VALUES (?1)",
                    params![info.name],
                )
                .with_context(|| format!("import graph {}", info.name))?;
                tx.execute(
                    "DELETE FROM graph_collections WHERE graph = ?1",
                    params![info.name],
                )
                .with_context(|| format!("clear members of graph {}", info.name))?;
                for collection in &info.collections {
                    tx.execute(
                        "INSERT OR IGNORE INTO graph_collections (graph, collection) VALUES (?1, ?2)",
                        params![info.name, collection],
                    )
                    .with_context(|| format!("import member {collection} of graph {}", info.name))?;
                }
                stats.graphs += 1;
            }
            LogRecord::Event(event) => {
                tx.execute(
                    "INSERT OR REPLACE INTO events \
                     (event_id, node, collection, event, hops, ctime_us, last_snapshot) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        event.id,
                        event.node,
                        event.collection(),
                        event.event.as_str(),
                        event.hops_from_origin,
                        event.ctime,
                        event.last_snapshot,
                    ],
                )
                .with_context(|| format!("import event {}", event.id))?;
                stats.events += 1;
            }
            LogRecord::Snapshot { id, data } => {
                let data_json = serde_json::to_string(data).context("serialize snapshot data")?;
                tx.execute(
                    "INSERT OR REPLACE INTO snapshots (snapshot_id, data_json) VALUES (?1, ?2)",
                    params![id, data_json],
                )
                .with_context(|| format!("import snapshot {id}"))?;
                stats.snapshots += 1;
            }
            LogRecord::Command { from, to, command } => {
                let command_json = serde_json::to_string(command).context("serialize command")?;
                insert_edge(&tx, from, to, EdgeKind::Command, &command_json)?;
                stats.edges += 1;
            }
            LogRecord::EvtSsLink { from, to } => {
                insert_edge(&tx, from, to, EdgeKind::EvtSsLink, "[]")?;
                stats.edges += 1;
            }
            LogRecord::SnapshotLink { from, to } => {
                insert_edge(&tx, from, to, EdgeKind::SnapshotLink, "[]")?;
                stats.edges += 1;
            }
        }
    }

    tx.execute(
        "UPDATE store_meta SET last_import_us = ?1 WHERE id = 1",
        params![now_us()],
    )
    .context("record import time")?;
    tx.commit().context("commit import transaction")?;

    info!(
        records = stats.total(),
        events = stats.events,
        snapshots = stats.snapshots,
        edges = stats.edges,
        "imported event log"
    );
    Ok(stats)
}

fn insert_edge(
    conn: &Connection,
    from: &str,
    to: &str,
    kind: EdgeKind,
    command_json: &str,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO edges (from_id, to_id, kind, command_json) VALUES (?1, ?2, ?3, ?4)",
        params![from, to, kind.as_str(), command_json],
    )
    .with_context(|| format!("import {kind} edge {from} -> {to}"))?;
    Ok(())
}
