//! `rwd import`: load a JSON Lines event log into a SQLite store.

use anyhow::{Context as _, Result, anyhow};
use clap::Args;
use rewind_core::db::{self, ImportStats};
use rewind_core::error::ErrorCode;
use rewind_core::store::log_file::CorruptRecord;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

use super::Context;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON Lines event log to read.
    pub log: PathBuf,

    /// Store database to write; created if missing. Defaults to `[store] db`.
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ImportReport {
    log: PathBuf,
    db: PathBuf,
    #[serde(flatten)]
    stats: ImportStats,
}

pub fn run_import(args: &ImportArgs, ctx: &Context) -> Result<()> {
    let db_path = match (&args.db, &ctx.project.store.db) {
        (Some(db), _) => db.clone(),
        (None, Some(db)) => ctx.root.join(db),
        (None, None) => {
            return Err(ctx.fail(
                ErrorCode::StoreNotFound,
                anyhow!("no --db given and no [store] db configured"),
            ));
        }
    };
    if !args.log.exists() {
        return Err(ctx.fail(
            ErrorCode::StoreNotFound,
            anyhow!("event log {} does not exist", args.log.display()),
        ));
    }

    let mut conn = db::open_store(&db_path)?;
    let stats = db::import_log(&mut conn, &args.log)
        .map_err(|err| {
            let code = if err.chain().any(|cause| cause.is::<CorruptRecord>()) {
                ErrorCode::CorruptLogRecord
            } else {
                ErrorCode::StoreUnavailable
            };
            ctx.fail(code, err)
        })
        .with_context(|| format!("import {} into {}", args.log.display(), db_path.display()))?;
    info!(rows = stats.total(), db = %db_path.display(), "import finished");

    let report = ImportReport {
        log: args.log.clone(),
        db: db_path,
        stats,
    };
    render_mode(ctx.output, &report, write_text, write_pretty)
}

fn write_text(report: &ImportReport, w: &mut dyn Write) -> io::Result<()> {
    let s = &report.stats;
    writeln!(
        w,
        "imported {} records into {} (collections={} graphs={} events={} snapshots={} edges={})",
        s.total(),
        report.db.display(),
        s.collections,
        s.graphs,
        s.events,
        s.snapshots,
        s.edges
    )
}

fn write_pretty(report: &ImportReport, w: &mut dyn Write) -> io::Result<()> {
    let s = &report.stats;
    pretty_section(w, "Import")?;
    pretty_kv(w, "log", report.log.display().to_string())?;
    pretty_kv(w, "database", report.db.display().to_string())?;
    pretty_kv(w, "collections", s.collections.to_string())?;
    pretty_kv(w, "graphs", s.graphs.to_string())?;
    pretty_kv(w, "events", s.events.to_string())?;
    pretty_kv(w, "snapshots", s.snapshots.to_string())?;
    pretty_kv(w, "edges", s.edges.to_string())
}
