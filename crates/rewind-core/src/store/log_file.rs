//! JSON Lines event log.
//!
//! One record per line, discriminated by `type`. Blank lines are ignored.
//!
//! ```text
//! {"type":"collection","name":"orders","kind":"vertex"}
//! {"type":"graph","name":"shop","collections":["orders"]}
//! {"type":"snapshot","_id":"evstore_snapshots/1","data":{"total":5}}
//! {"type":"event","_id":"evstore_events/1","node":"orders/1","event":"created","hops-from-origin":1,"ctime":1547560124432040,"last-snapshot":"evstore_snapshots/1"}
//! {"type":"evt_ss_link","_from":"evstore_events/1","_to":"evstore_snapshots/1"}
//! {"type":"command","_from":"evstore_events/1","_to":"evstore_events/2","command":[...]}
//! {"type":"snapshot_link","_from":"evstore_snapshots/1","_to":"evstore_snapshots/2"}
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::diff::Patch;
use crate::error::ErrorCode;
use crate::model::{CollectionInfo, Event, GraphInfo};

/// One line of the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogRecord {
    Collection(CollectionInfo),
    Graph(GraphInfo),
    Event(Event),
    Snapshot {
        #[serde(rename = "_id")]
        id: String,
        data: Value,
    },
    Command {
        #[serde(rename = "_from")]
        from: String,
        #[serde(rename = "_to")]
        to: String,
        #[serde(default, deserialize_with = "null_as_empty")]
        command: Patch,
    },
    EvtSsLink {
        #[serde(rename = "_from")]
        from: String,
        #[serde(rename = "_to")]
        to: String,
    },
    SnapshotLink {
        #[serde(rename = "_from")]
        from: String,
        #[serde(rename = "_to")]
        to: String,
    },
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Patch, D::Error> {
    Ok(Option::<Patch>::deserialize(deserializer)?.unwrap_or_default())
}

/// A line that does not parse as a [`LogRecord`].
#[derive(Debug, thiserror::Error)]
#[error("{}: line {line}: {source}", ErrorCode::CorruptLogRecord.message())]
pub struct CorruptRecord {
    pub line: usize,
    #[source]
    pub source: serde_json::Error,
}

/// Parse log records from any buffered reader.
///
/// # Errors
///
/// Returns an error on I/O failure or the first line that does not parse.
pub fn parse_log<R: BufRead>(reader: R) -> Result<Vec<LogRecord>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read log line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str(trimmed).map_err(|source| CorruptRecord {
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Read every record from the log at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a line is corrupt.
pub fn read_log(path: &Path) -> Result<Vec<LogRecord>> {
    let file = File::open(path).with_context(|| format!("open event log {}", path.display()))?;
    parse_log(BufReader::new(file)).with_context(|| format!("parse event log {}", path.display()))
}

/// Write `records` to `path`, one per line, replacing any existing file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_log(path: &Path, records: &[LogRecord]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create event log {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut out, record).context("serialize log record")?;
        out.write_all(b"\n").context("write log record")?;
    }
    out.flush().context("flush event log")?;
    Ok(())
}
