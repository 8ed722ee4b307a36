//! [`EventStore`] over the SQLite schema.
//!
//! Per-node selection runs as a `ROW_NUMBER()` window query with collection
//! and id restrictions pushed into the `WHERE` clause; the full scope filter
//! is then re-applied in Rust (node-glob regexes cannot be pushed down).
//! Chain search walks the `edges` table one vertex at a time through the
//! shared breadth-first search.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::ServiceConfig;
use crate::diff::Patch;
use crate::model::{Catalog, CollectionInfo, CollectionKind, Event, EventKind, GraphInfo};
use crate::plan::Selection;
use crate::reconstruct::{HopPath, Stop};
use crate::scope::ScopeFilter;
use crate::store::EventStore;
use crate::store::chain::{self, Hop};

/// An event store backed by a SQLite database.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    service: ServiceConfig,
}

impl SqliteStore {
    /// Open an existing store database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database does not exist or cannot be opened.
    pub fn open(path: &Path, service: ServiceConfig) -> Result<Self> {
        Ok(Self::from_connection(super::open_existing(path)?, service))
    }

    #[must_use]
    pub const fn from_connection(conn: Connection, service: ServiceConfig) -> Self {
        Self { conn, service }
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn neighbors(&self, vertex: &str) -> Result<Vec<Hop>> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT to_id, command_json FROM edges WHERE from_id = ?1 \
                 UNION ALL \
                 SELECT from_id, command_json FROM edges \
                 WHERE to_id = ?1 AND kind <> 'snapshot_link'",
            )
            .context("prepare neighbors query")?;
        let rows = stmt
            .query_map(params![vertex], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .context("execute neighbors query")?;

        let mut hops = Vec::new();
        for row in rows {
            let (next, command_json) = row.context("read edge row")?;
            let command: Patch = serde_json::from_str(&command_json)
                .with_context(|| format!("corrupt command on edge {vertex} - {next}"))?;
            hops.push(Hop::new(next, command));
        }
        Ok(hops)
    }

    fn snapshot_data(&self, vertex: &str) -> Result<Option<serde_json::Value>> {
        let data_json: Option<String> = self
            .conn
            .query_row(
                "SELECT data_json FROM snapshots WHERE snapshot_id = ?1",
                params![vertex],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("read snapshot {vertex}"))?;
        data_json
            .map(|json| {
                serde_json::from_str(&json).with_context(|| format!("corrupt snapshot {vertex}"))
            })
            .transpose()
    }
}

impl EventStore for SqliteStore {
    fn service(&self) -> &ServiceConfig {
        &self.service
    }

    fn catalog(&self) -> Result<Catalog> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, kind FROM collections ORDER BY name")
            .context("prepare collections query")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .context("execute collections query")?;
        let mut collections = Vec::new();
        for row in rows {
            let (name, kind) = row.context("read collection row")?;
            let kind: CollectionKind = kind
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .with_context(|| format!("collection {name}"))?;
            collections.push(CollectionInfo { name, kind });
        }

        let mut stmt = self
            .conn
            .prepare(
                "SELECT g.name, gc.collection FROM graphs g \
                 LEFT JOIN graph_collections gc ON gc.graph = g.name \
                 ORDER BY g.name, gc.collection",
            )
            .context("prepare graphs query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })
            .context("execute graphs query")?;
        let mut graphs: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            let (graph, collection) = row.context("read graph row")?;
            let members = graphs.entry(graph).or_default();
            members.extend(collection);
        }

        Ok(Catalog::new(
            collections,
            graphs
                .into_iter()
                .map(|(name, collections)| GraphInfo { name, collections }),
            &self.service,
        ))
    }

    fn latest_events(&self, selection: &Selection) -> Result<Vec<Event>> {
        let mut conditions = vec!["hops > 0".to_string(), "ctime_us <= ?1".to_string()];
        let mut values: Vec<String> = Vec::new();

        if let Some(collections) = selection.filter.collections() {
            if collections.is_empty() {
                return Ok(Vec::new());
            }
            let start = values.len() + 2;
            values.extend(collections.into_iter().map(str::to_string));
            conditions.push(format!("collection IN ({})", placeholders(start, values.len() + 2)));
        }
        if let ScopeFilter::NodeIds(groups) = &selection.filter {
            let start = values.len() + 2;
            values.extend(groups.values().flatten().cloned());
            conditions.push(format!("node IN ({})", placeholders(start, values.len() + 2)));
        }

        let sql = format!(
            "SELECT event_id, node, event, hops, ctime_us, last_snapshot FROM ( \
                 SELECT event_id, node, event, hops, ctime_us, last_snapshot, \
                        ROW_NUMBER() OVER (PARTITION BY node ORDER BY hops DESC) AS rn \
                 FROM events WHERE {} \
             ) WHERE rn = 1 ORDER BY node",
            conditions.join(" AND ")
        );

        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(selection.bound_us)];
        params.extend(
            values
                .into_iter()
                .map(|v| Box::new(v) as Box<dyn rusqlite::types::ToSql>),
        );
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(AsRef::as_ref).collect();

        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("prepare latest_events query: {sql}"))?;
        let rows = stmt
            .query_map(params_from_iter(params_ref), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .context("execute latest_events query")?;

        let mut events = Vec::new();
        for row in rows {
            let (id, node, kind, hops, ctime, last_snapshot) = row.context("read event row")?;
            let event = kind
                .parse::<EventKind>()
                .with_context(|| format!("event {id}"))?;
            let event = Event {
                id,
                node,
                event,
                hops_from_origin: hops,
                ctime,
                last_snapshot,
            };
            if self.service.is_service_collection(event.collection())
                || !selection.filter.admits(&event.node)
            {
                continue;
            }
            events.push(event);
        }
        Ok(events)
    }

    fn shortest_chain(&self, from: &str, to: &str) -> Result<Option<HopPath>> {
        let Some(hops) = chain::shortest(from, to, |vertex| self.neighbors(vertex))? else {
            return Ok(None);
        };
        let mut path = Vec::with_capacity(hops.len());
        for hop in hops {
            let data = self.snapshot_data(&hop.vertex)?;
            path.push(Stop::new(hop.vertex, data, hop.command));
        }
        Ok(Some(path))
    }
}

/// `?start, ?start+1, …` up to (excluding) `end`.
fn placeholders(start: usize, end: usize) -> String {
    (start..end)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
