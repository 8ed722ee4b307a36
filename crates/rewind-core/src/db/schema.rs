//! SQLite schema for an imported event log.
//!
//! - `collections`, `graphs`, `graph_collections` hold catalog metadata
//! - `events` holds one row per log event, denormalized with its collection
//! - `snapshots` holds snapshot content as JSON text
//! - `edges` holds every history edge; `command` is a JSON patch array
//! - `store_meta` records the schema version and the last import time

/// Migration v1: catalog, history, and metadata tables.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_import_us INTEGER
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 0);

CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    kind TEXT NOT NULL CHECK (kind IN ('vertex', 'edge'))
);

CREATE TABLE IF NOT EXISTS graphs (
    name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS graph_collections (
    graph TEXT NOT NULL REFERENCES graphs(name) ON DELETE CASCADE,
    collection TEXT NOT NULL,
    PRIMARY KEY (graph, collection)
);

CREATE TABLE IF NOT EXISTS events (
    event_id TEXT PRIMARY KEY,
    node TEXT NOT NULL,
    collection TEXT NOT NULL,
    event TEXT NOT NULL CHECK (event IN ('created', 'updated', 'deleted', 'restored')),
    hops INTEGER NOT NULL,
    ctime_us INTEGER NOT NULL,
    last_snapshot TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS snapshots (
    snapshot_id TEXT PRIMARY KEY,
    data_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS edges (
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('command', 'evt_ss_link', 'snapshot_link')),
    command_json TEXT NOT NULL DEFAULT '[]',
    PRIMARY KEY (from_id, to_id, kind)
);

CREATE INDEX IF NOT EXISTS idx_events_node_hops
    ON events(node, hops DESC);

CREATE INDEX IF NOT EXISTS idx_events_collection_ctime
    ON events(collection, ctime_us);

CREATE INDEX IF NOT EXISTS idx_edges_to
    ON edges(to_id);
";

/// Indexes the selection and chain queries rely on.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_events_node_hops",
    "idx_events_collection_ctime",
    "idx_edges_to",
];
