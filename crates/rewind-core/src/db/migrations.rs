//! Schema migrations, tracked in `PRAGMA user_version`.

use super::schema;
use rusqlite::{Connection, types::Type};

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 1;

const MIGRATIONS: &[(u32, &str)] = &[(1, schema::MIGRATION_V1_SQL)];

/// Read `PRAGMA user_version` as a `u32`.
///
/// # Errors
///
/// Returns an error if querying SQLite fails or the stored value is out of
/// range.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply pending migrations in ascending order, each in its own transaction.
///
/// # Errors
///
/// Returns an error if any migration fails.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.execute(
            "UPDATE store_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(*version)],
        )?;
        tx.commit()?;
        current = *version;
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::{LATEST_SCHEMA_VERSION, current_schema_version, migrate};
    use crate::db::schema;
    use rusqlite::{Connection, params};

    fn object_exists(conn: &Connection, kind: &str, name: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2)",
            params![kind, name],
            |row| row.get(0),
        )
    }

    #[test]
    fn migrate_empty_db_to_latest() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;

        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        assert_eq!(current_schema_version(&conn)?, LATEST_SCHEMA_VERSION);

        for table in [
            "store_meta",
            "collections",
            "graphs",
            "graph_collections",
            "events",
            "snapshots",
            "edges",
        ] {
            assert!(object_exists(&conn, "table", table)?, "missing table {table}");
        }
        for index in schema::REQUIRED_INDEXES {
            assert!(object_exists(&conn, "index", index)?, "missing index {index}");
        }
        Ok(())
    }

    #[test]
    fn migrate_is_idempotent() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;

        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);

        let meta_rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM store_meta", [], |row| row.get(0))?;
        assert_eq!(meta_rows, 1);

        let version: i64 = conn.query_row(
            "SELECT schema_version FROM store_meta WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(version, i64::from(LATEST_SCHEMA_VERSION));
        Ok(())
    }
}
