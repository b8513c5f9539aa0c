//! SQLite schema for the engine state store
//!
//! Migrations are applied in order, each inside its own transaction, and the
//! reached version is recorded in `schema_info`. All sync state lives in the
//! single `kv` table; see the module docs of `storage` for its keys.

use rusqlite::{params, Connection, OptionalExtension, Result};
use tracing::info;

/// Migration steps; step `n` takes the schema from version `n` to `n + 1`
const MIGRATIONS: &[&str] = &[
    // 0 -> 1: key-value state
    r#"
    CREATE TABLE IF NOT EXISTS kv (
        key TEXT PRIMARY KEY,
        value BLOB NOT NULL,
        updated_at INTEGER NOT NULL
    );
    "#,
];

/// Version a fully migrated database reports
pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

/// Recorded schema version (0 for a fresh database)
pub fn schema_version(conn: &Connection) -> Result<i32> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_info (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
    )?;
    let recorded: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_info WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(recorded.and_then(|v| v.parse().ok()).unwrap_or(0))
}

/// Bring the schema up to `SCHEMA_VERSION`, returning the version found
pub fn migrate(conn: &mut Connection) -> Result<i32> {
    let found = schema_version(conn)?;

    for (from, step) in MIGRATIONS.iter().enumerate().skip(found.max(0) as usize) {
        let tx = conn.transaction()?;
        tx.execute_batch(step)?;
        tx.execute(
            "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?1)",
            params![(from + 1).to_string()],
        )?;
        tx.commit()?;
        info!("Migrated state schema to version {}", from + 1);
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_migrate_fresh_database() {
        let mut conn = Connection::open_in_memory().unwrap();

        assert_eq!(migrate(&mut conn).unwrap(), 0);
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables = tables(&conn);
        assert!(tables.contains(&"kv".to_string()));
        assert!(tables.contains(&"schema_info".to_string()));
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        assert_eq!(migrate(&mut conn).unwrap(), SCHEMA_VERSION);
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
