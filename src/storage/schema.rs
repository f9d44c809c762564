//! SQLite schema and migrations for the telemetry database.
//!
//! Table migrations are tracked in `schema_migrations`. Separately,
//! [`CURRENT_SCHEMA_VERSION`] tags detail aggregate rows: bumping it marks
//! every existing aggregate logically stale without deleting it, which makes
//! the next sync recompute exactly the outdated rows.

use rusqlite::Connection;

use crate::error::{Result, TmsError};

/// Version stamped on detail aggregate rows at computation time.
///
/// Bump this whenever the aggregate computation changes; stale rows remain
/// readable until the background sync replaces them.
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("../../migrations/001_summaries.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("../../migrations/002_detail_aggregates.sql"),
    },
    Migration {
        version: 3,
        sql: include_str!("../../migrations/003_sync_state.sql"),
    },
];

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: i32,
    sql: &'static str,
}

/// Run table migrations, returning the latest version applied.
///
/// # Errors
/// Returns an error if creating the migrations table, reading the version,
/// or applying any migration fails.
pub fn run_migrations(conn: &mut Connection) -> Result<i32> {
    ensure_schema_migrations_table(conn)?;

    let mut current_version = get_schema_version(conn)?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            apply_migration(conn, migration)?;
            current_version = migration.version;
        }
    }

    Ok(current_version)
}

fn ensure_schema_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
            version INTEGER PRIMARY KEY,\
            applied_at TEXT DEFAULT (datetime('now'))\
        );",
    )?;
    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let version: Option<i32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

fn apply_migration(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(migration.sql).map_err(|e| {
        TmsError::Storage(format!("apply migration {}: {e}", migration.version))
    })?;

    tx.execute(
        "INSERT INTO schema_migrations (version) VALUES (?1)",
        [migration.version],
    )?;

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_in_memory() -> Connection {
        Connection::open_in_memory().expect("open in-memory db")
    }

    #[test]
    fn migrations_create_schema() {
        let mut conn = open_in_memory();
        let version = run_migrations(&mut conn).expect("run migrations");

        assert_eq!(version, 3);

        for table in [
            "drive_summaries",
            "charge_summaries",
            "drive_detail_aggregates",
            "charge_detail_aggregates",
            "sync_state",
        ] {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .expect("query table existence");
            assert_eq!(exists, 1, "missing table {table}");
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = open_in_memory();
        run_migrations(&mut conn).expect("first run");
        let version = run_migrations(&mut conn).expect("second run");
        assert_eq!(version, 3);

        let applied: i32 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .expect("count migrations");
        assert_eq!(applied, 3);
    }
}
