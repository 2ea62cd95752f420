//! Schema migrations for the region store.
//!
//! Versions are applied in ascending order, each inside its own transaction
//! together with its `_migrations` row, so a failed version leaves neither
//! partial schema nor a bookkeeping entry behind.

use tokio_rusqlite::rusqlite::{self, Transaction};
use tokio_rusqlite::{Connection, params};

use crate::Error;

/// Schema versions: (version, SQL batch).
const MIGRATIONS: &[(u32, &str)] = &[(1, include_str!("../../../migrations/001_regions.sql"))];

fn applied_version(conn: &rusqlite::Connection) -> Result<u32, Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    let version = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;
    Ok(version)
}

fn apply(tx: Transaction<'_>, version: u32, sql: &str) -> Result<(), Error> {
    tx.execute_batch(sql)
        .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
    tx.execute(
        "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
        params![version, chrono::Utc::now().to_rfc3339()],
    )?;
    tx.commit()?;
    Ok(())
}

/// Bring the schema up to the latest version.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let current = applied_version(conn)?;
        for &(version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
            apply(conn.transaction()?, version, sql)?;
            tracing::debug!(version, "applied storage migration");
        }
        Ok(())
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn count(conn: &Connection, sql: &'static str) -> i64 {
        conn.call(move |conn| conn.query_row(sql, [], |row| row.get(0)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_twice_is_a_no_op() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let tables = count(
            &conn,
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('regions', 'entries')",
        )
        .await;
        assert_eq!(tables, 2);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM _migrations").await, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_failed_version_rolls_back() {
        let conn = Connection::open_in_memory().await.unwrap();

        let result = conn
            .call(|conn| -> Result<(), Error> {
                applied_version(conn)?;
                apply(conn.transaction()?, 99, "CREATE TABLE half (id INTEGER); NOT VALID SQL;")
            })
            .await
            .map_err(Error::from);

        assert!(matches!(result, Err(Error::MigrationFailed(msg)) if msg.contains("version 99")));
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM sqlite_master WHERE name = 'half'").await, 0);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM _migrations").await, 0);
    }
}
