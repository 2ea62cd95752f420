//! Region and entry operations.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

use super::connection::SqliteStorage;
use crate::Error;
use crate::storage::{CachedResponse, StorageBackend};

fn ensure_region(conn: &rusqlite::Connection, name: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO regions (name, created_at) VALUES (?1, ?2)",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    async fn open_region(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> { ensure_region(conn, &name) })
            .await
            .map_err(Error::from)
    }

    async fn has_region(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM regions WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Uses UPSERT semantics: a second write to the same key replaces the
    /// first (last writer wins).
    async fn put(&self, region: &str, key: &str, entry: CachedResponse) -> Result<(), Error> {
        let region = region.to_string();
        let key = key.to_string();
        let headers_json = serde_json::to_string(&entry.headers)
            .map_err(|e| Error::Storage(format!("failed to encode headers: {e}")))?;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_region(&tx, &region)?;
                tx.execute(
                    "INSERT INTO entries (
                    region, key, url, status, content_type, headers_json, body, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(region, key) DO UPDATE SET
                    url = excluded.url,
                    status = excluded.status,
                    content_type = excluded.content_type,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at",
                    params![
                        &region,
                        &key,
                        &entry.url,
                        entry.status,
                        &entry.content_type,
                        &headers_json,
                        entry.body.as_ref(),
                        &entry.stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, region: &str, key: &str) -> Result<Option<CachedResponse>, Error> {
        let region = region.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let row = conn
                    .query_row(
                        "SELECT url, status, content_type, headers_json, body, stored_at
                        FROM entries WHERE region = ?1 AND key = ?2",
                        params![region, key],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, u16>(1)?,
                                row.get::<_, Option<String>>(2)?,
                                row.get::<_, String>(3)?,
                                row.get::<_, Vec<u8>>(4)?,
                                row.get::<_, String>(5)?,
                            ))
                        },
                    )
                    .optional()?;

                let Some((url, status, content_type, headers_json, body, stored_at)) = row else {
                    return Ok(None);
                };

                let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)
                    .map_err(|e| Error::Storage(format!("corrupt headers for {key}: {e}")))?;

                Ok(Some(CachedResponse { url, status, content_type, headers, body: Bytes::from(body), stored_at }))
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, region: &str, key: &str) -> Result<bool, Error> {
        let region = region.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM entries WHERE region = ?1 AND key = ?2", params![region, key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, region: &str) -> Result<Vec<String>, Error> {
        let region = region.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM entries WHERE region = ?1 ORDER BY key")?;
                let keys = stmt
                    .query_map(params![region], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_region(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM regions WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
