//! Cached entry reads and writes within one generation.

use std::collections::BTreeMap;

use super::connection::CacheDb;
use super::generations::GenerationId;
use crate::{Error, Response};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response, keyed by canonical request identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub key: String,
    pub url: String,
    pub response: Response,
    pub stored_at: String,
}

impl CachedEntry {
    pub fn new(key: String, url: String, response: Response) -> Self {
        Self { key, url, response, stored_at: chrono::Utc::now().to_rfc3339() }
    }
}

impl CacheDb {
    /// Insert or replace an entry in a generation.
    ///
    /// Fails if the generation does not exist (foreign key).
    pub async fn put_entry(&self, generation: &GenerationId, entry: &CachedEntry) -> Result<(), Error> {
        let generation = generation.as_str().to_string();
        let entry = entry.clone();
        let headers_json = serde_json::to_string(&entry.response.headers)
            .map_err(|e| Error::InvalidInput(format!("failed to serialize headers: {e}")))?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (generation, key, url, status, headers_json, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(generation, key) DO UPDATE SET
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        generation,
                        entry.key,
                        entry.url,
                        entry.response.status,
                        headers_json,
                        entry.response.body.as_ref(),
                        entry.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by key.
    ///
    /// Returns None if the key (or the generation) doesn't exist.
    pub async fn get_entry(&self, generation: &GenerationId, key: &str) -> Result<Option<CachedEntry>, Error> {
        let generation = generation.as_str().to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, url, status, headers_json, body, stored_at
                     FROM entries WHERE generation = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![generation, key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u16>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                });

                let (key, url, status, headers_json, body, stored_at) = match result {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let headers: BTreeMap<String, String> = serde_json::from_str(&headers_json)
                    .map_err(|e| Error::CacheUnavailable(format!("corrupt headers for {url}: {e}")))?;

                Ok(Some(CachedEntry {
                    key,
                    url,
                    response: Response { status, headers, body: body.into() },
                    stored_at,
                }))
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries stored in a generation.
    pub async fn count_entries(&self, generation: &GenerationId) -> Result<u64, Error> {
        let generation = generation.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE generation = ?1",
                    params![generation],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash::compute_request_key;

    fn make_test_entry(url: &str, body: &str) -> CachedEntry {
        let parsed = url::Url::parse(url).unwrap();
        let response = Response::new(200, body.to_string()).with_header("content-type", "text/plain");
        CachedEntry::new(compute_request_key(&parsed), url.to_string(), response)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = GenerationId::new("v1");
        db.open_generation(&generation).await.unwrap();

        let entry = make_test_entry("https://app.test/media/a.png", "png-bytes");
        db.put_entry(&generation, &entry).await.unwrap();

        let retrieved = db.get_entry(&generation, &entry.key).await.unwrap().unwrap();
        assert_eq!(retrieved, entry);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = GenerationId::new("v1");
        db.open_generation(&generation).await.unwrap();

        db.put_entry(&generation, &make_test_entry("https://app.test/api/settings", "old"))
            .await
            .unwrap();
        let fresh = make_test_entry("https://app.test/api/settings", "new");
        db.put_entry(&generation, &fresh).await.unwrap();

        let retrieved = db.get_entry(&generation, &fresh.key).await.unwrap().unwrap();
        assert_eq!(retrieved.response.body.as_ref(), b"new");
        assert_eq!(db.count_entries(&generation).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_entries_are_per_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let v1 = GenerationId::new("v1");
        let v2 = GenerationId::new("v2");
        db.open_generation(&v1).await.unwrap();
        db.open_generation(&v2).await.unwrap();

        let entry = make_test_entry("https://app.test/", "index");
        db.put_entry(&v1, &entry).await.unwrap();

        assert!(db.get_entry(&v2, &entry.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_generation_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = GenerationId::new("v1");
        db.open_generation(&generation).await.unwrap();
        let entry = make_test_entry("https://app.test/", "index");
        db.put_entry(&generation, &entry).await.unwrap();

        db.delete_generation(&generation).await.unwrap();
        assert_eq!(db.count_entries(&generation).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_into_missing_generation_fails() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = make_test_entry("https://app.test/", "index");

        let result = db.put_entry(&GenerationId::new("gone"), &entry).await;
        assert!(matches!(result, Err(Error::Database(_))));
    }
}
