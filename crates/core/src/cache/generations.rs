//! Generation bookkeeping: create, enumerate and delete named stores.

use std::fmt;

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Name of one versioned cache store.
///
/// Opaque to the rest of the system; ordering between generations comes
/// from the store (creation order), not from the string itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct GenerationId(String);

impl GenerationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl CacheDb {
    /// Create the generation if it does not exist yet.
    ///
    /// Opening an existing generation leaves its creation time and entries untouched.
    pub async fn open_generation(&self, generation: &GenerationId) -> Result<(), Error> {
        let id = generation.as_str().to_string();
        let created_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO generations (id, created_at) VALUES (?1, ?2)
                     ON CONFLICT(id) DO NOTHING",
                    params![id, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// List every known generation, oldest first.
    pub async fn list_generations(&self) -> Result<Vec<GenerationId>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<GenerationId>, Error> {
                let mut stmt = conn.prepare("SELECT id FROM generations ORDER BY created_at ASC, rowid ASC")?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ids.into_iter().map(GenerationId).collect())
            })
            .await
            .map_err(Error::from)
    }

    /// Record that `generation` has just become the serving generation.
    ///
    /// Returns false if the generation does not exist.
    pub async fn mark_activated(&self, generation: &GenerationId) -> Result<bool, Error> {
        let id = generation.as_str().to_string();
        let activated_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "UPDATE generations SET activated_at = ?2 WHERE id = ?1",
                    params![id, activated_at],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// The most recently activated generation still in the store.
    pub async fn last_activated(&self) -> Result<Option<GenerationId>, Error> {
        self.conn
            .call(|conn| -> Result<Option<GenerationId>, Error> {
                let result = conn.query_row(
                    "SELECT id FROM generations WHERE activated_at IS NOT NULL
                     ORDER BY activated_at DESC, rowid DESC LIMIT 1",
                    [],
                    |row| row.get::<_, String>(0),
                );
                match result {
                    Ok(id) => Ok(Some(GenerationId(id))),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and, by cascade, all of its entries.
    ///
    /// Returns false if the generation did not exist.
    pub async fn delete_generation(&self, generation: &GenerationId) -> Result<bool, Error> {
        let id = generation.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
