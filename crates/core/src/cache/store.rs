//! The cache store boundary and a generation-bound handle over it.

use std::sync::Arc;

use async_trait::async_trait;

use super::connection::CacheDb;
use super::entries::CachedEntry;
use super::generations::GenerationId;
use crate::{Error, Request, Response};

/// Named, versioned key-value stores provided by the host.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named store if absent.
    async fn open(&self, generation: &GenerationId) -> Result<(), Error>;

    /// All store names, oldest first.
    async fn list(&self) -> Result<Vec<GenerationId>, Error>;

    /// Remove a store and everything in it. Returns false if it did not exist.
    async fn delete(&self, generation: &GenerationId) -> Result<bool, Error>;

    async fn get(&self, generation: &GenerationId, key: &str) -> Result<Option<CachedEntry>, Error>;

    async fn put(&self, generation: &GenerationId, entry: &CachedEntry) -> Result<(), Error>;

    /// Remember `generation` as the serving one across restarts.
    async fn mark_active(&self, generation: &GenerationId) -> Result<(), Error>;

    /// The generation most recently passed to `mark_active` that still exists.
    async fn last_active(&self) -> Result<Option<GenerationId>, Error>;
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, generation: &GenerationId) -> Result<(), Error> {
        self.open_generation(generation).await
    }

    async fn list(&self) -> Result<Vec<GenerationId>, Error> {
        self.list_generations().await
    }

    async fn delete(&self, generation: &GenerationId) -> Result<bool, Error> {
        self.delete_generation(generation).await
    }

    async fn get(&self, generation: &GenerationId, key: &str) -> Result<Option<CachedEntry>, Error> {
        self.get_entry(generation, key).await
    }

    async fn put(&self, generation: &GenerationId, entry: &CachedEntry) -> Result<(), Error> {
        self.put_entry(generation, entry).await
    }

    async fn mark_active(&self, generation: &GenerationId) -> Result<(), Error> {
        if !self.mark_activated(generation).await? {
            return Err(Error::CacheUnavailable(format!("no store named {generation}")));
        }
        Ok(())
    }

    async fn last_active(&self) -> Result<Option<GenerationId>, Error> {
        self.last_activated().await
    }
}

/// One opened store, bound to its generation.
///
/// Every failure coming out of a handle is `CacheUnavailable`.
#[derive(Clone)]
pub struct StoreHandle {
    storage: Arc<dyn CacheStorage>,
    generation: GenerationId,
}

impl StoreHandle {
    /// Open (creating if absent) the store for `generation`.
    pub async fn open(storage: Arc<dyn CacheStorage>, generation: GenerationId) -> Result<Self, Error> {
        storage
            .open(&generation)
            .await
            .map_err(Error::into_cache_unavailable)?;
        Ok(Self { storage, generation })
    }

    pub fn generation(&self) -> &GenerationId {
        &self.generation
    }

    pub async fn get(&self, request: &Request) -> Result<Option<CachedEntry>, Error> {
        self.storage
            .get(&self.generation, &request.cache_key())
            .await
            .map_err(Error::into_cache_unavailable)
    }

    /// Store a copy of `response` under the request's canonical key.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        let entry = CachedEntry::new(request.cache_key(), request.url.to_string(), response.clone());
        self.storage
            .put(&self.generation, &entry)
            .await
            .map_err(Error::into_cache_unavailable)
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle").field("generation", &self.generation).finish()
    }
}
