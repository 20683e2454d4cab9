//! Test doubles shared by the unit tests in this crate.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use url::Url;

use crate::worker::scope::ScopeTracker;
use crate::{CacheDb, CacheStorage, CachedEntry, Error, GenerationId, Network, Request, Response};

pub const ORIGIN: &str = "https://app.test";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub fn request(path: &str) -> Request {
    Request::get(url(path))
}

pub fn seeds(paths: &[&str]) -> Vec<Url> {
    paths.iter().map(|p| url(p)).collect()
}

/// Scripted network keyed by path. Unscripted paths are unreachable.
#[derive(Default)]
pub struct StubNetwork {
    responses: Mutex<HashMap<String, Option<Response>>>,
    calls: AtomicUsize,
}

impl StubNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &str, response: Response) {
        self.responses.lock().unwrap().insert(path.to_string(), Some(response));
    }

    pub fn fail(&self, path: &str) {
        self.responses.lock().unwrap().insert(path.to_string(), None);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .get(request.path())
            .cloned()
            .flatten()
            .ok_or_else(|| Error::NetworkUnavailable(format!("{} unreachable", request.url)))
    }
}

/// A real in-memory store that counts writes and can be told to fail deletes.
pub struct CountingStorage {
    inner: CacheDb,
    puts: AtomicUsize,
    failing_deletes: Mutex<HashSet<String>>,
}

impl CountingStorage {
    pub fn new(inner: CacheDb) -> Self {
        Self { inner, puts: AtomicUsize::new(0), failing_deletes: Mutex::new(HashSet::new()) }
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn fail_delete(&self, generation: &str) {
        self.failing_deletes.lock().unwrap().insert(generation.to_string());
    }
}

#[async_trait]
impl CacheStorage for CountingStorage {
    async fn open(&self, generation: &GenerationId) -> Result<(), Error> {
        self.inner.open_generation(generation).await
    }

    async fn list(&self) -> Result<Vec<GenerationId>, Error> {
        self.inner.list_generations().await
    }

    async fn delete(&self, generation: &GenerationId) -> Result<bool, Error> {
        if self.failing_deletes.lock().unwrap().contains(generation.as_str()) {
            return Err(Error::CacheUnavailable(format!("cannot delete {generation}")));
        }
        self.inner.delete_generation(generation).await
    }

    async fn get(&self, generation: &GenerationId, key: &str) -> Result<Option<CachedEntry>, Error> {
        self.inner.get_entry(generation, key).await
    }

    async fn put(&self, generation: &GenerationId, entry: &CachedEntry) -> Result<(), Error> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put_entry(generation, entry).await
    }

    async fn mark_active(&self, generation: &GenerationId) -> Result<(), Error> {
        self.inner.mark_active(generation).await
    }

    async fn last_active(&self) -> Result<Option<GenerationId>, Error> {
        self.inner.last_active().await
    }
}

/// A store whose every operation fails at the infrastructure level.
pub struct FailingStorage;

#[async_trait]
impl CacheStorage for FailingStorage {
    async fn open(&self, _generation: &GenerationId) -> Result<(), Error> {
        Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed))
    }

    async fn list(&self) -> Result<Vec<GenerationId>, Error> {
        Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed))
    }

    async fn delete(&self, _generation: &GenerationId) -> Result<bool, Error> {
        Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed))
    }

    async fn get(&self, _generation: &GenerationId, _key: &str) -> Result<Option<CachedEntry>, Error> {
        Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed))
    }

    async fn put(&self, _generation: &GenerationId, _entry: &CachedEntry) -> Result<(), Error> {
        Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed))
    }

    async fn mark_active(&self, _generation: &GenerationId) -> Result<(), Error> {
        Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed))
    }

    async fn last_active(&self) -> Result<Option<GenerationId>, Error> {
        Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed))
    }
}

/// Scopes that never go idle.
pub struct NeverIdle;

#[async_trait]
impl ScopeTracker for NeverIdle {
    async fn wait_idle(&self, _incoming: &GenerationId) {
        std::future::pending::<()>().await
    }

    async fn claim(&self, _generation: &GenerationId) -> usize {
        0
    }
}
