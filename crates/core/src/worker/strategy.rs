//! Strategy executors.
//!
//! Each executor sequences store reads, network fetches and store writes
//! for one [`Strategy`]. Only 2xx responses are ever written, and only
//! into the store the caller passed in.

use super::route::Strategy;
use crate::{Error, Network, Request, Response, StoreHandle};

/// Run `request` through the executor for `strategy`.
pub async fn execute(
    strategy: Strategy, request: &Request, store: &StoreHandle, network: &dyn Network,
) -> Result<Response, Error> {
    match strategy {
        Strategy::CacheFirst => cache_first(request, store, network).await,
        Strategy::NetworkFirst => network_first(request, store, network).await,
        Strategy::NetworkOnly => network_only(request, store, network).await,
    }
}

/// Serve from the store; on a miss fetch, store a copy, and return it.
///
/// A stored entry is never revalidated.
pub async fn cache_first(request: &Request, store: &StoreHandle, network: &dyn Network) -> Result<Response, Error> {
    if let Some(entry) = store.get(request).await? {
        tracing::debug!(url = %request.url, generation = %store.generation(), "cache hit");
        return Ok(entry.response);
    }

    tracing::debug!(url = %request.url, "cache miss, fetching");
    let response = network.fetch(request).await?;
    write_back(request, store, &response).await;
    Ok(response)
}

/// Fetch and refresh the store; fall back to the stored entry when offline.
pub async fn network_first(request: &Request, store: &StoreHandle, network: &dyn Network) -> Result<Response, Error> {
    match network.fetch(request).await {
        Ok(response) => {
            write_back(request, store, &response).await;
            Ok(response)
        }
        Err(err) if err.is_network_unavailable() => fallback(request, store, err).await,
        Err(err) => Err(err),
    }
}

/// Fetch without writing; fall back to whatever the store happens to hold.
///
/// Nothing on this path writes the store, so the fallback only hits when
/// another strategy or the seed set stored the same key.
pub async fn network_only(request: &Request, store: &StoreHandle, network: &dyn Network) -> Result<Response, Error> {
    match network.fetch(request).await {
        Ok(response) => Ok(response),
        Err(err) if err.is_network_unavailable() => fallback(request, store, err).await,
        Err(err) => Err(err),
    }
}

async fn fallback(request: &Request, store: &StoreHandle, err: Error) -> Result<Response, Error> {
    match store.get(request).await? {
        Some(entry) => {
            tracing::info!(url = %request.url, stored_at = %entry.stored_at, "network unavailable, serving cached entry");
            Ok(entry.response)
        }
        None => {
            tracing::debug!(url = %request.url, "network unavailable and nothing cached");
            Err(err)
        }
    }
}

/// Write a cacheable response. A failed write does not fail the request.
async fn write_back(request: &Request, store: &StoreHandle, response: &Response) {
    if !response.is_success() {
        tracing::debug!(url = %request.url, status = response.status, "not caching non-success response");
        return;
    }

    if let Err(e) = store.put(request, response).await {
        tracing::warn!(url = %request.url, generation = %store.generation(), error = %e, "failed to store response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingStorage, StubNetwork, request};
    use crate::{CacheDb, GenerationId};
    use std::sync::Arc;

    async fn store() -> (Arc<CountingStorage>, StoreHandle) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let storage = Arc::new(CountingStorage::new(db));
        let handle = StoreHandle::open(storage.clone(), GenerationId::new("v1")).await.unwrap();
        (storage, handle)
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_and_stores() {
        let (storage, store) = store().await;
        let network = StubNetwork::new();
        let fetched = Response::new(200, "png-bytes").with_header("content-type", "image/png");
        network.respond("/media/a.png", fetched.clone());

        let req = request("/media/a.png");
        let response = cache_first(&req, &store, &network).await.unwrap();

        assert_eq!(response, fetched);
        assert_eq!(network.calls(), 1);
        assert_eq!(storage.puts(), 1);
        let entry = store.get(&req).await.unwrap().unwrap();
        assert_eq!(entry.response, fetched);
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let (_, store) = store().await;
        let req = request("/media/a.png");
        let cached = Response::new(200, "cached-png");
        store.put(&req, &cached).await.unwrap();

        let network = StubNetwork::new();
        network.respond("/media/a.png", Response::new(200, "new-png"));

        let response = cache_first(&req, &store, &network).await.unwrap();
        assert_eq!(response, cached);
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_offline_fails() {
        let (storage, store) = store().await;
        let network = StubNetwork::new();

        let result = cache_first(&request("/media/a.png"), &store, &network).await;
        assert!(matches!(result, Err(Error::NetworkUnavailable(_))));
        assert_eq!(storage.puts(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_does_not_store_errors() {
        let (storage, store) = store().await;
        let network = StubNetwork::new();
        network.respond("/media/missing.png", Response::new(404, "not found"));

        let req = request("/media/missing.png");
        let response = cache_first(&req, &store, &network).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(storage.puts(), 0);
        assert!(store.get(&req).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_first_offline_serves_stale_without_write() {
        let (storage, store) = store().await;
        let req = request("/api/settings");
        let stale = Response::new(200, r#"{"volume":3}"#);
        store.put(&req, &stale).await.unwrap();
        let puts_before = storage.puts();

        let network = StubNetwork::new();
        network.fail("/api/settings");

        let response = network_first(&req, &store, &network).await.unwrap();
        assert_eq!(response, stale);
        assert_eq!(network.calls(), 1);
        assert_eq!(storage.puts(), puts_before);
    }

    #[tokio::test]
    async fn test_network_first_success_overwrites() {
        let (_, store) = store().await;
        let req = request("/api/settings");
        store.put(&req, &Response::new(200, r#"{"volume":3}"#)).await.unwrap();

        let network = StubNetwork::new();
        let fresh = Response::new(200, r#"{"volume":7}"#);
        network.respond("/api/settings", fresh.clone());

        let response = network_first(&req, &store, &network).await.unwrap();
        assert_eq!(response, fresh);
        assert_eq!(store.get(&req).await.unwrap().unwrap().response, fresh);
    }

    #[tokio::test]
    async fn test_network_first_offline_and_empty_fails() {
        let (_, store) = store().await;
        let network = StubNetwork::new();
        network.fail("/api/settings");

        let result = network_first(&request("/api/settings"), &store, &network).await;
        assert!(matches!(result, Err(Error::NetworkUnavailable(_))));
    }

    #[tokio::test]
    async fn test_network_only_never_writes() {
        let (storage, store) = store().await;
        let network = StubNetwork::new();
        network.respond("/", Response::new(200, "<html>"));

        let req = request("/");
        let response = network_only(&req, &store, &network).await.unwrap();
        assert_eq!(response.body.as_ref(), b"<html>");
        assert_eq!(storage.puts(), 0);
        assert!(store.get(&req).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_only_falls_back_to_seeded_entry() {
        let (_, store) = store().await;
        let req = request("/");
        let seeded = Response::new(200, "<html>seeded</html>");
        store.put(&req, &seeded).await.unwrap();

        let network = StubNetwork::new();
        network.fail("/");

        let response = network_only(&req, &store, &network).await.unwrap();
        assert_eq!(response, seeded);
    }

    #[tokio::test]
    async fn test_network_only_offline_fails() {
        let (_, store) = store().await;
        let network = StubNetwork::new();

        let result = network_only(&request("/about"), &store, &network).await;
        assert!(matches!(result, Err(Error::NetworkUnavailable(_))));
    }

    #[tokio::test]
    async fn test_execute_dispatches() {
        let (storage, store) = store().await;
        let network = StubNetwork::new();
        network.respond("/api/playlist", Response::new(200, "[]"));

        execute(Strategy::NetworkFirst, &request("/api/playlist"), &store, &network)
            .await
            .unwrap();
        assert_eq!(storage.puts(), 1);
    }
}
