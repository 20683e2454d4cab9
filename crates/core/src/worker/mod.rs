//! Request interception.
//!
//! [`CacheWorker`] is the single entry point for intercepted requests:
//! it pins the active generation, selects a strategy from the request path
//! and runs the matching executor against that generation's store.

pub mod control;
pub mod lifecycle;
pub mod route;
pub mod scope;
pub mod strategy;

use std::sync::Arc;

pub use control::{ControlChannel, ControlListener, ControlSignal};
pub use lifecycle::{GenerationStatus, Lifecycle, LifecycleStatus, Phase};
pub use route::{RouteClass, Strategy};
pub use scope::{Scope, ScopeRegistry, ScopeTracker};

use crate::{CacheStorage, CachedEntry, Error, GenerationId, Network, Request, Response, StoreHandle};

/// A response produced for an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intercepted {
    pub response: Response,
    /// Generation that served the request, None when passed through uncontrolled.
    pub generation: Option<GenerationId>,
    /// Strategy applied, None when caching was bypassed.
    pub strategy: Option<Strategy>,
}

/// Routes intercepted requests through the active generation.
pub struct CacheWorker {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    lifecycle: Arc<Lifecycle>,
}

impl CacheWorker {
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, lifecycle: Arc<Lifecycle>) -> Self {
        Self { storage, network, lifecycle }
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Produce a response for `request`.
    ///
    /// The active generation is pinned for the whole call. Without an active
    /// generation, and for non-GET requests, the request goes straight to the
    /// network.
    ///
    /// # Errors
    ///
    /// `NetworkUnavailable` when the fetch failed and nothing cached could
    /// stand in; `CacheUnavailable` when the active store cannot be used.
    pub async fn handle(&self, request: &Request) -> Result<Intercepted, Error> {
        let serving = self.lifecycle.serving().await;

        let Some(generation) = serving.as_ref() else {
            tracing::debug!(url = %request.url, "no active generation, passing through");
            return self.pass_through(request, None).await;
        };

        if !request.is_get() {
            tracing::debug!(url = %request.url, method = %request.method, "non-GET request, bypassing cache");
            return self.pass_through(request, Some(generation.clone())).await;
        }

        let strategy = route::select(request.path());
        let store = StoreHandle::open(self.storage.clone(), generation.clone()).await?;
        let response = strategy::execute(strategy, request, &store, self.network.as_ref()).await?;

        Ok(Intercepted { response, generation: Some(generation.clone()), strategy: Some(strategy) })
    }

    async fn pass_through(&self, request: &Request, generation: Option<GenerationId>) -> Result<Intercepted, Error> {
        let response = self.network.fetch(request).await?;
        Ok(Intercepted { response, generation, strategy: None })
    }

    /// Read-only lookup in the active generation's store.
    pub async fn lookup(&self, request: &Request) -> Result<Option<(GenerationId, CachedEntry)>, Error> {
        let serving = self.lifecycle.serving().await;
        let Some(generation) = serving.as_ref() else {
            return Ok(None);
        };

        let store = StoreHandle::open(self.storage.clone(), generation.clone()).await?;
        Ok(store.get(request).await?.map(|entry| (generation.clone(), entry)))
    }
}

impl std::fmt::Debug for CacheWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheWorker").field("lifecycle", &self.lifecycle).finish_non_exhaustive()
    }
}
