//! Request-handling scopes and the idle check that gates activation.
//!
//! A scope is one long-lived client of the worker (a page, a session).
//! A waiting generation may only take over on its own once no open scope
//! is still controlled by some other generation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::GenerationId;

/// Tracks open scopes on behalf of the lifecycle.
#[async_trait]
pub trait ScopeTracker: Send + Sync {
    /// Resolve once no open scope is controlled by a generation other than `incoming`.
    async fn wait_idle(&self, incoming: &GenerationId);

    /// Move every open scope under `generation`. Returns how many scopes were claimed.
    async fn claim(&self, generation: &GenerationId) -> usize;
}

#[derive(Debug)]
struct Inner {
    scopes: Mutex<HashMap<u64, Option<GenerationId>>>,
    next_id: AtomicU64,
    changed: watch::Sender<u64>,
}

impl Inner {
    fn scopes(&self) -> MutexGuard<'_, HashMap<u64, Option<GenerationId>>> {
        self.scopes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn bump(&self) {
        self.changed.send_modify(|version| *version = version.wrapping_add(1));
    }
}

/// In-process scope registry.
#[derive(Debug, Clone)]
pub struct ScopeRegistry {
    inner: Arc<Inner>,
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeRegistry {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self { inner: Arc::new(Inner { scopes: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1), changed }) }
    }

    /// Open a scope controlled by `controller` (None when nothing is active yet).
    ///
    /// The scope closes when the returned guard is dropped.
    pub fn open(&self, controller: Option<GenerationId>) -> Scope {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.scopes().insert(id, controller);
        self.inner.bump();
        tracing::debug!(scope = id, "scope opened");
        Scope { id, inner: self.inner.clone() }
    }

    pub fn open_count(&self) -> usize {
        self.inner.scopes().len()
    }

    fn is_idle_for(&self, incoming: &GenerationId) -> bool {
        self.inner
            .scopes()
            .values()
            .all(|controller| controller.as_ref().is_none_or(|g| g == incoming))
    }
}

#[async_trait]
impl ScopeTracker for ScopeRegistry {
    async fn wait_idle(&self, incoming: &GenerationId) {
        let mut changed = self.inner.changed.subscribe();
        loop {
            if self.is_idle_for(incoming) {
                return;
            }
            if changed.changed().await.is_err() {
                return;
            }
        }
    }

    async fn claim(&self, generation: &GenerationId) -> usize {
        let claimed = {
            let mut scopes = self.inner.scopes();
            for controller in scopes.values_mut() {
                *controller = Some(generation.clone());
            }
            scopes.len()
        };
        self.inner.bump();
        claimed
    }
}

/// An open scope. Dropping it closes the scope.
#[derive(Debug)]
pub struct Scope {
    id: u64,
    inner: Arc<Inner>,
}

impl Scope {
    pub fn controller(&self) -> Option<GenerationId> {
        self.inner.scopes().get(&self.id).cloned().flatten()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.inner.scopes().remove(&self.id);
        self.inner.bump();
        tracing::debug!(scope = self.id, "scope closed");
    }
}
