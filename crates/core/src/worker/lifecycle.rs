//! Cache generation lifecycle.
//!
//! ```text
//! Installing -> Waiting -> Activating -> Active -> Superseded
//! ```
//!
//! Each phase is an explicit future the host awaits:
//!
//! - [`Lifecycle::install`] opens the new store and populates the seed set.
//!   Any seed failure discards the generation; the active one is untouched.
//! - [`Lifecycle::activate_when_ready`] parks the generation in `Waiting`
//!   until no scope is controlled by an older generation, or until an
//!   adopt-now control signal arrives.
//! - Activation holds the serving lock exclusively while it purges every
//!   other store and claims all scopes, so no request is answered by the
//!   new generation before both steps complete. The activated generation is
//!   recorded in the store, and [`Lifecycle::restore`] brings it back after a
//!   restart.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::{RwLock, RwLockReadGuard, watch};
use url::Url;

use super::scope::ScopeTracker;
use crate::{CacheStorage, Error, GenerationId, Network, Request, StoreHandle};

/// Lifecycle phase of one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Installing,
    Waiting,
    Activating,
    Active,
    Superseded,
}

/// Phase of one known generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct GenerationStatus {
    pub id: GenerationId,
    pub phase: Phase,
}

/// Point-in-time view of the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct LifecycleStatus {
    pub active: Option<GenerationId>,
    pub waiting: Option<GenerationId>,
    pub generations: Vec<GenerationStatus>,
}

#[derive(Debug, Default)]
struct State {
    waiting: Option<GenerationId>,
    adopt_requested: bool,
    phases: Vec<GenerationStatus>,
}

impl State {
    fn set_phase(&mut self, id: &GenerationId, phase: Phase) {
        match self.phases.iter_mut().find(|g| &g.id == id) {
            Some(status) => status.phase = phase,
            None => self.phases.push(GenerationStatus { id: id.clone(), phase }),
        }
    }

    fn forget(&mut self, id: &GenerationId) {
        self.phases.retain(|g| &g.id != id);
    }
}

/// Drives generations from install to active.
pub struct Lifecycle {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    scopes: Arc<dyn ScopeTracker>,
    seeds: Vec<Url>,
    active: RwLock<Option<GenerationId>>,
    state: Mutex<State>,
    adopt: watch::Sender<u64>,
}

impl Lifecycle {
    pub fn new(
        storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, scopes: Arc<dyn ScopeTracker>, seeds: Vec<Url>,
    ) -> Self {
        let (adopt, _) = watch::channel(0);
        Self { storage, network, scopes, seeds, active: RwLock::new(None), state: Mutex::new(State::default()), adopt }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Shared access to the active generation for the duration of a request.
    ///
    /// Activation waits for every outstanding guard before it purges.
    pub async fn serving(&self) -> RwLockReadGuard<'_, Option<GenerationId>> {
        self.active.read().await
    }

    pub async fn active(&self) -> Option<GenerationId> {
        self.active.read().await.clone()
    }

    pub fn waiting(&self) -> Option<GenerationId> {
        self.state().waiting.clone()
    }

    pub fn phase(&self, generation: &GenerationId) -> Option<Phase> {
        self.state()
            .phases
            .iter()
            .find(|g| &g.id == generation)
            .map(|g| g.phase)
    }

    pub async fn status(&self) -> LifecycleStatus {
        let active = self.active().await;
        let state = self.state();
        LifecycleStatus { active, waiting: state.waiting.clone(), generations: state.phases.clone() }
    }

    /// Create and seed a new generation, leaving it `Waiting`.
    ///
    /// A different generation already `Waiting` is replaced and its store removed.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `generation` is already active, waiting or installing
    /// - `CacheUnavailable` if the store cannot be opened
    /// - `SeedPopulationFailed` if any seed entry could not be fetched and stored
    pub async fn install(&self, generation: &GenerationId) -> Result<(), Error> {
        if self.active().await.as_ref() == Some(generation) {
            return Err(Error::InvalidInput(format!("generation {generation} is already active")));
        }

        {
            let mut state = self.state();
            if state.waiting.as_ref() == Some(generation) {
                return Err(Error::InvalidInput(format!("generation {generation} is already waiting")));
            }
            if state.phases.iter().any(|g| &g.id == generation && g.phase == Phase::Installing) {
                return Err(Error::InvalidInput(format!("generation {generation} is already installing")));
            }
            state.set_phase(generation, Phase::Installing);
        }
        tracing::info!(%generation, seeds = self.seeds.len(), "installing generation");

        if let Err(e) = self.populate(generation).await {
            tracing::error!(%generation, error = %e, "install failed, discarding generation");
            let was_waiting = {
                let mut state = self.state();
                state.forget(generation);
                let was_waiting = state.waiting.as_ref() == Some(generation);
                if was_waiting {
                    state.waiting = None;
                    state.adopt_requested = false;
                }
                was_waiting
            };
            if was_waiting {
                self.adopt.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
            }
            self.discard(generation).await;
            return Err(e);
        }

        let replaced = {
            let mut state = self.state();
            let replaced = state.waiting.replace(generation.clone()).filter(|g| g != generation);
            state.adopt_requested = false;
            state.set_phase(generation, Phase::Waiting);
            if let Some(old) = &replaced {
                state.set_phase(old, Phase::Superseded);
            }
            replaced
        };
        if let Some(old) = replaced {
            tracing::info!(%old, new = %generation, "waiting generation replaced");
            self.adopt.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
            self.discard(&old).await;
        }

        tracing::info!(%generation, "generation installed, waiting");
        Ok(())
    }

    async fn populate(&self, generation: &GenerationId) -> Result<(), Error> {
        let store = StoreHandle::open(self.storage.clone(), generation.clone()).await?;

        for url in &self.seeds {
            let request = Request::get(url.clone());
            let failed = |reason: String| Error::SeedPopulationFailed { path: url.path().to_string(), reason };

            let response = self.network.fetch(&request).await.map_err(|e| failed(e.to_string()))?;
            if !response.is_success() {
                return Err(failed(format!("status {}", response.status)));
            }
            store.put(&request, &response).await.map_err(|e| failed(e.to_string()))?;
            tracing::debug!(%generation, url = %url, "seeded");
        }

        Ok(())
    }

    async fn discard(&self, generation: &GenerationId) {
        if let Err(e) = self.storage.delete(generation).await {
            tracing::warn!(%generation, error = %e, "failed to delete discarded generation");
        }
    }

    /// Request immediate takeover by the waiting generation.
    ///
    /// Returns false when nothing is waiting.
    pub fn adopt_now(&self) -> bool {
        let mut state = self.state();
        let Some(waiting) = state.waiting.clone() else {
            return false;
        };
        state.adopt_requested = true;
        drop(state);

        tracing::info!(generation = %waiting, "adopt-now requested");
        self.adopt.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
        true
    }

    /// Wait in `Waiting` until scopes are idle or adopt-now is requested,
    /// then activate.
    ///
    /// Returns `Ok(false)` if `generation` stopped waiting first: another
    /// install replaced it, its install failed, or a concurrent waiter
    /// already activated it.
    pub async fn activate_when_ready(&self, generation: &GenerationId) -> Result<bool, Error> {
        let mut adopt = self.adopt.subscribe();
        loop {
            {
                let state = self.state();
                if state.waiting.as_ref() != Some(generation) {
                    return Ok(false);
                }
                if state.adopt_requested {
                    break;
                }
            }

            tokio::select! {
                _ = self.scopes.wait_idle(generation) => {
                    tracing::debug!(%generation, "no scopes held by older generations");
                    break;
                }
                changed = adopt.changed() => {
                    if changed.is_err() {
                        return Ok(false);
                    }
                }
            }
        }

        self.activate(generation).await
    }

    /// Install then activate once ready.
    pub async fn upgrade(&self, generation: &GenerationId) -> Result<bool, Error> {
        self.install(generation).await?;
        self.activate_when_ready(generation).await
    }

    /// Re-adopt a generation that is already seeded in the store.
    ///
    /// Returns `Ok(false)` if another generation started waiting meanwhile.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the store has no such generation.
    pub async fn resume(&self, generation: &GenerationId) -> Result<bool, Error> {
        let known = self.storage.list().await.map_err(Error::into_cache_unavailable)?;
        if !known.contains(generation) {
            return Err(Error::InvalidInput(format!("generation {generation} is not in the store")));
        }

        {
            let mut state = self.state();
            state.waiting = Some(generation.clone());
            state.set_phase(generation, Phase::Waiting);
        }
        tracing::info!(%generation, "resuming stored generation");
        self.activate(generation).await
    }

    /// Put the generation that was serving before a restart back into service.
    ///
    /// Returns the restored generation, or None if nothing was ever activated.
    pub async fn restore(&self) -> Result<Option<GenerationId>, Error> {
        let Some(generation) = self.storage.last_active().await.map_err(Error::into_cache_unavailable)? else {
            return Ok(None);
        };
        self.resume(&generation).await?;
        Ok(Some(generation))
    }

    /// Returns false without touching anything if `generation` is no longer waiting.
    async fn activate(&self, generation: &GenerationId) -> Result<bool, Error> {
        let mut active = self.active.write().await;

        {
            let mut state = self.state();
            if state.waiting.as_ref() != Some(generation) {
                tracing::debug!(%generation, "no longer waiting, skipping activation");
                return Ok(false);
            }
            state.set_phase(generation, Phase::Activating);
        }
        tracing::info!(%generation, "activating generation");

        let purged = match self.purge_except(generation).await {
            Ok(purged) => purged,
            Err(e) => {
                self.state().set_phase(generation, Phase::Waiting);
                return Err(e);
            }
        };
        let claimed = self.scopes.claim(generation).await;
        if let Err(e) = self.storage.mark_active(generation).await {
            tracing::warn!(%generation, error = %e, "failed to record active generation");
        }
        let previous = active.replace(generation.clone());

        {
            let mut state = self.state();
            state.waiting = None;
            state.adopt_requested = false;
            for status in state.phases.iter_mut() {
                if &status.id != generation && status.phase != Phase::Installing {
                    status.phase = Phase::Superseded;
                }
            }
            state.set_phase(generation, Phase::Active);
        }

        tracing::info!(
            %generation,
            previous = previous.as_ref().map(GenerationId::as_str),
            purged,
            claimed,
            "generation active"
        );
        Ok(true)
    }

    /// Delete every store except `keep`. Individual delete failures are skipped.
    async fn purge_except(&self, keep: &GenerationId) -> Result<usize, Error> {
        let known = self.storage.list().await.map_err(Error::into_cache_unavailable)?;

        let mut purged = 0;
        for generation in known.iter().filter(|g| *g != keep) {
            match self.storage.delete(generation).await {
                Ok(true) => {
                    purged += 1;
                    tracing::info!(%generation, "purged stale generation");
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(%generation, error = %e, "failed to purge stale generation, skipping"),
            }
        }
        Ok(purged)
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("seeds", &self.seeds)
            .field("state", &*self.state())
            .finish_non_exhaustive()
    }
}
