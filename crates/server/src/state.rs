//! Shared proxy state handed to every tool.

use std::sync::Arc;

use shelter_client::{FetchClient, FetchConfig, resolve};
use shelter_core::config::AppConfig;
use shelter_core::worker::{ControlChannel, Lifecycle, Scope, ScopeRegistry, control};
use shelter_core::{CacheDb, CacheStorage, CacheWorker, Error, GenerationId, Network};
use tokio::task::JoinHandle;
use url::Url;

/// Everything a tool call needs: the worker, its lifecycle, the control
/// channel and the origin relative targets are resolved against.
#[derive(Debug)]
pub struct ProxyState {
    pub worker: Arc<CacheWorker>,
    pub lifecycle: Arc<Lifecycle>,
    pub control: ControlChannel,
    pub scopes: ScopeRegistry,
    pub origin: Url,
}

impl ProxyState {
    /// Wire the worker, lifecycle and control listener over the given boundaries.
    ///
    /// Must be called inside a tokio runtime (the control listener is spawned).
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, origin: Url, seeds: Vec<Url>) -> Self {
        let scopes = ScopeRegistry::new();
        let lifecycle = Arc::new(Lifecycle::new(storage.clone(), network.clone(), Arc::new(scopes.clone()), seeds));
        let worker = Arc::new(CacheWorker::new(storage, network, lifecycle.clone()));
        let (control, _listener) = control::channel(lifecycle.clone());

        Self { worker, lifecycle, control, scopes, origin }
    }

    /// Open the cache database and build the network client from configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        let seeds = config
            .seed_paths
            .iter()
            .map(|path| resolve(&origin, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        let db = CacheDb::open(&config.db_path).await?;
        let network = FetchClient::new(FetchConfig {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        })?;

        Ok(Self::new(Arc::new(db), Arc::new(network), origin, seeds))
    }

    /// Bring the proxy up for one session.
    ///
    /// The generation that was serving before the restart is restored first,
    /// and the session scope opens under it. If `generation` differs, it is
    /// upgraded to in the background; a failed upgrade leaves the restored
    /// generation serving.
    pub async fn start(&self, generation: GenerationId) -> (Scope, Option<JoinHandle<()>>) {
        let restored = match self.lifecycle.restore().await {
            Ok(restored) => restored,
            Err(e) => {
                tracing::error!(error = %e, "failed to restore previous generation");
                None
            }
        };
        if let Some(restored) = &restored {
            tracing::info!(generation = %restored, "restored previous generation");
        }

        let session = self.scopes.open(self.lifecycle.active().await);
        if restored.as_ref() == Some(&generation) {
            return (session, None);
        }

        let lifecycle = self.lifecycle.clone();
        let upgrade = tokio::spawn(async move {
            match lifecycle.upgrade(&generation).await {
                Ok(true) => {}
                Ok(false) => tracing::info!(%generation, "configured generation replaced before activation"),
                Err(e) => tracing::error!(%generation, error = %e, "failed to bring up configured generation"),
            }
        });
        (session, Some(upgrade))
    }
}

/// State over an in-memory database and an origin nothing listens on.
#[cfg(test)]
pub(crate) async fn offline_state() -> (CacheDb, ProxyState) {
    let db = CacheDb::open_in_memory().await.unwrap();
    let network = FetchClient::new(FetchConfig {
        timeout: std::time::Duration::from_millis(500),
        ..Default::default()
    })
    .unwrap();
    let origin = Url::parse("http://127.0.0.1:1").unwrap();
    let state = ProxyState::new(Arc::new(db.clone()), Arc::new(network), origin, Vec::new());
    (db, state)
}
