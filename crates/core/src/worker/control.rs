//! Out-of-band control signals from the host application.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::lifecycle::Lifecycle;

/// A control message. Carries nothing beyond its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ControlSignal {
    /// Promote the waiting generation now, without waiting for idle scopes.
    #[serde(rename = "adopt-now")]
    AdoptNow,

    /// Any kind this build does not know. Ignored.
    #[serde(other)]
    Unknown,
}

/// Applies control signals to the lifecycle.
#[derive(Debug, Clone)]
pub struct ControlListener {
    lifecycle: Arc<Lifecycle>,
}

impl ControlListener {
    pub fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Handle one signal. Returns true if it triggered a takeover.
    pub fn on_message(&self, signal: &ControlSignal) -> bool {
        match signal {
            ControlSignal::AdoptNow => {
                let triggered = self.lifecycle.adopt_now();
                if !triggered {
                    tracing::debug!("adopt-now ignored, no generation waiting");
                }
                triggered
            }
            ControlSignal::Unknown => {
                tracing::debug!("ignoring unknown control signal");
                false
            }
        }
    }

    /// Consume signals until every sender is dropped.
    pub fn spawn(self, mut rx: mpsc::UnboundedReceiver<ControlSignal>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(signal) = rx.recv().await {
                self.on_message(&signal);
            }
            tracing::debug!("control channel closed");
        })
    }
}

/// Fire-and-forget sender side of the control channel.
#[derive(Debug, Clone)]
pub struct ControlChannel {
    tx: mpsc::UnboundedSender<ControlSignal>,
}

impl ControlChannel {
    /// Post a signal. No response is returned; a closed channel drops it.
    pub fn post(&self, signal: ControlSignal) {
        if self.tx.send(signal).is_err() {
            tracing::warn!("control listener stopped, signal dropped");
        }
    }
}

/// Start a listener for `lifecycle` and return the channel feeding it.
pub fn channel(lifecycle: Arc<Lifecycle>) -> (ControlChannel, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = ControlListener::new(lifecycle).spawn(rx);
    (ControlChannel { tx }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{NeverIdle, StubNetwork, seeds};
    use crate::worker::lifecycle::Phase;
    use crate::{CacheDb, GenerationId, Response};
    use std::time::Duration;

    #[test]
    fn test_parse_adopt_now() {
        let signal: ControlSignal = serde_json::from_str(r#"{"kind":"adopt-now"}"#).unwrap();
        assert_eq!(signal, ControlSignal::AdoptNow);
    }

    #[test]
    fn test_parse_legacy_kind_is_unknown() {
        let signal: ControlSignal = serde_json::from_str(r#"{"kind":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(signal, ControlSignal::Unknown);
    }

    #[test]
    fn test_parse_unknown_kind() {
        let signal: ControlSignal = serde_json::from_str(r#"{"kind":"reload-playlist"}"#).unwrap();
        assert_eq!(signal, ControlSignal::Unknown);
    }

    async fn lifecycle() -> (CacheDb, Arc<Lifecycle>) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(StubNetwork::new());
        network.respond("/", Response::new(200, "<html>"));
        let lifecycle = Arc::new(Lifecycle::new(Arc::new(db.clone()), network, Arc::new(NeverIdle), seeds(&["/"])));
        (db, lifecycle)
    }

    #[tokio::test]
    async fn test_unknown_signal_is_noop() {
        let (_, lifecycle) = lifecycle().await;
        lifecycle.install(&GenerationId::new("v1")).await.unwrap();

        let listener = ControlListener::new(lifecycle.clone());
        assert!(!listener.on_message(&ControlSignal::Unknown));
        assert_eq!(lifecycle.phase(&GenerationId::new("v1")), Some(Phase::Waiting));
    }

    #[tokio::test]
    async fn test_posted_adopt_now_activates_waiting_generation() {
        let (db, lifecycle) = lifecycle().await;
        let v1 = GenerationId::new("v1");
        db.open_generation(&v1).await.unwrap();
        lifecycle.resume(&v1).await.unwrap();

        let v2 = GenerationId::new("v2");
        lifecycle.install(&v2).await.unwrap();
        let waiter = {
            let lifecycle = lifecycle.clone();
            let v2 = v2.clone();
            tokio::spawn(async move { lifecycle.activate_when_ready(&v2).await })
        };

        let (control, _listener) = channel(lifecycle.clone());
        control.post(serde_json::from_str(r#"{"kind":"adopt-now"}"#).unwrap());

        let activated = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(activated.unwrap());
        assert_eq!(lifecycle.active().await, Some(v2.clone()));
        assert_eq!(db.list_generations().await.unwrap(), vec![v2]);
    }
}
