//! Cancellation: local registry plus cross-process pub/sub.
//!
//! A single execution runs in one process, but operators can cancel it
//! from anywhere: `cancel` first tries the local registry, then
//! publishes a [`CancellationMessage`] on a well-known channel that the
//! owning process's subscriber loop picks up.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use weave_core::ExecutionId;

use crate::store::PubSub;

/// The channel remote cancellations travel on.
pub const CANCELLATION_CHANNEL: &str = "weave:cancellations";

/// A cancellation request as published across processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationMessage {
    /// The execution to cancel.
    pub execution_id: ExecutionId,
    /// Why it was cancelled.
    pub reason: String,
    /// Who asked.
    pub requested_by: String,
    /// When the request was made.
    pub requested_at: DateTime<Utc>,
}

/// Registry of cancel functions for executions running in this process,
/// with pub/sub fan-in for executions running elsewhere.
pub struct CancellationManager {
    local: DashMap<ExecutionId, CancellationToken>,
    bus: Arc<dyn PubSub>,
}

impl CancellationManager {
    /// Manager over a pub/sub bus.
    #[must_use]
    pub fn new(bus: Arc<dyn PubSub>) -> Self {
        Self {
            local: DashMap::new(),
            bus,
        }
    }

    /// Register a running execution's token. Call at execution start.
    pub fn register(&self, execution_id: ExecutionId, token: CancellationToken) {
        self.local.insert(execution_id, token);
    }

    /// Remove an execution's token. Call on completion.
    pub fn unregister(&self, execution_id: &ExecutionId) {
        self.local.remove(execution_id);
    }

    /// Number of executions registered locally.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.local.len()
    }

    /// Cancel an execution. Local registrations cancel immediately;
    /// otherwise the request is published so the owning process can act
    /// on it.
    pub async fn cancel(&self, execution_id: &ExecutionId, reason: &str, requested_by: &str) {
        if let Some(token) = self.local.get(execution_id) {
            info!(execution_id = %execution_id, reason, requested_by, "cancelling local execution");
            token.cancel();
            return;
        }

        let message = CancellationMessage {
            execution_id: execution_id.clone(),
            reason: reason.to_owned(),
            requested_by: requested_by.to_owned(),
            requested_at: Utc::now(),
        };
        match serde_json::to_string(&message) {
            Ok(payload) => {
                info!(execution_id = %execution_id, "publishing remote cancellation");
                if let Err(err) = self.bus.publish(CANCELLATION_CHANNEL, payload).await {
                    warn!(execution_id = %execution_id, error = %err, "cancellation publish failed");
                }
            }
            Err(err) => warn!(error = %err, "failed to encode cancellation message"),
        }
    }

    /// Run the subscriber loop: parse incoming cancellation messages and
    /// cancel matching local executions; unknown executions are dropped
    /// silently. Runs until the bus subscription closes.
    pub async fn run_subscriber(self: Arc<Self>) {
        let mut rx = match self.bus.subscribe(CANCELLATION_CHANNEL).await {
            Ok(rx) => rx,
            Err(err) => {
                warn!(error = %err, "cancellation subscriber failed to start");
                return;
            }
        };
        loop {
            match rx.recv().await {
                Ok(payload) => match serde_json::from_str::<CancellationMessage>(&payload) {
                    Ok(message) => {
                        if let Some(token) = self.local.get(&message.execution_id) {
                            info!(
                                execution_id = %message.execution_id,
                                reason = %message.reason,
                                "remote cancellation matched local execution"
                            );
                            token.cancel();
                        } else {
                            debug!(
                                execution_id = %message.execution_id,
                                "remote cancellation for execution not running here"
                            );
                        }
                    }
                    Err(err) => warn!(error = %err, "undecodable cancellation message"),
                },
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "cancellation subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

impl std::fmt::Debug for CancellationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationManager")
            .field("registered", &self.local.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBus;
    use std::time::Duration;

    #[tokio::test]
    async fn local_cancel_fires_token() {
        let manager = CancellationManager::new(Arc::new(MemoryBus::new()));
        let token = CancellationToken::new();
        manager.register(ExecutionId::new("e1"), token.clone());

        manager.cancel(&ExecutionId::new("e1"), "user asked", "ops").await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn unregistered_cancel_publishes() {
        let bus = Arc::new(MemoryBus::new());
        let mut rx = bus.subscribe(CANCELLATION_CHANNEL).await.unwrap();
        let manager = CancellationManager::new(bus);

        manager
            .cancel(&ExecutionId::new("elsewhere"), "timeout", "scheduler")
            .await;

        let payload = rx.recv().await.unwrap();
        let message: CancellationMessage = serde_json::from_str(&payload).unwrap();
        assert_eq!(message.execution_id.as_str(), "elsewhere");
        assert_eq!(message.reason, "timeout");
    }

    #[tokio::test]
    async fn subscriber_cancels_matching_execution() {
        let bus = Arc::new(MemoryBus::new());
        let manager = Arc::new(CancellationManager::new(
            Arc::clone(&bus) as Arc<dyn PubSub>
        ));
        let token = CancellationToken::new();
        manager.register(ExecutionId::new("e1"), token.clone());

        let subscriber = tokio::spawn(Arc::clone(&manager).run_subscriber());
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Simulates another process publishing the cancellation.
        let message = CancellationMessage {
            execution_id: ExecutionId::new("e1"),
            reason: "remote".into(),
            requested_by: "other-process".into(),
            requested_at: Utc::now(),
        };
        bus.publish(
            CANCELLATION_CHANNEL,
            serde_json::to_string(&message).unwrap(),
        )
        .await
        .unwrap();

        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("token should cancel");
        subscriber.abort();
    }

    #[tokio::test]
    async fn subscriber_drops_unknown_and_garbage() {
        let bus = Arc::new(MemoryBus::new());
        let manager = Arc::new(CancellationManager::new(
            Arc::clone(&bus) as Arc<dyn PubSub>
        ));
        let subscriber = tokio::spawn(Arc::clone(&manager).run_subscriber());
        tokio::time::sleep(Duration::from_millis(20)).await;

        bus.publish(CANCELLATION_CHANNEL, "not json".into())
            .await
            .unwrap();
        let message = CancellationMessage {
            execution_id: ExecutionId::new("nobody-home"),
            reason: "remote".into(),
            requested_by: "x".into(),
            requested_at: Utc::now(),
        };
        bus.publish(
            CANCELLATION_CHANNEL,
            serde_json::to_string(&message).unwrap(),
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.registered(), 0);
        subscriber.abort();
    }

    #[tokio::test]
    async fn unregister_forgets_execution() {
        let manager = CancellationManager::new(Arc::new(MemoryBus::new()));
        let token = CancellationToken::new();
        manager.register(ExecutionId::new("e1"), token.clone());
        manager.unregister(&ExecutionId::new("e1"));

        manager.cancel(&ExecutionId::new("e1"), "late", "ops").await;
        assert!(!token.is_cancelled());
    }
}
