//! Shared store and pub/sub interfaces, with in-memory reference
//! implementations.
//!
//! The runtime treats both as thread-safe black boxes: caches and
//! progress snapshots go through [`KeyValueStore`], events and remote
//! cancellation through [`PubSub`]. Production deployments back these
//! with an external store; tests and single-process embedders use
//! [`MemoryStore`] and [`MemoryBus`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::error::EngineError;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, EngineError>;

/// Key/value store with per-key TTL and set-if-absent.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a key. Expired keys read as absent.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a key, optionally with a TTL.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> StoreResult<()>;

    /// Write a key only when absent. Returns whether the write won.
    async fn set_nx(&self, key: &str, value: String, ttl: Option<Duration>) -> StoreResult<bool>;

    /// Delete a key.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Delete every key with the prefix, returning how many went.
    async fn delete_prefix(&self, prefix: &str) -> StoreResult<u64>;
}

/// Publish/subscribe channel fan-out.
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Publish a payload on a channel.
    async fn publish(&self, channel: &str, payload: String) -> StoreResult<()>;

    /// Subscribe to a channel.
    async fn subscribe(&self, channel: &str) -> StoreResult<broadcast::Receiver<String>>;
}

/// In-process [`KeyValueStore`] with lazy expiry.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, (String, Option<Instant>)>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn expired(deadline: Option<Instant>) -> bool {
        deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        if let Some(entry) = self.entries.get(key) {
            let (value, deadline) = entry.value().clone();
            drop(entry);
            if Self::expired(deadline) {
                self.entries.remove(key);
                return Ok(None);
            }
            return Ok(Some(value));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> StoreResult<()> {
        let deadline = ttl.map(|t| Instant::now() + t);
        self.entries.insert(key.to_owned(), (value, deadline));
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: String, ttl: Option<Duration>) -> StoreResult<bool> {
        let deadline = ttl.map(|t| Instant::now() + t);
        match self.entries.entry(key.to_owned()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if Self::expired(occupied.get().1) {
                    occupied.insert((value, deadline));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert((value, deadline));
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> StoreResult<u64> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        let count = keys.len() as u64;
        for key in keys {
            self.entries.remove(&key);
        }
        Ok(count)
    }
}

const BUS_CAPACITY: usize = 256;

/// In-process broadcast [`PubSub`].
///
/// Publishing to a channel nobody subscribed to drops the payload, as a
/// real pub/sub bus would.
#[derive(Debug, Default)]
pub struct MemoryBus {
    channels: DashMap<String, broadcast::Sender<String>>,
}

impl MemoryBus {
    /// Empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(channel.to_owned())
            .or_insert_with(|| broadcast::channel(BUS_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl PubSub for MemoryBus {
    async fn publish(&self, channel: &str, payload: String) -> StoreResult<()> {
        // An Err here only means no live subscribers.
        let _ = self.sender(channel).send(payload);
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> StoreResult<broadcast::Receiver<String>> {
        Ok(self.sender(channel).subscribe())
    }
}
