//! Credential caching with reduced plaintext residency.
//!
//! Decrypted credentials are cached on two levels with distinct TTLs:
//! the shared store keeps them for a few minutes, the in-process layer
//! for less, so plaintext lingers in this process as briefly as
//! practical. A SET-if-absent lock in the shared store elects a single
//! refresher per credential when tokens need renewing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache;
use serde_json::Value;
use tracing::{debug, warn};
use weave_core::CredentialId;

use crate::error::NodeError;
use crate::handler::{CredentialData, CredentialResolver};
use crate::store::KeyValueStore;

/// Credential cache tuning.
#[derive(Debug, Clone)]
pub struct CredentialCacheConfig {
    /// Shared-store TTL (default 5 min).
    pub store_ttl: Duration,
    /// In-process TTL (default 1 min, tighter on purpose).
    pub local_ttl: Duration,
    /// TTL for the token refresh lock.
    pub refresh_lock_ttl: Duration,
}

impl Default for CredentialCacheConfig {
    fn default() -> Self {
        Self {
            store_ttl: Duration::from_secs(5 * 60),
            local_ttl: Duration::from_secs(60),
            refresh_lock_ttl: Duration::from_secs(30),
        }
    }
}

/// A [`CredentialResolver`] that layers caching over an inner resolver.
///
/// Lookup order: in-process cache, shared store, inner resolver (which
/// repopulates both layers).
pub struct CachingCredentialResolver {
    inner: Arc<dyn CredentialResolver>,
    store: Arc<dyn KeyValueStore>,
    local: Cache<String, CredentialData>,
    config: CredentialCacheConfig,
}

impl CachingCredentialResolver {
    /// Layer default-tuned caching over a resolver.
    #[must_use]
    pub fn new(inner: Arc<dyn CredentialResolver>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(inner, store, CredentialCacheConfig::default())
    }

    /// Layer caching with explicit tuning.
    #[must_use]
    pub fn with_config(
        inner: Arc<dyn CredentialResolver>,
        store: Arc<dyn KeyValueStore>,
        config: CredentialCacheConfig,
    ) -> Self {
        let local = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(config.local_ttl)
            .build();
        Self {
            inner,
            store,
            local,
            config,
        }
    }

    fn store_key(id: &CredentialId) -> String {
        format!("credential:data:{id}")
    }

    fn lock_key(id: &CredentialId) -> String {
        format!("credential:refresh:{id}")
    }

    /// Try to become the refresher for a credential. Only the winner of
    /// the SET-if-absent should perform an OAuth refresh; losers re-read
    /// the cache after the winner finishes.
    pub async fn acquire_refresh_lock(&self, id: &CredentialId) -> bool {
        match self
            .store
            .set_nx(
                &Self::lock_key(id),
                "1".to_owned(),
                Some(self.config.refresh_lock_ttl),
            )
            .await
        {
            Ok(won) => won,
            Err(err) => {
                warn!(credential_id = %id, error = %err, "refresh lock acquisition failed");
                false
            }
        }
    }

    /// Release the refresh lock early (it also expires on its own).
    pub async fn release_refresh_lock(&self, id: &CredentialId) {
        if let Err(err) = self.store.delete(&Self::lock_key(id)).await {
            warn!(credential_id = %id, error = %err, "refresh lock release failed");
        }
    }

    /// Drop one credential from both layers.
    pub async fn invalidate(&self, id: &CredentialId) {
        self.local.invalidate(&Self::store_key(id));
        if let Err(err) = self.store.delete(&Self::store_key(id)).await {
            warn!(credential_id = %id, error = %err, "credential invalidation failed");
        }
    }

    /// Wipe every cached credential.
    pub async fn invalidate_all(&self) {
        self.local.invalidate_all();
        if let Err(err) = self.store.delete_prefix("credential:data:").await {
            warn!(error = %err, "credential bulk invalidation failed");
        }
    }
}

impl std::fmt::Debug for CachingCredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingCredentialResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialResolver for CachingCredentialResolver {
    async fn resolve(&self, id: &CredentialId) -> Result<CredentialData, NodeError> {
        let key = Self::store_key(id);

        if let Some(hit) = self.local.get(&key) {
            debug!(credential_id = %id, "credential cache hit (local)");
            return Ok(hit);
        }

        match self.store.get(&key).await {
            Ok(Some(raw)) => {
                if let Ok(Value::Object(data)) = serde_json::from_str::<Value>(&raw) {
                    debug!(credential_id = %id, "credential cache hit (store)");
                    self.local.insert(key, data.clone());
                    return Ok(data);
                }
                warn!(credential_id = %id, "dropping undecodable cached credential");
            }
            Ok(None) => {}
            Err(err) => {
                warn!(credential_id = %id, error = %err, "credential cache read failed");
            }
        }

        let data = self.inner.resolve(id).await?;
        self.local.insert(key.clone(), data.clone());
        let payload = Value::Object(data.clone()).to_string();
        if let Err(err) = self
            .store
            .set(&key, payload, Some(self.config.store_ttl))
            .await
        {
            warn!(credential_id = %id, error = %err, "credential cache write failed");
        }
        Ok(data)
    }
}
