//! Two-level caches over the shared store.

mod credential;
mod result;

pub use credential::{CachingCredentialResolver, CredentialCacheConfig};
pub use result::{cacheable_node_type, ResultCache, ResultCacheConfig};
