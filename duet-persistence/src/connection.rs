use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::info;

use crate::store::{MemoryStore, RedisStore, StateStore};

/// Opens the store named by `store_url`.
///
/// `memory://` selects the in-process store, `redis://` and `rediss://`
/// select Redis.
pub async fn connect_to_store(store_url: &str) -> Result<Arc<dyn StateStore>> {
    if store_url.starts_with("memory://") {
        info!("Using in-memory state store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    if store_url.starts_with("redis://") || store_url.starts_with("rediss://") {
        let store = RedisStore::connect(store_url).await?;
        info!("Connected to Redis state store");
        return Ok(Arc::new(store));
    }
    bail!("Unsupported store URL: {}", store_url)
}

pub fn connect_to_memory_store() -> Arc<dyn StateStore> {
    Arc::new(MemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_url_selects_memory_store() {
        let store = connect_to_store("memory://").await.unwrap();
        assert!(!store.exists("room:AB12").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_scheme_rejected() {
        assert!(connect_to_store("sqlite://rooms.db").await.is_err());
    }
}
