//! Storage implementations for different backends

use std::sync::Arc;

use anyhow::Result;

use crate::config::{CacheBackend, CacheConfig};
use crate::core::cache::Cache;

pub mod in_memory;
pub mod memory_cache;
#[cfg(feature = "mongodb_backend")]
pub mod mongodb;
#[cfg(feature = "redis")]
pub mod redis;

pub use in_memory::{InMemoryCollection, InMemoryQuery};
pub use memory_cache::InMemoryCache;
#[cfg(feature = "mongodb_backend")]
pub use self::mongodb::{MongoCollection, MongoQuery};
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

/// Build the cache selected by configuration
pub async fn cache_from_config(config: &CacheConfig) -> Result<Arc<dyn Cache>> {
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(InMemoryCache::new())),
        #[cfg(feature = "redis")]
        CacheBackend::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                anyhow::anyhow!("cache.redis_url is required for the redis backend")
            })?;
            Ok(Arc::new(RedisCache::connect(url).await?))
        }
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis => Err(anyhow::anyhow!(
            "cache backend 'redis' requires building with the `redis` feature"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_from_default_config() {
        let cache = cache_from_config(&CacheConfig::default()).await.unwrap();
        cache.set_ex("k", 10, "v".into()).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
