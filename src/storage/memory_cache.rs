//! In-memory cache with per-entry expiry

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tokio::time::Instant;

use crate::core::cache::Cache;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-memory cache
///
/// Expired entries are never returned; they are dropped lazily on the next
/// write. Uses tokio's clock so tests can pause and advance time.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| e.expires_at > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry
    pub fn clear(&self) -> Result<()> {
        self.entries
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?
            .clear();
        Ok(())
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone()))
    }

    /// A TTL of zero is rejected like Redis `SETEX` rejects it
    async fn set_ex(&self, key: &str, ttl_seconds: u64, value: String) -> Result<()> {
        if ttl_seconds == 0 {
            bail!("invalid expire time for '{}': TTL must be positive", key);
        }
        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(ttl_seconds))
            .ok_or_else(|| anyhow!("TTL of {} seconds is out of range", ttl_seconds))?;

        let mut entries = self
            .entries
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }
}
