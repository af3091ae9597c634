//! Redis-backed cache (`GET` / `SETEX`)

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::core::cache::Cache;

/// Cache stored in Redis
///
/// The connection manager reconnects on its own; a failed command surfaces
/// as an error to the caller.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    /// Optional key prefix for namespacing (e.g., "campus:")
    prefix: String,
}

impl RedisCache {
    /// Connect without a key prefix
    pub async fn connect(url: &str) -> Result<Self> {
        Self::with_prefix(url, None).await
    }

    /// Connect, prepending `prefix` to every key
    pub async fn with_prefix(url: &str, prefix: Option<&str>) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid Redis URL")?;
        let connection = ConnectionManager::new(client)
            .await
            .context("failed to connect to Redis")?;

        tracing::info!("Connected to Redis");

        Ok(Self {
            connection,
            prefix: prefix.unwrap_or("").to_string(),
        })
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(self.prefixed_key(key)).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, ttl_seconds: u64, value: String) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(self.prefixed_key(key), value, ttl_seconds)
            .await?;
        Ok(())
    }
}
