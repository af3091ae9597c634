//! Key-value cache collaborator

use anyhow::Result;
use async_trait::async_trait;

/// External string cache with per-entry expiry
///
/// Values are serialized JSON. Implementations must treat `set_ex` as a
/// whole-value overwrite (last write wins).
#[async_trait]
pub trait Cache: Send + Sync {
    /// Read a value, `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value that expires after `ttl_seconds`
    async fn set_ex(&self, key: &str, ttl_seconds: u64, value: String) -> Result<()>;
}
