//! Expiring key/value storage used for OTP codes, attempt counters and
//! session records.
//!
//! Production runs against Redis ([`RedisStore`]); [`MemoryStore`] backs tests
//! and the `memory://` development mode. Both are wrapped in [`Timed`], which
//! bounds every call and retries reads once after a timeout. Writes are never
//! retried so an attempt counter cannot be incremented twice.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use async_trait::async_trait;
use std::{future::Future, sync::Arc, time::Duration};
use tracing::warn;

pub const MEMORY_STORE_URL: &str = "memory://";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store operation timed out")]
    Timeout,
    #[error("store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set `key` to `value`, replacing any previous value and TTL.
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError>;

    /// Delete keys, returning how many existed. Absent keys are not an error.
    async fn del(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// Atomically increment an integer counter. The TTL is applied only when
    /// the increment creates the key (result is 1).
    async fn incr_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64, StoreError>;

    /// Live keys starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Check `candidate` against the code at `code_key` as one atomic step.
    ///
    /// Refuses with [`CodeCheck::Locked`] once the counter at `counter_key`
    /// has reached `max_failures`. A match deletes both keys. A mismatch
    /// increments the counter, applying `lockout_seconds` only when it is
    /// created. An absent code leaves the counter alone.
    async fn check_code(
        &self,
        code_key: &str,
        counter_key: &str,
        candidate: &str,
        max_failures: u32,
        lockout_seconds: u64,
    ) -> Result<CodeCheck, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Outcome of [`KeyValueStore::check_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Locked,
    Missing,
    Matched,
    /// Carries the failure count after the increment.
    Mismatched(i64),
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// Open the store named by `url` and wrap it with `timeout` bounds.
///
/// # Errors
/// Returns an error if the Redis URL is invalid or the connection fails.
pub async fn connect(url: &str, timeout: Duration) -> Result<SharedStore, StoreError> {
    if url == MEMORY_STORE_URL {
        warn!("Using in-process memory store; state is lost on restart");
        return Ok(Arc::new(Timed::new(MemoryStore::new(), timeout)));
    }
    let store = RedisStore::connect(url).await?;
    Ok(Arc::new(Timed::new(store, timeout)))
}

/// Bounds every call with a timeout. Reads are retried once, writes are not.
#[derive(Debug)]
pub struct Timed<S> {
    inner: S,
    timeout: Duration,
}

impl<S: KeyValueStore> Timed<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn read<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        if let Ok(result) = tokio::time::timeout(self.timeout, call()).await {
            return result;
        }
        warn!(operation, "Store read timed out, retrying once");
        tokio::time::timeout(self.timeout, call())
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    async fn write<T, Fut>(&self, operation: &'static str, call: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.timeout, call).await.map_err(|_| {
            warn!(operation, "Store write timed out");
            StoreError::Timeout
        })?
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for Timed<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.read("GET", || self.inner.get(key)).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError> {
        self.write("SET", self.inner.set_ex(key, value, ttl_seconds)).await
    }

    async fn del(&self, keys: &[String]) -> Result<u64, StoreError> {
        self.write("DEL", self.inner.del(keys)).await
    }

    async fn incr_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64, StoreError> {
        self.write("INCR", self.inner.incr_with_ttl(key, ttl_seconds)).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.read("SCAN", || self.inner.scan_prefix(prefix)).await
    }

    async fn check_code(
        &self,
        code_key: &str,
        counter_key: &str,
        candidate: &str,
        max_failures: u32,
        lockout_seconds: u64,
    ) -> Result<CodeCheck, StoreError> {
        self.write(
            "CHECK",
            self.inner
                .check_code(code_key, counter_key, candidate, max_failures, lockout_seconds),
        )
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.read("PING", || self.inner.ping()).await
    }
}
