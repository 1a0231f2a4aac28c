use async_trait::async_trait;
use std::{collections::HashMap, time::Duration};
use tokio::{sync::Mutex, time::Instant};

use super::{CodeCheck, KeyValueStore, StoreError};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process store with Redis-like expiry semantics.
///
/// Expiry is measured with `tokio::time::Instant`, so tests running on a
/// paused clock can step through TTLs with `tokio::time::advance`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Drop every expired entry. Run on each write so keys that are never read
/// again do not pile up.
fn evict_expired(entries: &mut HashMap<String, Entry>, now: Instant) {
    entries.retain(|_, entry| entry.is_live(now));
}

fn live_counter(
    entries: &HashMap<String, Entry>,
    key: &str,
    now: Instant,
) -> Result<Option<i64>, StoreError> {
    entries
        .get(key)
        .filter(|entry| entry.is_live(now))
        .map(|entry| {
            entry
                .value
                .parse::<i64>()
                .map_err(|_| StoreError::Backend(format!("value at {key} is not an integer")))
        })
        .transpose()
}

fn increment(
    entries: &mut HashMap<String, Entry>,
    key: &str,
    ttl_seconds: u64,
    now: Instant,
) -> Result<i64, StoreError> {
    let count = live_counter(entries, key, now)?.unwrap_or(0) + 1;
    if let Some(entry) = entries.get_mut(key).filter(|_| count > 1) {
        entry.value = count.to_string();
    } else {
        entries.insert(
            key.to_string(),
            Entry {
                value: count.to_string(),
                expires_at: now + Duration::from_secs(ttl_seconds),
            },
        );
    }
    Ok(count)
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let value = entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));
        match value {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, now);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + Duration::from_secs(ttl_seconds),
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let mut removed = 0;
        for key in keys {
            if entries.remove(key).is_some_and(|entry| entry.is_live(now)) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn incr_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, now);
        increment(&mut entries, key, ttl_seconds, now)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, now);
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn check_code(
        &self,
        code_key: &str,
        counter_key: &str,
        candidate: &str,
        max_failures: u32,
        lockout_seconds: u64,
    ) -> Result<CodeCheck, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, now);

        if live_counter(&entries, counter_key, now)?.unwrap_or(0) >= i64::from(max_failures) {
            return Ok(CodeCheck::Locked);
        }
        let Some(code) = entries.get(code_key).map(|entry| entry.value.as_str()) else {
            return Ok(CodeCheck::Missing);
        };
        if code == candidate {
            entries.remove(code_key);
            entries.remove(counter_key);
            return Ok(CodeCheck::Matched);
        }
        increment(&mut entries, counter_key, lockout_seconds, now).map(CodeCheck::Mismatched)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
