//! Per-client sliding-window rate limiting.
//!
//! Process-local and reset on restart: every gateway instance counts on its
//! own. Prune, check and append happen under one shard lock, so admission is
//! exact within a process.

use std::{
    collections::{hash_map::DefaultHasher, HashMap, VecDeque},
    hash::{Hash, Hasher},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};
use tokio::{task::JoinHandle, time::Instant};
use tracing::debug;

const SHARDS: usize = 16;

type Windows = HashMap<String, VecDeque<Instant>>;

#[derive(Debug)]
pub struct SlidingWindowLimiter {
    shards: Vec<Mutex<Windows>>,
    window: Duration,
    max_requests: usize,
}

fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while timestamps
        .front()
        .is_some_and(|&oldest| now.duration_since(oldest) >= window)
    {
        timestamps.pop_front();
    }
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            shards: (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
            window,
            max_requests,
        }
    }

    fn shard(&self, client: &str) -> MutexGuard<'_, Windows> {
        let mut hasher = DefaultHasher::new();
        client.hash(&mut hasher);
        let index = usize::try_from(hasher.finish() % SHARDS as u64).unwrap_or(0);
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit and record a request from `client`, or refuse it without
    /// recording anything.
    pub fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut shard = self.shard(client);
        let timestamps = shard.entry(client.to_string()).or_default();
        prune(timestamps, now, self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }
        timestamps.push_back(now);
        true
    }

    /// Drop clients with no request inside the window. Returns how many were
    /// removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        self.shards
            .iter()
            .map(|shard| {
                let mut windows = shard.lock().unwrap_or_else(PoisonError::into_inner);
                let before = windows.len();
                windows.retain(|_, timestamps| {
                    prune(timestamps, now, self.window);
                    !timestamps.is_empty()
                });
                before - windows.len()
            })
            .sum()
    }

    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    /// Sweep every `every` until the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let removed = limiter.sweep();
                if removed > 0 {
                    debug!(removed, "Swept idle rate-limit windows");
                }
            }
        })
    }
}
