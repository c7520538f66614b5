//! In-process key-value store with per-key deadlines.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::{KvStore, StoreError, StoreResult};

/// Minimum time between two sweeps of expired entries
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

struct Inner {
    entries: HashMap<String, Entry>,
    last_sweep: Instant,
}

/// Expiring map used by tests and when no Redis URL is configured.
///
/// Reads drop the expired entry they hit. Writes additionally drop every
/// expired entry once per sweep interval, so keys that are never read
/// again do not accumulate.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    sweep_interval: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            sweep_interval,
        }
    }

    /// Number of stored entries, expired ones included until swept
    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>, Instant) -> T) -> StoreResult<T> {
        let mut inner = self.lock()?;
        Ok(f(&mut inner.entries, Instant::now()))
    }

    /// Like `with_entries`, sweeping expired entries first when due
    fn write_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>, Instant) -> T) -> StoreResult<T> {
        let mut inner = self.lock()?;
        let now = Instant::now();

        if now.duration_since(inner.last_sweep) >= self.sweep_interval {
            let before = inner.entries.len();
            inner.entries.retain(|_, entry| entry.is_live(now));
            inner.last_sweep = now;

            let swept = before - inner.entries.len();
            if swept > 0 {
                log::debug!("Swept {} expired entries from memory store", swept);
            }
        }

        Ok(f(&mut inner.entries, now))
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.write_entries(|entries, now| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: now + ttl,
                },
            );
        })
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        self.write_entries(|entries, now| {
            if entries.get(key).is_some_and(|e| e.is_live(now)) {
                return false;
            }
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: now + ttl,
                },
            );
            true
        })
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_entries(|entries, now| match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.with_entries(|entries, _| {
            entries.remove(key);
        })
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        self.with_entries(|entries, now| {
            let Some(entry) = entries.get(key) else {
                return false;
            };
            let live = entry.is_live(now);
            let matched = live && entry.value == expected;

            if matched || !live {
                entries.remove(key);
            }
            matched
        })
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        self.with_entries(|entries, now| match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.expires_at - now),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        self.with_entries(|_, _| ())
    }
}
