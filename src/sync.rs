//! Synchronization primitives.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default max idle age before a lock entry is dropped (2 hours).
pub const DEFAULT_MAX_IDLE_AGE: Duration = Duration::from_secs(7200);

/// Maps key to (lock, last access time).
type LockStorage = DashMap<String, (Arc<Mutex<()>>, Instant)>;

/// Per-key async mutex.
///
/// Operations on the same key are serialized while different keys proceed
/// concurrently. The file log store keys these by operation id, which makes
/// its check-then-insert on `create` atomic within one process.
///
/// ```ignore
/// let locks = KeyedLocks::new();
/// let lock = locks.get("op-1");
/// let _guard = lock.lock().await;
/// ```
#[derive(Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<LockStorage>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the lock for `key`, refreshing its last-access time.
    pub fn get(&self, key: &str) -> Arc<Mutex<()>> {
        let now = Instant::now();
        self.locks
            .entry(key.to_string())
            .and_modify(|(_, last_access)| *last_access = now)
            .or_insert_with(|| (Arc::new(Mutex::new(())), now))
            .0
            .clone()
    }

    /// Drop entries idle for longer than `max_age` that nobody else holds.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_stale(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let before = self.locks.len();
        self.locks.retain(|_, (lock, last_access)| {
            Arc::strong_count(lock) > 1 || now.duration_since(*last_access) <= max_age
        });
        before.saturating_sub(self.locks.len())
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
