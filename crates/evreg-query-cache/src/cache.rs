//! Read-through query cache
//!
//! The cache is shared mutable state without a lock held across `.await`:
//! the internal mutex only guards map bookkeeping, loaders always run
//! outside of it.

use crate::key::QueryKey;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Freshness window used when an entry is written without a prior fetch
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq)]
struct CacheEntry {
    value: Value,
    fetched_at: Instant,
    stale_time: Duration,
    invalidated: bool,
}

impl CacheEntry {
    fn fresh(value: Value, stale_time: Duration) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
            stale_time,
            invalidated: false,
        }
    }

    fn is_stale(&self, now: Instant) -> bool {
        self.invalidated || now.duration_since(self.fetched_at) > self.stale_time
    }
}

/// Cache counters, mostly useful for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of stored entries (fresh or stale)
    pub entries: usize,
    /// `fetch` calls answered from a fresh entry
    pub hits: u64,
    /// `fetch` calls that started a load
    pub misses: u64,
    /// `fetch` calls that joined a load already in flight
    pub shared_loads: u64,
}

/// Prior state of a single cache entry
///
/// Taken by a mutation before it writes a speculative value, and handed back
/// to [`QueryCache::restore`] if the mutation fails.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot {
    key: QueryKey,
    entry: CacheEntry,
}

impl CacheSnapshot {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.entry.value
    }
}

struct InFlight<E> {
    id: u64,
    sender: broadcast::Sender<Result<Value, E>>,
}

struct Inner<E> {
    entries: HashMap<QueryKey, CacheEntry>,
    in_flight: HashMap<QueryKey, InFlight<E>>,
    /// Bumped on every write/remove/invalidate of a key. A load that finishes
    /// under a different epoch than it started with does not store its result.
    epochs: HashMap<QueryKey, u64>,
    next_load_id: u64,
    hits: u64,
    misses: u64,
    shared_loads: u64,
}

impl<E> Inner<E> {
    fn epoch(&self, key: &QueryKey) -> u64 {
        self.epochs.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: &QueryKey) {
        *self.epochs.entry(key.clone()).or_insert(0) += 1;
    }
}

enum Step<E> {
    Hit(Value),
    Wait(broadcast::Receiver<Result<Value, E>>),
    Lead { id: u64, epoch: u64 },
}

/// Keyed query cache
///
/// `E` is the loader error type. It is cloned to every caller that joined a
/// shared load, so it has to be `Clone`.
pub struct QueryCache<E> {
    inner: Mutex<Inner<E>>,
}

impl<E> Default for QueryCache<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for QueryCache<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("stats", &self.stats())
            .finish()
    }
}

impl<E> QueryCache<E> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                epochs: HashMap::new(),
                next_load_id: 0,
                hits: 0,
                misses: 0,
                shared_loads: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Peek at the stored value, stale or not, without loading
    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        self.lock().entries.get(key).map(|e| e.value.clone())
    }

    /// Whether an entry exists for exactly this key
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// `Some(true)` if the entry exists and is stale, `None` if absent
    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        let now = Instant::now();
        self.lock().entries.get(key).map(|e| e.is_stale(now))
    }

    /// Unconditionally overwrite the entry for `key` with a fresh value
    ///
    /// The entry keeps its previous freshness window if it had one.
    pub fn write(&self, key: &QueryKey, value: Value) {
        let mut inner = self.lock();
        let stale_time = inner
            .entries
            .get(key)
            .map(|e| e.stale_time)
            .unwrap_or(DEFAULT_STALE_TIME);
        inner
            .entries
            .insert(key.clone(), CacheEntry::fresh(value, stale_time));
        inner.bump(key);
        debug!("Cache WRITE {}", key);
    }

    /// Delete the entry for `key`, returning its value
    pub fn remove(&self, key: &QueryKey) -> Option<Value> {
        let mut inner = self.lock();
        inner.bump(key);
        let removed = inner.entries.remove(key).map(|e| e.value);
        if removed.is_some() {
            debug!("Cache REMOVE {}", key);
        }
        removed
    }

    /// Mark every entry under `prefix` as stale
    ///
    /// Stale values stay readable through [`get`](Self::get); the next
    /// [`fetch`](Self::fetch) for each key reloads it. Returns the number of
    /// entries affected.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut inner = self.lock();
        let mut touched: Vec<QueryKey> = inner
            .in_flight
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();

        let mut count = 0;
        for (key, entry) in inner.entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                touched.push(key.clone());
                count += 1;
            }
        }
        for key in &touched {
            inner.bump(key);
        }

        debug!("Cache INVALIDATE {} ({} entries)", prefix, count);
        count
    }

    /// Save the current entry for `key`, if there is one
    pub fn snapshot(&self, key: &QueryKey) -> Option<CacheSnapshot> {
        self.lock().entries.get(key).map(|entry| CacheSnapshot {
            key: key.clone(),
            entry: entry.clone(),
        })
    }

    /// Put a saved entry back exactly as it was, fetch time included
    pub fn restore(&self, snapshot: CacheSnapshot) {
        let mut inner = self.lock();
        inner.bump(&snapshot.key);
        debug!("Cache RESTORE {}", snapshot.key);
        inner.entries.insert(snapshot.key, snapshot.entry);
    }

    /// Drop every entry
    ///
    /// Loads still in flight complete for their callers but are not stored.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let pending: Vec<QueryKey> = inner.in_flight.keys().cloned().collect();
        for key in &pending {
            inner.bump(key);
        }
        let keys: Vec<QueryKey> = inner.entries.keys().cloned().collect();
        for key in &keys {
            inner.bump(key);
        }
        inner.entries.clear();
        debug!("Cache CLEAR ({} entries)", keys.len());
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
            shared_loads: inner.shared_loads,
        }
    }
}

impl<E: Clone> QueryCache<E> {
    /// Return the value for `key`, loading it if absent or stale
    ///
    /// A fresh entry (younger than its window and not invalidated) is
    /// returned without calling `loader`. Otherwise `loader` runs, its
    /// successful result is stored with `stale_time` as the new window, and
    /// the result is returned. Callers that arrive while a load for the same
    /// key is in flight wait for that load and receive a clone of its result;
    /// their own `loader` is never called. Errors are not stored.
    pub async fn fetch<F, Fut>(
        &self,
        key: &QueryKey,
        stale_time: Duration,
        loader: F,
    ) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        let (id, epoch) = loop {
            match self.next_step(key) {
                Step::Hit(value) => return Ok(value),
                Step::Wait(mut receiver) => match receiver.recv().await {
                    Ok(result) => return result,
                    Err(_) => {
                        // The loading caller went away before finishing
                        debug!("Shared load for {} was abandoned, retrying", key);
                        continue;
                    }
                },
                Step::Lead { id, epoch } => break (id, epoch),
            }
        };

        let mut guard = LoadGuard {
            cache: self,
            key,
            id,
            armed: true,
        };
        let result = loader().await;
        guard.armed = false;
        self.complete_load(key, id, epoch, stale_time, result)
    }

    /// Force a load for `key`, ignoring any fresh entry
    ///
    /// Joins a load already in flight instead of starting a second one. The
    /// epoch is left alone, so that joined load still stores its result.
    pub async fn refetch<F, Fut>(
        &self,
        key: &QueryKey,
        stale_time: Duration,
        loader: F,
    ) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(entry) = self.lock().entries.get_mut(key) {
            entry.invalidated = true;
        }
        self.fetch(key, stale_time, loader).await
    }

    fn next_step(&self, key: &QueryKey) -> Step<E> {
        let mut inner = self.lock();

        let now = Instant::now();
        if let Some(entry) = inner.entries.get(key).filter(|e| !e.is_stale(now)) {
            let value = entry.value.clone();
            inner.hits += 1;
            debug!("Cache HIT for {}", key);
            return Step::Hit(value);
        }

        if let Some(receiver) = inner.in_flight.get(key).map(|f| f.sender.subscribe()) {
            inner.shared_loads += 1;
            debug!("Cache JOIN in-flight load for {}", key);
            return Step::Wait(receiver);
        }

        inner.misses += 1;
        inner.next_load_id += 1;
        let id = inner.next_load_id;
        let (sender, _) = broadcast::channel(1);
        inner.in_flight.insert(key.clone(), InFlight { id, sender });
        debug!("Cache MISS for {}", key);
        Step::Lead {
            id,
            epoch: inner.epoch(key),
        }
    }

    fn complete_load(
        &self,
        key: &QueryKey,
        id: u64,
        epoch: u64,
        stale_time: Duration,
        result: Result<Value, E>,
    ) -> Result<Value, E> {
        let sender = {
            let mut inner = self.lock();
            let owns_load = inner.in_flight.get(key).map(|f| f.id) == Some(id);
            let sender = if owns_load {
                inner.in_flight.remove(key).map(|f| f.sender)
            } else {
                None
            };

            if let Ok(value) = &result {
                if inner.epoch(key) == epoch {
                    inner
                        .entries
                        .insert(key.clone(), CacheEntry::fresh(value.clone(), stale_time));
                } else {
                    debug!("Discarding superseded load for {}", key);
                }
            }
            sender
        };

        if let Some(sender) = sender {
            // No receivers is fine, nobody joined this load
            let _ = sender.send(result.clone());
        }
        result
    }
}

/// Clears the in-flight marker if the loading future is dropped early
struct LoadGuard<'a, E> {
    cache: &'a QueryCache<E>,
    key: &'a QueryKey,
    id: u64,
    armed: bool,
}

impl<E> Drop for LoadGuard<'_, E> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.cache.lock();
        if inner.in_flight.get(self.key).map(|f| f.id) == Some(self.id) {
            inner.in_flight.remove(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn key(id: &str) -> QueryKey {
        QueryKey::new(["events", "detail", id])
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_skips_loader() {
        let cache: QueryCache<String> = QueryCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .fetch(&key("1"), DEFAULT_STALE_TIME, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"id": "1"}))
                })
                .await
                .unwrap();
            assert_eq!(value["id"], "1");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_reloads() {
        let cache: QueryCache<String> = QueryCache::new();
        let window = Duration::from_secs(120);

        cache
            .fetch(&key("1"), window, || async { Ok(json!(1)) })
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(119)).await;
        let within = cache
            .fetch(&key("1"), window, || async { Ok(json!(2)) })
            .await
            .unwrap();
        assert_eq!(within, json!(1));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.is_stale(&key("1")), Some(true));
        let after = cache
            .fetch(&key("1"), window, || async { Ok(json!(3)) })
            .await
            .unwrap();
        assert_eq!(after, json!(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_load() {
        let cache: Arc<QueryCache<String>> = Arc::new(QueryCache::new());
        cache
            .fetch(&key("1"), DEFAULT_STALE_TIME, || async { Ok(json!("old")) })
            .await
            .unwrap();
        tokio::time::advance(DEFAULT_STALE_TIME + Duration::from_secs(1)).await;

        let calls = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .fetch(&key("1"), DEFAULT_STALE_TIME, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(json!("new"))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), json!("new"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().shared_loads, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_load_error_reaches_all_callers_and_is_not_stored() {
        let cache: Arc<QueryCache<String>> = Arc::new(QueryCache::new());

        let mut handles = Vec::new();
        for _ in 0..3 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache
                    .fetch(&key("1"), DEFAULT_STALE_TIME, || async {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Err("boom".to_string())
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Err("boom".to_string()));
        }
        assert!(!cache.contains(&key("1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_marks_prefix_stale_but_keeps_values() {
        let cache: QueryCache<String> = QueryCache::new();
        let list = QueryKey::new(["events", "list", "page=1"]);
        let other = QueryKey::new(["registrations", "my", "page=1"]);
        cache.write(&list, json!(["a"]));
        cache.write(&key("1"), json!({"id": "1"}));
        cache.write(&other, json!(["r"]));

        assert_eq!(cache.invalidate(&QueryKey::new(["events"])), 2);

        assert_eq!(cache.is_stale(&list), Some(true));
        assert_eq!(cache.is_stale(&key("1")), Some(true));
        assert_eq!(cache.is_stale(&other), Some(false));
        assert_eq!(cache.get(&list), Some(json!(["a"])));

        let reloaded = cache
            .fetch(&list, DEFAULT_STALE_TIME, || async { Ok(json!(["b"])) })
            .await
            .unwrap();
        assert_eq!(reloaded, json!(["b"]));
        assert_eq!(cache.is_stale(&list), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_restore_is_exact() {
        let cache: QueryCache<String> = QueryCache::new();
        assert!(cache.snapshot(&key("1")).is_none());

        cache.write(&key("1"), json!({"registeredCount": 10}));
        let snapshot = cache.snapshot(&key("1")).unwrap();
        assert_eq!(snapshot.key(), &key("1"));

        cache.write(&key("1"), json!({"registeredCount": 9}));
        cache.restore(snapshot);
        assert_eq!(cache.get(&key("1")), Some(json!({"registeredCount": 10})));

        assert_eq!(cache.remove(&key("1")), Some(json!({"registeredCount": 10})));
        assert!(cache.get(&key("1")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_during_load_wins() {
        let cache: Arc<QueryCache<String>> = Arc::new(QueryCache::new());

        let loader_cache = Arc::clone(&cache);
        let load = tokio::spawn(async move {
            loader_cache
                .fetch(&key("1"), DEFAULT_STALE_TIME, || async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(json!("from server"))
                })
                .await
        });
        tokio::task::yield_now().await;

        cache.write(&key("1"), json!("optimistic"));

        assert_eq!(load.await.unwrap().unwrap(), json!("from server"));
        assert_eq!(cache.get(&key("1")), Some(json!("optimistic")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_reloads_fresh_entry_and_joins_inflight_load() {
        let cache: Arc<QueryCache<String>> = Arc::new(QueryCache::new());
        cache
            .fetch(&key("1"), DEFAULT_STALE_TIME, || async { Ok(json!("old")) })
            .await
            .unwrap();

        let reloaded = cache
            .refetch(&key("1"), DEFAULT_STALE_TIME, || async { Ok(json!("forced")) })
            .await
            .unwrap();
        assert_eq!(reloaded, json!("forced"));

        cache.invalidate(&key("1"));
        let leader_cache = Arc::clone(&cache);
        let leader = tokio::spawn(async move {
            leader_cache
                .fetch(&key("1"), DEFAULT_STALE_TIME, || async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(json!("from leader"))
                })
                .await
        });
        tokio::task::yield_now().await;

        let calls = AtomicUsize::new(0);
        let joined = cache
            .refetch(&key("1"), DEFAULT_STALE_TIME, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!("second load"))
            })
            .await
            .unwrap();

        assert_eq!(joined, json!("from leader"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(leader.await.unwrap().unwrap(), json!("from leader"));
        assert_eq!(cache.get(&key("1")), Some(json!("from leader")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_load_lets_waiter_retry() {
        let cache: Arc<QueryCache<String>> = Arc::new(QueryCache::new());

        let leader_cache = Arc::clone(&cache);
        let leader = tokio::spawn(async move {
            leader_cache
                .fetch(&key("1"), DEFAULT_STALE_TIME, || async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(json!("never"))
                })
                .await
        });
        tokio::task::yield_now().await;

        let follower_cache = Arc::clone(&cache);
        let follower = tokio::spawn(async move {
            follower_cache
                .fetch(&key("1"), DEFAULT_STALE_TIME, || async { Ok(json!("retry")) })
                .await
        });
        tokio::task::yield_now().await;

        leader.abort();
        assert_eq!(follower.await.unwrap().unwrap(), json!("retry"));
        assert_eq!(cache.get(&key("1")), Some(json!("retry")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_drops_everything() {
        let cache: QueryCache<String> = QueryCache::new();
        cache.write(&key("1"), json!(1));
        cache.write(&key("2"), json!(2));
        assert_eq!(cache.keys().len(), 2);

        cache.clear();
        assert!(cache.keys().is_empty());
        assert_eq!(cache.stats().entries, 0);
    }
}
