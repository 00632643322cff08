//! Optimistic mutation primitive
//!
//! A mutation moves through `Idle -> Pending -> Succeeded | RolledBack`.
//! Speculative changes snapshot the affected entry first, and only entries
//! that hold a value are touched. On failure every snapshot is put back
//! exactly; on success the snapshots are discarded and the caller reconciles
//! the cache with the server response.
//!
//! ```rust,ignore
//! let mut mutation = OptimisticMutation::new(&cache, "update event");
//! mutation.update::<Event, _>(&events::detail(id), |e| e.apply_patch(patch));
//! let event = mutation.settle(inner.update_event(id, patch)).await?;
//! ```

use evreg_query_cache::{CacheSnapshot, QueryCache, QueryKey};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;

/// Lifecycle of one mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    /// Speculative values are in the cache
    Pending,
    Succeeded,
    RolledBack,
}

/// One in-flight mutation and the snapshots it owns
///
/// Dropping a `Pending` mutation rolls it back.
pub struct OptimisticMutation<'a, E> {
    cache: &'a QueryCache<E>,
    label: &'static str,
    state: MutationState,
    snapshots: Vec<CacheSnapshot>,
}

impl<'a, E> OptimisticMutation<'a, E> {
    pub fn new(cache: &'a QueryCache<E>, label: &'static str) -> Self {
        Self {
            cache,
            label,
            state: MutationState::Idle,
            snapshots: Vec::new(),
        }
    }

    pub fn state(&self) -> MutationState {
        self.state
    }

    /// Number of entries this mutation changed speculatively
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Speculatively edit the cached value at `key` as a `T`
    ///
    /// Nothing happens if the key holds no value or the value is not a `T`.
    pub fn update<T, F>(&mut self, key: &QueryKey, edit: F) -> bool
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        if self.is_settled() {
            return false;
        }
        let Some(snapshot) = self.cache.snapshot(key) else {
            return false;
        };

        let mut current: T = match serde_json::from_value(snapshot.value().clone()) {
            Ok(value) => value,
            Err(e) => {
                debug!("{}: cached {} is not editable: {}", self.label, key, e);
                return false;
            }
        };
        edit(&mut current);
        let speculative = match serde_json::to_value(&current) {
            Ok(value) => value,
            Err(e) => {
                debug!("{}: cannot encode speculative {}: {}", self.label, key, e);
                return false;
            }
        };

        self.snapshots.push(snapshot);
        self.cache.write(key, speculative);
        self.state = MutationState::Pending;
        true
    }

    /// Speculatively drop the cached value at `key`
    pub fn remove(&mut self, key: &QueryKey) -> bool {
        if self.is_settled() {
            return false;
        }
        let Some(snapshot) = self.cache.snapshot(key) else {
            return false;
        };

        self.snapshots.push(snapshot);
        self.cache.remove(key);
        self.state = MutationState::Pending;
        true
    }

    /// Await the server request, rolling back if it fails
    pub async fn settle<T, Err, Fut>(&mut self, request: Fut) -> Result<T, Err>
    where
        Fut: Future<Output = Result<T, Err>>,
        Err: std::fmt::Display,
    {
        self.state = MutationState::Pending;
        match request.await {
            Ok(value) => {
                self.commit();
                Ok(value)
            }
            Err(e) => {
                warn!("{} failed, rolling back: {}", self.label, e);
                self.rollback();
                Err(e)
            }
        }
    }

    /// Keep the speculative values and release the snapshots
    pub fn commit(&mut self) {
        self.snapshots.clear();
        self.state = MutationState::Succeeded;
    }

    /// Put every snapshot back, newest first
    pub fn rollback(&mut self) {
        let count = self.snapshots.len();
        while let Some(snapshot) = self.snapshots.pop() {
            self.cache.restore(snapshot);
        }
        if count > 0 {
            debug!("{}: restored {} cache entries", self.label, count);
        }
        self.state = MutationState::RolledBack;
    }

    fn is_settled(&self) -> bool {
        matches!(
            self.state,
            MutationState::Succeeded | MutationState::RolledBack
        )
    }
}

impl<E> Drop for OptimisticMutation<'_, E> {
    fn drop(&mut self) {
        if self.state == MutationState::Pending {
            warn!("{} dropped while pending, rolling back", self.label);
            self.rollback();
        }
    }
}
