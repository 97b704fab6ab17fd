//! Data cache and invalidation layer
//!
//! List responses are cached per [`CacheKey`]. Concurrent fetches of one key
//! share a single remote call. Writes go through [`DataCache::mutate`], which
//! patches every cached copy of the entity before the remote call, found
//! through a reverse index from entity id to cache keys, and restores the
//! synchronous snapshot if the call fails. Overlapping writes to one row stack
//! as layers, each holding the value it replaced.

use crate::error::{ConsoleError, Result};
use crate::query::CacheKey;
use chrono::{DateTime, Utc};
use console_core::{Entity, EntityId, Teacher, Transaction, User};
use console_service::{ListResponse, ServiceError, ServiceResult};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

type FetchOutput<T> = std::result::Result<Arc<ListResponse<T>>, Arc<ServiceError>>;
type InFlight<T> = Shared<BoxFuture<'static, FetchOutput<T>>>;

/// Cached list response
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    response: Arc<ListResponse<T>>,
    stale: bool,
    fetched_at: DateTime<Utc>,
}

/// One in-flight write on a cached row
///
/// `baseline` is the row as it stood just before this write was applied.
#[derive(Debug, Clone)]
struct PendingRow<T> {
    mutation_id: u64,
    baseline: T,
    patched: T,
}

#[derive(Debug)]
struct CacheState<T> {
    entries: HashMap<CacheKey, CacheEntry<T>>,
    index: HashMap<EntityId, HashSet<CacheKey>>,
    /// Oldest write first
    pending: HashMap<(CacheKey, EntityId), Vec<PendingRow<T>>>,
    epoch: u64,
    next_mutation: u64,
}

impl<T> Default for CacheState<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            index: HashMap::new(),
            pending: HashMap::new(),
            epoch: 0,
            next_mutation: 1,
        }
    }
}

impl<T: Entity> CacheState<T> {
    fn unindex(&mut self, key: &CacheKey) {
        let Some(entry) = self.entries.get(key) else {
            return;
        };
        for item in &entry.response.items {
            if let Some(keys) = self.index.get_mut(item.entity_id()) {
                keys.remove(key);
                if keys.is_empty() {
                    self.index.remove(item.entity_id());
                }
            }
        }
    }

    fn store(&mut self, key: CacheKey, mut response: ListResponse<T>, stale: bool) -> Arc<ListResponse<T>> {
        self.unindex(&key);

        // Rows with writes in flight keep showing the newest optimistic value;
        // the fresh copy becomes the oldest write's baseline.
        for item in &mut response.items {
            let pending_key = (key.clone(), item.entity_id().to_string());
            if let Some(layers) = self.pending.get_mut(&pending_key) {
                if let Some(oldest) = layers.first_mut() {
                    oldest.baseline = item.clone();
                }
                if let Some(newest) = layers.last() {
                    *item = newest.patched.clone();
                }
            }
        }
        self.pending
            .retain(|(pending_key, id), _| pending_key != &key || response.items.iter().any(|i| i.entity_id() == id));

        for item in &response.items {
            self.index
                .entry(item.entity_id().to_string())
                .or_default()
                .insert(key.clone());
        }

        let response = Arc::new(response);
        self.entries.insert(
            key,
            CacheEntry {
                response: Arc::clone(&response),
                stale,
                fetched_at: Utc::now(),
            },
        );
        response
    }

    fn row_mut(&mut self, key: &CacheKey, entity_id: &str) -> Option<&mut T> {
        let entry = self.entries.get_mut(key)?;
        Arc::make_mut(&mut entry.response)
            .items
            .iter_mut()
            .find(|item| item.entity_id() == entity_id)
    }

    /// Remove the layer `mutation_id` left on one row
    ///
    /// Returns the layer's baseline when it was the newest layer, i.e. the
    /// value the row should show if the write is undone. With `hand_down`
    /// set, a newer layer above it takes over that baseline instead.
    fn unstack(&mut self, key: &CacheKey, entity_id: &str, mutation_id: u64, hand_down: bool) -> Option<T> {
        let pending_key = (key.clone(), entity_id.to_string());
        let layers = self.pending.get_mut(&pending_key)?;
        let position = layers.iter().position(|layer| layer.mutation_id == mutation_id)?;
        let removed = layers.remove(position);

        let restore = match layers.get_mut(position) {
            Some(newer) => {
                if hand_down {
                    newer.baseline = removed.baseline;
                }
                None
            }
            None => Some(removed.baseline),
        };
        if layers.is_empty() {
            self.pending.remove(&pending_key);
        }
        restore
    }

    fn keys_holding(&self, entity_id: &str) -> Vec<CacheKey> {
        self.index
            .get(entity_id)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Fresh entries served without a remote call
    pub hits: u64,
    /// Lookups that needed a remote call
    pub misses: u64,
    /// Lookups that joined an in-flight call
    pub coalesced: u64,
    /// Remote list calls issued
    pub remote_fetches: u64,
    /// Optimistic writes rolled back
    pub rollbacks: u64,
    /// Entries currently cached
    pub entries: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    remote_fetches: AtomicU64,
    rollbacks: AtomicU64,
}

/// Read-through, write-optimistic cache for one entity family
pub struct DataCache<T: Entity> {
    state: Arc<RwLock<CacheState<T>>>,
    in_flight: Arc<DashMap<CacheKey, InFlight<T>>>,
    counters: Arc<Counters>,
}

impl<T: Entity> Clone for DataCache<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            in_flight: Arc::clone(&self.in_flight),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<T: Entity> std::fmt::Debug for DataCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCache")
            .field("stats", &self.stats())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl<T: Entity> Default for DataCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> DataCache<T> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState::default())),
            in_flight: Arc::new(DashMap::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Return the cached response for `key`, fetching it when absent or stale
    ///
    /// A fresh entry is returned without awaiting anything. Concurrent calls
    /// for the same key share one invocation of `fetcher`; later callers'
    /// fetchers are dropped unused.
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure; failures are not cached.
    pub async fn fetch_list<F, Fut>(&self, key: CacheKey, fetcher: F) -> Result<Arc<ListResponse<T>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<ListResponse<T>>> + Send + 'static,
    {
        if let Some(response) = self.fresh(&key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(%key, "Cache hit");
            return Ok(response);
        }

        let shared = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(%key, "Joining in-flight fetch");
                occupied.get().clone()
            }
            Entry::Vacant(vacant) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.counters.remote_fetches.fetch_add(1, Ordering::Relaxed);
                debug!(%key, "Cache miss");

                let state = Arc::clone(&self.state);
                let epoch_at_start = state.read().epoch;
                let store_key = key.clone();
                let request = fetcher();
                let task = async move {
                    match request.await {
                        Ok(response) => {
                            let mut state = state.write();
                            let stale = state.epoch != epoch_at_start;
                            if stale {
                                debug!(key = %store_key, "Write landed during fetch, storing as stale");
                            }
                            Ok(state.store(store_key, response, stale))
                        }
                        Err(err) => Err(Arc::new(err)),
                    }
                }
                .boxed()
                .shared();
                vacant.insert(task.clone());
                task
            }
        };

        let outcome = shared.clone().await;
        self.in_flight
            .remove_if(&key, |_, current| Shared::ptr_eq(current, &shared));

        outcome.map_err(|err| {
            warn!(%key, error = %err, "List fetch failed");
            ConsoleError::from(err.as_ref())
        })
    }

    /// Apply `patch` optimistically to every cached copy of `entity_id`, then
    /// run `remote`
    ///
    /// On success every affected key is marked stale so the next read
    /// refetches. On failure the rows are restored to the snapshot taken
    /// before patching, unless a newer write to the same row is still in
    /// flight; that write inherits the snapshot as its own baseline instead.
    /// Older in-flight writes are left untouched. Never retries.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Mutation`] when the remote call fails.
    pub async fn mutate<P, F, Fut, R>(&self, entity_id: &str, patch: P, remote: F) -> Result<R>
    where
        P: Fn(&mut T),
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<R>>,
    {
        let (mutation_id, keys) = self.apply_optimistic(entity_id, &patch);
        info!(entity_id, mutation_id, keys = keys.len(), "Optimistic update applied");

        match remote().await {
            Ok(value) => {
                self.settle(entity_id, mutation_id, &keys);
                info!(entity_id, mutation_id, "Update confirmed");
                Ok(value)
            }
            Err(err) => {
                self.roll_back(entity_id, mutation_id, &keys);
                warn!(entity_id, mutation_id, error = %err, "Update failed, rolled back");
                Err(ConsoleError::mutation(entity_id, err.to_string()))
            }
        }
    }

    fn apply_optimistic(&self, entity_id: &str, patch: &dyn Fn(&mut T)) -> (u64, Vec<CacheKey>) {
        let mut state = self.state.write();
        let mutation_id = state.next_mutation;
        state.next_mutation += 1;
        state.epoch += 1;

        let keys = state.keys_holding(entity_id);
        for key in &keys {
            let Some(row) = state.row_mut(key, entity_id) else {
                continue;
            };
            let current = row.clone();
            patch(row);
            let patched = row.clone();

            state
                .pending
                .entry((key.clone(), entity_id.to_string()))
                .or_default()
                .push(PendingRow {
                    mutation_id,
                    baseline: current,
                    patched,
                });
        }
        (mutation_id, keys)
    }

    fn settle(&self, entity_id: &str, mutation_id: u64, keys: &[CacheKey]) {
        let mut state = self.state.write();
        state.epoch += 1;
        for key in keys {
            state.unstack(key, entity_id, mutation_id, false);
            if let Some(entry) = state.entries.get_mut(key) {
                entry.stale = true;
            }
        }
    }

    fn roll_back(&self, entity_id: &str, mutation_id: u64, keys: &[CacheKey]) {
        let mut state = self.state.write();
        state.epoch += 1;
        for key in keys {
            if let Some(baseline) = state.unstack(key, entity_id, mutation_id, true)
                && let Some(row) = state.row_mut(key, entity_id)
            {
                *row = baseline;
            }
        }
        self.counters.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    fn fresh(&self, key: &CacheKey) -> Option<Arc<ListResponse<T>>> {
        let state = self.state.read();
        state
            .entries
            .get(key)
            .filter(|entry| !entry.stale)
            .map(|entry| Arc::clone(&entry.response))
    }

    /// Cached response for `key`, fresh or stale, without fetching
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<ListResponse<T>>> {
        self.state
            .read()
            .entries
            .get(key)
            .map(|entry| Arc::clone(&entry.response))
    }

    /// Whether `key` is cached but marked for refetch
    pub fn is_stale(&self, key: &CacheKey) -> Option<bool> {
        self.state.read().entries.get(key).map(|entry| entry.stale)
    }

    /// When `key` was last stored
    pub fn fetched_at(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
        self.state.read().entries.get(key).map(|entry| entry.fetched_at)
    }

    /// Cached keys currently holding `entity_id`
    pub fn keys_for(&self, entity_id: &str) -> Vec<CacheKey> {
        self.state.read().keys_holding(entity_id)
    }

    /// Mark every entry of `scope` stale
    pub fn invalidate_scope(&self, scope: &str) -> usize {
        let mut state = self.state.write();
        let mut count = 0;
        for (key, entry) in &mut state.entries {
            if key.scope() == scope && !entry.stale {
                entry.stale = true;
                count += 1;
            }
        }
        debug!(scope, count, "Invalidated scope");
        count
    }

    /// Drop one entry
    pub fn evict(&self, key: &CacheKey) -> bool {
        let mut state = self.state.write();
        state.unindex(key);
        state.pending.retain(|(pending_key, _), _| pending_key != key);
        state.entries.remove(key).is_some()
    }

    /// Counters and entry count
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            remote_fetches: self.counters.remote_fetches.load(Ordering::Relaxed),
            rollbacks: self.counters.rollbacks.load(Ordering::Relaxed),
            entries: self.state.read().entries.len(),
        }
    }
}

/// Process-wide caches, one per entity family
#[derive(Debug, Clone, Default)]
pub struct CacheHub {
    /// User pages
    pub users: DataCache<User>,
    /// Transaction pages
    pub transactions: DataCache<Transaction>,
    /// Teacher pages
    pub teachers: DataCache<Teacher>,
}

impl CacheHub {
    /// Create empty caches
    pub fn new() -> Self {
        Self::default()
    }
}
