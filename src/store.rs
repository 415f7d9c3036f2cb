//! Tag-indexed query store.
//!
//! Holds raw response bodies per [`QueryKey`], the tags each entry provides,
//! and at most one in-flight fetch per key. Invalidating a tag marks
//! the entries that provided it stale; they are refetched on next access.
//! Entries without subscribers are evicted after the keep-unused window.

use crate::error::{Error, Result};
use crate::key::QueryKey;
use crate::observability::{NoOpMetrics, StoreMetrics};
use crate::tag::Tag;
use dashmap::DashMap;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Response body as received, shared between the store and every reader.
pub type CachedBytes = Arc<Vec<u8>>;

type SharedFetch = Shared<BoxFuture<'static, Result<CachedBytes>>>;

/// Outcome of a successful fetch: the raw JSON body and the tags it provides.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Vec<u8>,
    pub tags: Vec<Tag>,
}

impl Fetched {
    pub fn new(body: Vec<u8>, tags: Vec<Tag>) -> Self {
        Fetched { body, tags }
    }
}

/// Whether a read may be served from a fresh entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Serve fresh data, fetch on miss or stale.
    Cached,
    /// Always go to the network (joins a request already in flight).
    Forced,
}

struct Entry {
    /// Identity of this incarnation of the key; survives refetches, not eviction.
    epoch: u64,
    data: Option<CachedBytes>,
    provided: Vec<Tag>,
    stale: bool,
    in_flight: Option<(u64, SharedFetch)>,
    subscribers: usize,
    idle_generation: u64,
    fulfilled_at: Option<Instant>,
    invalidations: watch::Sender<u64>,
}

impl Entry {
    fn new(epoch: u64) -> Self {
        let (invalidations, _) = watch::channel(0);
        Entry {
            epoch,
            data: None,
            provided: Vec::new(),
            stale: false,
            in_flight: None,
            subscribers: 0,
            idle_generation: 0,
            fulfilled_at: None,
            invalidations,
        }
    }

    fn is_idle(&self) -> bool {
        self.subscribers == 0 && self.in_flight.is_none()
    }
}

struct StoreInner {
    entries: DashMap<QueryKey, Entry>,
    tags: DashMap<Tag, HashSet<QueryKey>>,
    /// Tags invalidated while each request was running, by request id.
    invalidated_during: DashMap<u64, HashSet<Tag>>,
    keep_unused_for: Duration,
    metrics: Box<dyn StoreMetrics>,
    next_id: AtomicU64,
}

/// Explicitly owned cache of query results.
///
/// Cloning is cheap and shares the same state. Each client owns one store, so
/// independent clients never see each other's entries.
///
/// # Example
///
/// ```ignore
/// let store = QueryStore::new(Duration::from_secs(10));
/// let key = QueryKey::unit("listPosts");
/// let bytes = store
///     .query(&key, FetchMode::Cached, || async { fetch_list().await })
///     .await?;
/// ```
#[derive(Clone)]
pub struct QueryStore {
    inner: Arc<StoreInner>,
}

impl QueryStore {
    pub fn new(keep_unused_for: Duration) -> Self {
        QueryStore::with_metrics(keep_unused_for, Box::new(NoOpMetrics))
    }

    pub fn with_metrics(keep_unused_for: Duration, metrics: Box<dyn StoreMetrics>) -> Self {
        QueryStore {
            inner: Arc::new(StoreInner {
                entries: DashMap::new(),
                tags: DashMap::new(),
                invalidated_during: DashMap::new(),
                keep_unused_for,
                metrics,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn keep_unused_for(&self) -> Duration {
        self.inner.keep_unused_for
    }

    /// Register interest in `key`, creating its entry if needed.
    ///
    /// The entry is not evicted while the returned lease is alive. The receiver
    /// ticks every time the entry is invalidated.
    pub fn acquire(&self, key: &QueryKey) -> (Lease, watch::Receiver<u64>) {
        let mut entry = self
            .inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(self.inner.next_id()));
        entry.subscribers += 1;

        let lease = Lease {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            epoch: entry.epoch,
        };
        (lease, entry.invalidations.subscribe())
    }

    /// Read `key`, fetching with `fetch` on miss, when stale, or when forced.
    ///
    /// Concurrent callers for the same key share one request. The request runs
    /// on its own task, so dropping this future does not cancel it; the result
    /// still lands in the store.
    ///
    /// # Errors
    ///
    /// Returns whatever `fetch` failed with. A failed fetch leaves previously
    /// cached data and tags untouched.
    pub async fn query<F, Fut>(
        &self,
        key: &QueryKey,
        mode: FetchMode,
        fetch: F,
    ) -> Result<CachedBytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Fetched>> + Send + 'static,
    {
        let (_lease, _) = self.acquire(key);

        let shared = {
            let mut entry = self
                .inner
                .entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(self.inner.next_id()));

            if let (FetchMode::Cached, false, Some(data)) = (mode, entry.stale, &entry.data) {
                debug!("✓ Query hit for {}", key);
                self.inner.metrics.record_hit(key);
                return Ok(Arc::clone(data));
            }

            let joined = entry.in_flight.as_ref().map(|(_, f)| f.clone());
            match joined {
                Some(in_flight) => {
                    debug!("Joining in-flight request for {}", key);
                    in_flight
                }
                None => self.inner.start_fetch(&mut entry, key, fetch()),
            }
        };

        shared.await
    }

    /// Mark every entry providing one of `tags` stale.
    ///
    /// Requests still in flight remember the tags; a result that provides one
    /// of them lands stale. Returns the number of distinct stored entries
    /// affected.
    pub fn invalidate_tags(&self, tags: &[Tag]) -> usize {
        // Recorded before reading the tag index: a request completing
        // concurrently either sees these tags or has already indexed its own.
        for mut pending in self.inner.invalidated_during.iter_mut() {
            pending.extend(tags.iter().cloned());
        }

        let mut affected: HashSet<QueryKey> = HashSet::new();

        for tag in tags {
            let keys: Vec<QueryKey> = self
                .inner
                .tags
                .get(tag)
                .map(|keys| keys.iter().cloned().collect())
                .unwrap_or_default();

            let mut count = 0;
            for key in keys {
                if let Some(mut entry) = self.inner.entries.get_mut(&key) {
                    entry.stale = true;
                    entry.invalidations.send_modify(|n| *n += 1);
                    count += 1;
                    affected.insert(key);
                }
            }

            debug!("» Invalidated tag {} ({} entries)", tag, count);
            self.inner.metrics.record_invalidation(tag, count);
        }

        affected.len()
    }

    /// Drop every entry and tag. In-flight requests still resolve for their
    /// callers but are not stored.
    pub fn reset(&self) {
        let count = self.inner.entries.len();
        self.inner.entries.clear();
        self.inner.tags.clear();
        self.inner.invalidated_during.clear();
        info!("✓ Query store reset ({} entries dropped)", count);
    }

    /// Read a fresh or stale entry without fetching.
    pub fn peek(&self, key: &QueryKey) -> Option<CachedBytes> {
        self.inner.entries.get(key).and_then(|e| e.data.clone())
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Whether the entry was invalidated since it was last filled.
    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        self.inner.entries.get(key).map(|e| e.stale)
    }

    /// Tags the entry currently provides.
    pub fn provided_tags(&self, key: &QueryKey) -> Option<Vec<Tag>> {
        self.inner.entries.get(key).map(|e| e.provided.clone())
    }

    /// Keys currently providing `tag`.
    pub fn keys_for_tag(&self, tag: &Tag) -> Vec<QueryKey> {
        self.inner
            .tags
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.inner.entries.get(key).map_or(0, |e| e.subscribers)
    }

    /// When the entry was last filled.
    pub fn fulfilled_at(&self, key: &QueryKey) -> Option<Instant> {
        self.inner.entries.get(key).and_then(|e| e.fulfilled_at)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

impl StoreInner {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn start_fetch<Fut>(
        self: &Arc<Self>,
        entry: &mut Entry,
        key: &QueryKey,
        fut: Fut,
    ) -> SharedFetch
    where
        Fut: Future<Output = Result<Fetched>> + Send + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("✗ No tokio runtime to fetch {}", key);
            let err = Error::ApplicationError(format!("no tokio runtime to fetch {}", key));
            return future::ready(Err(err)).boxed().shared();
        };

        let request_id = self.next_id();
        let epoch = entry.epoch;
        let inner = Arc::clone(self);
        let task_key = key.clone();

        debug!("» Fetching {} (request {})", key, request_id);
        self.metrics.record_fetch(key);
        self.invalidated_during.insert(request_id, HashSet::new());

        let handle = runtime.spawn(async move {
            let started = Instant::now();
            let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => Err(Error::ApplicationError(format!(
                    "fetch for {} panicked: {}",
                    task_key,
                    panic_message(panic.as_ref())
                ))),
            };
            inner.complete(&task_key, epoch, request_id, outcome, started)
        });

        // The entry holds this future, so it must not keep the store alive.
        let store = Arc::downgrade(self);
        let join_key = key.clone();
        let shared = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let err = Error::ApplicationError(format!("fetch task failed: {}", e));
                    match store.upgrade() {
                        Some(store) => {
                            store.complete(&join_key, epoch, request_id, Err(err), Instant::now())
                        }
                        None => Err(err),
                    }
                }
            }
        }
        .boxed()
        .shared();

        entry.in_flight = Some((request_id, shared.clone()));
        shared
    }

    fn complete(
        self: &Arc<Self>,
        key: &QueryKey,
        epoch: u64,
        request_id: u64,
        outcome: Result<Fetched>,
        started: Instant,
    ) -> Result<CachedBytes> {
        let Some(mut entry) = self.entries.get_mut(key).filter(|e| e.epoch == epoch) else {
            // Entry was reset or evicted while the request ran.
            self.invalidated_during.remove(&request_id);
            debug!("Discarding result for {}: entry no longer present", key);
            return outcome.map(|fetched| Arc::new(fetched.body));
        };

        if matches!(entry.in_flight, Some((id, _)) if id == request_id) {
            entry.in_flight = None;
        }

        match outcome {
            Ok(fetched) => {
                let bytes = Arc::new(fetched.body);
                let previous = std::mem::replace(&mut entry.provided, fetched.tags);
                self.retag(key, &previous, &entry.provided);

                // Taken after retagging, under the entry lock, so no
                // invalidation falls between the two.
                let invalidated = self
                    .invalidated_during
                    .remove(&request_id)
                    .map(|(_, tags)| tags)
                    .unwrap_or_default();
                let landed_stale = entry.provided.iter().any(|t| invalidated.contains(t));

                entry.data = Some(Arc::clone(&bytes));
                entry.stale = landed_stale;
                entry.fulfilled_at = Some(Instant::now());
                if landed_stale {
                    entry.invalidations.send_modify(|n| *n += 1);
                }

                let idle = entry.is_idle();
                drop(entry);

                if landed_stale {
                    debug!("» {} landed stale: invalidated while in flight", key);
                }
                info!("✓ Fetched {} in {:?}", key, started.elapsed());
                self.metrics.record_fulfilled(key, started.elapsed());

                if idle {
                    self.schedule_eviction(key);
                }
                Ok(bytes)
            }
            Err(e) => {
                self.invalidated_during.remove(&request_id);
                let idle = entry.is_idle();
                drop(entry);

                warn!("✗ Fetch failed for {}: {}", key, e);
                self.metrics.record_error(key, &e.to_string());

                if idle {
                    self.schedule_eviction(key);
                }
                Err(e)
            }
        }
    }

    fn retag(&self, key: &QueryKey, previous: &[Tag], current: &[Tag]) {
        for tag in previous.iter().filter(|t| !current.contains(t)) {
            self.untag(key, tag);
        }
        for tag in current {
            self.tags.entry(tag.clone()).or_default().insert(key.clone());
        }
    }

    fn untag(&self, key: &QueryKey, tag: &Tag) {
        if let Some(mut keys) = self.tags.get_mut(tag) {
            keys.remove(key);
        }
        self.tags.remove_if(tag, |_, keys| keys.is_empty());
    }

    fn release(self: &Arc<Self>, key: &QueryKey, epoch: u64) {
        let idle = match self.entries.get_mut(key) {
            Some(mut entry) if entry.epoch == epoch => {
                entry.subscribers = entry.subscribers.saturating_sub(1);
                entry.is_idle()
            }
            _ => false,
        };

        if idle {
            self.schedule_eviction(key);
        }
    }

    fn schedule_eviction(self: &Arc<Self>, key: &QueryKey) {
        let Some((epoch, generation)) = self.entries.get_mut(key).map(|mut entry| {
            entry.idle_generation += 1;
            (entry.epoch, entry.idle_generation)
        }) else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime to schedule eviction of {}; entry kept", key);
            return;
        };

        let store: Weak<StoreInner> = Arc::downgrade(self);
        let key = key.clone();
        let delay = self.keep_unused_for;

        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(store) = store.upgrade() {
                store.evict_if_idle(&key, epoch, generation);
            }
        });
    }

    fn evict_if_idle(&self, key: &QueryKey, epoch: u64, generation: u64) {
        let removed = self.entries.remove_if(key, |_, entry| {
            entry.epoch == epoch && entry.idle_generation == generation && entry.is_idle()
        });

        if let Some((key, entry)) = removed {
            for tag in &entry.provided {
                self.untag(&key, tag);
            }
            debug!("✓ Evicted idle entry {}", key);
            self.metrics.record_eviction(&key);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Keeps one entry alive; dropping it releases the subscription.
pub struct Lease {
    inner: Arc<StoreInner>,
    key: QueryKey,
    epoch: u64,
}

impl Lease {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.inner.release(&self.key, self.epoch);
    }
}
