//! Long-lived query subscriptions.

use crate::error::{Error, Result};
use crate::key::QueryKey;
use crate::store::{FetchMode, Fetched, Lease, QueryStore};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;

/// Produces a fresh request for one query each time it is called.
pub type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Fetched>> + Send + Sync>;

/// Read `key` through the store and decode it.
pub(crate) async fn read<T: DeserializeOwned>(
    store: &QueryStore,
    key: &QueryKey,
    mode: FetchMode,
    fetcher: &Fetcher,
) -> Result<T> {
    let bytes = store.query(key, mode, || fetcher()).await?;
    decode(key, &bytes)
}

fn decode<T: DeserializeOwned>(key: &QueryKey, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::DeserializationError(format!("{}: {}", key, e)))
}

/// A mounted query.
///
/// While the subscription is alive its entry is never evicted. Reads are
/// served from the store when fresh and refetched once the entry has been
/// invalidated. Dropping the subscription detaches it; the entry is evicted
/// after the keep-unused window if nobody else subscribes.
///
/// # Example
///
/// ```ignore
/// let mut posts = client.subscribe_posts();
/// render(posts.data().await?);
/// while posts.invalidated().await {
///     render(posts.data().await?);
/// }
/// ```
pub struct QuerySubscription<T> {
    store: QueryStore,
    key: QueryKey,
    fetcher: Fetcher,
    changes: watch::Receiver<u64>,
    _lease: Lease,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> QuerySubscription<T> {
    pub(crate) fn new(store: QueryStore, key: QueryKey, fetcher: Fetcher) -> Self {
        let (lease, changes) = store.acquire(&key);
        debug!("Subscribed to {}", key);
        QuerySubscription {
            store,
            key,
            fetcher,
            changes,
            _lease: lease,
            _marker: PhantomData,
        }
    }

    /// Cached data if fresh, otherwise a (shared) refetch.
    pub async fn data(&self) -> Result<T> {
        read(&self.store, &self.key, FetchMode::Cached, &self.fetcher).await
    }

    /// Force a request even if the cached data is fresh.
    pub async fn refetch(&self) -> Result<T> {
        read(&self.store, &self.key, FetchMode::Forced, &self.fetcher).await
    }

    /// Whatever is cached right now, fresh or stale, without fetching.
    pub fn current(&self) -> Option<Result<T>> {
        self.store
            .peek(&self.key)
            .map(|bytes| decode(&self.key, &bytes))
    }

    pub fn is_stale(&self) -> bool {
        self.store.is_stale(&self.key).unwrap_or(false)
    }

    /// Wait until the entry is invalidated.
    ///
    /// Returns `false` once the entry is gone (store reset), after which no
    /// further notifications arrive.
    pub async fn invalidated(&mut self) -> bool {
        self.changes.changed().await.is_ok()
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl<T> Drop for QuerySubscription<T> {
    fn drop(&mut self) {
        debug!("Unsubscribed from {}", self.key);
    }
}
