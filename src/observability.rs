//! Metrics hooks for the query store.

use crate::key::QueryKey;
use crate::tag::Tag;
use std::time::Duration;

/// Receives store events. Every method has an empty default, so implement
/// only what you record.
pub trait StoreMetrics: Send + Sync {
    /// Served from a fresh entry.
    fn record_hit(&self, _key: &QueryKey) {}

    /// A network fetch was started for the key (miss, stale or forced).
    fn record_fetch(&self, _key: &QueryKey) {}

    /// A fetch finished successfully.
    fn record_fulfilled(&self, _key: &QueryKey, _duration: Duration) {}

    fn record_error(&self, _key: &QueryKey, _error: &str) {}

    /// Tag invalidated, with the number of entries it marked stale.
    fn record_invalidation(&self, _tag: &Tag, _affected: usize) {}

    fn record_eviction(&self, _key: &QueryKey) {}
}

/// Discards every event.
pub struct NoOpMetrics;

impl StoreMetrics for NoOpMetrics {}
