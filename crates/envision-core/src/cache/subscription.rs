use std::marker::PhantomData;

use tokio::sync::watch;

use super::key::QueryKey;
use super::state::{QueryState, ViewState};
use super::QueryCache;

/// A registered consumer of one cache key.
///
/// While at least one subscription for a key is alive the key is kept out of eviction
/// and, if configured, polled in the background. Dropping the subscription releases
/// it; a fetch already running keeps running and still updates the cache, but this
/// subscription is no longer notified.
pub struct Subscription<V> {
    cache: QueryCache,
    key: QueryKey,
    changes: watch::Receiver<u64>,
    _value: PhantomData<fn() -> V>,
}

impl<V: Send + Sync + 'static> Subscription<V> {
    pub(super) fn new(cache: QueryCache, key: QueryKey, changes: watch::Receiver<u64>) -> Self {
        Self {
            cache,
            key,
            changes,
            _value: PhantomData,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn state(&self) -> QueryState<V> {
        self.cache.peek(&self.key)
    }

    pub fn view(&self) -> ViewState<V> {
        self.state().view()
    }

    /// Waits for the next change to the entry and returns the new state.
    ///
    /// Returns `None` once the entry no longer exists.
    pub async fn changed(&mut self) -> Option<QueryState<V>> {
        self.changes.changed().await.ok()?;
        Some(self.state())
    }

    /// Forces a new fetch and waits for it to settle.
    pub async fn refetch(&self) -> QueryState<V> {
        match self.cache.refetch::<V>(&self.key).await {
            Some(state) => state,
            None => QueryState::idle(),
        }
    }

    /// Unregisters this consumer.
    pub fn release(self) {}
}

impl<V> Drop for Subscription<V> {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}

impl<V> std::fmt::Debug for Subscription<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
