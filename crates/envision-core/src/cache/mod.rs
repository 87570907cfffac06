//! In-memory query cache with de-duplication, stale-while-revalidate and polling.
//!
//! Entries are keyed by [`QueryKey`] and hold the last validated value for that key,
//! the last error, timestamps and at most one tracked in-flight fetch.
//!
//! - A caller only waits when there is nothing servable (no value, or the value is
//!   past `expire_time`). Concurrent callers join the in-flight fetch.
//! - A value past `stale_time` is returned immediately and revalidated in the
//!   background.
//! - Every fetch runs in its own task tagged with a generation. Only the most
//!   recently issued generation may update the entry.
//! - A failed fetch keeps the previous value and records the error next to it.
//! - Keys with live [`Subscription`]s are polled every `refetch_interval`; the poller
//!   stops with the last release.

mod entry;
mod key;
mod state;
mod subscription;

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::FutureExt;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use self::entry::{erase_fetcher, erase_value, Entry, FetchResult, InFlight, SharedFetch};
use crate::error::{ApiError, ApiErrorKind};

pub use self::key::QueryKey;
pub use self::state::{QueryOptions, QueryState, QueryStatus, ViewState};
pub use self::subscription::Subscription;

/// Default idle period before an unused entry becomes evictable.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

struct CacheInner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    next_generation: AtomicU64,
    idle_timeout: Duration,
}

/// Process-wide query cache. Clones share the same store.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .field("idle_timeout", &self.inner.idle_timeout)
            .finish()
    }
}

impl QueryCache {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                idle_timeout,
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn from_weak(inner: &Weak<CacheInner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries().contains_key(key)
    }

    /// Number of live subscriptions for `key`.
    pub fn consumers(&self, key: &QueryKey) -> usize {
        self.entries().get(key).map_or(0, |entry| entry.consumers)
    }

    /// Whether a background poller is running for `key`.
    pub fn is_polling(&self, key: &QueryKey) -> bool {
        self.entries()
            .get(key)
            .and_then(|entry| entry.poller.as_ref())
            .is_some_and(|poller| !poller.is_finished())
    }

    /// Returns the state for `key`, fetching first only if nothing servable exists.
    ///
    /// A stale value is returned as-is while a background revalidation runs. If a
    /// fetch for `key` is already in flight, this call joins it instead of issuing
    /// another request. Errors never escape; they are recorded on the state.
    ///
    /// The fetcher and options are remembered for later revalidation, polling and
    /// [`refetch`](Self::refetch).
    pub async fn get<V, F, Fut>(
        &self,
        key: QueryKey,
        fetcher: F,
        options: QueryOptions,
    ) -> QueryState<V>
    where
        V: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        self.get_or_placeholder(key, fetcher, options, None).await
    }

    /// Like [`get`](Self::get), but a key whose fetches have only ever failed shows
    /// `placeholder` as its data, with the error still recorded. A previously fetched
    /// value always takes precedence over the placeholder.
    pub async fn get_or_placeholder<V, F, Fut>(
        &self,
        key: QueryKey,
        fetcher: F,
        options: QueryOptions,
        placeholder: Option<V>,
    ) -> QueryState<V>
    where
        V: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let pending = {
            let mut entries = self.entries();
            let entry = self.register(&mut entries, &key, erase_fetcher(fetcher), options);
            entry.placeholder = placeholder.map(erase_value);
            self.ensure_fresh(&key, entry)
        };

        if let Some(pending) = pending {
            self.await_settled(&key, pending).await;
        }

        self.peek(&key)
    }

    /// Registers a consumer for `key` and starts a fetch if nothing servable exists.
    ///
    /// When `options.refetch_interval` is set the key is polled until the last
    /// subscription is released. Must be called from within a Tokio runtime.
    pub fn subscribe<V, F, Fut>(
        &self,
        key: QueryKey,
        fetcher: F,
        options: QueryOptions,
    ) -> Subscription<V>
    where
        V: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        self.subscribe_or_placeholder(key, fetcher, options, None)
    }

    /// [`subscribe`](Self::subscribe) with the placeholder rule of
    /// [`get_or_placeholder`](Self::get_or_placeholder).
    pub fn subscribe_or_placeholder<V, F, Fut>(
        &self,
        key: QueryKey,
        fetcher: F,
        options: QueryOptions,
        placeholder: Option<V>,
    ) -> Subscription<V>
    where
        V: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let mut entries = self.entries();
        let entry = self.register(&mut entries, &key, erase_fetcher(fetcher), options);
        entry.placeholder = placeholder.map(erase_value);
        entry.consumers += 1;
        self.ensure_fresh(&key, entry);

        if let Some(period) = options.refetch_interval.filter(|period| !period.is_zero()) {
            let running = entry
                .poller
                .as_ref()
                .is_some_and(|poller| !poller.is_finished());
            if !running {
                entry.poller = Some(self.spawn_poller(key.clone(), period));
                debug!(key = %key, period_ms = period.as_millis() as u64, "polling started");
            }
        }

        let changes = entry.version.subscribe();
        drop(entries);
        Subscription::new(self.clone(), key, changes)
    }

    /// Forces a new fetch for a known key and waits for it to settle.
    ///
    /// The new fetch supersedes any fetch already in flight. Returns `None` if the key
    /// has never been requested.
    pub async fn refetch<V: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
    ) -> Option<QueryState<V>> {
        let pending = {
            let mut entries = self.entries();
            let entry = entries.get_mut(key)?;
            entry.last_access = Instant::now();
            self.start_fetch(key, entry)
        };

        self.await_settled(key, pending).await;
        Some(self.peek(key))
    }

    /// Marks `key` stale. If it has consumers a revalidation starts immediately,
    /// otherwise the next access revalidates. Returns whether the key was known.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        self.invalidate_entry(key, entry);
        true
    }

    /// Invalidates every key of one resource. Returns the number of keys affected.
    pub fn invalidate_resource(&self, resource: &str) -> usize {
        let mut entries = self.entries();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if key.resource() == resource {
                self.invalidate_entry(key, entry);
                count += 1;
            }
        }
        count
    }

    /// Snapshot of `key` without triggering any fetch.
    pub fn peek<V: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<V> {
        self.entries()
            .get(key)
            .map_or_else(QueryState::idle, |entry| entry.snapshot(Instant::now()))
    }

    /// Removes entries with no consumers, no fetch in flight and no access within the
    /// idle timeout. Returns the number of entries removed.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let idle_timeout = self.inner.idle_timeout;
        let mut entries = self.entries();
        let before = entries.len();

        entries.retain(|key, entry| {
            let keep = entry.consumers > 0
                || entry.in_flight.is_some()
                || now.saturating_duration_since(entry.last_access) < idle_timeout;
            if !keep {
                debug!(key = %key, "evicting idle cache entry");
            }
            keep
        });

        before - entries.len()
    }

    /// Runs [`evict_idle`](Self::evict_idle) every `period` for as long as the cache
    /// is alive. A zero period schedules nothing and returns `None`.
    pub fn spawn_eviction(&self, period: Duration) -> Option<JoinHandle<()>> {
        if period.is_zero() {
            return None;
        }
        let weak = Arc::downgrade(&self.inner);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(cache) = Self::from_weak(&weak) else {
                    break;
                };
                let evicted = cache.evict_idle();
                if evicted > 0 {
                    debug!(evicted, remaining = cache.len(), "eviction pass finished");
                }
            }
        }))
    }

    fn register<'a>(
        &self,
        entries: &'a mut HashMap<QueryKey, Entry>,
        key: &QueryKey,
        fetcher: entry::ErasedFetcher,
        options: QueryOptions,
    ) -> &'a mut Entry {
        let now = Instant::now();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(fetcher.clone(), options, now));
        entry.fetcher = fetcher;
        entry.options = options;
        entry.last_access = now;
        entry
    }

    /// Starts a fetch if the entry is not fresh and none is running. Returns the fetch
    /// to wait on when the caller has nothing to show.
    fn ensure_fresh(&self, key: &QueryKey, entry: &mut Entry) -> Option<SharedFetch> {
        let freshness = entry.freshness(Instant::now());
        let running = entry.in_flight.as_ref().map(|fetch| fetch.future.clone());

        match (freshness, running) {
            (entry::Freshness::Fresh, _) => None,
            (freshness, Some(running)) => freshness.blocks().then_some(running),
            (freshness, None) => {
                let started = self.start_fetch(key, entry);
                freshness.blocks().then_some(started)
            }
        }
    }

    fn invalidate_entry(&self, key: &QueryKey, entry: &mut Entry) {
        entry.invalidated = true;
        if entry.consumers > 0 {
            let _ = self.start_fetch(key, entry);
        } else {
            entry.notify();
        }
        debug!(key = %key, consumers = entry.consumers, "invalidated");
    }

    /// Issues a new generation for `key` on its own task.
    fn start_fetch(&self, key: &QueryKey, entry: &mut Entry) -> SharedFetch {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(previous) = &entry.in_flight {
            debug!(
                key = %key,
                superseded = previous.generation,
                generation,
                "superseding in-flight fetch"
            );
        }

        let fetch = (entry.fetcher)();
        let weak = Arc::downgrade(&self.inner);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(fetch)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(ApiError::internal("fetcher panicked")));
            if let Some(cache) = Self::from_weak(&weak) {
                cache.complete(&task_key, generation, &outcome);
            }
            outcome
        });

        let future = async move {
            task.await.unwrap_or_else(|error| {
                Err(ApiError::internal(format!("fetch task failed: {error}")))
            })
        }
        .boxed()
        .shared();

        entry.issued_generation = generation;
        entry.in_flight = Some(InFlight {
            generation,
            future: future.clone(),
        });
        if entry.value.is_none() {
            entry.status = QueryStatus::Loading;
        }
        entry.notify();

        future
    }

    /// Applies a finished fetch if it belongs to the most recently issued generation.
    fn complete(&self, key: &QueryKey, generation: u64, outcome: &FetchResult) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            debug!(key = %key, generation, "entry gone, dropping fetch result");
            return;
        };

        if generation != entry.issued_generation {
            debug!(
                key = %key,
                generation,
                current = entry.issued_generation,
                "discarding result of superseded fetch"
            );
            return;
        }

        let now = Instant::now();
        entry.in_flight = None;
        entry.last_fetched_at = Some(now);

        match outcome {
            Ok(value) => {
                entry.value = Some(Arc::clone(value));
                entry.error = None;
                entry.status = QueryStatus::Success;
                entry.last_success_at = Some(now);
                entry.updated_at = Some(OffsetDateTime::now_utc());
                entry.invalidated = false;
                debug!(key = %key, generation, consumers = entry.consumers, "fetch applied");
            }
            Err(error) => {
                if entry.value.is_some() {
                    warn!(key = %key, error = %error, "revalidation failed, keeping last value");
                } else if entry.placeholder.is_some()
                    && error.kind() != ApiErrorKind::Validation
                {
                    warn!(key = %key, error = %error, "fetch failed, serving placeholder");
                } else {
                    warn!(key = %key, error = %error, "fetch failed");
                }
                entry.error = Some(error.clone());
                entry.status = QueryStatus::Error;
            }
        }

        entry.notify();
    }

    /// Waits until `key` has no fetch in flight, following superseding generations.
    async fn await_settled(&self, key: &QueryKey, mut pending: SharedFetch) {
        loop {
            let _ = pending.await;
            let next = self
                .entries()
                .get(key)
                .and_then(|entry| entry.in_flight.as_ref().map(|fetch| fetch.future.clone()));
            match next {
                Some(next) => pending = next,
                None => break,
            }
        }
    }

    fn spawn_poller(&self, key: QueryKey, period: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(cache) = Self::from_weak(&weak) else {
                    break;
                };
                if !cache.poll(&key) {
                    break;
                }
            }
        })
    }

    /// One polling tick. Returns `false` once the key has no consumers left.
    fn poll(&self, key: &QueryKey) -> bool {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        if entry.consumers == 0 {
            return false;
        }
        if entry.in_flight.is_none() {
            let _ = self.start_fetch(key, entry);
        }
        true
    }

    fn release(&self, key: &QueryKey) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };

        entry.consumers = entry.consumers.saturating_sub(1);
        entry.last_access = Instant::now();
        if entry.consumers == 0 {
            if let Some(poller) = entry.poller.take() {
                poller.abort();
                debug!(key = %key, "polling stopped");
            }
            if entry.in_flight.is_some() {
                debug!(key = %key, "last consumer released during fetch, result will only be cached");
            }
        }
    }
}
