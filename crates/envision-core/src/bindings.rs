//! View bindings: resources exposed through the query cache.
//!
//! A view asks for a resource and parameters and gets back either a settled
//! [`QueryState`] or a live [`Subscription`]. Both render as
//! `{ data, is_loading, error }` through `view()`, and a subscription can `refetch()`.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::cache::{QueryCache, QueryKey, QueryOptions, QueryState, Subscription};
use crate::config::Config;
use crate::endpoints::{DashboardApi, FallbackPolicy};
use crate::error::ApiError;
use crate::http_client::HttpClient;
use crate::params::QueryParams;
use crate::resources::Resource;

#[derive(Debug, Clone)]
pub struct DashboardQueries {
    api: Arc<DashboardApi>,
    cache: QueryCache,
    options: QueryOptions,
}

impl DashboardQueries {
    pub fn new(api: DashboardApi, cache: QueryCache, options: QueryOptions) -> Self {
        Self {
            api: Arc::new(api),
            cache,
            options,
        }
    }

    /// Production wiring: reqwest transport, retry policy and a fresh cache.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            DashboardApi::from_config(config),
            QueryCache::new(config.cache_idle),
            config.query,
        )
    }

    /// Same wiring over an arbitrary transport.
    pub fn with_http_client(http: Arc<dyn HttpClient>, config: &Config) -> Self {
        Self::new(
            DashboardApi::with_http_client(http, config),
            QueryCache::new(config.cache_idle),
            config.query,
        )
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn api(&self) -> &DashboardApi {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn options(&self) -> QueryOptions {
        self.options
    }

    pub fn key<R: Resource>(params: &QueryParams) -> QueryKey {
        QueryKey::of::<R>(params.clone())
    }

    /// Returns the cached state of `R`, waiting only when nothing is servable.
    ///
    /// Under the placeholder policy a key that has never loaded shows the resource's
    /// placeholder next to the error; a previously loaded value is never replaced.
    pub async fn query<R: Resource>(&self, params: QueryParams) -> QueryState<R::Output> {
        let key = Self::key::<R>(&params);
        self.cache
            .get_or_placeholder(
                key,
                self.fetcher::<R>(params),
                self.options,
                self.placeholder::<R>(),
            )
            .await
    }

    /// Subscribes to `R`; the key is polled while the subscription lives.
    pub fn watch<R: Resource>(&self, params: QueryParams) -> Subscription<R::Output> {
        let key = Self::key::<R>(&params);
        self.cache.subscribe_or_placeholder(
            key,
            self.fetcher::<R>(params),
            self.options,
            self.placeholder::<R>(),
        )
    }

    pub fn invalidate<R: Resource>(&self, params: &QueryParams) -> bool {
        self.cache.invalidate(&Self::key::<R>(params))
    }

    pub fn invalidate_all<R: Resource>(&self) -> usize {
        self.cache.invalidate_resource(R::NAME)
    }

    /// Starts periodic eviction of entries idle for longer than the cache's idle
    /// period. The task ends when the cache is dropped.
    ///
    /// Returns `None` when `period` is zero. Must be called from within a Tokio runtime.
    pub fn spawn_maintenance(&self, period: Duration) -> Option<JoinHandle<()>> {
        self.cache.spawn_eviction(period)
    }

    fn placeholder<R: Resource>(&self) -> Option<R::Output> {
        (self.api.fallback() == FallbackPolicy::Placeholder)
            .then(R::placeholder)
            .flatten()
    }

    fn fetcher<R: Resource>(
        &self,
        params: QueryParams,
    ) -> impl Fn() -> BoxFuture<'static, Result<R::Output, ApiError>> + Send + Sync + 'static {
        let api = Arc::clone(&self.api);
        move || {
            let api = Arc::clone(&api);
            let params = params.clone();
            async move { api.fetch_strict::<R>(&params).await }.boxed()
        }
    }
}
