//! Behavior-driven tests for the query cache: de-duplication, stale-while-revalidate,
//! error retention, generation ordering, polling and eviction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use envision_core::resources::{EnergyTrend, Forecast, Kpis, Resource};
use envision_core::{
    ApiError, ApiErrorKind, Config, DashboardApi, DashboardFilters, DashboardQueries,
    EnergyTrendPoint, FallbackPolicy, QueryCache, QueryKey, QueryOptions, QueryParams,
    QueryStatus, ScriptedHttpClient, ScriptedReply, TimeRange,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::json;
use tokio::time::{sleep, Instant};

/// In-process backend counting how often it was asked.
#[derive(Clone, Default)]
struct CountingBackend {
    calls: Arc<AtomicUsize>,
}

impl CountingBackend {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Each call resolves to its 1-based call number after `latency`.
    fn fetcher(
        &self,
        latency: Duration,
    ) -> impl Fn() -> BoxFuture<'static, Result<usize, ApiError>> + Send + Sync + 'static {
        let calls = Arc::clone(&self.calls);
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                sleep(latency).await;
                Ok(call)
            }
            .boxed()
        }
    }
}

fn api_over(http: &Arc<ScriptedHttpClient>) -> Arc<DashboardApi> {
    let config = Config::default().with_base_url("http://api.envision.test");
    Arc::new(DashboardApi::with_http_client(http.clone(), &config))
}

fn endpoint<R: Resource>(
    api: &Arc<DashboardApi>,
    params: QueryParams,
) -> impl Fn() -> BoxFuture<'static, Result<R::Output, ApiError>> + Send + Sync + 'static {
    let api = Arc::clone(api);
    move || {
        let api = Arc::clone(&api);
        let params = params.clone();
        async move { api.fetch::<R>(&params).await }.boxed()
    }
}

fn key(name: &str) -> QueryKey {
    QueryKey::new(name, QueryParams::new())
}

fn kpis_reply() -> ScriptedReply {
    ScriptedReply::json(
        200,
        &envision_core::fixtures::sample_envelope(envision_core::ResourceKind::Kpis),
    )
}

// =============================================================================
// Query Cache: De-duplication
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_two_consumers_ask_50ms_apart_system_issues_one_request() {
    // Given: A KPI endpoint that takes 200ms to answer
    let http = Arc::new(ScriptedHttpClient::new().with_fallback(
        kpis_reply().after(Duration::from_millis(200)),
    ));
    let api = api_over(&http);
    let cache = QueryCache::default();
    let params = DashboardFilters::range(TimeRange::Last7Days).to_params();
    let key = QueryKey::of::<Kpis>(params.clone());

    // When: A first consumer asks, and a second asks 50ms later while it is pending
    let first = tokio::spawn({
        let cache = cache.clone();
        let key = key.clone();
        let fetch = endpoint::<Kpis>(&api, params.clone());
        async move { cache.get(key, fetch, QueryOptions::default()).await }
    });
    sleep(Duration::from_millis(50)).await;
    let second = cache
        .get(key.clone(), endpoint::<Kpis>(&api, params), QueryOptions::default())
        .await;
    let first = first.await.expect("first consumer task");

    // Then: Only one HTTP call was made and both got the same value
    assert_eq!(http.calls(), 1);
    let first = first.data.expect("first consumer has data");
    let second = second.data.expect("second consumer has data");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(key.to_string(), "kpis?range=7d");
}

#[tokio::test(start_paused = true)]
async fn when_many_consumers_ask_in_the_same_tick_system_fetches_once() {
    // Given: A slow backend
    let backend = CountingBackend::default();
    let cache = QueryCache::default();
    let options = QueryOptions::default();

    // When: Three consumers ask concurrently
    let (a, b, c) = tokio::join!(
        cache.get(key("anomalies"), backend.fetcher(Duration::from_millis(100)), options),
        cache.get(key("anomalies"), backend.fetcher(Duration::from_millis(100)), options),
        cache.get(key("anomalies"), backend.fetcher(Duration::from_millis(100)), options),
    );

    // Then: All three see the single result
    assert_eq!(backend.calls(), 1);
    for state in [a, b, c] {
        assert_eq!(state.data.as_deref(), Some(&1));
        assert_eq!(state.status, QueryStatus::Success);
    }
}

#[tokio::test(start_paused = true)]
async fn when_forecast_is_fetched_system_caches_it_under_the_bare_resource_key() {
    // Given: A forecast endpoint
    let http = Arc::new(ScriptedHttpClient::new().with_fallback(ScriptedReply::json(
        200,
        &json!({"success": true, "data": {"values": [
            {"forecast_date": "2024-01-01", "predicted_kwh": 100, "is_forecast": false},
            {"forecast_date": "2024-01-02", "predicted_kwh": 110, "is_forecast": true}
        ]}}),
    )));
    let api = api_over(&http);
    let cache = QueryCache::default();
    let key = QueryKey::of::<Forecast>(QueryParams::new());

    // When: The forecast goes through the cache
    let state = cache
        .get(key.clone(), endpoint::<Forecast>(&api, QueryParams::new()), QueryOptions::default())
        .await;

    // Then: The two points are stored under ("forecast", {})
    assert_eq!(key.to_string(), "forecast");
    assert!(cache.contains(&key));
    let points = cache.peek::<Vec<envision_core::ForecastPoint>>(&key);
    assert_eq!(points.data.map(|points| points.len()), Some(2));
    assert_eq!(state.data.map(|points| points[1].predicted_kwh), Some(110.0));
}

// =============================================================================
// Query Cache: Freshness
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_value_is_stale_system_serves_it_immediately_and_revalidates() {
    // Given: A cached value with a 10s stale threshold
    let backend = CountingBackend::default();
    let cache = QueryCache::default();
    let options = QueryOptions::default().with_stale_time(Duration::from_secs(10));
    let latency = Duration::from_millis(500);
    cache.get(key("kpis"), backend.fetcher(latency), options).await;

    // When: The value is read again after it went stale
    sleep(Duration::from_secs(11)).await;
    let asked_at = Instant::now();
    let stale = cache.get(key("kpis"), backend.fetcher(latency), options).await;

    // Then: The old value comes back without waiting, flagged stale and refreshing
    assert_eq!(asked_at.elapsed(), Duration::ZERO);
    assert_eq!(stale.data.as_deref(), Some(&1));
    assert!(stale.is_stale);
    assert!(stale.is_fetching);
    assert!(!stale.view().is_loading);

    // And: The revalidated value replaces it once the background fetch lands
    sleep(latency * 2).await;
    let fresh = cache.peek::<usize>(&key("kpis"));
    assert_eq!(fresh.data.as_deref(), Some(&2));
    assert!(!fresh.is_stale);
    assert!(!fresh.is_fetching);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn when_value_is_expired_system_waits_for_a_new_one() {
    // Given: A cached value with a 30s hard ceiling
    let backend = CountingBackend::default();
    let cache = QueryCache::default();
    let options = QueryOptions::default()
        .with_stale_time(Duration::from_secs(10))
        .with_expire_time(Duration::from_secs(30));
    let latency = Duration::from_millis(300);
    cache.get(key("kpis"), backend.fetcher(latency), options).await;

    // When: The value is read after expiry
    sleep(Duration::from_secs(31)).await;
    assert!(cache.peek::<usize>(&key("kpis")).view().data.is_none());
    let asked_at = Instant::now();
    let state = cache.get(key("kpis"), backend.fetcher(latency), options).await;

    // Then: The caller waited for the fetch and got the new value
    let waited = asked_at.elapsed();
    assert!(waited >= latency && waited < latency * 2, "waited {waited:?}");
    assert_eq!(state.data.as_deref(), Some(&2));
    assert!(!state.is_expired);
}

// =============================================================================
// Query Cache: Error Policy
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_revalidation_fails_system_keeps_the_last_good_value() {
    // Given: An energy trend cached once, after which the backend reports a failure
    let http = Arc::new(
        ScriptedHttpClient::new()
            .with_reply(ScriptedReply::json(
                200,
                &envision_core::fixtures::sample_envelope(envision_core::ResourceKind::EnergyTrend),
            ))
            .with_fallback(ScriptedReply::json(
                200,
                &json!({"success": false, "error": "no data for range"}),
            )),
    );
    let api = api_over(&http);
    let cache = QueryCache::default();
    let params = DashboardFilters::range(TimeRange::Last30Days).to_params();
    let key = QueryKey::of::<EnergyTrend>(params.clone());
    let first = cache
        .get(key.clone(), endpoint::<EnergyTrend>(&api, params), QueryOptions::default())
        .await;
    assert_eq!(first.data.as_ref().map(|points| points.len()), Some(3));

    // When: The key is refetched
    let state = cache
        .refetch::<Vec<envision_core::EnergyTrendPoint>>(&key)
        .await
        .expect("known key");

    // Then: The failure sits next to the previous data
    assert_eq!(http.calls(), 2);
    assert_eq!(state.status, QueryStatus::Error);
    assert_eq!(state.error, Some(ApiError::application("no data for range")));
    assert!(Arc::ptr_eq(
        state.data.as_ref().expect("data kept"),
        first.data.as_ref().expect("first data")
    ));
}

#[tokio::test(start_paused = true)]
async fn when_first_fetch_fails_system_reports_error_without_data() {
    // Given: A backend that only ever reports a failure
    let http = Arc::new(ScriptedHttpClient::new().with_fallback(ScriptedReply::json(
        200,
        &json!({"success": false, "error": "no data for range"}),
    )));
    let api = api_over(&http);
    let cache = QueryCache::default();

    // When: KPIs are requested through the cache
    let state = cache
        .get(
            QueryKey::of::<Kpis>(QueryParams::new()),
            endpoint::<Kpis>(&api, QueryParams::new()),
            QueryOptions::default(),
        )
        .await;

    // Then: The error is a field, not a failure, and there is nothing to show
    assert_eq!(http.calls(), 1);
    assert_eq!(state.status, QueryStatus::Error);
    assert!(state.data.is_none());
    let view = state.view();
    assert!(!view.is_loading);
    assert_eq!(
        view.error.map(|error| error.to_string()),
        Some(String::from("no data for range"))
    );
}

fn placeholder_queries(http: &Arc<ScriptedHttpClient>) -> DashboardQueries {
    let config = Config {
        fallback: FallbackPolicy::Placeholder,
        ..Config::default().with_base_url("http://api.envision.test")
    };
    DashboardQueries::with_http_client(http.clone(), &config)
}

#[tokio::test(start_paused = true)]
async fn when_placeholders_are_enabled_failed_revalidation_still_keeps_the_last_value() {
    // Given: Placeholder degradation on, and an energy trend cached once before the
    // backend starts failing
    let http = Arc::new(
        ScriptedHttpClient::new()
            .with_reply(ScriptedReply::json(
                200,
                &envision_core::fixtures::sample_envelope(envision_core::ResourceKind::EnergyTrend),
            ))
            .with_fallback(ScriptedReply::json(
                200,
                &json!({"success": false, "error": "maintenance window"}),
            )),
    );
    let queries = placeholder_queries(&http);
    let params = DashboardFilters::range(TimeRange::Last7Days).to_params();
    let first = queries.query::<EnergyTrend>(params.clone()).await;
    assert_eq!(first.data.as_ref().map(|points| points.len()), Some(3));

    // When: The key is refetched and the backend fails
    let state = queries
        .cache()
        .refetch::<Vec<EnergyTrendPoint>>(&DashboardQueries::key::<EnergyTrend>(&params))
        .await
        .expect("known key");

    // Then: The last good value survives and the failure is reported next to it
    assert_eq!(http.calls(), 2);
    assert_eq!(state.status, QueryStatus::Error);
    assert_eq!(state.data.as_ref().map(|points| points.len()), Some(3));
    assert!(Arc::ptr_eq(
        state.data.as_ref().expect("data kept"),
        first.data.as_ref().expect("first data")
    ));
    assert_eq!(state.error, Some(ApiError::application("maintenance window")));
}

#[tokio::test(start_paused = true)]
async fn when_placeholders_are_enabled_first_failure_shows_placeholder_with_error() {
    // Given: Placeholder degradation on and a backend that only fails
    let http = Arc::new(ScriptedHttpClient::new().with_fallback(ScriptedReply::json(
        200,
        &json!({"success": false, "error": "maintenance window"}),
    )));
    let queries = placeholder_queries(&http);

    // When: A list resource and an object resource are queried
    let trend = queries.query::<EnergyTrend>(QueryParams::new()).await;
    let kpis = queries.query::<Kpis>(QueryParams::new()).await;

    // Then: The list shows its empty placeholder, the error is still recorded
    assert_eq!(trend.status, QueryStatus::Error);
    assert_eq!(trend.data.as_deref(), Some(&Vec::new()));
    assert_eq!(trend.error, Some(ApiError::application("maintenance window")));
    let view = trend.view();
    assert!(!view.is_loading);
    assert!(view.error.is_some());

    // And: The object resource has no placeholder to show
    assert!(kpis.data.is_none());
    assert_eq!(kpis.status, QueryStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn when_placeholders_are_enabled_contract_breaks_are_not_masked() {
    // Given: Placeholder degradation on and a backend returning the wrong shape
    let http = Arc::new(ScriptedHttpClient::new().with_fallback(ScriptedReply::json(
        200,
        &json!({"success": true, "data": {"unexpected": true}}),
    )));
    let queries = placeholder_queries(&http);

    // When: A list resource is queried
    let state = queries.query::<EnergyTrend>(QueryParams::new()).await;

    // Then: No placeholder is shown and the validation error surfaces
    assert!(state.data.is_none());
    assert_eq!(
        state.error.map(|error| error.kind()),
        Some(ApiErrorKind::Validation)
    );
}

// =============================================================================
// Query Cache: Ordering
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_older_fetch_finishes_last_system_keeps_the_newer_result() {
    // Given: A backend where the first call is slow and the second is fast
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = {
        let calls = Arc::clone(&calls);
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                let (latency, value) = if call == 1 {
                    (Duration::from_millis(500), "older")
                } else {
                    (Duration::from_millis(50), "newer")
                };
                sleep(latency).await;
                Ok::<_, ApiError>(value.to_owned())
            }
        }
    };
    let cache = QueryCache::default();

    // When: A refetch is issued while the first fetch is still running
    let first = tokio::spawn({
        let cache = cache.clone();
        async move { cache.get(key("forecast"), fetcher, QueryOptions::default()).await }
    });
    sleep(Duration::from_millis(10)).await;
    let refetched = cache
        .refetch::<String>(&key("forecast"))
        .await
        .expect("known key");

    // Then: The newer generation wins, for both callers
    assert_eq!(refetched.data.as_deref().map(String::as_str), Some("newer"));
    let first = first.await.expect("first caller task");
    assert_eq!(first.data.as_deref().map(String::as_str), Some("newer"));

    // And: The older completion arriving afterwards is discarded
    sleep(Duration::from_secs(1)).await;
    let settled = cache.peek::<String>(&key("forecast"));
    assert_eq!(settled.data.as_deref().map(String::as_str), Some("newer"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// =============================================================================
// Query Cache: Polling and Consumers
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_key_has_consumers_system_polls_until_the_last_release() {
    // Given: Two subscribers on a key polled every second
    let backend = CountingBackend::default();
    let cache = QueryCache::default();
    let options = QueryOptions::default().with_refetch_interval(Some(Duration::from_secs(1)));
    let first = cache.subscribe::<usize, _, _>(key("kpis"), backend.fetcher(Duration::ZERO), options);
    let second = cache.subscribe::<usize, _, _>(key("kpis"), backend.fetcher(Duration::ZERO), options);
    assert_eq!(cache.consumers(&key("kpis")), 2);

    // When: 3.5 seconds pass
    sleep(Duration::from_millis(3_500)).await;

    // Then: The initial fetch plus three polls happened
    assert_eq!(backend.calls(), 4);
    assert!(cache.is_polling(&key("kpis")));

    // When: One subscriber leaves, polling continues
    first.release();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.calls(), 5);
    assert!(cache.is_polling(&key("kpis")));

    // When: The last subscriber leaves, polling stops
    drop(second);
    assert_eq!(cache.consumers(&key("kpis")), 0);
    assert!(!cache.is_polling(&key("kpis")));
    sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn when_consumer_leaves_during_a_fetch_system_still_caches_the_result() {
    // Given: A subscriber whose fetch takes a while
    let backend = CountingBackend::default();
    let cache = QueryCache::default();
    let subscription = cache.subscribe::<usize, _, _>(
        key("recommendations"),
        backend.fetcher(Duration::from_millis(300)),
        QueryOptions::default(),
    );
    assert!(subscription.view().is_loading);

    // When: It is released before the fetch resolves
    drop(subscription);
    sleep(Duration::from_secs(1)).await;

    // Then: The request was not aborted and its result is cached for later readers
    assert_eq!(backend.calls(), 1);
    let state = cache.peek::<usize>(&key("recommendations"));
    assert_eq!(state.data.as_deref(), Some(&1));
    assert_eq!(cache.consumers(&key("recommendations")), 0);
}

#[tokio::test(start_paused = true)]
async fn when_subscriber_waits_for_changes_system_notifies_on_completion() {
    // Given: A subscription on an empty key
    let backend = CountingBackend::default();
    let cache = QueryCache::default();
    let mut subscription = cache.subscribe::<usize, _, _>(
        key("carbon-metrics"),
        backend.fetcher(Duration::from_millis(100)),
        QueryOptions::default(),
    );

    // When: It waits until data arrives
    let mut state = subscription.state();
    while state.data.is_none() {
        state = subscription.changed().await.expect("entry alive");
    }

    // Then: The update carries the value and success status
    assert_eq!(state.data.as_deref(), Some(&1));
    assert_eq!(state.status, QueryStatus::Success);
    assert!(!subscription.view().is_loading);
}

// =============================================================================
// Query Cache: Invalidation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_watched_key_is_invalidated_system_refetches_immediately() {
    // Given: A subscribed key holding a fresh value
    let backend = CountingBackend::default();
    let cache = QueryCache::default();
    let mut subscription = cache.subscribe::<usize, _, _>(
        key("ai-insights"),
        backend.fetcher(Duration::from_millis(10)),
        QueryOptions::default(),
    );
    while subscription.state().data.is_none() {
        subscription.changed().await.expect("entry alive");
    }

    // When: It is invalidated
    assert!(cache.invalidate(&key("ai-insights")));
    assert!(subscription.state().is_stale);
    sleep(Duration::from_millis(50)).await;

    // Then: A new fetch ran and the value is fresh again
    assert_eq!(backend.calls(), 2);
    let state = subscription.state();
    assert_eq!(state.data.as_deref(), Some(&2));
    assert!(!state.is_stale);
}

#[tokio::test(start_paused = true)]
async fn when_unwatched_key_is_invalidated_system_revalidates_on_next_read() {
    // Given: A cached key with no subscribers
    let backend = CountingBackend::default();
    let cache = QueryCache::default();
    let options = QueryOptions::default();
    cache.get(key("cost-metrics"), backend.fetcher(Duration::ZERO), options).await;

    // When: Every key of the resource is invalidated
    assert_eq!(cache.invalidate_resource("cost-metrics"), 1);

    // Then: Nothing is fetched until the next read, which serves the old value first
    sleep(Duration::from_millis(10)).await;
    assert_eq!(backend.calls(), 1);
    let state = cache.get(key("cost-metrics"), backend.fetcher(Duration::ZERO), options).await;
    assert_eq!(state.data.as_deref(), Some(&1));
    assert!(state.is_stale);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(backend.calls(), 2);
    assert_eq!(cache.peek::<usize>(&key("cost-metrics")).data.as_deref(), Some(&2));
}

// =============================================================================
// Query Cache: Eviction
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_entry_is_idle_past_the_timeout_system_evicts_it() {
    // Given: A cache with a 60s idle timeout holding one unwatched and one watched key
    let backend = CountingBackend::default();
    let cache = QueryCache::new(Duration::from_secs(60));
    cache
        .get(key("deviations"), backend.fetcher(Duration::ZERO), QueryOptions::default())
        .await;
    let _watched = cache.subscribe::<usize, _, _>(
        key("active-appliances"),
        backend.fetcher(Duration::ZERO),
        QueryOptions::default(),
    );
    assert_eq!(cache.evict_idle(), 0);

    // When: The idle timeout passes
    sleep(Duration::from_secs(61)).await;

    // Then: Only the unwatched entry is removed
    assert_eq!(cache.evict_idle(), 1);
    assert!(!cache.contains(&key("deviations")));
    assert!(cache.contains(&key("active-appliances")));
}

#[tokio::test(start_paused = true)]
async fn when_eviction_runs_in_background_system_sweeps_periodically() {
    // Given: A cache sweeping every 5s with a 10s idle timeout
    let backend = CountingBackend::default();
    let cache = QueryCache::new(Duration::from_secs(10));
    let sweeper = cache
        .spawn_eviction(Duration::from_secs(5))
        .expect("non-zero period");
    cache
        .get(key("energy-intensity"), backend.fetcher(Duration::ZERO), QueryOptions::default())
        .await;

    // When: Enough time passes for a sweep after the timeout
    sleep(Duration::from_secs(16)).await;

    // Then: The entry is gone
    assert!(cache.is_empty());
    sweeper.abort();
}

#[tokio::test(start_paused = true)]
async fn when_eviction_period_is_zero_system_schedules_nothing() {
    // Given: A cache holding one entry
    let backend = CountingBackend::default();
    let cache = QueryCache::new(Duration::from_secs(1));
    cache
        .get(key("cost-metrics"), backend.fetcher(Duration::ZERO), QueryOptions::default())
        .await;

    // When: Eviction is requested with a zero period
    let sweeper = cache.spawn_eviction(Duration::ZERO);

    // Then: No task is started and the entry stays until evicted explicitly
    assert!(sweeper.is_none());
    sleep(Duration::from_secs(5)).await;
    assert!(cache.contains(&key("cost-metrics")));
    assert_eq!(cache.evict_idle(), 1);
}
