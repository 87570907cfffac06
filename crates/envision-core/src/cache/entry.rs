use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::state::{QueryOptions, QueryState, QueryStatus};
use crate::error::{ApiError, ApiErrorKind};

pub(crate) type ErasedValue = Arc<dyn Any + Send + Sync>;
pub(crate) type FetchResult = Result<ErasedValue, ApiError>;
pub(crate) type ErasedFetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;
pub(crate) type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

pub(crate) fn erase_fetcher<V, F, Fut>(fetcher: F) -> ErasedFetcher
where
    V: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
{
    Arc::new(move || {
        let fetch = fetcher();
        async move { fetch.await.map(erase_value) }.boxed()
    })
}

pub(crate) fn erase_value<V: Send + Sync + 'static>(value: V) -> ErasedValue {
    Arc::new(value)
}

pub(crate) struct InFlight {
    pub generation: u64,
    pub future: SharedFetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Freshness {
    Missing,
    Fresh,
    Stale,
    Expired,
}

impl Freshness {
    /// Whether a caller has to wait for a fetch before anything can be shown.
    pub fn blocks(self) -> bool {
        matches!(self, Self::Missing | Self::Expired)
    }
}

pub(crate) struct Entry {
    pub status: QueryStatus,
    pub value: Option<ErasedValue>,
    pub error: Option<ApiError>,
    pub last_fetched_at: Option<Instant>,
    pub last_success_at: Option<Instant>,
    pub updated_at: Option<OffsetDateTime>,
    pub last_access: Instant,
    pub invalidated: bool,
    pub in_flight: Option<InFlight>,
    pub issued_generation: u64,
    pub fetcher: ErasedFetcher,
    /// Shown in place of a value while the entry has never fetched successfully
    /// and its last fetch failed.
    pub placeholder: Option<ErasedValue>,
    pub options: QueryOptions,
    pub consumers: usize,
    pub poller: Option<JoinHandle<()>>,
    pub version: watch::Sender<u64>,
}

impl Entry {
    pub fn new(fetcher: ErasedFetcher, options: QueryOptions, now: Instant) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            status: QueryStatus::Idle,
            value: None,
            error: None,
            last_fetched_at: None,
            last_success_at: None,
            updated_at: None,
            last_access: now,
            invalidated: false,
            in_flight: None,
            issued_generation: 0,
            fetcher,
            placeholder: None,
            options,
            consumers: 0,
            poller: None,
            version,
        }
    }

    pub fn freshness(&self, now: Instant) -> Freshness {
        let (Some(_), Some(succeeded)) = (&self.value, self.last_success_at) else {
            return Freshness::Missing;
        };

        let age = now.saturating_duration_since(succeeded);
        if age >= self.options.expire_time {
            Freshness::Expired
        } else if self.invalidated || age >= self.options.stale_time {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }

    /// The value to show: the last fetched one, else the placeholder after a failure
    /// that is not a contract break.
    fn displayed(&self) -> Option<ErasedValue> {
        match (&self.value, &self.error) {
            (Some(value), _) => Some(Arc::clone(value)),
            (None, Some(error)) if error.kind() != ApiErrorKind::Validation => {
                self.placeholder.clone()
            }
            _ => None,
        }
    }

    pub fn notify(&self) {
        self.version.send_modify(|version| *version += 1);
    }

    pub fn snapshot<V: Send + Sync + 'static>(&self, now: Instant) -> QueryState<V> {
        let freshness = self.freshness(now);
        let (data, mismatch) = match self.displayed().map(|value| value.downcast::<V>()) {
            Some(Ok(data)) => (Some(data), false),
            Some(Err(_)) => (None, true),
            None => (None, false),
        };

        let error = if mismatch {
            Some(ApiError::internal(format!(
                "cached value is not a {}",
                std::any::type_name::<V>()
            )))
        } else {
            self.error.clone()
        };

        QueryState {
            status: self.status,
            data,
            error,
            is_fetching: self.in_flight.is_some(),
            is_stale: matches!(freshness, Freshness::Stale | Freshness::Expired),
            is_expired: freshness == Freshness::Expired,
            updated_at: self.updated_at,
        }
    }
}
