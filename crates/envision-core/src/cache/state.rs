use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;

use crate::error::ApiError;

/// Fetch lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    /// Never fetched.
    Idle,
    /// First fetch outstanding, nothing to show yet.
    Loading,
    Success,
    /// Last fetch failed. A previously fetched value may still be present.
    Error,
}

impl QueryStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl Display for QueryStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Freshness and polling settings for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Age after which a value is revalidated in the background on access.
    pub stale_time: Duration,
    /// Age after which a value is no longer served.
    pub expire_time: Duration,
    /// Background polling period while the key has consumers.
    pub refetch_interval: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(10),
            expire_time: Duration::from_secs(300),
            refetch_interval: None,
        }
    }
}

impl QueryOptions {
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_expire_time(mut self, expire_time: Duration) -> Self {
        self.expire_time = expire_time;
        self
    }

    pub fn with_refetch_interval(mut self, interval: Option<Duration>) -> Self {
        self.refetch_interval = interval;
        self
    }
}

/// Typed snapshot of a cache entry.
#[derive(Debug)]
pub struct QueryState<V> {
    pub status: QueryStatus,
    pub data: Option<Arc<V>>,
    pub error: Option<ApiError>,
    pub is_fetching: bool,
    pub is_stale: bool,
    pub is_expired: bool,
    /// Wall-clock time of the last successful fetch.
    pub updated_at: Option<OffsetDateTime>,
}

impl<V> Clone for QueryState<V> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
            is_expired: self.is_expired,
            updated_at: self.updated_at,
        }
    }
}

impl<V> QueryState<V> {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_fetching: false,
            is_stale: false,
            is_expired: false,
            updated_at: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    /// The value if it may still be displayed.
    pub fn servable(&self) -> Option<&Arc<V>> {
        self.data.as_ref().filter(|_| !self.is_expired)
    }

    /// Presentation shape: `{ data, isLoading, error }`.
    pub fn view(&self) -> ViewState<V> {
        let data = self.servable().cloned();
        ViewState {
            is_loading: data.is_none() && (self.is_fetching || self.status == QueryStatus::Loading),
            data,
            error: self.error.clone(),
        }
    }
}

/// What a view renders.
#[derive(Debug)]
pub struct ViewState<V> {
    pub data: Option<Arc<V>>,
    pub is_loading: bool,
    pub error: Option<ApiError>,
}

impl<V> Clone for ViewState<V> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            is_loading: self.is_loading,
            error: self.error.clone(),
        }
    }
}
