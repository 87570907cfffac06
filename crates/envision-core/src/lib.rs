//! # EnVision Core
//!
//! Data-access layer for the EnVision energy and carbon dashboard.
//!
//! ## Overview
//!
//! This crate talks to the EnVision analytics API and exposes its results to views:
//!
//! - **Transport** over reqwest with per-request timeouts and bearer auth
//! - **Retry policy** with exponential backoff for transient failures
//! - **Response validation** of the `{ success, data, message, error }` envelope
//!   against a declarative schema per resource
//! - **Typed endpoint functions**, one per dashboard resource
//! - **Query cache** with de-duplication, stale-while-revalidate and polling
//! - **View bindings** producing `{ data, is_loading, error }` with `refetch`
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bindings`] | Cache-backed resource queries and subscriptions |
//! | [`cache`] | Query cache, keys, states and subscriptions |
//! | [`client`] | Request descriptors and the retry-wrapped API client |
//! | [`config`] | Environment-driven configuration |
//! | [`domain`] | Payload models and request filters |
//! | [`endpoints`] | Typed endpoint functions and fallback policy |
//! | [`envelope`] | Response envelope and validator |
//! | [`error`] | Error taxonomy |
//! | [`fixtures`] | Demo payloads and offline transport |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`params`] | Normalised query parameters |
//! | [`resources`] | Resource declarations |
//! | [`retry`] | Retry policy |
//! | [`schema`] | Declarative JSON schemas |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use envision_core::{Config, DashboardFilters, DashboardQueries, TimeRange};
//! use envision_core::resources::Kpis;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let queries = DashboardQueries::from_config(&Config::from_env()?);
//!
//!     let filters = DashboardFilters::range(TimeRange::Last7Days);
//!     let state = queries.query::<Kpis>(filters.to_params()).await;
//!
//!     if let Some(kpis) = state.view().data {
//!         println!("total: {} kWh", kpis.total_energy_consumption.value);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  View Bindings  │  DashboardQueries, Subscription
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │   Query Cache   │  QueryCache
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Endpoints     │────▶│    Validator     │
//! │ (DashboardApi)  │     │ (validate_resp.) │
//! └─────────────────┘     └────────┬─────────┘
//!                                  ▼
//!                         ┌──────────────────┐
//!                         │   Retry Policy   │
//!                         └────────┬─────────┘
//!                                  ▼
//!                         ┌──────────────────┐
//!                         │    Transport     │
//!                         │    (reqwest)     │
//!                         └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Endpoint calls return [`ApiError`]. The cache never returns errors; it records them
//! on the entry next to the last good value:
//!
//! ```rust
//! use envision_core::{ApiError, ApiErrorKind};
//!
//! fn describe(error: &ApiError) -> &'static str {
//!     match error.kind() {
//!         ApiErrorKind::Transport | ApiErrorKind::Timeout => "backend unreachable",
//!         ApiErrorKind::Http => "backend rejected the request",
//!         ApiErrorKind::Application => "backend reported a failure",
//!         ApiErrorKind::Validation => "backend broke the response contract",
//!         _ => "request could not be made",
//!     }
//! }
//!
//! assert_eq!(
//!     describe(&ApiError::application("no data for range")),
//!     "backend reported a failure"
//! );
//! ```
//!
//! ## Logging
//!
//! The crate emits `tracing` events and never installs a subscriber.

pub mod bindings;
pub mod cache;
pub mod client;
pub mod config;
pub mod domain;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod fixtures;
pub mod http_client;
pub mod params;
pub mod resources;
pub mod retry;
pub mod schema;

// View bindings
pub use bindings::DashboardQueries;

// Caching
pub use cache::{
    QueryCache, QueryKey, QueryOptions, QueryState, QueryStatus, Subscription, ViewState,
};

// Client
pub use client::{ApiClient, RequestDescriptor};

// Configuration
pub use config::{ApiConfig, Config};

// Domain models
pub use domain::{
    ActiveAppliance, AiInsight, AnomalyRecord, CarbonBreakdownItem, CarbonMetrics, CostMetrics,
    DashboardFilters, DashboardKpis, DeviationPoint, EnergyIntensity, EnergyTrendPoint,
    ForecastModel, ForecastParams, ForecastPoint, Recommendation, Severity, TimeRange,
    ZoneDeviation,
};

// Endpoints
pub use endpoints::{DashboardApi, FallbackPolicy};

// Envelope and validation
pub use envelope::{validate_response, Envelope};

// Error types
pub use error::{ApiError, ApiErrorKind, ConfigError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
    ScriptedHttpClient, ScriptedReply, TransportError, TransportErrorKind,
};

pub use fixtures::FixtureHttpClient;
pub use params::QueryParams;
pub use resources::{Resource, ResourceKind};
pub use retry::{Backoff, RetryConfig, RetryingHttpClient};
pub use schema::{Field, Schema, SchemaViolation};
