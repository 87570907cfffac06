use std::sync::Arc;

use tracing::warn;

use crate::client::{ApiClient, RequestDescriptor};
use crate::config::Config;
use crate::domain::{
    ActiveAppliance, AiInsight, AnomalyRecord, CarbonBreakdownItem, CarbonMetrics, CostMetrics,
    DashboardFilters, DashboardKpis, DeviationPoint, EnergyIntensity, EnergyTrendPoint,
    ForecastParams, ForecastPoint, Recommendation, ZoneDeviation,
};
use crate::error::{ApiError, ApiErrorKind};
use crate::http_client::HttpClient;
use crate::params::QueryParams;
use crate::resources::{self, Resource};

/// What to do when a resource cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Surface the error to the caller.
    #[default]
    Propagate,
    /// Degrade to the resource's placeholder when it defines one.
    Placeholder,
}

/// Typed endpoint functions for the dashboard API.
///
/// Results are returned exactly as the backend produced them.
#[derive(Debug, Clone)]
pub struct DashboardApi {
    client: ApiClient,
    fallback: FallbackPolicy,
}

impl DashboardApi {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            fallback: FallbackPolicy::Propagate,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ApiClient::new(config)).with_fallback(config.fallback)
    }

    pub fn with_http_client(http: Arc<dyn HttpClient>, config: &Config) -> Self {
        Self::new(ApiClient::with_http_client(http, config)).with_fallback(config.fallback)
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Fetches and validates any resource, degrading to its placeholder when the
    /// fallback policy allows it.
    ///
    /// A response that breaks the backend contract is never degraded.
    pub async fn fetch<R: Resource>(&self, params: &QueryParams) -> Result<R::Output, ApiError> {
        match self.fetch_strict::<R>(params).await {
            Err(error) if self.degrades(&error) => match R::placeholder() {
                Some(placeholder) => {
                    warn!(
                        resource = R::NAME,
                        error = %error,
                        "fetch failed, serving placeholder"
                    );
                    Ok(placeholder)
                }
                None => Err(error),
            },
            other => other,
        }
    }

    /// Fetches and validates any resource. Failures are always returned.
    pub async fn fetch_strict<R: Resource>(
        &self,
        params: &QueryParams,
    ) -> Result<R::Output, ApiError> {
        let descriptor = RequestDescriptor::get(R::NAME, R::PATH, params.clone());
        self.client
            .fetch::<R::Payload>(&descriptor, &R::schema())
            .await
            .map(R::extract)
    }

    /// Whether `error` may be replaced by a placeholder under the current policy.
    pub fn degrades(&self, error: &ApiError) -> bool {
        self.fallback == FallbackPolicy::Placeholder && error.kind() != ApiErrorKind::Validation
    }

    pub async fn kpis(&self, filters: &DashboardFilters) -> Result<DashboardKpis, ApiError> {
        self.fetch::<resources::Kpis>(&filters.to_params()).await
    }

    pub async fn energy_trend(
        &self,
        filters: &DashboardFilters,
    ) -> Result<Vec<EnergyTrendPoint>, ApiError> {
        self.fetch::<resources::EnergyTrend>(&filters.to_params()).await
    }

    pub async fn deviation_over_time(
        &self,
        filters: &DashboardFilters,
    ) -> Result<Vec<DeviationPoint>, ApiError> {
        self.fetch::<resources::DeviationOverTime>(&filters.to_params())
            .await
    }

    pub async fn deviations(&self) -> Result<Vec<ZoneDeviation>, ApiError> {
        self.fetch::<resources::Deviations>(&QueryParams::new()).await
    }

    pub async fn anomalies(
        &self,
        filters: &DashboardFilters,
    ) -> Result<Vec<AnomalyRecord>, ApiError> {
        self.fetch::<resources::Anomalies>(&filters.to_params()).await
    }

    pub async fn forecast(&self, params: &ForecastParams) -> Result<Vec<ForecastPoint>, ApiError> {
        self.fetch::<resources::Forecast>(&params.to_params()).await
    }

    pub async fn carbon_metrics(
        &self,
        filters: &DashboardFilters,
    ) -> Result<CarbonMetrics, ApiError> {
        self.fetch::<resources::CarbonMetrics>(&filters.to_params()).await
    }

    pub async fn carbon_breakdown(
        &self,
        filters: &DashboardFilters,
    ) -> Result<Vec<CarbonBreakdownItem>, ApiError> {
        self.fetch::<resources::CarbonBreakdown>(&filters.to_params())
            .await
    }

    pub async fn ai_insights(&self, filters: &DashboardFilters) -> Result<Vec<AiInsight>, ApiError> {
        self.fetch::<resources::AiInsights>(&filters.to_params()).await
    }

    pub async fn recommendations(
        &self,
        filters: &DashboardFilters,
    ) -> Result<Vec<Recommendation>, ApiError> {
        self.fetch::<resources::Recommendations>(&filters.to_params())
            .await
    }

    pub async fn cost_metrics(
        &self,
        filters: &DashboardFilters,
    ) -> Result<CostMetrics, ApiError> {
        self.fetch::<resources::CostMetrics>(&filters.to_params()).await
    }

    pub async fn energy_intensity(
        &self,
        filters: &DashboardFilters,
    ) -> Result<EnergyIntensity, ApiError> {
        self.fetch::<resources::EnergyIntensity>(&filters.to_params())
            .await
    }

    pub async fn active_appliances(
        &self,
        filters: &DashboardFilters,
    ) -> Result<Vec<ActiveAppliance>, ApiError> {
        self.fetch::<resources::ActiveAppliances>(&filters.to_params())
            .await
    }
}
