//! Demo payloads and an offline transport that serves them.
//!
//! Used by the CLI `--mock` flag and by contract tests. Nothing substitutes these
//! payloads for real responses implicitly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{json, Value};

use crate::http_client::{HttpClient, HttpRequest, HttpResponse, TransportError, TransportFuture};
use crate::resources::ResourceKind;

/// Sample `data` member for a resource, shaped like the backend's stub responses.
pub fn sample_data(kind: ResourceKind) -> Value {
    match kind {
        ResourceKind::Kpis => json!({
            "totalEnergyConsumption": {"value": 45230.5, "unit": "kWh", "delta": -3.2},
            "energyCost": {"value": 6784.58, "unit": "USD", "delta": -2.1},
            "energySaved": {"value": 1520.0, "unit": "kWh", "delta": 4.5},
            "overConsumptionPercent": {"value": 7.8, "delta": 1.2},
            "co2Emissions": {"value": 18.4, "unit": "tCO2e", "delta": -0.6},
            "avgConsumption": 1507.7,
            "peakConsumption": 2210.0,
            "baselineComparison": -3.2,
            "systemStatus": "stable",
            "sustainabilityStatus": "on-track",
            "lastIngestionTimestamp": "2024-01-31T23:45:00Z"
        }),
        ResourceKind::EnergyTrend => json!([
            {"date": "2024-01-29", "actual": 1480.2, "baseline": 1500.0},
            {"date": "2024-01-30", "actual": 1612.9, "baseline": 1500.0},
            {"date": "2024-01-31", "actual": 1455.4, "baseline": 1500.0}
        ]),
        ResourceKind::DeviationOverTime => json!([
            {"date": "2024-01-29", "deviation": -19.8},
            {"date": "2024-01-30", "deviation": 112.9},
            {"date": "2024-01-31", "deviation": -44.6}
        ]),
        ResourceKind::Deviations => json!([
            {"zone": 3, "deviation": 18250.0},
            {"zone": 1, "deviation": 14120.5},
            {"zone": 2, "deviation": 9870.25}
        ]),
        ResourceKind::Anomalies => json!([
            {
                "timestamp": "2024-01-04T14:32:00Z",
                "value": 185000,
                "severity": "high",
                "description": "HVAC spike in Building A",
                "impact": "high",
                "affectedSystem": "HVAC",
                "timeWindow": "2:00 PM - 2:30 PM",
                "energyImpact": 2400,
                "explanation": "Deviation from baseline detected",
                "model": "Isolation Forest"
            }
        ]),
        ResourceKind::Forecast => json!({
            "model": "xgboost",
            "horizon_days": 2,
            "values": [
                {"forecast_date": "2024-01-01", "predicted_kwh": 100, "is_forecast": false},
                {"forecast_date": "2024-01-02", "predicted_kwh": 110, "is_forecast": true}
            ]
        }),
        ResourceKind::CarbonMetrics => json!({
            "totalEmissions": 18.4,
            "delta": -3.1,
            "unit": "tCO2e",
            "period": "2024-01-01 to 2024-01-31"
        }),
        ResourceKind::CarbonBreakdown => json!([
            {"source": "Electricity", "value": 12.6, "scope": "Scope 2", "percentage": 68.48},
            {"source": "Natural Gas", "value": 5.8, "scope": "Scope 1", "percentage": 31.52}
        ]),
        ResourceKind::AiInsights => json!([
            {
                "id": "1",
                "type": "alert",
                "message": "Unusual spike detected in HVAC",
                "timestamp": "2024-01-31T09:15:00",
                "severity": "high"
            }
        ]),
        ResourceKind::Recommendations => json!([
            {
                "id": "1",
                "severity": "high",
                "category": "efficiency",
                "title": "Reduce HVAC usage",
                "description": "HVAC running during low occupancy",
                "impact": "Save 2400 kWh/week",
                "why": "Occupancy < 15% after 6 PM"
            }
        ]),
        ResourceKind::CostMetrics => json!({
            "total_cost": 6784.58,
            "electricity_cost": 5427.66,
            "gas_cost": 1356.92,
            "previous_cost": 6930.1,
            "current_cost": 6784.58,
            "previous_month": "2023-12",
            "current_month": "2024-01",
            "cost_change_percent": -2.1
        }),
        ResourceKind::EnergyIntensity => json!({
            "intensity": 112.4,
            "current_usage": 45230.5,
            "predicted_usage": 47100.0,
            "usage_history": [
                {"date": "2024-01-29", "value": 1480.2},
                {"date": "2024-01-30", "value": 1612.9},
                {"date": "2024-01-31", "value": 1455.4}
            ],
            "carbon_till_date": 18.4,
            "carbon_predicted": 19.1,
            "green_energy_percent": 22.5
        }),
        ResourceKind::ActiveAppliances => json!([
            {"name": "HVAC", "usage": 820.5, "maxUsage": 1200.0},
            {"name": "Lighting", "usage": 240.0, "maxUsage": 400.0},
            {"name": "Servers", "usage": 515.2}
        ]),
    }
}

/// Successful envelope around [`sample_data`].
pub fn sample_envelope(kind: ResourceKind) -> Value {
    json!({"success": true, "data": sample_data(kind)})
}

/// Offline transport answering every known resource path with its sample envelope.
#[derive(Debug, Default)]
pub struct FixtureHttpClient {
    latency: Duration,
    calls: AtomicUsize,
}

impl FixtureHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated latency applied to every response.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn respond(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|error| TransportError::other(format!("invalid url '{}': {error}", request.url)))?;

        let response = match ResourceKind::from_path(url.path()) {
            Some(kind) => HttpResponse::ok_json(sample_envelope(kind).to_string()),
            None => HttpResponse::new(
                404,
                json!({"success": false, "error": format!("no resource at {}", url.path())})
                    .to_string(),
            ),
        };
        Ok(response)
    }
}

impl HttpClient for FixtureHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                if self.latency.as_millis() as u64 > request.timeout_ms {
                    tokio::time::sleep(Duration::from_millis(request.timeout_ms)).await;
                    return Err(TransportError::timeout(request.timeout_ms));
                }
                tokio::time::sleep(self.latency).await;
            }
            self.respond(&request)
        })
    }
}
