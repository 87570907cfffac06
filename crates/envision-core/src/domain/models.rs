use serde::{Deserialize, Serialize};

/// Single headline KPI value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiBlock {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Percent change against the previous period, as computed by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemStatus {
    Stable,
    AtRisk,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SustainabilityStatus {
    OnTrack,
    Deviating,
    Exceeding,
}

/// Aggregate KPI block served by `/dashboard/kpis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardKpis {
    pub total_energy_consumption: KpiBlock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_cost: Option<KpiBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_saved: Option<KpiBlock>,
    pub over_consumption_percent: KpiBlock,
    pub co2_emissions: KpiBlock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_consumption: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_consumption: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_comparison: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_status: Option<SystemStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sustainability_status: Option<SustainabilityStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ingestion_timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyTrendPoint {
    pub date: String,
    pub actual: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationPoint {
    pub date: String,
    pub deviation: f64,
}

/// Zones are identified by name or by numeric department id depending on the backend
/// revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZoneId {
    Number(i64),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDeviation {
    pub zone: ZoneId,
    pub deviation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation_percent: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const NAMES: &'static [&'static str] = &["low", "medium", "high", "critical"];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_impact: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub forecast_date: String,
    pub predicted_kwh: f64,
    pub is_forecast: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
}

/// Body of `/dashboard/forecast`; only `values` is handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon_days: Option<u32>,
    pub values: Vec<ForecastPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarbonMetrics {
    pub total_emissions: f64,
    pub delta: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonBreakdownItem {
    pub source: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

/// Backend-generated insight. Older revisions send `title`/`description`, newer ones
/// `type`/`message`; both shapes are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiInsight {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub timestamp: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostMetrics {
    pub total_cost: f64,
    pub electricity_cost: f64,
    pub gas_cost: f64,
    pub previous_cost: f64,
    pub current_cost: f64,
    pub previous_month: String,
    pub current_month: String,
    pub cost_change_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePoint {
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyIntensity {
    pub intensity: f64,
    pub current_usage: f64,
    pub predicted_usage: f64,
    pub usage_history: Vec<UsagePoint>,
    pub carbon_till_date: f64,
    pub carbon_predicted: f64,
    pub green_energy_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAppliance {
    pub name: String,
    pub usage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_usage: Option<f64>,
}
