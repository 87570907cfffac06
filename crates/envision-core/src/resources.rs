//! Resource declarations.
//!
//! Each dashboard resource is a zero-sized marker type implementing [`Resource`]. The
//! marker fixes the resource name used in cache keys, the request path, the expected
//! `data` schema and the serde types used to decode it.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{
    self, ActiveAppliance, AiInsight, AnomalyRecord, CarbonBreakdownItem, DashboardKpis,
    DeviationPoint, EnergyTrendPoint, ForecastPoint, ForecastResponse, Recommendation, Severity,
    ZoneDeviation,
};
use crate::error::ApiError;
use crate::schema::{Field, Schema};

/// Static description of one backend resource.
pub trait Resource: Send + Sync + 'static {
    /// Resource identifier used in cache keys and logs.
    const NAME: &'static str;
    /// Request path relative to the API base URL.
    const PATH: &'static str;

    /// Type of the envelope `data` member.
    type Payload: DeserializeOwned + Send;
    /// Type handed to callers.
    type Output: Serialize + Send + Sync + 'static;

    fn schema() -> Schema;

    /// Structural projection from payload to output. Never computes derived values.
    fn extract(payload: Self::Payload) -> Self::Output;

    /// Value to degrade to when fetching fails and placeholders are enabled.
    fn placeholder() -> Option<Self::Output> {
        None
    }
}

macro_rules! list_resource {
    ($(#[$meta:meta])* $marker:ident, $name:literal, $path:literal, $item:ty, $schema:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $marker;

        impl Resource for $marker {
            const NAME: &'static str = $name;
            const PATH: &'static str = $path;

            type Payload = Vec<$item>;
            type Output = Vec<$item>;

            fn schema() -> Schema {
                Schema::array($schema)
            }

            fn extract(payload: Self::Payload) -> Self::Output {
                payload
            }

            fn placeholder() -> Option<Self::Output> {
                Some(Vec::new())
            }
        }
    };
}

macro_rules! object_resource {
    ($(#[$meta:meta])* $marker:ident, $name:literal, $path:literal, $output:ty, $schema:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $marker;

        impl Resource for $marker {
            const NAME: &'static str = $name;
            const PATH: &'static str = $path;

            type Payload = $output;
            type Output = $output;

            fn schema() -> Schema {
                $schema
            }

            fn extract(payload: Self::Payload) -> Self::Output {
                payload
            }
        }
    };
}

object_resource!(
    /// Aggregate KPI block.
    Kpis,
    "kpis",
    "/dashboard/kpis",
    DashboardKpis,
    kpis_schema()
);

list_resource!(
    EnergyTrend,
    "energy-trend",
    "/dashboard/energy-trend",
    EnergyTrendPoint,
    Schema::object([
        Field::required("date", Schema::String),
        Field::required("actual", Schema::Number),
        Field::optional("baseline", Schema::Number),
    ])
);

list_resource!(
    DeviationOverTime,
    "deviation-over-time",
    "/dashboard/deviation-over-time",
    DeviationPoint,
    Schema::object([
        Field::required("date", Schema::String),
        Field::required("deviation", Schema::Number),
    ])
);

list_resource!(
    /// Per-zone deviation breakdown.
    Deviations,
    "deviations",
    "/dashboard/deviations",
    ZoneDeviation,
    Schema::object([
        Field::required("zone", Schema::one_of([Schema::String, Schema::Integer])),
        Field::required("deviation", Schema::Number),
        Field::optional("actual", Schema::Number),
        Field::optional("baseline", Schema::Number),
        Field::optional("deviationPercent", Schema::Number),
    ])
);

list_resource!(
    Anomalies,
    "anomalies",
    "/dashboard/anomalies",
    AnomalyRecord,
    Schema::object([
        Field::optional("id", Schema::String),
        Field::required("timestamp", Schema::String),
        Field::optional("value", Schema::Number),
        Field::required("severity", Schema::Enum(Severity::NAMES)),
        Field::required("description", Schema::String),
        Field::optional("impact", Schema::String),
        Field::optional("affectedSystem", Schema::String),
        Field::optional("timeWindow", Schema::String),
        Field::optional("energyImpact", Schema::Number),
        Field::optional("explanation", Schema::String),
        Field::optional("model", Schema::String),
    ])
);

/// Consumption forecast. The backend wraps the points in `{ values }`; only the points
/// are handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Forecast;

impl Resource for Forecast {
    const NAME: &'static str = "forecast";
    const PATH: &'static str = "/dashboard/forecast";

    type Payload = ForecastResponse;
    type Output = Vec<ForecastPoint>;

    fn schema() -> Schema {
        Schema::object([
            Field::optional("model", Schema::String),
            Field::optional("horizon_days", Schema::Integer),
            Field::required(
                "values",
                Schema::array(Schema::object([
                    Field::required("forecast_date", Schema::String),
                    Field::required("predicted_kwh", Schema::Number),
                    Field::required("is_forecast", Schema::Bool),
                    Field::optional("lower_bound", Schema::Number),
                    Field::optional("upper_bound", Schema::Number),
                ])),
            ),
        ])
    }

    fn extract(payload: Self::Payload) -> Self::Output {
        payload.values
    }

    fn placeholder() -> Option<Self::Output> {
        Some(Vec::new())
    }
}

object_resource!(
    CarbonMetrics,
    "carbon-metrics",
    "/dashboard/carbon-metrics",
    domain::CarbonMetrics,
    Schema::object([
        Field::required("totalEmissions", Schema::Number),
        Field::required("delta", Schema::Number),
        Field::optional("unit", Schema::String),
        Field::optional("period", Schema::String),
    ])
);

list_resource!(
    CarbonBreakdown,
    "carbon-breakdown",
    "/dashboard/carbon-breakdown",
    CarbonBreakdownItem,
    Schema::object([
        Field::required("source", Schema::String),
        Field::required("value", Schema::Number),
        Field::optional("scope", Schema::String),
        Field::optional("percentage", Schema::Number),
    ])
);

list_resource!(
    AiInsights,
    "ai-insights",
    "/dashboard/ai-insights",
    AiInsight,
    Schema::object([
        Field::optional("id", Schema::String),
        Field::optional("type", Schema::String),
        Field::optional("title", Schema::String),
        Field::optional("message", Schema::String),
        Field::optional("description", Schema::String),
        Field::required("timestamp", Schema::String),
        Field::required("severity", Schema::Enum(Severity::NAMES)),
    ])
);

list_resource!(
    Recommendations,
    "recommendations",
    "/dashboard/recommendations",
    Recommendation,
    Schema::object([
        Field::optional("id", Schema::String),
        Field::required("severity", Schema::Enum(Severity::NAMES)),
        Field::optional("category", Schema::String),
        Field::required("title", Schema::String),
        Field::required("description", Schema::String),
        Field::optional("impact", Schema::String),
        Field::optional("why", Schema::String),
    ])
);

object_resource!(
    CostMetrics,
    "cost-metrics",
    "/dashboard/cost-metrics",
    domain::CostMetrics,
    Schema::object([
        Field::required("total_cost", Schema::Number),
        Field::required("electricity_cost", Schema::Number),
        Field::required("gas_cost", Schema::Number),
        Field::required("previous_cost", Schema::Number),
        Field::required("current_cost", Schema::Number),
        Field::required("previous_month", Schema::String),
        Field::required("current_month", Schema::String),
        Field::required("cost_change_percent", Schema::Number),
    ])
);

object_resource!(
    EnergyIntensity,
    "energy-intensity",
    "/dashboard/energy-intensity",
    domain::EnergyIntensity,
    Schema::object([
        Field::required("intensity", Schema::Number),
        Field::required("current_usage", Schema::Number),
        Field::required("predicted_usage", Schema::Number),
        Field::required(
            "usage_history",
            Schema::array(Schema::object([
                Field::required("date", Schema::String),
                Field::required("value", Schema::Number),
            ])),
        ),
        Field::required("carbon_till_date", Schema::Number),
        Field::required("carbon_predicted", Schema::Number),
        Field::required("green_energy_percent", Schema::Number),
    ])
);

list_resource!(
    ActiveAppliances,
    "active-appliances",
    "/dashboard/active-appliances",
    ActiveAppliance,
    Schema::object([
        Field::required("name", Schema::String),
        Field::required("usage", Schema::Number),
        Field::optional("maxUsage", Schema::Number),
    ])
);

fn kpi_block() -> Schema {
    Schema::object([
        Field::required("value", Schema::Number),
        Field::optional("unit", Schema::String),
        Field::optional("delta", Schema::Number),
        Field::optional("period", Schema::String),
    ])
}

fn kpis_schema() -> Schema {
    Schema::object([
        Field::required("totalEnergyConsumption", kpi_block()),
        Field::optional("energyCost", kpi_block()),
        Field::optional("energySaved", kpi_block()),
        Field::required("overConsumptionPercent", kpi_block()),
        Field::required("co2Emissions", kpi_block()),
        Field::optional("avgConsumption", Schema::Number),
        Field::optional("peakConsumption", Schema::Number),
        Field::optional("baselineComparison", Schema::Number),
        Field::optional(
            "systemStatus",
            Schema::Enum(&["stable", "at-risk", "critical"]),
        ),
        Field::optional(
            "sustainabilityStatus",
            Schema::Enum(&["on-track", "deviating", "exceeding"]),
        ),
        Field::optional("lastIngestionTimestamp", Schema::String),
    ])
}

/// Runtime handle for every resource, used for listing and name-based dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Kpis,
    EnergyTrend,
    DeviationOverTime,
    Deviations,
    Anomalies,
    Forecast,
    CarbonMetrics,
    CarbonBreakdown,
    AiInsights,
    Recommendations,
    CostMetrics,
    EnergyIntensity,
    ActiveAppliances,
}

impl ResourceKind {
    pub const ALL: [Self; 13] = [
        Self::Kpis,
        Self::EnergyTrend,
        Self::DeviationOverTime,
        Self::Deviations,
        Self::Anomalies,
        Self::Forecast,
        Self::CarbonMetrics,
        Self::CarbonBreakdown,
        Self::AiInsights,
        Self::Recommendations,
        Self::CostMetrics,
        Self::EnergyIntensity,
        Self::ActiveAppliances,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Kpis => Kpis::NAME,
            Self::EnergyTrend => EnergyTrend::NAME,
            Self::DeviationOverTime => DeviationOverTime::NAME,
            Self::Deviations => Deviations::NAME,
            Self::Anomalies => Anomalies::NAME,
            Self::Forecast => Forecast::NAME,
            Self::CarbonMetrics => CarbonMetrics::NAME,
            Self::CarbonBreakdown => CarbonBreakdown::NAME,
            Self::AiInsights => AiInsights::NAME,
            Self::Recommendations => Recommendations::NAME,
            Self::CostMetrics => CostMetrics::NAME,
            Self::EnergyIntensity => EnergyIntensity::NAME,
            Self::ActiveAppliances => ActiveAppliances::NAME,
        }
    }

    pub const fn path(self) -> &'static str {
        match self {
            Self::Kpis => Kpis::PATH,
            Self::EnergyTrend => EnergyTrend::PATH,
            Self::DeviationOverTime => DeviationOverTime::PATH,
            Self::Deviations => Deviations::PATH,
            Self::Anomalies => Anomalies::PATH,
            Self::Forecast => Forecast::PATH,
            Self::CarbonMetrics => CarbonMetrics::PATH,
            Self::CarbonBreakdown => CarbonBreakdown::PATH,
            Self::AiInsights => AiInsights::PATH,
            Self::Recommendations => Recommendations::PATH,
            Self::CostMetrics => CostMetrics::PATH,
            Self::EnergyIntensity => EnergyIntensity::PATH,
            Self::ActiveAppliances => ActiveAppliances::PATH,
        }
    }

    pub fn schema(self) -> Schema {
        match self {
            Self::Kpis => Kpis::schema(),
            Self::EnergyTrend => EnergyTrend::schema(),
            Self::DeviationOverTime => DeviationOverTime::schema(),
            Self::Deviations => Deviations::schema(),
            Self::Anomalies => Anomalies::schema(),
            Self::Forecast => Forecast::schema(),
            Self::CarbonMetrics => CarbonMetrics::schema(),
            Self::CarbonBreakdown => CarbonBreakdown::schema(),
            Self::AiInsights => AiInsights::schema(),
            Self::Recommendations => Recommendations::schema(),
            Self::CostMetrics => CostMetrics::schema(),
            Self::EnergyIntensity => EnergyIntensity::schema(),
            Self::ActiveAppliances => ActiveAppliances::schema(),
        }
    }

    /// Whether the resource accepts `range`/`start_date`/`end_date`.
    pub const fn accepts_filters(self) -> bool {
        !matches!(self, Self::Forecast | Self::Deviations)
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        Self::ALL.into_iter().find(|kind| kind.path() == path)
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceKind {
    type Err = ApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == value)
            .ok_or_else(|| ApiError::invalid_request(format!("unknown resource '{value}'")))
    }
}
