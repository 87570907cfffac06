//! # Domain Models
//!
//! Payload types for the EnVision dashboard resources and the request parameters that
//! select them.
//!
//! Every model mirrors what the analytics backend produces. Nothing here recomputes,
//! aggregates or filters values; KPI math, anomaly scoring and forecasting belong to
//! the backend.
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DashboardKpis`] | Aggregate KPI block |
//! | [`EnergyTrendPoint`] | Actual vs. baseline consumption sample |
//! | [`DeviationPoint`] | Deviation sample over time |
//! | [`ZoneDeviation`] | Per-zone deviation |
//! | [`AnomalyRecord`] | Detected anomaly |
//! | [`ForecastPoint`] | Historical or predicted consumption point |
//! | [`CarbonMetrics`] | Emission totals |
//! | [`CarbonBreakdownItem`] | Emissions per source |
//! | [`AiInsight`] | Backend-generated insight |
//! | [`Recommendation`] | Suggested action |
//! | [`CostMetrics`] | Cost summary |
//! | [`EnergyIntensity`] | Intensity and usage history |
//! | [`ActiveAppliance`] | Currently running appliance |
//!
//! ## Parameters
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DashboardFilters`] | `range` or explicit `start_date`/`end_date` window |
//! | [`TimeRange`] | `24h`, `7d`, `30d`, `90d` |
//! | [`ForecastParams`] | Forecast horizon and model |
//! | [`ForecastModel`] | `xgboost` or `lstm` |

mod filters;
mod models;

pub use filters::{
    parse_date, DashboardFilters, ForecastModel, ForecastParams, TimeRange,
};
pub use models::{
    ActiveAppliance, AiInsight, AnomalyRecord, CarbonBreakdownItem, CarbonMetrics,
    CostMetrics, DashboardKpis, DeviationPoint, EnergyIntensity, EnergyTrendPoint,
    ForecastPoint, ForecastResponse, KpiBlock, Recommendation, Severity,
    SustainabilityStatus, SystemStatus, UsagePoint, ZoneDeviation, ZoneId,
};
