use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;

use crate::error::ApiError;
use crate::params::QueryParams;

/// Relative reporting window understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "24h")]
    Last24Hours,
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
}

impl TimeRange {
    pub const ALL: [Self; 4] = [
        Self::Last24Hours,
        Self::Last7Days,
        Self::Last30Days,
        Self::Last90Days,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Last24Hours => "24h",
            Self::Last7Days => "7d",
            Self::Last30Days => "30d",
            Self::Last90Days => "90d",
        }
    }
}

impl Display for TimeRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = ApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|range| range.as_str() == value.trim())
            .ok_or_else(|| {
                ApiError::invalid_request(format!(
                    "invalid range '{value}', expected one of 24h, 7d, 30d, 90d"
                ))
            })
    }
}

/// Reporting window shared by most dashboard resources.
///
/// An explicit date range takes precedence over `range` on the backend; both are
/// forwarded as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DashboardFilters {
    range: Option<TimeRange>,
    start_date: Option<Date>,
    end_date: Option<Date>,
}

impl DashboardFilters {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn range(range: TimeRange) -> Self {
        Self {
            range: Some(range),
            ..Self::default()
        }
    }

    /// Explicit window; `start` must be strictly before `end`.
    pub fn between(start: Date, end: Date) -> Result<Self, ApiError> {
        if start >= end {
            return Err(ApiError::invalid_request(format!(
                "start_date {start} must be before end_date {end}"
            )));
        }

        Ok(Self {
            range: None,
            start_date: Some(start),
            end_date: Some(end),
        })
    }

    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn time_range(&self) -> Option<TimeRange> {
        self.range
    }

    pub fn start_date(&self) -> Option<Date> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<Date> {
        self.end_date
    }

    pub fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .with_opt("range", self.range)
            .with_opt("start_date", self.start_date)
            .with_opt("end_date", self.end_date)
    }
}

impl From<&DashboardFilters> for QueryParams {
    fn from(filters: &DashboardFilters) -> Self {
        filters.to_params()
    }
}

impl From<DashboardFilters> for QueryParams {
    fn from(filters: DashboardFilters) -> Self {
        filters.to_params()
    }
}

/// Parses a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(value: &str) -> Result<Date, ApiError> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).map_err(|error| {
        ApiError::invalid_request(format!("invalid date '{value}': {error}"))
    })
}

/// Forecasting model selectable on `/dashboard/forecast`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastModel {
    Xgboost,
    Lstm,
}

impl ForecastModel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xgboost => "xgboost",
            Self::Lstm => "lstm",
        }
    }
}

impl Display for ForecastModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ForecastParams {
    days: Option<u32>,
    model: Option<ForecastModel>,
}

impl ForecastParams {
    pub fn new(days: Option<u32>, model: Option<ForecastModel>) -> Result<Self, ApiError> {
        if days == Some(0) {
            return Err(ApiError::invalid_request(
                "forecast horizon must be at least one day",
            ));
        }

        Ok(Self { days, model })
    }

    pub fn days(&self) -> Option<u32> {
        self.days
    }

    pub fn model(&self) -> Option<ForecastModel> {
        self.model
    }

    pub fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .with_opt("days", self.days)
            .with_opt("model", self.model)
    }
}

impl From<&ForecastParams> for QueryParams {
    fn from(params: &ForecastParams) -> Self {
        params.to_params()
    }
}

impl From<ForecastParams> for QueryParams {
    fn from(params: ForecastParams) -> Self {
        params.to_params()
    }
}
