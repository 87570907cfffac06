mod fetch;
mod resources;
mod watch;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use envision_core::domain::parse_date;
use envision_core::{
    Config, DashboardFilters, DashboardQueries, FixtureHttpClient, ForecastParams, QueryParams,
    ResourceKind,
};
use serde::Serialize;

use crate::cli::{Cli, Command, FilterArgs};
use crate::error::CliError;

/// Calls `handler::<Marker>(args..)` for the marker type behind a [`ResourceKind`].
macro_rules! dispatch {
    ($kind:expr, $($handler:ident)::+, ($($arg:expr),* $(,)?)) => {{
        use envision_core::resources as r;
        match $kind {
            ResourceKind::Kpis => $($handler)::+::<r::Kpis>($($arg),*).await,
            ResourceKind::EnergyTrend => $($handler)::+::<r::EnergyTrend>($($arg),*).await,
            ResourceKind::DeviationOverTime => $($handler)::+::<r::DeviationOverTime>($($arg),*).await,
            ResourceKind::Deviations => $($handler)::+::<r::Deviations>($($arg),*).await,
            ResourceKind::Anomalies => $($handler)::+::<r::Anomalies>($($arg),*).await,
            ResourceKind::Forecast => $($handler)::+::<r::Forecast>($($arg),*).await,
            ResourceKind::CarbonMetrics => $($handler)::+::<r::CarbonMetrics>($($arg),*).await,
            ResourceKind::CarbonBreakdown => $($handler)::+::<r::CarbonBreakdown>($($arg),*).await,
            ResourceKind::AiInsights => $($handler)::+::<r::AiInsights>($($arg),*).await,
            ResourceKind::Recommendations => $($handler)::+::<r::Recommendations>($($arg),*).await,
            ResourceKind::CostMetrics => $($handler)::+::<r::CostMetrics>($($arg),*).await,
            ResourceKind::EnergyIntensity => $($handler)::+::<r::EnergyIntensity>($($arg),*).await,
            ResourceKind::ActiveAppliances => $($handler)::+::<r::ActiveAppliances>($($arg),*).await,
        }
    }};
}

pub async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    match &cli.command {
        Command::Resources => resources::run(cli.pretty),
        Command::Fetch(args) => {
            let params = request_params(args.resource, &args.filters)?;
            let queries = build_queries(cli, load_config(cli)?);
            dispatch!(args.resource, fetch::run, (&queries, params, cli.pretty))
        }
        Command::Watch(args) => {
            let params = request_params(args.resource, &args.filters)?;
            let mut config = load_config(cli)?;
            if let Some(interval_ms) = args.interval_ms {
                config.query.refetch_interval =
                    (interval_ms > 0).then_some(Duration::from_millis(interval_ms));
            }
            let sweep_period = config.cache_idle;
            let queries = build_queries(cli, config);
            let maintenance = queries.spawn_maintenance(sweep_period);
            let outcome = dispatch!(args.resource, watch::run, (&queries, params, args.count));
            if let Some(maintenance) = maintenance {
                maintenance.abort();
            }
            outcome
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    let mut config = Config::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url.as_str());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config = config.with_timeout(Duration::from_millis(timeout_ms));
    }
    config.validate()?;
    Ok(config)
}

fn build_queries(cli: &Cli, config: Config) -> DashboardQueries {
    if cli.mock {
        DashboardQueries::with_http_client(Arc::new(FixtureHttpClient::new()), &config)
    } else {
        DashboardQueries::from_config(&config)
    }
}

/// Turns command-line filters into the parameters `kind` accepts.
fn request_params(kind: ResourceKind, filters: &FilterArgs) -> Result<QueryParams, CliError> {
    let invalid = |error: envision_core::ApiError| CliError::Command(error.to_string());

    if kind == ResourceKind::Forecast {
        if filters.has_window() {
            return Err(CliError::Command(
                "forecast takes --days and --model, not a date window".to_owned(),
            ));
        }
        let params = ForecastParams::new(filters.days, filters.model.map(Into::into))
            .map_err(invalid)?;
        return Ok(params.to_params());
    }

    if filters.has_forecast() {
        return Err(CliError::Command(format!(
            "--days and --model only apply to forecast, not {kind}"
        )));
    }
    if !kind.accepts_filters() {
        if filters.has_window() {
            return Err(CliError::Command(format!("{kind} takes no filters")));
        }
        return Ok(QueryParams::new());
    }

    let mut window = match (&filters.start_date, &filters.end_date) {
        (Some(start), Some(end)) => {
            let start = parse_date(start).map_err(invalid)?;
            let end = parse_date(end).map_err(invalid)?;
            DashboardFilters::between(start, end).map_err(invalid)?
        }
        (None, None) => DashboardFilters::none(),
        _ => {
            return Err(CliError::Command(
                "--start-date and --end-date must be given together".to_owned(),
            ))
        }
    };
    if let Some(range) = filters.range {
        window = window.with_range(range);
    }
    Ok(window.to_params())
}

fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<(), CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use envision_core::TimeRange;

    use super::*;
    use crate::cli::ModelArg;

    #[test]
    fn window_filters_become_query_params() {
        let filters = FilterArgs {
            range: Some(TimeRange::Last7Days),
            start_date: Some("2024-01-01".to_owned()),
            end_date: Some("2024-01-31".to_owned()),
            ..FilterArgs::default()
        };

        let params = request_params(ResourceKind::Kpis, &filters).expect("valid filters");
        assert_eq!(params.get("range"), Some("7d"));
        assert_eq!(params.get("start_date"), Some("2024-01-01"));
        assert_eq!(params.get("end_date"), Some("2024-01-31"));
    }

    #[test]
    fn forecast_takes_days_and_model_only() {
        let filters = FilterArgs {
            days: Some(30),
            model: Some(ModelArg::Lstm),
            ..FilterArgs::default()
        };
        let params = request_params(ResourceKind::Forecast, &filters).expect("valid filters");
        assert_eq!(params.get("days"), Some("30"));
        assert_eq!(params.get("model"), Some("lstm"));

        assert!(request_params(ResourceKind::Kpis, &filters).is_err());

        let windowed = FilterArgs {
            range: Some(TimeRange::Last24Hours),
            ..FilterArgs::default()
        };
        assert!(request_params(ResourceKind::Forecast, &windowed).is_err());
    }

    #[test]
    fn rejects_half_open_and_inverted_windows() {
        let half_open = FilterArgs {
            start_date: Some("2024-01-01".to_owned()),
            ..FilterArgs::default()
        };
        assert!(request_params(ResourceKind::EnergyTrend, &half_open).is_err());

        let inverted = FilterArgs {
            start_date: Some("2024-02-01".to_owned()),
            end_date: Some("2024-01-01".to_owned()),
            ..FilterArgs::default()
        };
        assert!(request_params(ResourceKind::EnergyTrend, &inverted).is_err());
    }

    #[test]
    fn unfiltered_resources_reject_windows() {
        let filters = FilterArgs {
            range: Some(TimeRange::Last30Days),
            ..FilterArgs::default()
        };
        assert!(request_params(ResourceKind::Deviations, &filters).is_err());
        assert!(request_params(ResourceKind::Deviations, &FilterArgs::default())
            .expect("no filters")
            .is_empty());
    }
}
