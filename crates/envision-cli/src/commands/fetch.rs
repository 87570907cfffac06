use std::process::ExitCode;

use envision_core::{DashboardQueries, QueryParams, Resource};

use crate::error::CliError;

use super::print_json;

pub async fn run<R: Resource>(
    queries: &DashboardQueries,
    params: QueryParams,
    pretty: bool,
) -> Result<ExitCode, CliError> {
    let state = queries.query::<R>(params).await;

    if let Some(error) = state.error {
        return Err(CliError::Api {
            resource: R::NAME,
            source: error,
        });
    }
    let data = state
        .data
        .ok_or_else(|| CliError::Command(format!("{} returned no data", R::NAME)))?;

    print_json(&*data, pretty)?;
    Ok(ExitCode::SUCCESS)
}
