use std::process::ExitCode;

use envision_core::ResourceKind;
use serde::Serialize;

use crate::error::CliError;

use super::print_json;

#[derive(Debug, Serialize)]
struct ResourceRow {
    name: &'static str,
    path: &'static str,
    filters: &'static [&'static str],
}

pub fn run(pretty: bool) -> Result<ExitCode, CliError> {
    let rows: Vec<ResourceRow> = ResourceKind::ALL
        .into_iter()
        .map(|kind| ResourceRow {
            name: kind.name(),
            path: kind.path(),
            filters: filters_for(kind),
        })
        .collect();

    print_json(&rows, pretty)?;
    Ok(ExitCode::SUCCESS)
}

fn filters_for(kind: ResourceKind) -> &'static [&'static str] {
    if kind == ResourceKind::Forecast {
        &["days", "model"]
    } else if kind.accepts_filters() {
        &["range", "start_date", "end_date"]
    } else {
        &[]
    }
}
