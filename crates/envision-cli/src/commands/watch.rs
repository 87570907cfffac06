use std::process::ExitCode;

use envision_core::{DashboardQueries, QueryParams, QueryState, QueryStatus, Resource};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

use crate::error::CliError;

use super::print_json;

/// One NDJSON line per observed state.
#[derive(Debug, Serialize)]
struct StateLine<'a, V> {
    resource: &'static str,
    status: QueryStatus,
    is_loading: bool,
    is_fetching: bool,
    is_stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
    data: Option<&'a V>,
}

impl<'a, V> StateLine<'a, V> {
    fn new(resource: &'static str, state: &'a QueryState<V>) -> Self {
        Self {
            resource,
            status: state.status,
            is_loading: state.view().is_loading,
            is_fetching: state.is_fetching,
            is_stale: state.is_stale,
            error: state.error.as_ref().map(ToString::to_string),
            updated_at: state
                .updated_at
                .and_then(|timestamp| timestamp.format(&Rfc3339).ok()),
            data: state.data.as_deref(),
        }
    }
}

/// Prints the current state, then every change until `count` lines or Ctrl-C.
pub async fn run<R: Resource>(
    queries: &DashboardQueries,
    params: QueryParams,
    count: Option<usize>,
) -> Result<ExitCode, CliError> {
    let mut subscription = queries.watch::<R>(params);
    let limit = count.unwrap_or(usize::MAX);
    if limit == 0 {
        return Ok(ExitCode::SUCCESS);
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut printed = 0;
    let mut state = subscription.state();
    loop {
        print_json(&StateLine::new(R::NAME, &state), false)?;
        printed += 1;
        if printed >= limit {
            break;
        }

        state = tokio::select! {
            next = subscription.changed() => match next {
                Some(next) => next,
                None => break,
            },
            signal = &mut shutdown => {
                signal?;
                tracing::info!(resource = R::NAME, printed, "watch interrupted");
                break;
            }
        };
    }

    subscription.release();
    Ok(ExitCode::SUCCESS)
}
