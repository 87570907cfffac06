use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

/// Installs JSON logging on stderr so stdout stays machine-readable.
///
/// `RUST_LOG` is honoured; the `envision` crates default to `info`, or `debug`
/// with `--verbose`.
pub fn init_logging(verbose: bool) -> Result<(), CliError> {
    let default = if verbose {
        "envision=debug"
    } else {
        "envision=info"
    };
    let directive: Directive = default
        .parse()
        .map_err(|error| CliError::Logging(format!("{error}")))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::from_default_env().add_directive(directive))
        .try_init()
        .map_err(|error| CliError::Logging(error.to_string()))
}
