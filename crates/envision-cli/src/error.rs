use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] envision_core::ConfigError),

    #[error("command error: {0}")]
    Command(String),

    #[error("{resource}: {source}")]
    Api {
        resource: &'static str,
        #[source]
        source: envision_core::ApiError,
    },

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Command(_) => 2,
            Self::Api { .. } => 3,
            Self::Logging(_) => 1,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
