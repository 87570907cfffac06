use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::http_client::{TransportError, TransportErrorKind};
use crate::schema::SchemaViolation;

/// Coarse classification of [`ApiError`] without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    Transport,
    Timeout,
    Http,
    Application,
    Validation,
    InvalidRequest,
    Internal,
}

impl ApiErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Http => "http",
            Self::Application => "application",
            Self::Validation => "validation",
            Self::InvalidRequest => "invalid_request",
            Self::Internal => "internal",
        }
    }
}

impl Display for ApiErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single logical API call.
///
/// Errors are `Clone` because a de-duplicated fetch hands the same outcome to every
/// caller attached to it, and the query cache keeps the last error on its entry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("upstream returned status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("{message}")]
    Application { message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> ApiErrorKind {
        match self {
            Self::Transport { .. } => ApiErrorKind::Transport,
            Self::Timeout { .. } => ApiErrorKind::Timeout,
            Self::Http { .. } => ApiErrorKind::Http,
            Self::Application { .. } => ApiErrorKind::Application,
            Self::Validation(_) => ApiErrorKind::Validation,
            Self::InvalidRequest { .. } => ApiErrorKind::InvalidRequest,
            Self::Internal { .. } => ApiErrorKind::Internal,
        }
    }

    /// Timeouts are a subtype of transport failures.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(error: TransportError) -> Self {
        match error.kind() {
            TransportErrorKind::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            _ => Self::Transport {
                message: error.message().to_owned(),
            },
        }
    }
}

/// Response contract violations detected by the validator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("response body is not valid JSON: {message}")]
    MalformedJson { message: String },

    #[error("response envelope is malformed: {0}")]
    MalformedEnvelope(SchemaViolation),

    #[error("response envelope reported success without a data field")]
    MissingData,

    #[error("response data does not match schema: {0}")]
    Schema(#[from] SchemaViolation),

    #[error("response data could not be decoded: {message}")]
    Decode { message: String },
}

/// Configuration loading errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}, expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("inconsistent configuration: {message}")]
    Inconsistent { message: String },
}
