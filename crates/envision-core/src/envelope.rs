use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ValidationError};
use crate::http_client::HttpResponse;
use crate::schema::{Field, Schema};

/// Response envelope used by every dashboard endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
        }
    }

    /// Backend-provided reason for an unsuccessful envelope.
    pub fn failure_reason(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|reason| !reason.trim().is_empty())
    }
}

fn envelope_schema() -> Schema {
    Schema::object([
        Field::required("success", Schema::Bool),
        Field::optional("data", Schema::Any),
        Field::optional("message", Schema::String),
        Field::optional("error", Schema::String),
    ])
}

/// Validates a raw response against the envelope contract and the resource schema.
///
/// Returns exactly the decoded `data` member. Validation failures are deterministic and
/// surface as [`ApiError::Validation`]; a `success: false` envelope surfaces as
/// [`ApiError::Application`] regardless of the HTTP status.
pub fn validate_response<T: DeserializeOwned>(
    response: &HttpResponse,
    schema: &Schema,
) -> Result<T, ApiError> {
    if !response.is_success() {
        return Err(http_failure(response));
    }

    let value: Value =
        serde_json::from_str(&response.body).map_err(|error| ValidationError::MalformedJson {
            message: error.to_string(),
        })?;

    envelope_schema()
        .validate(&value)
        .map_err(ValidationError::MalformedEnvelope)?;

    let envelope: Envelope<Value> =
        serde_json::from_value(value).map_err(|error| ValidationError::Decode {
            message: error.to_string(),
        })?;

    if !envelope.success {
        let reason = envelope
            .failure_reason()
            .unwrap_or("request was not successful");
        return Err(ApiError::application(reason));
    }

    let data = envelope.data.ok_or(ValidationError::MissingData)?;
    schema.validate(&data).map_err(ValidationError::Schema)?;

    serde_json::from_value(data).map_err(|error| {
        ApiError::from(ValidationError::Decode {
            message: error.to_string(),
        })
    })
}

fn http_failure(response: &HttpResponse) -> ApiError {
    let from_body = serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|body| {
            ["error", "message", "detail"].iter().find_map(|key| {
                body.get(key)
                    .and_then(Value::as_str)
                    .filter(|text| !text.trim().is_empty())
                    .map(str::to_owned)
            })
        });

    let message = from_body.unwrap_or_else(|| {
        reqwest::StatusCode::from_u16(response.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("unexpected status")
            .to_owned()
    });

    ApiError::http(response.status, message)
}
