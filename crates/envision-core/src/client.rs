use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::envelope::validate_response;
use crate::error::ApiError;
use crate::http_client::{
    HttpAuth, HttpClient, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};
use crate::params::QueryParams;
use crate::retry::{RetryConfig, RetryingHttpClient};
use crate::schema::Schema;

/// Everything needed to issue one logical request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    resource: &'static str,
    method: HttpMethod,
    path: &'static str,
    query: QueryParams,
    body: Option<Value>,
}

impl RequestDescriptor {
    pub fn get(resource: &'static str, path: &'static str, query: QueryParams) -> Self {
        Self {
            resource,
            method: HttpMethod::Get,
            path,
            query,
            body: None,
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// Retry-wrapped transport bound to one API base URL.
#[derive(Clone)]
pub struct ApiClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    auth: HttpAuth,
    timeout: Duration,
}

impl ApiClient {
    /// Production client: reqwest transport under the configured retry policy.
    pub fn new(config: &Config) -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()), config)
    }

    /// Wraps an arbitrary transport in the configured retry policy.
    pub fn with_http_client(http: Arc<dyn HttpClient>, config: &Config) -> Self {
        Self::with_retry(http, config, config.retry.clone())
    }

    pub fn with_retry(http: Arc<dyn HttpClient>, config: &Config, retry: RetryConfig) -> Self {
        Self {
            http: Arc::new(RetryingHttpClient::new(http, retry)),
            base_url: config.api.base_url.trim_end_matches('/').to_owned(),
            auth: HttpAuth::from_token(config.api.token.as_deref()),
            timeout: config.api.timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, descriptor: &RequestDescriptor) -> String {
        let mut url = format!("{}{}", self.base_url, descriptor.path);
        if !descriptor.query.is_empty() {
            url.push('?');
            url.push_str(&descriptor.query.to_query_string());
        }
        url
    }

    fn build_request(&self, descriptor: &RequestDescriptor) -> HttpRequest {
        let mut request = HttpRequest::new(descriptor.method, self.url_for(descriptor))
            .with_header("content-type", "application/json")
            .with_auth(&self.auth)
            .with_timeout_ms(self.timeout.as_millis() as u64);
        if let Some(body) = &descriptor.body {
            request = request.with_body(body.to_string());
        }
        request
    }

    /// Issues the request through the retry policy and returns the raw response.
    pub async fn send(&self, descriptor: &RequestDescriptor) -> Result<HttpResponse, ApiError> {
        let request = self.build_request(descriptor);
        let span = tracing::debug_span!(
            "api_request",
            request_id = %Uuid::new_v4(),
            resource = descriptor.resource,
            method = %descriptor.method,
            path = descriptor.path,
        );

        async move {
            let response = self.http.execute(request).await?;
            debug!(status = response.status, bytes = response.body.len(), "request completed");
            Ok(response)
        }
        .instrument(span)
        .await
    }

    /// Issues the request and validates the envelope and `data` against `schema`.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor,
        schema: &Schema,
    ) -> Result<T, ApiError> {
        let response = self.send(descriptor).await?;
        validate_response(&response, schema)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("authenticated", &!matches!(self.auth, HttpAuth::None))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http_client::{ScriptedHttpClient, ScriptedReply};

    fn config(token: Option<&str>) -> Config {
        let mut config = Config::default().with_base_url("https://api.envision.test/");
        config.api.token = token.map(str::to_owned);
        config
    }

    #[tokio::test]
    async fn builds_absolute_url_with_sorted_encoded_query() {
        let http = Arc::new(
            ScriptedHttpClient::new()
                .with_reply(ScriptedReply::json(200, &json!({"success": true, "data": []}))),
        );
        let client = ApiClient::with_http_client(http.clone(), &config(None));
        let descriptor = RequestDescriptor::get(
            "anomalies",
            "/dashboard/anomalies",
            QueryParams::new().with("range", "7d").with("end_date", "2024-01-31"),
        );

        let data: Vec<Value> = client
            .fetch(&descriptor, &Schema::array(Schema::Any))
            .await
            .expect("valid");

        assert!(data.is_empty());
        let requests = http.requests();
        assert_eq!(
            requests[0].url,
            "https://api.envision.test/dashboard/anomalies?end_date=2024-01-31&range=7d"
        );
        assert_eq!(
            requests[0].headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert!(!requests[0].headers.contains_key("authorization"));
        assert_eq!(requests[0].timeout_ms, 30_000);
    }

    #[tokio::test]
    async fn attaches_bearer_token_when_configured() {
        let http = Arc::new(ScriptedHttpClient::new().with_reply(ScriptedReply::json(
            200,
            &json!({"success": true, "data": {}}),
        )));
        let client = ApiClient::with_http_client(http.clone(), &config(Some("token-1")));

        client
            .send(&RequestDescriptor::get(
                "kpis",
                "/dashboard/kpis",
                QueryParams::new(),
            ))
            .await
            .expect("sent");

        assert_eq!(
            http.requests()[0]
                .headers
                .get("authorization")
                .map(String::as_str),
            Some("Bearer token-1")
        );
        assert_eq!(http.requests()[0].url, "https://api.envision.test/dashboard/kpis");
    }

    #[tokio::test]
    async fn serialises_json_body() {
        let http = Arc::new(
            ScriptedHttpClient::new().with_fallback(ScriptedReply::status(200, "{}")),
        );
        let client = ApiClient::with_http_client(http.clone(), &config(None));
        let descriptor = RequestDescriptor::get("upload", "/upload", QueryParams::new())
            .with_method(HttpMethod::Post)
            .with_body(json!({"rows": 3}));

        client.send(&descriptor).await.expect("sent");

        let request = &http.requests()[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body.as_deref(), Some(r#"{"rows":3}"#));
    }
}
