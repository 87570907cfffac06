use std::collections::{BTreeMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// HTTP method set used by the dashboard API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication strategy applied to outgoing HTTP requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HttpAuth {
    #[default]
    None,
    BearerToken(String),
}

impl HttpAuth {
    /// Bearer auth when a non-empty token is present, no auth otherwise.
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::trim) {
            Some(token) if !token.is_empty() => Self::BearerToken(token.to_owned()),
            _ => Self::None,
        }
    }

    pub fn apply(&self, headers: &mut BTreeMap<String, String>) {
        match self {
            Self::None => {}
            Self::BearerToken(token) => {
                headers.insert(String::from("authorization"), format!("Bearer {token}"));
            }
        }
    }
}

/// Wire-level HTTP request handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout_ms: 30_000,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_auth(mut self, auth: &HttpAuth) -> Self {
        auth.apply(&mut self.headers);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Raw HTTP response returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok_json(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Network-level failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connect,
    Timeout { timeout_ms: u64 },
    Body,
    Other,
}

/// Failure where no usable response was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::new(
            TransportErrorKind::Timeout { timeout_ms },
            format!("request timed out after {timeout_ms}ms"),
        )
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }

    pub const fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Timeout { .. })
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportError {}

pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + 'a>>;

/// Transport contract: issue one request, honour its timeout, report what came back.
///
/// Non-2xx statuses are successful transport outcomes; classifying them is left to
/// the retry policy and the response validator.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a>;
}

impl<T: HttpClient + ?Sized> HttpClient for Arc<T> {
    fn execute<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a> {
        (**self).execute(request)
    }
}

/// Production HTTP client using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(concat!("envision/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a> {
        Box::pin(async move {
            let mut builder = match request.method {
                HttpMethod::Get => self.client.get(&request.url),
                HttpMethod::Post => self.client.post(&request.url),
            };

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            builder = builder.timeout(Duration::from_millis(request.timeout_ms));

            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| classify_reqwest_error(&e, request.timeout_ms))?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| {
                if e.is_timeout() {
                    TransportError::timeout(request.timeout_ms)
                } else {
                    TransportError::new(
                        TransportErrorKind::Body,
                        format!("failed to read response body: {e}"),
                    )
                }
            })?;

            Ok(HttpResponse { status, body })
        })
    }
}

fn classify_reqwest_error(error: &reqwest::Error, timeout_ms: u64) -> TransportError {
    if error.is_timeout() {
        TransportError::timeout(timeout_ms)
    } else if error.is_connect() {
        TransportError::connect(format!("connection failed: {error}"))
    } else {
        TransportError::other(format!("request failed: {error}"))
    }
}

/// One canned transport outcome for [`ScriptedHttpClient`].
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    outcome: Result<HttpResponse, TransportError>,
    latency: Duration,
}

impl ScriptedReply {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            outcome: Ok(HttpResponse::new(status, body)),
            latency: Duration::ZERO,
        }
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::status(status, body.to_string())
    }

    pub fn error(error: TransportError) -> Self {
        Self {
            outcome: Err(error),
            latency: Duration::ZERO,
        }
    }

    /// Simulated network latency before the outcome is delivered.
    pub fn after(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// Deterministic offline transport that replays queued outcomes in order.
///
/// Requests are recorded for later inspection. When the queue runs dry the
/// fallback reply is served, if one was configured.
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    script: Mutex<VecDeque<ScriptedReply>>,
    fallback: Mutex<Option<ScriptedReply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: ScriptedReply) -> Self {
        self.push(reply);
        self
    }

    pub fn with_fallback(self, reply: ScriptedReply) -> Self {
        *self.fallback.lock().unwrap_or_else(PoisonError::into_inner) = Some(reply);
        self
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    pub fn calls(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_reply(&self) -> Option<ScriptedReply> {
        let queued = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        queued.or_else(|| {
            self.fallback
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a> {
        Box::pin(async move {
            let timeout = Duration::from_millis(request.timeout_ms);
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request);

            let Some(reply) = self.next_reply() else {
                return Err(TransportError::connect("no scripted reply left"));
            };

            if reply.latency > timeout {
                tokio::time::sleep(timeout).await;
                return Err(TransportError::timeout(timeout.as_millis() as u64));
            }
            if !reply.latency.is_zero() {
                tokio::time::sleep(reply.latency).await;
            }
            reply.outcome
        })
    }
}
