//! HTTP transport to the library backend

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;

use crate::{
    config::ApiConfig,
    error::{AppError, AppResult},
    models::response::{failure_message, ApiResponse},
};

/// A single call against the REST API, relative to the base URL.
///
/// The path is kept as raw segments; the transport percent-encodes each
/// one when building the URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new<S: AsRef<str>>(method: Method, segments: &[S]) -> Self {
        Self {
            method,
            segments: segments.iter().map(|s| s.as_ref().to_string()).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get<S: AsRef<str>>(segments: &[S]) -> Self {
        Self::new(Method::GET, segments)
    }

    pub fn delete<S: AsRef<str>>(segments: &[S]) -> Self {
        Self::new(Method::DELETE, segments)
    }

    pub fn post<S: AsRef<str>, B: Serialize>(segments: &[S], body: &B) -> AppResult<Self> {
        Self::new(Method::POST, segments).with_body(body)
    }

    pub fn put<S: AsRef<str>, B: Serialize>(segments: &[S], body: &B) -> AppResult<Self> {
        Self::new(Method::PUT, segments).with_body(body)
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    fn with_body<B: Serialize>(mut self, body: &B) -> AppResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Unencoded path, for logs and matching
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

impl std::fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path())
    }
}

/// Sends requests and unwraps the `{success, message, data}` envelope.
///
/// Implementations return `Err` for non-2xx statuses and for envelopes
/// with `success: false`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> AppResult<ApiResponse<Value>>;
}

/// `reqwest`-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| AppError::Config(format!("Invalid API base URL {}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "Invalid API base URL {}: not a base URL",
                config.base_url
            )));
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn url(&self, segments: &[String]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("Invalid API base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Decode a 2xx body. An envelope with `success: false` is a failure
/// carrying its own reason, with or without `data`.
fn parse_envelope(status: StatusCode, body: &[u8]) -> AppResult<ApiResponse<Value>> {
    let body: Value = serde_json::from_slice(body)?;
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(AppError::Api {
            status: status.as_u16(),
            message: failure_message(&body),
        });
    }
    Ok(serde_json::from_value(body)?)
}

/// Map a non-2xx response to an error, keeping the backend's reason
fn status_error(status: StatusCode, body: &[u8]) -> AppError {
    let parsed: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let message = failure_message(&parsed);
    if status == StatusCode::NOT_FOUND {
        AppError::NotFound(message)
    } else {
        AppError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> AppResult<ApiResponse<Value>> {
        tracing::debug!(%request, "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.segments)?)
            .header(header::CONTENT_TYPE, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(%request, "Request failed: {}", e);
            AppError::from(e)
        })?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let err = status_error(status, &bytes);
            tracing::warn!(%request, status = status.as_u16(), "Backend rejected request: {}", err);
            return Err(err);
        }

        parse_envelope(status, &bytes).inspect_err(|err| {
            tracing::warn!(%request, status = status.as_u16(), "Backend reported failure: {}", err);
        })
    }
}
