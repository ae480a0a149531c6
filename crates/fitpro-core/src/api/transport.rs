//! HTTP plumbing shared by the API clients.
//!
//! Requests go through the [`HttpTransport`] trait so the clients can be
//! exercised against a scripted backend in tests. [`ApiContext`] adds the
//! base URL and the request timeout on top of a transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::ApiError;

/// Default request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header(header::AUTHORIZATION.as_str(), format!("Bearer {}", token))
    }

    /// Attach a JSON body serialized to text.
    ///
    /// No content-type header is set: the backend rejects requests that
    /// declare one, and parses the raw text as JSON regardless.
    pub fn json_text<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let text = serde_json::to_string(body)
            .map_err(|e| ApiError::Validation(format!("Failed to encode request body: {}", e)))?;
        self.body = Some(text);
        Ok(self)
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false)
    }

    /// Decode the body according to the response content type
    pub fn payload(&self) -> Payload {
        if self.is_json() {
            match serde_json::from_str(&self.body) {
                Ok(value) => return Payload::Json(value),
                Err(e) => warn!(error = %e, "Response declared JSON but did not parse"),
            }
        }
        Payload::Text(self.body.clone())
    }
}

/// A response body, decoded as JSON or kept as text
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Text(String),
}

impl Payload {
    /// Deserialize into `T`. Text bodies are tried as JSON too, since the
    /// backend does not always label JSON responses.
    pub fn json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            Payload::Json(value) => serde_json::from_value(value)
                .map_err(|e| ApiError::InvalidResponse(e.to_string())),
            Payload::Text(text) => serde_json::from_str(&text)
                .map_err(|e| ApiError::InvalidResponse(e.to_string())),
        }
    }

    /// The `message` field of a JSON body, or the text body itself
    pub fn message(self) -> String {
        match self {
            Payload::Json(value) => match value.get("message").and_then(|m| m.as_str()) {
                Some(message) => message.to_string(),
                None => value.to_string(),
            },
            Payload::Text(text) => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(value) => Payload::Json(value).message(),
                Err(_) => text,
            },
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request was cancelled before a response arrived
    #[error("request aborted")]
    Aborted,

    #[error("{0}")]
    Failed(String),
}

/// Sends HTTP requests. Implemented over reqwest for production use.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Aborted
            } else {
                TransportError::Failed(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Failed(format!("Failed to read response body: {}", e)))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Transport plus base URL and timeout.
/// Clone is cheap; clones share the transport.
#[derive(Clone)]
pub struct ApiContext {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    timeout: Duration,
}

impl ApiContext {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, failing with [`ApiError::Timeout`] if no response
    /// arrives within `timeout`. A transport-level abort maps to the same
    /// error.
    pub async fn fetch_with_timeout(
        &self,
        request: HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, ApiError> {
        let method = request.method.clone();
        let url = request.url.clone();
        debug!(%method, %url, "Sending request");

        match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(Ok(response)) => {
                debug!(%method, %url, status = response.status, "Response received");
                Ok(response)
            }
            Ok(Err(TransportError::Aborted)) | Err(_) => {
                warn!(%method, %url, timeout_ms = timeout.as_millis() as u64, "Request timed out");
                Err(ApiError::Timeout)
            }
            Ok(Err(TransportError::Failed(message))) => {
                warn!(%method, %url, error = %message, "Request failed");
                Err(ApiError::Network(message))
            }
        }
    }

    /// [`Self::fetch_with_timeout`] with the configured timeout
    pub async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.fetch_with_timeout(request, self.timeout).await
    }
}
