//! HTTP transport for the Stash API.
//!
//! The transport executes a replayable [`ApiRequest`] description and
//! returns the raw status and body without interpreting them beyond
//! exposing the server's structured error payload. Attaching the
//! right credential and reacting to expired-token responses is the
//! refresh coordinator's job; the [`Transport`] trait exists so tests
//! can record calls without a network.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};

/// Machine-checkable error tag the server uses for an expired access
/// token. Matched exactly, never by substring.
pub const EXPIRED_TOKEN_CODE: &str = "expired_token";

/// Which credential the transport attaches as `Authorization: Bearer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// No credential (register, login).
    None,
    /// The short-lived access token.
    Access,
    /// The refresh token (refresh, logout).
    Refresh,
}

/// Request body as a replayable description.
///
/// The refresh coordinator may reissue a request once after renewing
/// the access token, so bodies are kept in a form that can be rebuilt
/// per attempt rather than as consumed streams.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// JSON payload.
    Json(serde_json::Value),
    /// Multipart form with a single `file` part.
    Multipart {
        /// File name reported to the server.
        file_name: String,
        /// Raw file contents.
        bytes: Vec<u8>,
    },
}

/// An outgoing request to the Stash API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the server base URL, e.g. `/files`.
    pub path: String,
    /// Which credential to attach.
    pub auth: AuthScheme,
    /// Request body.
    pub body: RequestBody,
}

impl ApiRequest {
    /// A GET request authenticated with the access token.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            auth: AuthScheme::Access,
            body: RequestBody::Empty,
        }
    }

    /// A JSON POST request authenticated with the access token.
    pub fn post_json(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            auth: AuthScheme::Access,
            body: RequestBody::Json(body),
        }
    }

    /// A DELETE request authenticated with the access token.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            path: path.into(),
            auth: AuthScheme::Access,
            body: RequestBody::Empty,
        }
    }

    /// A multipart upload request authenticated with the access token.
    pub fn upload(path: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            auth: AuthScheme::Access,
            body: RequestBody::Multipart {
                file_name: file_name.into(),
                bytes,
            },
        }
    }

    /// Override the credential attached to this request.
    pub fn with_auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }
}

/// Structured error payload returned by the server on non-success
/// statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    /// Machine-checkable error code, when the server provides one.
    pub code: Option<String>,
    /// Human-readable error detail.
    pub detail: Option<String>,
}

impl ErrorBody {
    /// Whether this payload explicitly identifies an expired access
    /// token.
    ///
    /// The `code` field is authoritative; older servers put the tag in
    /// `detail` instead. Both are compared exactly so unrelated 401
    /// causes cannot match.
    pub fn is_expired_token(&self) -> bool {
        self.code.as_deref() == Some(EXPIRED_TOKEN_CODE)
            || self.detail.as_deref() == Some(EXPIRED_TOKEN_CODE)
    }

    /// The best available human-readable detail.
    pub fn message(&self) -> &str {
        self.detail
            .as_deref()
            .or(self.code.as_deref())
            .unwrap_or("unknown error")
    }
}

/// Raw response from the Stash API.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// `Content-Disposition` header value, when present (downloads).
    pub content_disposition: Option<String>,
    /// Raw response body.
    pub bytes: Bytes,
}

impl ApiResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.bytes).map_err(|e| {
            ApiError::Validation(format!("unexpected response body: {e}"))
        })
    }

    /// Parse the structured error payload, if the body carries one.
    pub fn error_body(&self) -> Option<ErrorBody> {
        serde_json::from_slice(&self.bytes).ok()
    }

    /// Human-readable error detail for this response.
    pub fn error_detail(&self) -> String {
        self.error_body()
            .map(|body| body.message().to_string())
            .unwrap_or_else(|| format!("HTTP {}", self.status))
    }

    /// File name suggested by the server via `Content-Disposition`.
    pub fn suggested_file_name(&self) -> Option<String> {
        let disposition = self.content_disposition.as_deref()?;
        let (_, name) = disposition.split_once("filename=")?;
        let name = name.trim().trim_matches('"');
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

/// Trait for request executors.
///
/// The refresh coordinator resolves the bearer credential from the
/// current session per attempt and hands it in alongside the request,
/// so a replayed request automatically carries the renewed token.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute the request, attaching the given bearer credential.
    ///
    /// Returns the raw response for any HTTP status; `Err` is reserved
    /// for transport-level failures (connect errors, timeouts).
    async fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse>;
}

/// Transport implementation over reqwest.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build a transport for the configured server.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.server_url)
            .map_err(|e| ApiError::Validation(format!("invalid server URL: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { http, base_url })
    }

    /// The server base URL this transport targets.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse> {
        let url = self
            .base_url
            .join(&request.path)
            .map_err(|e| ApiError::Validation(format!("invalid request path: {e}")))?;

        let mut builder = self.http.request(request.method.clone(), url);

        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart { file_name, bytes } => {
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone());
                builder.multipart(reqwest::multipart::Form::new().part("file", part))
            }
        };

        tracing::debug!(method = %request.method, path = %request.path, "sending request");

        let response = builder.send().await?;
        let status = response.status();
        let content_disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        tracing::debug!(%status, path = %request.path, "received response");

        Ok(ApiResponse {
            status,
            content_disposition,
            bytes,
        })
    }
}
