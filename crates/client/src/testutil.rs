//! Shared test helpers: a scripted transport that records every call.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, StatusCode};

use crate::error::{ApiError, Result};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// One call observed by the mock transport.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
}

/// A transport that pops pre-scripted responses per path and records
/// each call it receives.
pub struct MockTransport {
    scripted: Mutex<HashMap<String, VecDeque<ApiResponse>>>,
    fail_paths: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(HashMap::new()),
            fail_paths: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response for the given path.
    pub fn enqueue(&self, path: &str, response: ApiResponse) {
        self.scripted
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    /// Make calls to the given path fail at the transport level.
    pub fn fail_with_network_error(&self, path: &str, message: &str) {
        self.fail_paths
            .lock()
            .unwrap()
            .insert(path.to_string(), message.to_string());
    }

    /// Snapshot of all recorded calls.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method.clone(),
            path: request.path.clone(),
            bearer: bearer.map(str::to_string),
        });

        if let Some(message) = self.fail_paths.lock().unwrap().get(&request.path) {
            return Err(ApiError::Network(message.clone()));
        }

        let response = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&request.path)
            .and_then(VecDeque::pop_front);

        match response {
            Some(r) => Ok(r),
            None => panic!("no scripted response for {}", request.path),
        }
    }
}

/// Response constructors for scripted transports.
pub mod responses {
    use super::*;

    /// A 200 response with a JSON body.
    pub fn ok_json(body: serde_json::Value) -> ApiResponse {
        status_json(200, body)
    }

    /// A response with an arbitrary status and JSON body.
    pub fn status_json(status: u16, body: serde_json::Value) -> ApiResponse {
        ApiResponse {
            status: StatusCode::from_u16(status).expect("valid status code"),
            content_disposition: None,
            bytes: Bytes::from(body.to_string()),
        }
    }

    /// The 401 a server sends for an expired access token.
    pub fn expired_token_401() -> ApiResponse {
        status_json(401, serde_json::json!({"detail": "expired_token"}))
    }

    /// A 200 response with a raw body and optional content disposition.
    pub fn ok_bytes(bytes: &[u8], content_disposition: Option<&str>) -> ApiResponse {
        ApiResponse {
            status: StatusCode::OK,
            content_disposition: content_disposition.map(str::to_string),
            bytes: Bytes::copy_from_slice(bytes),
        }
    }
}
