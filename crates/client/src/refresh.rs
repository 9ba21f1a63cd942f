//! Token refresh coordination.
//!
//! The [`RefreshCoordinator`] sits between the API facade and the
//! transport. Every facade call goes through [`execute`]: the request
//! is sent with the current access token, and a 401 carrying the
//! explicit `expired_token` tag triggers one refresh exchange followed
//! by exactly one replay of the original request. Any further failure
//! is terminal and clears the session; there is no second retry and no
//! automatic re-login.
//!
//! Concurrent callers that each observe an expired token share a
//! single in-flight refresh: the first caller through the gate
//! performs the exchange, later callers find the token already
//! rotated and skip straight to their replay.
//!
//! [`execute`]: RefreshCoordinator::execute

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{ApiError, Result};
use crate::models::TokenResponse;
use crate::session::{Session, SessionStore};
use crate::transport::{ApiRequest, ApiResponse, AuthScheme, Transport};

/// Path of the token refresh endpoint.
const REFRESH_PATH: &str = "/users/refresh";

/// Per-call envelope around an in-flight request.
///
/// Carries the bounded retry counter (0 or 1) for this call only, so
/// one call's retry bookkeeping never blocks unrelated concurrent
/// calls and an abandoned call leaves nothing behind. The envelope is
/// replaced, not mutated, when the retry is consumed.
#[derive(Debug, Clone)]
pub struct CallEnvelope {
    request: ApiRequest,
    retry_consumed: bool,
}

impl CallEnvelope {
    /// Wrap a request for its first attempt.
    pub fn new(request: ApiRequest) -> Self {
        Self {
            request,
            retry_consumed: false,
        }
    }

    /// The wrapped request.
    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    /// Whether the single permitted retry is still available.
    pub fn can_retry(&self) -> bool {
        !self.retry_consumed
    }

    /// Consume the retry, producing the envelope for the replay.
    pub fn consume_retry(self) -> Self {
        Self {
            request: self.request,
            retry_consumed: true,
        }
    }
}

/// Executes requests and transparently renews an expired access token.
pub struct RefreshCoordinator {
    store: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
    // Single-flight gate for the refresh exchange
    refresh_gate: Mutex<()>,
}

impl RefreshCoordinator {
    /// Create a coordinator over the given store and transport.
    pub fn new(store: Arc<SessionStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            transport,
            refresh_gate: Mutex::new(()),
        }
    }

    /// The session store this coordinator updates.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Execute a request, refreshing and replaying once on an
    /// expired-token 401.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let envelope = CallEnvelope::new(request);

        let stale = self.bearer_for(envelope.request());
        let response = self
            .transport
            .execute(envelope.request(), stale.as_deref())
            .await?;

        let err = match Self::disposition(&response) {
            Ok(()) => return Ok(response),
            Err(e) => e,
        };

        let refreshable = err.is_auth_expired()
            && envelope.request().auth == AuthScheme::Access
            && envelope.can_retry();

        if !refreshable {
            return Err(self.terminal(err, false));
        }

        self.refresh(stale).await?;

        let envelope = envelope.consume_retry();
        let bearer = self.bearer_for(envelope.request());
        let retried = match self
            .transport
            .execute(envelope.request(), bearer.as_deref())
            .await
        {
            Ok(r) => r,
            Err(e) => {
                // The replay failed at the transport level; the session
                // state is of unknown validity, start over.
                self.store.clear();
                return Err(e);
            }
        };

        match Self::disposition(&retried) {
            Ok(()) => Ok(retried),
            Err(e) => Err(self.terminal(e, true)),
        }
    }

    /// Resolve the bearer credential for a request from the current
    /// session. Resolved per attempt, so a replay picks up the token
    /// the refresh exchange just stored.
    fn bearer_for(&self, request: &ApiRequest) -> Option<String> {
        let session = self.store.get();
        match request.auth {
            AuthScheme::None => None,
            AuthScheme::Access => session.access_token,
            AuthScheme::Refresh => session.refresh_token,
        }
    }

    /// Classify a response. `Ok` for 2xx, otherwise the error kind the
    /// caller would see if this attempt were final.
    fn disposition(response: &ApiResponse) -> Result<()> {
        if response.is_success() {
            return Ok(());
        }

        let status = response.status;
        match status.as_u16() {
            401 => {
                let expired = response
                    .error_body()
                    .is_some_and(|body| body.is_expired_token());
                if expired {
                    Err(ApiError::AuthExpired)
                } else {
                    Err(ApiError::AuthInvalid(response.error_detail()))
                }
            }
            403 => Err(ApiError::Forbidden(response.error_detail())),
            400 | 422 => Err(ApiError::Validation(response.error_detail())),
            _ => Err(ApiError::Server {
                status: status.as_u16(),
                detail: response.error_detail(),
            }),
        }
    }

    /// Apply the terminal-failure policy: authentication failures
    /// always clear the session, and after a consumed retry every
    /// failure does.
    fn terminal(&self, err: ApiError, retried: bool) -> ApiError {
        match err {
            ApiError::AuthExpired => {
                // Expired again after a successful refresh (or expired
                // on a non-access credential): the credential is being
                // rejected, not merely renewed.
                tracing::warn!("token still rejected as expired, clearing session");
                self.store.clear();
                ApiError::AuthInvalid("access token rejected after refresh".to_string())
            }
            ApiError::AuthInvalid(detail) => {
                tracing::warn!("authentication rejected, clearing session");
                self.store.clear();
                ApiError::AuthInvalid(detail)
            }
            other => {
                if retried {
                    self.store.clear();
                }
                other
            }
        }
    }

    /// Exchange the refresh token for a new access token and store the
    /// merged session.
    ///
    /// `stale_access` is the access token the caller saw fail; if the
    /// stored token has already moved past it, another caller's
    /// refresh won and this one is skipped.
    async fn refresh(&self, stale_access: Option<String>) -> Result<()> {
        let _guard = self.refresh_gate.lock().await;

        let current = self.store.get();
        if current.access_token.is_some() && current.access_token != stale_access {
            tracing::debug!("access token already refreshed by a concurrent call");
            return Ok(());
        }

        let Some(refresh_token) = current.refresh_token.clone() else {
            self.store.clear();
            return Err(ApiError::AuthInvalid(
                "no refresh credential available".to_string(),
            ));
        };

        let request = ApiRequest::post_json(REFRESH_PATH, serde_json::json!({}))
            .with_auth(AuthScheme::Refresh);

        tracing::debug!("access token expired, refreshing");

        let response = match self.transport.execute(&request, Some(&refresh_token)).await {
            Ok(r) => r,
            Err(e) => {
                self.store.clear();
                return Err(e);
            }
        };

        if !response.is_success() {
            tracing::warn!(status = %response.status, "token refresh rejected, clearing session");
            self.store.clear();
            return Err(ApiError::AuthInvalid(response.error_detail()));
        }

        let tokens: TokenResponse = match response.json() {
            Ok(t) => t,
            Err(_) => {
                self.store.clear();
                return Err(ApiError::AuthInvalid(
                    "malformed refresh response".to_string(),
                ));
            }
        };

        // New access token, refresh token only if the server rotated
        // it, role and identity untouched
        let renewed = Session {
            access_token: Some(tokens.access_token),
            refresh_token: tokens.refresh_token.or(current.refresh_token),
            role: current.role,
            username: current.username,
        };
        self.store
            .set(renewed)
            .map_err(|e| ApiError::Storage(e.to_string()))?;

        tracing::debug!("access token refreshed");
        Ok(())
    }
}
