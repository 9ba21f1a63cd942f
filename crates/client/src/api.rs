//! Session-aware API facade.
//!
//! [`ApiClient`] exposes one method per Stash operation. Each call
//! consults the local authorization gate where applicable, then runs
//! through the refresh coordinator so an expired access token is
//! renewed transparently. Login, register and logout additionally
//! update the session store.

use std::sync::Arc;

use crate::authz::{self, Operation};
use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::models::{
    AccessAction, Download, FileAccessRequest, FileEntry, LoginResponse, UserStatistics,
};
use crate::refresh::RefreshCoordinator;
use crate::session::{Role, Session, SessionStore};
use crate::transport::{ApiRequest, ApiResponse, AuthScheme, HttpTransport, Transport};

/// Client for the Stash file storage API.
pub struct ApiClient {
    store: Arc<SessionStore>,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    /// Build a client over HTTP for the configured server.
    pub fn new(config: &ClientConfig, store: Arc<SessionStore>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        let transport = Arc::new(HttpTransport::new(config)?);
        Ok(Self::with_transport(transport, store))
    }

    /// Build a client over an arbitrary transport.
    pub fn with_transport(transport: Arc<dyn Transport>, store: Arc<SessionStore>) -> Self {
        let coordinator = RefreshCoordinator::new(Arc::clone(&store), transport);
        Self { store, coordinator }
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        self.store.get()
    }

    /// Create an account, then log in with the same credentials.
    pub async fn register(&self, username: &str, password: &str) -> Result<Session> {
        let request = ApiRequest::post_json("/users/register", credentials(username, password))
            .with_auth(AuthScheme::None);
        self.coordinator.execute(request).await?;
        tracing::info!(username, "account registered");
        self.login(username, password).await
    }

    /// Exchange credentials for a session and store it.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let request = ApiRequest::post_json("/users/login", credentials(username, password))
            .with_auth(AuthScheme::None);
        let response = self.coordinator.execute(request).await?;
        let login: LoginResponse = response.json()?;

        let role = if login.is_admin {
            Role::Admin
        } else {
            Role::Standard
        };
        let session = Session::authenticated(
            login.access_token,
            login.refresh_token,
            role,
            login.username,
        );
        self.store
            .set(session.clone())
            .map_err(|e| ApiError::Storage(e.to_string()))?;

        tracing::info!(username, "logged in");
        Ok(session)
    }

    /// Invalidate the session server-side (best effort) and clear it
    /// locally. The local clear happens regardless of the server
    /// call's outcome.
    pub async fn logout(&self) -> Result<()> {
        let request = ApiRequest::post_json("/users/logout", serde_json::json!({}))
            .with_auth(AuthScheme::Refresh);
        if let Err(e) = self.coordinator.execute(request).await {
            tracing::warn!("server-side logout failed: {e}");
        }
        self.store.clear();
        tracing::info!("logged out");
        Ok(())
    }

    /// List stored files.
    pub async fn list_files(&self) -> Result<Vec<FileEntry>> {
        let response = self.coordinator.execute(ApiRequest::get("/files")).await?;
        response.json()
    }

    /// Upload a file. Admin only.
    pub async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        self.authorize(Operation::Upload)?;
        let request = ApiRequest::upload("/files/upload/", file_name, bytes);
        let response = self.coordinator.execute(request).await?;
        Ok(server_message(&response, "file uploaded"))
    }

    /// Download a file's contents.
    pub async fn download_file(&self, file_id: u64) -> Result<Download> {
        let request = ApiRequest::get(format!("/files/download/{file_id}"));
        let response = self.coordinator.execute(request).await?;
        Ok(Download {
            file_name: response.suggested_file_name(),
            bytes: response.bytes,
        })
    }

    /// Delete a stored file. Admin only.
    pub async fn delete_file(&self, file_id: u64) -> Result<String> {
        self.authorize(Operation::DeleteFile)?;
        let request = ApiRequest::delete(format!("/files/delete/{file_id}"));
        let response = self.coordinator.execute(request).await?;
        Ok(server_message(&response, "file deleted"))
    }

    /// Grant or revoke a user's access to a file. Admin only.
    pub async fn manage_file_access(
        &self,
        username: &str,
        file_id: u64,
        action: AccessAction,
    ) -> Result<String> {
        self.authorize(Operation::ManageFileAccess)?;
        let payload = FileAccessRequest {
            username: username.to_string(),
            file_id,
            action,
        };
        let body = serde_json::to_value(&payload)
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        let request = ApiRequest::post_json("/users/file-access/", body);
        let response = self.coordinator.execute(request).await?;
        Ok(server_message(&response, "access updated"))
    }

    /// Promote a user to admin. Admin only.
    pub async fn grant_admin(&self, username: &str) -> Result<String> {
        self.authorize(Operation::GrantAdmin)?;
        let request = ApiRequest::post_json(
            "/users/grant-admin/",
            serde_json::json!({ "username": username }),
        );
        let response = self.coordinator.execute(request).await?;
        Ok(server_message(&response, "admin rights granted"))
    }

    /// Fetch per-user download statistics. Restricted server-side to
    /// admins; the local gate passes it through by convention.
    pub async fn user_statistics(&self) -> Result<Vec<UserStatistics>> {
        let response = self
            .coordinator
            .execute(ApiRequest::get("/users/user-statistics"))
            .await?;
        response.json()
    }

    /// Run the local gate for a privileged operation. Denials return
    /// before any network traffic.
    fn authorize(&self, operation: Operation) -> Result<()> {
        authz::authorize(&self.store.get(), operation)
    }
}

fn credentials(username: &str, password: &str) -> serde_json::Value {
    serde_json::json!({ "username": username, "password": password })
}

/// The `message` field mutation endpoints answer with, or a fallback.
fn server_message(response: &ApiResponse, fallback: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ServerMessage {
        message: String,
    }
    response
        .json::<ServerMessage>()
        .map(|m| m.message)
        .unwrap_or_else(|_| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryBackend;
    use crate::testutil::{responses, MockTransport};

    fn client_with(
        session: Session,
        transport: Arc<MockTransport>,
    ) -> (ApiClient, Arc<SessionStore>) {
        let store = Arc::new(SessionStore::open(MemoryBackend::with_session(session)));
        let client = ApiClient::with_transport(transport, Arc::clone(&store));
        (client, store)
    }

    fn admin_session() -> Session {
        Session::authenticated("access", "refresh", Role::Admin, "alice")
    }

    fn standard_session() -> Session {
        Session::authenticated("access", "refresh", Role::Standard, "bob")
    }

    #[tokio::test]
    async fn test_login_stores_full_session() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue(
            "/users/login",
            responses::ok_json(serde_json::json!({
                "access_token": "a-token",
                "refresh_token": "r-token",
                "is_admin": true,
                "username": "alice",
            })),
        );
        let (client, store) = client_with(Session::default(), Arc::clone(&transport));

        let session = client
            .login("alice", "secret")
            .await
            .expect("Login should succeed");

        assert_eq!(session.access_token.as_deref(), Some("a-token"));
        assert_eq!(store.get(), session);
        assert!(store.is_admin());

        // Login itself carries no bearer
        let calls = transport.calls();
        assert_eq!(calls[0].bearer, None);
    }

    #[tokio::test]
    async fn test_login_rejection_surfaces_auth_invalid() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue(
            "/users/login",
            responses::status_json(401, serde_json::json!({"detail": "invalid credentials"})),
        );
        let (client, store) = client_with(Session::default(), Arc::clone(&transport));

        let result = client.login("alice", "wrong").await;
        assert!(matches!(result, Err(ApiError::AuthInvalid(_))));
        assert_eq!(store.get(), Session::default());
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue("/users/register", responses::ok_json(serde_json::json!({})));
        transport.enqueue(
            "/users/login",
            responses::ok_json(serde_json::json!({
                "access_token": "a-token",
                "refresh_token": "r-token",
                "is_admin": false,
                "username": "carol",
            })),
        );
        let (client, store) = client_with(Session::default(), Arc::clone(&transport));

        let session = client
            .register("carol", "secret")
            .await
            .expect("Register should succeed");

        assert!(session.is_authenticated());
        assert!(!session.is_admin());
        assert_eq!(store.get().username.as_deref(), Some("carol"));

        let paths: Vec<_> = transport.calls().iter().map(|c| c.path.clone()).collect();
        assert_eq!(paths, vec!["/users/register", "/users/login"]);
    }

    #[tokio::test]
    async fn test_gate_short_circuits_for_standard_session() {
        // No network call is issued for any privileged operation
        let transport = Arc::new(MockTransport::new());
        let (client, _store) = client_with(standard_session(), Arc::clone(&transport));

        let result = client.delete_file(7).await;
        match result {
            Err(ApiError::Forbidden(detail)) => {
                assert_eq!(detail, "Only admins can delete files.");
            }
            other => panic!("Expected Forbidden, got {other:?}"),
        }

        let result = client.upload_file("a.txt", vec![0]).await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));

        let result = client
            .manage_file_access("bob", 7, AccessAction::Grant)
            .await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));

        let result = client.grant_admin("bob").await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));

        assert!(transport.calls().is_empty(), "gate must not touch the network");
    }

    #[tokio::test]
    async fn test_gate_denial_leaves_session_untouched() {
        let transport = Arc::new(MockTransport::new());
        let before = standard_session();
        let (client, store) = client_with(before.clone(), Arc::clone(&transport));

        let _ = client.delete_file(7).await;
        assert_eq!(store.get(), before);
    }

    #[tokio::test]
    async fn test_admin_delete_goes_through() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue(
            "/files/delete/7",
            responses::ok_json(serde_json::json!({"message": "File deleted successfully."})),
        );
        let (client, _store) = client_with(admin_session(), Arc::clone(&transport));

        let message = client.delete_file(7).await.expect("Delete should succeed");
        assert_eq!(message, "File deleted successfully.");

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, reqwest::Method::DELETE);
        assert_eq!(calls[0].bearer.as_deref(), Some("access"));
    }

    #[tokio::test]
    async fn test_logout_clears_even_if_server_fails() {
        // The local session is cleared unconditionally
        let transport = Arc::new(MockTransport::new());
        transport.fail_with_network_error("/users/logout", "connection refused");
        let (client, store) = client_with(admin_session(), Arc::clone(&transport));

        client.logout().await.expect("Logout should not fail");

        assert_eq!(store.get(), Session::default());
        // The server call was attempted with the refresh credential
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].bearer.as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn test_logout_clears_on_success_too() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue("/users/logout", responses::ok_json(serde_json::json!({})));
        let (client, store) = client_with(standard_session(), Arc::clone(&transport));

        client.logout().await.expect("Logout should not fail");
        assert_eq!(store.get(), Session::default());
    }

    #[tokio::test]
    async fn test_list_files_parses_entries() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue(
            "/files",
            responses::ok_json(serde_json::json!([
                {"id": 1, "filename": "a.txt", "owner_username": "alice", "download_count": 4},
                {"id": 2, "filename": "b.bin"},
            ])),
        );
        let (client, _store) = client_with(admin_session(), Arc::clone(&transport));

        let files = client.list_files().await.expect("List should succeed");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "a.txt");
        assert_eq!(files[0].download_count, Some(4));
        assert_eq!(files[1].owner_username, None);
    }

    #[tokio::test]
    async fn test_download_returns_bytes_and_name() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue(
            "/files/download/3",
            responses::ok_bytes(b"payload", Some("attachment; filename=\"notes.txt\"")),
        );
        let (client, _store) = client_with(standard_session(), Arc::clone(&transport));

        let download = client.download_file(3).await.expect("Download should succeed");
        assert_eq!(&download.bytes[..], b"payload");
        assert_eq!(download.file_name.as_deref(), Some("notes.txt"));
    }

    #[tokio::test]
    async fn test_upload_validation_error_surfaces() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue(
            "/files/upload/",
            responses::status_json(422, serde_json::json!({"detail": "unsupported file type"})),
        );
        let (client, _store) = client_with(admin_session(), Arc::clone(&transport));

        let result = client.upload_file("a.exe", vec![0]).await;
        match result {
            Err(ApiError::Validation(detail)) => assert_eq!(detail, "unsupported file type"),
            other => panic!("Expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_manage_file_access_payload() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue(
            "/users/file-access/",
            responses::ok_json(serde_json::json!({"message": "Access granted."})),
        );
        let (client, _store) = client_with(admin_session(), Arc::clone(&transport));

        let message = client
            .manage_file_access("bob", 7, AccessAction::Grant)
            .await
            .expect("Manage access should succeed");
        assert_eq!(message, "Access granted.");
    }

    #[tokio::test]
    async fn test_statistics_passes_gate_for_standard_session() {
        // Admin-gated by caller convention only; the server decides
        let transport = Arc::new(MockTransport::new());
        transport.enqueue(
            "/users/user-statistics",
            responses::status_json(403, serde_json::json!({"detail": "admins only"})),
        );
        let (client, _store) = client_with(standard_session(), Arc::clone(&transport));

        let result = client.user_statistics().await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));
        // The request did reach the transport
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_statistics_parses_for_admin() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue(
            "/users/user-statistics",
            responses::ok_json(serde_json::json!([
                {"username": "alice", "is_admin": true, "download_count": 12},
            ])),
        );
        let (client, _store) = client_with(admin_session(), Arc::clone(&transport));

        let stats = client.user_statistics().await.expect("Stats should succeed");
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].username, "alice");
    }

    #[tokio::test]
    async fn test_expired_list_refreshes_and_succeeds() {
        // Expired 401 -> refresh -> replay -> file list
        let transport = Arc::new(MockTransport::new());
        transport.enqueue("/files", responses::expired_token_401());
        transport.enqueue(
            "/users/refresh",
            responses::ok_json(serde_json::json!({"access_token": "new-access"})),
        );
        transport.enqueue(
            "/files",
            responses::ok_json(serde_json::json!([{"id": 1, "filename": "a.txt"}])),
        );
        let (client, store) = client_with(admin_session(), Arc::clone(&transport));

        let files = client.list_files().await.expect("List should succeed");
        assert_eq!(files.len(), 1);
        assert_eq!(store.get().access_token.as_deref(), Some("new-access"));
    }
}
