//! Wire types for the Stash API.

use serde::{Deserialize, Serialize};

/// Response to a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// Short-lived access token.
    pub access_token: String,
    /// Longer-lived refresh token.
    pub refresh_token: String,
    /// Whether the account holds the admin role.
    pub is_admin: bool,
    /// Username echoed back by the server.
    pub username: String,
}

/// Response to a successful token refresh.
///
/// The refresh token is only rotated when the server decides to; an
/// absent value means the existing one stays valid.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// A stored file as returned by `GET /files`.
///
/// `owner_username` and `download_count` are only populated for admin
/// callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: u64,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_count: Option<u64>,
}

/// A downloaded file: payload plus the name the server suggested via
/// `Content-Disposition`, when present.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: Option<String>,
    pub bytes: bytes::Bytes,
}

/// Whether to grant or revoke a user's access to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessAction {
    Grant,
    Revoke,
}

/// Payload for `POST /users/file-access/`.
#[derive(Debug, Clone, Serialize)]
pub struct FileAccessRequest {
    pub username: String,
    pub file_id: u64,
    pub action: AccessAction,
}

/// Per-user statistics as returned by `GET /users/user-statistics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatistics {
    pub username: String,
    pub is_admin: bool,
    pub download_count: u64,
}
