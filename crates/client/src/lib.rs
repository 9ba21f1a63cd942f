//! # Stash Client Core
//!
//! Session and authorization layer for the Stash file storage
//! service: holds credentials, transparently renews an expired access
//! token with the refresh token, and gates admin-only operations
//! locally before they reach the network.
//!
//! ## Overview
//!
//! - **Session store**: the four credential fields (access token,
//!   refresh token, role, username) persisted as one atomically
//!   replaced record, surviving restarts.
//! - **Authorization gate**: a pure predicate denying admin-only
//!   operations for non-admin sessions without network traffic.
//! - **Transport**: a reqwest-backed executor that attaches the right
//!   bearer credential to each request.
//! - **Refresh coordinator**: detects the `expired_token` 401, runs a
//!   single-flight refresh exchange and replays the original request
//!   exactly once.
//! - **API facade**: one method per operation (register, login,
//!   logout, list, upload, download, delete, file access, grant
//!   admin, statistics) composing gate, coordinator and store.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stash_client::{ApiClient, ClientConfig, SessionStore};
//!
//! # async fn run() -> stash_client::Result<()> {
//! let store = Arc::new(SessionStore::open_default()
//!     .map_err(|e| stash_client::ApiError::Storage(e.to_string()))?);
//! let client = ApiClient::new(&ClientConfig::new(), store)?;
//!
//! client.login("alice", "secret").await?;
//! for file in client.list_files().await? {
//!     println!("{} {}", file.id, file.filename);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`api`]: the session-aware API facade
//! - [`authz`]: the local authorization gate
//! - [`config`]: client configuration
//! - [`error`]: the error taxonomy
//! - [`models`]: wire types
//! - [`refresh`]: token refresh coordination
//! - [`session`]: session model and persisted store
//! - [`transport`]: HTTP transport

pub mod api;
pub mod authz;
pub mod config;
pub mod error;
pub mod models;
pub mod refresh;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use api::ApiClient;
pub use authz::{authorize, Operation};
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, Result};
pub use models::{AccessAction, Download, FileEntry, UserStatistics};
pub use refresh::RefreshCoordinator;
pub use session::{
    FileBackend, MemoryBackend, Role, Session, SessionBackend, SessionStore, StoreError,
};
pub use transport::{ApiRequest, ApiResponse, AuthScheme, HttpTransport, RequestBody, Transport};
