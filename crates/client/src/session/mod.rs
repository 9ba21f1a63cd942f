//! Session state for the Stash client.
//!
//! A [`Session`] bundles the four persisted credential fields: access
//! token, refresh token, role flag and username. The fields are only
//! ever replaced as a group through the [`store::SessionStore`], so no
//! reader can observe a half-updated session.

mod store;

pub use store::{
    FileBackend, MemoryBackend, SessionBackend, SessionStore, StoreError, StoreResult,
};

use serde::{Deserialize, Serialize};

/// Role assigned to the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Ordinary user - may browse and download files.
    #[default]
    Standard,
    /// Elevated user - may additionally upload, delete, manage file
    /// access and grant admin rights.
    Admin,
}

/// The current authentication state.
///
/// `role` and `username` are only meaningful while `access_token` is
/// present. All four fields are replaced atomically by the session
/// store; individual fields are never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Session {
    /// Short-lived token authorizing ordinary API calls.
    pub access_token: Option<String>,
    /// Longer-lived token used only to obtain a new access token.
    pub refresh_token: Option<String>,
    /// Role of the authenticated user.
    pub role: Role,
    /// Username of the authenticated user.
    pub username: Option<String>,
}

impl Session {
    /// Create a fully populated session, as produced by a successful
    /// login.
    pub fn authenticated(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        role: Role,
        username: impl Into<String>,
    ) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
            role,
            username: Some(username.into()),
        }
    }

    /// Whether an access token is present.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Whether the session carries the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the field combination is one the client can have
    /// written itself.
    ///
    /// Without an access token the remaining fields must be at their
    /// cleared values; with one, a refresh token must also be present
    /// (it is required to renew the session). Anything else is a
    /// partial write from a crashed or tampered-with run and is
    /// discarded at startup.
    pub fn is_coherent(&self) -> bool {
        match self.access_token {
            Some(_) => self.refresh_token.is_some(),
            None => {
                self.refresh_token.is_none()
                    && self.username.is_none()
                    && self.role == Role::Standard
            }
        }
    }
}
