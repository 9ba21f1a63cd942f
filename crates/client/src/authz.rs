//! Local authorization gate.
//!
//! A pure predicate over the current [`Session`] and a static table of
//! privileged operations. The gate runs before any network call and
//! denies admin-only operations for non-admin sessions without
//! issuing traffic. This is a UX optimization, not a security
//! boundary: the server independently re-enforces authorization on
//! every endpoint.

use crate::error::ApiError;
use crate::session::{Role, Session};

/// The operations exposed by the API facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Create a new account.
    Register,
    /// Exchange credentials for a session.
    Login,
    /// Invalidate the session server-side and clear it locally.
    Logout,
    /// List stored files.
    ListFiles,
    /// Upload a new file (admin only).
    Upload,
    /// Download a file's contents.
    Download,
    /// Delete a stored file (admin only).
    DeleteFile,
    /// Grant or revoke a user's access to a file (admin only).
    ManageFileAccess,
    /// Promote a user to admin (admin only).
    GrantAdmin,
    /// Fetch per-user download statistics.
    Statistics,
}

impl Operation {
    /// The role required to perform this operation, if any.
    ///
    /// Statistics is intentionally absent from the privileged set: the
    /// server restricts it, but callers gate it by convention only.
    pub fn required_role(self) -> Option<Role> {
        match self {
            Operation::Upload
            | Operation::DeleteFile
            | Operation::ManageFileAccess
            | Operation::GrantAdmin => Some(Role::Admin),
            _ => None,
        }
    }

    /// Human-readable denial message for this operation.
    fn denial_message(self) -> &'static str {
        match self {
            Operation::Upload => "Only admins can upload files.",
            Operation::DeleteFile => "Only admins can delete files.",
            Operation::ManageFileAccess => "Only admins can manage file access.",
            Operation::GrantAdmin => "Only admins can grant admin rights.",
            _ => "Operation not permitted.",
        }
    }
}

/// Decide whether the given session may perform the operation.
///
/// Returns `Ok(())` for unprivileged operations and for privileged
/// operations under an admin session; otherwise returns
/// [`ApiError::Forbidden`] with a human-readable detail. Performs no
/// I/O and mutates nothing.
pub fn authorize(session: &Session, operation: Operation) -> Result<(), ApiError> {
    match operation.required_role() {
        None => Ok(()),
        Some(Role::Admin) if session.is_admin() => Ok(()),
        Some(_) => Err(ApiError::Forbidden(
            operation.denial_message().to_string(),
        )),
    }
}
