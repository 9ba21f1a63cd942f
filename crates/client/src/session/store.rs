//! Persisted session storage.
//!
//! The [`SessionStore`] is the exclusive owner of the current
//! [`Session`]. Every mutation replaces the whole session and persists
//! it through a [`SessionBackend`], so the store never holds, for
//! example, a fresh access token next to a stale role flag. The
//! default backend writes JSON to `~/.config/stash/session.json`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use thiserror::Error;

use super::Session;

/// File name of the persisted session under the config directory.
const SESSION_FILE: &str = "session.json";

/// Errors that can occur while loading or persisting the session.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The session file could not be read.
    #[error("failed to read session state: {0}")]
    Read(String),

    /// The session file could not be written.
    #[error("failed to write session state: {0}")]
    Write(String),

    /// The persisted session did not parse or failed the coherence
    /// check.
    #[error("persisted session is corrupt: {0}")]
    Corrupt(String),

    /// No config directory is available on this platform.
    #[error("no configuration directory available")]
    NoConfigDir,
}

/// Result type for session storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Trait for session persistence backends.
///
/// This trait allows different persistence strategies, including an
/// in-memory backend for tests and ephemeral sessions.
pub trait SessionBackend: Send + Sync {
    /// Load the persisted session, if any.
    fn load(&self) -> StoreResult<Option<Session>>;

    /// Persist the given session, replacing any previous state.
    fn persist(&self, session: &Session) -> StoreResult<()>;
}

/// File-backed session persistence.
///
/// The session is stored as a single JSON document so all four fields
/// survive or vanish together. Writes go to a temp file which is then
/// renamed over the target, preventing a crash from leaving a
/// half-written file behind.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create a backend storing the session at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a backend using the default per-user location,
    /// `~/.config/stash/session.json`.
    pub fn default_location() -> StoreResult<Self> {
        let dir = dirs::config_dir().ok_or(StoreError::NoConfigDir)?;
        Ok(Self::new(dir.join("stash").join(SESSION_FILE)))
    }

    /// The path this backend persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionBackend for FileBackend {
    fn load(&self) -> StoreResult<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Read(format!("{}: {}", self.path.display(), e)))?;

        let session: Session = serde_json::from_str(&contents)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Some(session))
    }

    fn persist(&self, session: &Session) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Write(format!("{}: {}", parent.display(), e)))?;
        }

        let contents = serde_json::to_string_pretty(session)
            .map_err(|e| StoreError::Write(e.to_string()))?;

        // Atomic write: write to temp file, then rename
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &contents)
            .map_err(|e| StoreError::Write(format!("{}: {}", temp_path.display(), e)))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| StoreError::Write(format!("{}: {}", self.path.display(), e)))?;
        Ok(())
    }
}

/// In-memory session persistence for tests and ephemeral sessions.
pub struct MemoryBackend {
    state: Mutex<Option<Session>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    /// Create an in-memory backend seeded with a session.
    pub fn with_session(session: Session) -> Self {
        Self {
            state: Mutex::new(Some(session)),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBackend for MemoryBackend {
    fn load(&self) -> StoreResult<Option<Session>> {
        Ok(self.state.lock().expect("backend lock poisoned").clone())
    }

    fn persist(&self, session: &Session) -> StoreResult<()> {
        *self.state.lock().expect("backend lock poisoned") = Some(session.clone());
        Ok(())
    }
}

/// Process-wide owner of the current session.
///
/// Readers receive snapshots; writers replace the whole session. The
/// lock is never held across an await point, so `get`, `set` and
/// `clear` are indivisible with respect to each other.
pub struct SessionStore {
    current: RwLock<Session>,
    backend: Box<dyn SessionBackend>,
}

impl SessionStore {
    /// Open the store, loading any persisted session.
    ///
    /// A persisted session that fails to parse or is incoherent (a
    /// partial write) is discarded and the cleared state is persisted
    /// in its place.
    pub fn open(backend: impl SessionBackend + 'static) -> Self {
        let backend: Box<dyn SessionBackend> = Box::new(backend);
        let current = match backend.load() {
            Ok(Some(session)) if session.is_coherent() => session,
            Ok(Some(_)) => {
                tracing::warn!("persisted session is incoherent, clearing");
                Self::persist_cleared(backend.as_ref())
            }
            Ok(None) => Session::default(),
            Err(e) => {
                tracing::warn!("failed to load persisted session ({e}), clearing");
                Self::persist_cleared(backend.as_ref())
            }
        };

        Self {
            current: RwLock::new(current),
            backend,
        }
    }

    /// Open the store at the default per-user location.
    pub fn open_default() -> StoreResult<Self> {
        Ok(Self::open(FileBackend::default_location()?))
    }

    fn persist_cleared(backend: &dyn SessionBackend) -> Session {
        let cleared = Session::default();
        if let Err(e) = backend.persist(&cleared) {
            tracing::warn!("failed to persist cleared session: {e}");
        }
        cleared
    }

    /// Snapshot of the current session. Never fails.
    pub fn get(&self) -> Session {
        self.current.read().expect("session lock poisoned").clone()
    }

    /// Atomically replace all four session fields and persist them.
    pub fn set(&self, session: Session) -> StoreResult<()> {
        self.backend.persist(&session)?;
        *self.current.write().expect("session lock poisoned") = session;
        Ok(())
    }

    /// Atomically reset the session to the cleared state.
    ///
    /// The in-memory state is always cleared; a failure to persist the
    /// cleared state is logged rather than surfaced so that
    /// authentication-failure paths can always clear.
    pub fn clear(&self) {
        let cleared = Session::default();
        if let Err(e) = self.backend.persist(&cleared) {
            tracing::warn!("failed to persist cleared session: {e}");
        }
        *self.current.write().expect("session lock poisoned") = cleared;
    }

    /// Whether an access token is currently present.
    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .expect("session lock poisoned")
            .is_authenticated()
    }

    /// Whether the current session carries the admin role.
    pub fn is_admin(&self) -> bool {
        self.current
            .read()
            .expect("session lock poisoned")
            .is_admin()
    }
}
