//! Session Persistence
//!
//! The authenticated session (`access_token` + user profile) lives in a
//! JSON file under the platform data directory. It is read once at
//! startup to decide the initial authenticated/unauthenticated state,
//! written on login, and removed on logout. The session is always
//! passed explicitly; nothing in the crate holds it as a global.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// An authenticated session against the CRM backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Bearer token injected into CRM requests
    pub access_token: String,
    /// The logged-in user
    pub user: UserProfile,
}

/// Profile of the logged-in user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// File-backed store for the session
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a store backed by the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store at the default platform location
    pub fn default_location() -> Self {
        let path = dirs::data_local_dir()
            .map(|p| p.join("aquaview").join("session.json"))
            .unwrap_or_else(|| PathBuf::from("./aquaview_session.json"));
        Self::new(path)
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted session, if any
    ///
    /// A missing file means no session; a corrupt file is an error so
    /// callers can decide whether to discard it.
    pub fn load(&self) -> Result<Option<Session>, SessionError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionError::Io {
                    path: self.path.clone(),
                    error: e.to_string(),
                })
            }
        };

        let session: Session =
            serde_json::from_str(&content).map_err(|e| SessionError::Corrupt {
                path: self.path.clone(),
                error: e.to_string(),
            })?;

        Ok(Some(session))
    }

    /// Persist a session (login)
    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SessionError::Io {
                path: parent.to_path_buf(),
                error: e.to_string(),
            })?;
        }

        let content = serde_json::to_string_pretty(session).map_err(|e| SessionError::Corrupt {
            path: self.path.clone(),
            error: e.to_string(),
        })?;

        std::fs::write(&self.path, content).map_err(|e| SessionError::Io {
            path: self.path.clone(),
            error: e.to_string(),
        })?;

        tracing::debug!("Session saved for user {}", session.user.username);
        Ok(())
    }

    /// Remove the persisted session (logout)
    pub fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Io {
                path: self.path.clone(),
                error: e.to_string(),
            }),
        }
    }
}

/// Session persistence errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to access session file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Session file {path:?} is corrupt: {error}")]
    Corrupt { path: PathBuf, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_session() -> Session {
        Session {
            access_token: "tok-123".to_string(),
            user: UserProfile {
                id: 7,
                username: "ines".to_string(),
                email: Some("ines@example.com".to_string()),
                full_name: None,
            },
        }
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_save_load_clear_roundtrip() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("session.json"));

        let session = sample_session();
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);

        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        let store = SessionStore::new(path);
        assert!(matches!(store.load(), Err(SessionError::Corrupt { .. })));
    }
}
