//! Operator session kept in the root folder (`session.json`)

use crate::error::{ReconcileError, Result};
use chrono::{DateTime, Utc};
use ecole_common::api::SessionUser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionFile {
    user: SessionUser,
    signed_in_at: DateTime<Utc>,
}

/// Who is signed in on this machine.
///
/// Loaded explicitly and passed to the commands that need it.
#[derive(Debug, Clone)]
pub struct AuthContext {
    path: PathBuf,
    session: Option<SessionFile>,
}

impl AuthContext {
    /// Read the session file; a missing or unreadable file means signed out
    pub fn load(path: &Path) -> Self {
        let session = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<SessionFile>(&text) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!("Ignoring corrupt session file {}: {}", path.display(), e);
                    None
                }
            },
            Err(_) => {
                debug!("No session file at {}", path.display());
                None
            }
        };
        Self {
            path: path.to_path_buf(),
            session,
        }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn signed_in_at(&self) -> Option<DateTime<Utc>> {
        self.session.as_ref().map(|s| s.signed_in_at)
    }

    /// The signed-in operator, or an authentication error
    pub fn require_user(&self) -> Result<&SessionUser> {
        self.user().ok_or_else(|| {
            ReconcileError::Authentication("not signed in, run `ecole-rc login` first".to_string())
        })
    }

    /// Record a successful login and persist it
    pub fn sign_in(&mut self, user: SessionUser) -> Result<()> {
        let session = SessionFile {
            user,
            signed_in_at: Utc::now(),
        };
        let text = serde_json::to_string_pretty(&session)
            .map_err(|e| ReconcileError::Session(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ReconcileError::Session(e.to_string()))?;
        }
        std::fs::write(&self.path, text).map_err(|e| ReconcileError::Session(e.to_string()))?;
        info!(username = %session.user.username, "Signed in");
        self.session = Some(session);
        Ok(())
    }

    /// Forget the session; returns the user that was signed in
    pub fn clear(&mut self) -> Result<Option<SessionUser>> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| ReconcileError::Session(e.to_string()))?;
        }
        Ok(self.session.take().map(|s| s.user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn user() -> SessionUser {
        SessionUser {
            id: 1,
            username: "secretariat".to_string(),
            fullname: "Mariama Bah".to_string(),
            role: "admin".to_string(),
            derniereconnection: None,
        }
    }

    #[test]
    fn test_sign_in_persists_and_clear_removes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let mut ctx = AuthContext::load(&path);
        assert!(ctx.require_user().is_err());

        ctx.sign_in(user()).unwrap();
        let reloaded = AuthContext::load(&path);
        assert_eq!(reloaded.user(), Some(&user()));
        assert!(reloaded.signed_in_at().is_some());

        let mut ctx = reloaded;
        assert_eq!(ctx.clear().unwrap(), Some(user()));
        assert!(!path.exists());
        assert!(AuthContext::load(&path).user().is_none());
    }

    #[test]
    fn test_corrupt_file_means_signed_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(AuthContext::load(&path).user().is_none());
    }
}
