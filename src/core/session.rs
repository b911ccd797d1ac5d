//! Session store: the bearer token in memory and in durable storage.

use crate::error::{Error, Result};
use crate::storage::TokenStore;
use tracing::info;

/// Holds zero or one session token and mirrors it to a [`TokenStore`].
#[derive(Debug)]
pub struct SessionStore<S> {
    store: S,
    token: Option<String>,
}

impl<S: TokenStore> SessionStore<S> {
    /// Create a session store with no token in memory.
    pub fn new(store: S) -> Self {
        Self { store, token: None }
    }

    /// Read the persisted token without adopting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be read.
    pub fn load_persisted_token(&self) -> Result<Option<String>> {
        self.store.load()
    }

    /// Adopt the persisted token, if any. Returns whether a session exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be read.
    pub fn restore(&mut self) -> Result<bool> {
        self.token = self.load_persisted_token()?;
        Ok(self.token.is_some())
    }

    /// Start a session with `token` and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be persisted. The in-memory
    /// session is still started.
    pub fn login(&mut self, token: &str) -> Result<()> {
        self.token = Some(token.to_string());
        info!("session started");
        self.store.save(token)
    }

    /// End the session and remove the persisted token.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted token cannot be removed. The
    /// in-memory token is cleared regardless.
    pub fn logout(&mut self) -> Result<()> {
        if self.token.take().is_some() {
            info!("session ended");
        }
        self.store.clear()
    }

    /// The current token.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Whether a session is active.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// The current token, or [`Error::NotAuthenticated`].
    ///
    /// # Errors
    ///
    /// Returns an error when no session is active.
    pub fn require_token(&self) -> Result<&str> {
        self.token().ok_or(Error::NotAuthenticated)
    }

    /// The underlying token store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileTokenStore, MemoryTokenStore};
    use tempfile::TempDir;

    #[test]
    fn starts_without_token() {
        let session = SessionStore::new(MemoryTokenStore::new());
        assert!(!session.is_authenticated());
        assert!(matches!(session.require_token(), Err(Error::NotAuthenticated)));
    }

    #[test]
    fn load_persisted_token_does_not_adopt() {
        let session = SessionStore::new(MemoryTokenStore::with_token("T"));
        assert_eq!(session.load_persisted_token().unwrap().as_deref(), Some("T"));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn restore_adopts_persisted_token() {
        let mut session = SessionStore::new(MemoryTokenStore::with_token("T"));
        assert!(session.restore().unwrap());
        assert_eq!(session.token(), Some("T"));
    }

    #[test]
    fn restore_without_token() {
        let mut session = SessionStore::new(MemoryTokenStore::new());
        assert!(!session.restore().unwrap());
        assert!(session.token().is_none());
    }

    #[test]
    fn login_persists() {
        let mut session = SessionStore::new(MemoryTokenStore::new());
        session.login("T").unwrap();
        assert_eq!(session.require_token().unwrap(), "T");
        assert_eq!(session.store().load().unwrap().as_deref(), Some("T"));
    }

    #[test]
    fn logout_clears_memory_and_storage() {
        let mut session = SessionStore::new(MemoryTokenStore::new());
        session.login("T").unwrap();
        session.logout().unwrap();

        assert!(!session.is_authenticated());
        assert!(session.store().load().unwrap().is_none());
    }

    #[test]
    fn logout_without_session_succeeds() {
        let mut session = SessionStore::new(MemoryTokenStore::new());
        session.logout().unwrap();
    }

    #[test]
    fn session_survives_restart_with_file_store() {
        let temp_dir = TempDir::new().unwrap();

        let mut first = SessionStore::new(FileTokenStore::new(temp_dir.path().to_path_buf()).unwrap());
        first.login("persisted").unwrap();
        drop(first);

        let mut second =
            SessionStore::new(FileTokenStore::new(temp_dir.path().to_path_buf()).unwrap());
        assert!(second.restore().unwrap());
        assert_eq!(second.token(), Some("persisted"));

        second.logout().unwrap();
        let mut third = SessionStore::new(FileTokenStore::new(temp_dir.path().to_path_buf()).unwrap());
        assert!(!third.restore().unwrap());
    }
}
