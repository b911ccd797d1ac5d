//! Storage trait definitions.

use crate::error::Result;

/// Durable storage for the bearer token.
///
/// At most one token is stored at a time.
pub trait TokenStore: Send + Sync {
    /// Read the stored token, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn load(&self) -> Result<Option<String>>;

    /// Store a token, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn save(&self, token: &str) -> Result<()>;

    /// Remove the stored token. Succeeds when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn clear(&self) -> Result<()>;
}
