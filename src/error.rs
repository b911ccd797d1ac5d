//! Error types for ragchat.

use std::io;
use thiserror::Error;

/// Result type alias for ragchat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ragchat operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Local storage I/O error.
    #[error("Storage error: {0}")]
    Storage(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The request never produced a response (connection refused, DNS, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned status {status}{}", detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Status {
        /// HTTP status code.
        status: u16,
        /// `detail` field of the error body, if any.
        detail: Option<String>,
    },

    /// The backend rejected the credentials or bearer token (401 or 403).
    #[error("Not authorized (status {status}){}", detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Unauthorized {
        /// HTTP status code.
        status: u16,
        /// `detail` field of the error body, if any.
        detail: Option<String>,
    },

    /// Invalid state encountered.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An authorized operation was attempted without a session token.
    #[error("Not logged in")]
    NotAuthenticated,

    /// A transcript operation was attempted with no current thread.
    #[error("No chat selected")]
    NoThreadSelected,

    /// The requested thread is not in the cached collection.
    #[error("Chat not found: {0}")]
    ThreadNotFound(i64),

    /// Empty or whitespace-only message text.
    #[error("Message is empty")]
    EmptyMessage,

    /// A send is already outstanding for the transcript.
    #[error("A message is already being sent")]
    SendInFlight,

    /// Invalid user input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Map an HTTP status and optional error detail into an error.
    ///
    /// 401 and 403 become [`Error::Unauthorized`]; everything else is
    /// [`Error::Status`].
    #[must_use]
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        if matches!(status, 401 | 403) {
            Self::Unauthorized { status, detail }
        } else {
            Self::Status { status, detail }
        }
    }

    /// Whether this error means the session token is no longer valid.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// The backend's `detail` message, if the error carried one.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } | Self::Unauthorized { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}
