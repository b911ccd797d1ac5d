//! Backend trait definition.

use crate::api::types::{
    AuthMode, ChatThread, Credentials, SendRequest, SendResponse, ServerMessage, TokenResponse,
};
use crate::error::Result;
use async_trait::async_trait;

/// The REST surface of the chat backend.
///
/// Every method except [`authenticate`](Self::authenticate) and
/// [`fetch_file`](Self::fetch_file) carries the bearer token. Implementations
/// map 401/403 to [`Error::Unauthorized`](crate::Error::Unauthorized), other
/// non-success statuses to [`Error::Status`](crate::Error::Status) and
/// failures without a response to [`Error::Transport`](crate::Error::Transport).
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `POST /token` or `POST /register`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the credentials are rejected.
    async fn authenticate(&self, mode: AuthMode, credentials: &Credentials)
    -> Result<TokenResponse>;

    /// `GET /chats/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn list_threads(&self, token: &str) -> Result<Vec<ChatThread>>;

    /// `POST /chats/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn create_thread(&self, token: &str, title: &str) -> Result<ChatThread>;

    /// `DELETE /chats/{id}`. Only a 204 response is success.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the status is not 204.
    async fn delete_thread(&self, token: &str, id: i64) -> Result<()>;

    /// `GET /chats/{id}/messages`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn load_history(&self, token: &str, thread_id: i64) -> Result<Vec<ServerMessage>>;

    /// `POST /chat`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn send(&self, token: &str, request: &SendRequest) -> Result<SendResponse>;

    /// `GET /files/{file_name}`, raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the file is missing.
    async fn fetch_file(&self, file_name: &str) -> Result<Vec<u8>>;

    /// Public link to a source file.
    fn file_url(&self, file_name: &str) -> String;
}
