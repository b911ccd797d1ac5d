//! CLI command implementations.

pub mod auth;
pub mod chats;
pub mod conversation;
pub mod repl;
pub mod source;

use crate::api::{ChatBackend, HttpBackend};
use crate::config::{Config, load_config};
use crate::core::ChatClient;
use crate::error::{Error, Result};
use crate::storage::{FileTokenStore, TokenStore};

/// Client bound to the configured backend and token directory.
pub type Client = ChatClient<HttpBackend, FileTokenStore>;

/// Load the configuration and build a client without touching the network.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the token directory
/// cannot be created.
pub fn connect() -> Result<(Config, Client)> {
    let config = load_config()?;
    let backend = HttpBackend::new(&config.api)?;
    let store = FileTokenStore::new(config.storage.path.clone())?;
    let client = ChatClient::new(backend, store, &config.chat);
    Ok((config, client))
}

/// Restore the persisted session and load the chat list.
///
/// # Errors
///
/// Returns [`Error::NotAuthenticated`] when no session is stored, or the
/// error of the chat list fetch (a rejected session also ends it).
pub async fn resume<B: ChatBackend, S: TokenStore>(client: &mut ChatClient<B, S>) -> Result<()> {
    if !client.restore_session()? {
        return Err(Error::NotAuthenticated);
    }
    client.fetch_threads().await
}
