//! `ragchat chats`, `ragchat new` and `ragchat delete`.

use crate::api::{ChatBackend, ChatThread};
use crate::cli::{connect, resume};
use crate::core::ChatClient;
use crate::error::Result;
use crate::storage::TokenStore;
use crate::view::render_thread_list;

/// Run the chats command.
///
/// # Errors
///
/// Returns an error if no session is stored or the backend call fails.
pub async fn list() -> Result<()> {
    let (_, mut client) = connect()?;
    resume(&mut client).await?;

    print!("{}", render_thread_list(client.chats()));
    println!("Showing {} chat(s)", client.chats().threads().len());
    Ok(())
}

/// Run the new command.
///
/// # Errors
///
/// Returns an error if no session is stored or the backend call fails.
pub async fn create(title: Option<&str>) -> Result<()> {
    let (_, mut client) = connect()?;
    resume(&mut client).await?;

    let thread = client.create_thread(title).await?;
    println!("Created chat #{}: {}", thread.id, thread.title);
    Ok(())
}

/// Run the delete command.
///
/// # Errors
///
/// Returns an error if no session is stored or the backend refuses.
pub async fn delete(id: i64) -> Result<()> {
    let (_, mut client) = connect()?;
    resume(&mut client).await?;

    let replacement = delete_thread(&mut client, id).await?;
    println!("Deleted chat #{id}.");
    if let Some(thread) = replacement {
        println!("Created chat #{} to replace it.", thread.id);
    }
    Ok(())
}

/// Delete a chat. Returns the replacement when it was the last one.
///
/// # Errors
///
/// Returns an error if the backend call fails.
pub async fn delete_thread<B: ChatBackend, S: TokenStore>(
    client: &mut ChatClient<B, S>,
    id: i64,
) -> Result<Option<ChatThread>> {
    let before: Vec<i64> = client.chats().threads().iter().map(|t| t.id).collect();
    client.delete_thread(id).await?;

    Ok(client
        .chats()
        .threads()
        .iter()
        .find(|t| !before.contains(&t.id))
        .cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryBackend;
    use crate::config::ChatConfig;
    use crate::storage::MemoryTokenStore;

    async fn started(backend: MemoryBackend) -> ChatClient<MemoryBackend, MemoryTokenStore> {
        let mut client = ChatClient::new(
            backend,
            MemoryTokenStore::with_token("tok"),
            &ChatConfig::default(),
        );
        resume(&mut client).await.unwrap();
        client
    }

    #[tokio::test]
    async fn delete_reports_replacement_only_for_last_chat() {
        let backend = MemoryBackend::with_session("alice", "tok");
        let a = backend.add_chat("alice", "a");
        let b = backend.add_chat("alice", "b");
        let mut client = started(backend).await;

        assert!(delete_thread(&mut client, a).await.unwrap().is_none());

        let replacement = delete_thread(&mut client, b).await.unwrap().unwrap();
        assert_eq!(client.chats().current_id(), Some(replacement.id));
        assert_eq!(client.backend().chat_count(), 1);
    }
}
