//! `ragchat login`, `ragchat register` and `ragchat logout`.

use crate::api::{AuthMode, ChatBackend};
use crate::cli::connect;
use crate::core::ChatClient;
use crate::error::{Error, Result};
use crate::storage::TokenStore;
use crate::view::LoginForm;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;

/// Run the login or register command.
///
/// Missing fields are read from stdin, one per line.
///
/// # Errors
///
/// Returns an error if the fields are blank, the backend rejects them, or
/// the token cannot be stored.
pub async fn run(mode: AuthMode, username: Option<String>, password: Option<String>) -> Result<()> {
    let (_, mut client) = connect()?;
    let mut stdin = BufReader::new(tokio::io::stdin());

    let mut form = LoginForm::new(mode);
    form.username = match username {
        Some(name) => name,
        None => read_field(&mut stdin, "username").await?,
    };
    form.password = match password {
        Some(password) => password,
        None => read_field(&mut stdin, "password").await?,
    };

    let chats = submit(&mut client, &mut form).await?;
    println!("Logged in as {}. {chats} chat(s) available.", form.username.trim());
    Ok(())
}

/// Submit the form. Returns the number of chats loaded afterwards.
///
/// # Errors
///
/// Returns the validation or backend error; it is also recorded on the form.
pub async fn submit<B: ChatBackend, S: TokenStore>(
    client: &mut ChatClient<B, S>,
    form: &mut LoginForm,
) -> Result<usize> {
    let credentials = form.submit()?;
    if let Err(error) = client.authenticate(form.mode(), &credentials).await {
        form.fail(&error);
        return Err(error);
    }
    info!(username = %credentials.username, mode = ?form.mode(), "authenticated");
    Ok(client.chats().threads().len())
}

/// Run the logout command.
///
/// # Errors
///
/// Returns an error if the stored token cannot be removed.
pub fn logout() -> Result<()> {
    let (_, mut client) = connect()?;
    let had_session = client.session().load_persisted_token()?.is_some();
    client.logout()?;

    if had_session {
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

async fn read_field<R: AsyncBufRead + Unpin>(input: &mut R, name: &str) -> Result<String> {
    eprint!("{name}: ");
    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Err(Error::InvalidInput(format!("missing {name}")));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryBackend;
    use crate::config::ChatConfig;
    use crate::storage::MemoryTokenStore;

    fn client(backend: MemoryBackend) -> ChatClient<MemoryBackend, MemoryTokenStore> {
        ChatClient::new(backend, MemoryTokenStore::new(), &ChatConfig::default())
    }

    #[tokio::test]
    async fn submit_logs_in_and_loads_chats() {
        let backend = MemoryBackend::new();
        backend.add_user("alice", "secret");
        backend.add_chat("alice", "first");
        let mut client = client(backend);

        let mut form = LoginForm::new(AuthMode::Login);
        form.username = "alice".to_string();
        form.password = "secret".to_string();

        assert_eq!(submit(&mut client, &mut form).await.unwrap(), 1);
        assert!(client.session().is_authenticated());
        assert!(form.error().is_none());
    }

    #[tokio::test]
    async fn submit_records_backend_detail() {
        let mut client = client(MemoryBackend::new());
        let mut form = LoginForm::new(AuthMode::Login);
        form.username = "alice".to_string();
        form.password = "wrong".to_string();

        let err = submit(&mut client, &mut form).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(form.error(), Some("Incorrect username or password"));
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn register_creates_first_chat() {
        let mut client = client(MemoryBackend::new());
        let mut form = LoginForm::new(AuthMode::Register);
        form.username = "bob".to_string();
        form.password = "pw".to_string();

        assert_eq!(submit(&mut client, &mut form).await.unwrap(), 1);
        assert_eq!(client.backend().chat_count(), 1);
    }

    #[tokio::test]
    async fn read_field_strips_newline() {
        let mut input = BufReader::new(&b"alice\r\n"[..]);
        assert_eq!(read_field(&mut input, "username").await.unwrap(), "alice");

        let mut empty = BufReader::new(&b""[..]);
        assert!(matches!(
            read_field(&mut empty, "password").await,
            Err(Error::InvalidInput(_))
        ));
    }
}
