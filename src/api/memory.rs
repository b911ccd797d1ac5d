//! In-memory backend for testing.
//!
//! Emulates the REST backend closely enough to drive the managers: accounts,
//! per-user chats, persisted history, first-message chat renaming, and
//! scripted failures per endpoint.

use crate::api::traits::ChatBackend;
use crate::api::types::{
    AuthMode, ChatThread, Credentials, SendRequest, SendResponse, Sender, ServerMessage,
    SourceDocument, TokenResponse,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Endpoints that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Authenticate,
    ListThreads,
    CreateThread,
    DeleteThread,
    LoadHistory,
    Send,
    FetchFile,
}

/// A scripted failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// No response at all.
    Transport,

    /// A response with this status.
    Status(u16),
}

impl Failure {
    fn into_error(self) -> Error {
        match self {
            Self::Transport => Error::Transport("connection refused".to_string()),
            Self::Status(status) => Error::from_status(status, Some(format!("scripted {status}"))),
        }
    }
}

/// A call received by the backend, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Authenticate(AuthMode, String),
    ListThreads,
    CreateThread(String),
    DeleteThread(i64),
    LoadHistory(i64),
    Send(SendRequest),
    FetchFile(String),
}

#[derive(Debug)]
struct StoredChat {
    thread: ChatThread,
    owner: String,
    messages: Vec<ServerMessage>,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<String, String>,
    tokens: HashMap<String, String>,
    chats: Vec<StoredChat>,
    files: HashMap<String, Vec<u8>>,
    failures: HashMap<Endpoint, VecDeque<Failure>>,
    reply: Option<(String, Vec<SourceDocument>)>,
    calls: Vec<Call>,
    next_id: i64,
    clock: i64,
}

impl State {
    fn take_failure(&mut self, endpoint: Endpoint) -> Result<()> {
        match self.failures.get_mut(&endpoint).and_then(VecDeque::pop_front) {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }

    fn user_for(&self, token: &str) -> Result<String> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| Error::from_status(401, Some("Could not validate credentials".into())))
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing timestamps so server ordering is deterministic.
    fn tick(&mut self) -> chrono::DateTime<Utc> {
        self.clock += 1;
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(self.clock)
    }

    fn owned_chat(&mut self, user: &str, id: i64) -> Result<&mut StoredChat> {
        let chat = self
            .chats
            .iter_mut()
            .find(|c| c.thread.id == id)
            .ok_or_else(|| Error::from_status(404, Some("Chat not found".into())))?;
        if chat.owner != user {
            return Err(Error::from_status(403, Some("Not authorized".into())));
        }
        Ok(chat)
    }
}

/// In-memory backend for testing.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend with one account and a token already issued to it.
    #[must_use]
    pub fn with_session(username: &str, token: &str) -> Self {
        let backend = Self::new();
        {
            let mut state = backend.state.lock().unwrap();
            state.users.insert(username.to_string(), String::new());
            state.tokens.insert(token.to_string(), username.to_string());
        }
        backend
    }

    /// Register an account directly.
    pub fn add_user(&self, username: &str, password: &str) {
        let mut state = self.state.lock().unwrap();
        state.users.insert(username.to_string(), password.to_string());
    }

    /// Seed a chat owned by `username`. Returns its id.
    pub fn add_chat(&self, username: &str, title: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let created_at = state.tick();
        state.chats.push(StoredChat {
            thread: ChatThread {
                id,
                title: title.to_string(),
                created_at,
            },
            owner: username.to_string(),
            messages: Vec::new(),
        });
        id
    }

    /// Seed a persisted message in a chat.
    pub fn add_message(&self, chat_id: i64, sender: Sender, content: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let timestamp = Some(state.tick());
        if let Some(chat) = state.chats.iter_mut().find(|c| c.thread.id == chat_id) {
            chat.messages.push(ServerMessage {
                id,
                content: content.to_string(),
                sender,
                timestamp,
                source_documents: None,
            });
        }
        id
    }

    /// Serve a file from `/files/{name}`.
    pub fn add_file(&self, name: &str, contents: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.files.insert(name.to_string(), contents.to_vec());
    }

    /// Fix the answer returned by `POST /chat`.
    pub fn set_reply(&self, content: &str, sources: Vec<SourceDocument>) {
        let mut state = self.state.lock().unwrap();
        state.reply = Some((content.to_string(), sources));
    }

    /// Make the next call to `endpoint` fail.
    pub fn fail_next(&self, endpoint: Endpoint, failure: Failure) {
        let mut state = self.state.lock().unwrap();
        state.failures.entry(endpoint).or_default().push_back(failure);
    }

    /// Invalidate every issued token.
    pub fn revoke_tokens(&self) {
        let mut state = self.state.lock().unwrap();
        state.tokens.clear();
    }

    /// Calls received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of chats stored for all users.
    #[must_use]
    pub fn chat_count(&self) -> usize {
        self.state.lock().unwrap().chats.len()
    }
}

#[async_trait]
impl ChatBackend for MemoryBackend {
    async fn authenticate(
        &self,
        mode: AuthMode,
        credentials: &Credentials,
    ) -> Result<TokenResponse> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::Authenticate(mode, credentials.username.clone()));
        state.take_failure(Endpoint::Authenticate)?;

        match mode {
            AuthMode::Register => {
                if state.users.contains_key(&credentials.username) {
                    return Err(Error::from_status(
                        400,
                        Some("Username already registered".into()),
                    ));
                }
                state
                    .users
                    .insert(credentials.username.clone(), credentials.password.clone());
            }
            AuthMode::Login => {
                if state.users.get(&credentials.username) != Some(&credentials.password) {
                    return Err(Error::from_status(
                        401,
                        Some("Incorrect username or password".into()),
                    ));
                }
            }
        }

        let token = format!("token-{}-{}", credentials.username, state.next_id());
        state
            .tokens
            .insert(token.clone(), credentials.username.clone());
        Ok(TokenResponse {
            access_token: token,
            token_type: Some("bearer".to_string()),
        })
    }

    async fn list_threads(&self, token: &str) -> Result<Vec<ChatThread>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ListThreads);
        state.take_failure(Endpoint::ListThreads)?;
        let user = state.user_for(token)?;

        let mut threads: Vec<ChatThread> = state
            .chats
            .iter()
            .filter(|c| c.owner == user)
            .map(|c| c.thread.clone())
            .collect();
        // Newest first, as the server orders them
        threads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(threads)
    }

    async fn create_thread(&self, token: &str, title: &str) -> Result<ChatThread> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateThread(title.to_string()));
        state.take_failure(Endpoint::CreateThread)?;
        let user = state.user_for(token)?;

        let id = state.next_id();
        let created_at = state.tick();
        let thread = ChatThread {
            id,
            title: title.to_string(),
            created_at,
        };
        state.chats.push(StoredChat {
            thread: thread.clone(),
            owner: user,
            messages: Vec::new(),
        });
        Ok(thread)
    }

    async fn delete_thread(&self, token: &str, id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::DeleteThread(id));
        state.take_failure(Endpoint::DeleteThread)?;
        let user = state.user_for(token)?;

        state.owned_chat(&user, id)?;
        state.chats.retain(|c| c.thread.id != id);
        Ok(())
    }

    async fn load_history(&self, token: &str, thread_id: i64) -> Result<Vec<ServerMessage>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::LoadHistory(thread_id));
        state.take_failure(Endpoint::LoadHistory)?;
        let user = state.user_for(token)?;

        Ok(state.owned_chat(&user, thread_id)?.messages.clone())
    }

    async fn send(&self, token: &str, request: &SendRequest) -> Result<SendResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Send(request.clone()));
        state.take_failure(Endpoint::Send)?;
        let user = state.user_for(token)?;
        state.owned_chat(&user, request.chat_id)?;

        let (content, sources) = state
            .reply
            .clone()
            .unwrap_or_else(|| (format!("answer to: {}", request.query), Vec::new()));

        let user_id = state.next_id();
        let user_ts = state.tick();
        let ai_id = state.next_id();
        let ai_ts = state.tick();

        let chat = state.owned_chat(&user, request.chat_id)?;
        if chat.messages.is_empty() {
            chat.thread.title = first_message_title(&request.query);
        }
        chat.messages.push(ServerMessage {
            id: user_id,
            content: request.query.clone(),
            sender: Sender::User,
            timestamp: Some(user_ts),
            source_documents: None,
        });
        chat.messages.push(ServerMessage {
            id: ai_id,
            content: content.clone(),
            sender: Sender::Ai,
            timestamp: Some(ai_ts),
            source_documents: None,
        });

        Ok(SendResponse {
            id: Some(ai_id),
            content,
            timestamp: Some(ai_ts),
            source_documents: Some(sources),
        })
    }

    async fn fetch_file(&self, file_name: &str) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::FetchFile(file_name.to_string()));
        state.take_failure(Endpoint::FetchFile)?;

        state
            .files
            .get(file_name)
            .cloned()
            .ok_or_else(|| Error::from_status(404, Some("File not found".into())))
    }

    fn file_url(&self, file_name: &str) -> String {
        format!("memory:///files/{file_name}")
    }
}

/// Title the backend assigns after the first message: the first 30
/// characters of the query, with `...` when truncated.
#[must_use]
pub fn first_message_title(query: &str) -> String {
    let mut title: String = query.chars().take(30).collect::<String>().trim().to_string();
    if query.chars().count() > 30 {
        title.push_str("...");
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let backend = MemoryBackend::new();
        let registered = backend
            .authenticate(AuthMode::Register, &creds("a", "b"))
            .await
            .unwrap();
        assert!(!registered.access_token.is_empty());

        let logged_in = backend
            .authenticate(AuthMode::Login, &creds("a", "b"))
            .await
            .unwrap();
        assert_ne!(logged_in.access_token, registered.access_token);
    }

    #[tokio::test]
    async fn duplicate_registration_rejected() {
        let backend = MemoryBackend::new();
        backend.add_user("a", "b");
        let err = backend
            .authenticate(AuthMode::Register, &creds("a", "c"))
            .await
            .unwrap_err();
        assert_eq!(err.detail(), Some("Username already registered"));
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let backend = MemoryBackend::new();
        let err = backend.list_threads("bogus").await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn threads_listed_newest_first() {
        let backend = MemoryBackend::with_session("u", "T");
        let older = backend.add_chat("u", "older");
        let newer = backend.add_chat("u", "newer");
        backend.add_chat("someone-else", "hidden");

        let threads = backend.list_threads("T").await.unwrap();
        let ids: Vec<i64> = threads.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![newer, older]);
    }

    #[tokio::test]
    async fn deleting_foreign_chat_is_forbidden() {
        let backend = MemoryBackend::with_session("u", "T");
        let foreign = backend.add_chat("other", "x");
        let err = backend.delete_thread("T", foreign).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized { status: 403, .. }));
        assert_eq!(backend.chat_count(), 1);
    }

    #[tokio::test]
    async fn first_send_renames_chat() {
        let backend = MemoryBackend::with_session("u", "T");
        let id = backend.add_chat("u", "New chat");
        backend
            .send(
                "T",
                &SendRequest {
                    chat_id: id,
                    query: "What is in the quarterly report for Q3?".to_string(),
                    use_tables: false,
                },
            )
            .await
            .unwrap();

        let threads = backend.list_threads("T").await.unwrap();
        assert_eq!(threads[0].title, "What is in the quarterly repor...");
        assert_eq!(backend.load_history("T", id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn scripted_failure_applies_once() {
        let backend = MemoryBackend::with_session("u", "T");
        backend.fail_next(Endpoint::ListThreads, Failure::Status(500));

        assert!(matches!(
            backend.list_threads("T").await,
            Err(Error::Status { status: 500, .. })
        ));
        assert!(backend.list_threads("T").await.is_ok());
    }

    #[test]
    fn short_titles_are_kept() {
        assert_eq!(first_message_title("hello"), "hello");
    }
}
