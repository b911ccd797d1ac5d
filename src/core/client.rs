//! Client controller: wires the managers to the backend.
//!
//! All authorized calls go through [`ChatClient::checked`], which logs the
//! failure and ends the session whenever the backend answers 401 or 403.

use crate::api::{AuthMode, ChatBackend, ChatThread, Credentials, SendResponse, SourceDocument};
use crate::config::ChatConfig;
use crate::core::session::SessionStore;
use crate::core::threads::{ChatList, Removal};
use crate::core::transcript::{Message, MessageId, PendingSend, Reconciled, Transcript};
use crate::error::{Error, Result};
use crate::storage::TokenStore;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the event channel. Slow subscribers see `Lagged`.
const EVENT_CAPACITY: usize = 64;

/// State change notifications for views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// Login or logout.
    SessionChanged,

    /// The thread collection changed.
    ThreadsChanged,

    /// The current thread changed.
    SelectionChanged,

    /// The transcript changed.
    TranscriptChanged,

    /// Thread list fetch started (`true`) or finished (`false`).
    Loading(bool),
}

/// Result of [`ChatClient::send_message`].
#[derive(Debug)]
pub enum SendOutcome {
    /// The answer replaced the placeholder.
    Answered(Message),

    /// The call failed; `message` is the terminal error entry.
    Failed { message: Message, error: Error },

    /// The transcript moved on before the answer arrived.
    Stale,
}

/// Session, chat list and transcript bound to one backend.
pub struct ChatClient<B, S> {
    backend: B,
    session: SessionStore<S>,
    chats: ChatList,
    transcript: Transcript,
    default_title: String,
    events: broadcast::Sender<ClientEvent>,
}

impl<B: ChatBackend, S: TokenStore> ChatClient<B, S> {
    /// Create a client with no session loaded.
    pub fn new(backend: B, store: S, config: &ChatConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            session: SessionStore::new(store),
            chats: ChatList::new(),
            transcript: Transcript::new(),
            default_title: config.default_title.clone(),
            events,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn session(&self) -> &SessionStore<S> {
        &self.session
    }

    pub fn chats(&self) -> &ChatList {
        &self.chats
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Subscribe to state change events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: ClientEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn token(&self) -> Result<String> {
        self.session.require_token().map(str::to_string)
    }

    /// Log a failed authorized call and end the session on 401/403.
    fn on_failure(&mut self, op: &'static str, error: &Error) {
        warn!(op, %error, "backend call failed");
        if error.is_unauthorized() && self.session.is_authenticated() {
            warn!(op, "session rejected by backend, logging out");
            if let Err(logout_error) = self.logout() {
                warn!(%logout_error, "failed to remove persisted token");
            }
        }
    }

    fn checked<T>(&mut self, op: &'static str, result: Result<T>) -> Result<T> {
        result.map_err(|error| {
            self.on_failure(op, &error);
            error
        })
    }

    /// Adopt the persisted token, if any, without calling the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be read.
    pub fn restore_session(&mut self) -> Result<bool> {
        if !self.session.restore()? {
            return Ok(false);
        }
        info!("restored persisted session");
        self.publish(ClientEvent::SessionChanged);
        Ok(true)
    }

    /// Restore a persisted session and, if one exists, load its threads.
    ///
    /// Returns whether a session is active afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be read. Thread loading
    /// failures are logged, not returned.
    pub async fn start(&mut self) -> Result<bool> {
        if !self.restore_session()? {
            return Ok(false);
        }
        if let Err(error) = self.fetch_threads().await {
            debug!(%error, "initial thread fetch failed");
        }
        Ok(self.session.is_authenticated())
    }

    /// Log in or register, persist the token and load threads.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the credentials are rejected or the
    /// request fails, or a storage error if the token cannot be persisted.
    pub async fn authenticate(&mut self, mode: AuthMode, credentials: &Credentials) -> Result<()> {
        let response = self
            .backend
            .authenticate(mode, credentials)
            .await
            .inspect_err(|error| warn!(%error, ?mode, "authentication failed"))?;

        self.chats.clear();
        self.transcript.reset(None);
        self.session.login(&response.access_token)?;
        self.publish(ClientEvent::SessionChanged);

        if let Err(error) = self.fetch_threads().await {
            debug!(%error, "thread fetch after login failed");
        }
        Ok(())
    }

    /// End the session and forget all cached state.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted token cannot be removed; the
    /// in-memory state is cleared regardless.
    pub fn logout(&mut self) -> Result<()> {
        let result = self.session.logout();
        self.chats.clear();
        self.transcript.reset(None);
        self.publish(ClientEvent::SessionChanged);
        self.publish(ClientEvent::ThreadsChanged);
        self.publish(ClientEvent::SelectionChanged);
        self.publish(ClientEvent::TranscriptChanged);
        result
    }

    /// Mark the thread list as loading. [`fetch_threads`](Self::fetch_threads)
    /// does this itself; views call it to draw the indicator first.
    pub fn begin_fetch(&mut self) {
        self.set_loading(true);
    }

    fn set_loading(&mut self, loading: bool) {
        if self.chats.is_loading() != loading {
            self.chats.set_loading(loading);
            self.publish(ClientEvent::Loading(loading));
        }
    }

    /// Reload the thread list.
    ///
    /// Selects the first thread when nothing (valid) is selected and creates
    /// one when the list is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if no session is active or the backend call fails.
    pub async fn fetch_threads(&mut self) -> Result<()> {
        let token = self.token().inspect_err(|_| self.set_loading(false))?;

        self.begin_fetch();
        let result = self.backend.list_threads(&token).await;
        self.set_loading(false);

        let threads = self.checked("list_threads", result)?;
        debug!(count = threads.len(), "fetched threads");
        let refresh = self.chats.apply_fetched(threads);
        self.publish(ClientEvent::ThreadsChanged);

        if refresh.needs_thread {
            self.create_thread(None).await?;
        } else if refresh.selection_changed {
            self.publish(ClientEvent::SelectionChanged);
            self.refresh_transcript().await;
        }
        Ok(())
    }

    /// Create a thread, put it first and select it.
    ///
    /// # Errors
    ///
    /// Returns an error if no session is active or the backend call fails;
    /// the cached state is unchanged in that case.
    pub async fn create_thread(&mut self, title: Option<&str>) -> Result<ChatThread> {
        let token = self.token()?;
        let title = title.unwrap_or(&self.default_title).to_string();

        let result = self.backend.create_thread(&token, &title).await;
        let thread = self.checked("create_thread", result)?;
        info!(id = thread.id, "created chat");

        self.chats.apply_created(thread.clone());
        self.publish(ClientEvent::ThreadsChanged);
        self.publish(ClientEvent::SelectionChanged);
        self.refresh_transcript().await;
        Ok(thread)
    }

    /// Delete a thread, moving or replacing the selection as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if no session is active or the backend did not answer
    /// 204; the cached state is unchanged in that case.
    pub async fn delete_thread(&mut self, id: i64) -> Result<()> {
        let token = self.token()?;

        let result = self.backend.delete_thread(&token, id).await;
        self.checked("delete_thread", result)?;
        info!(id, "deleted chat");

        match self.chats.apply_deleted(id) {
            Removal::NotFound => {}
            Removal::Removed {
                selection_changed: false,
            } => self.publish(ClientEvent::ThreadsChanged),
            Removal::Removed {
                selection_changed: true,
            } => {
                self.publish(ClientEvent::ThreadsChanged);
                self.publish(ClientEvent::SelectionChanged);
                self.refresh_transcript().await;
            }
            Removal::NeedsReplacement => {
                self.transcript.reset(None);
                self.publish(ClientEvent::ThreadsChanged);
                self.publish(ClientEvent::SelectionChanged);
                self.publish(ClientEvent::TranscriptChanged);
                self.create_thread(None).await?;
            }
        }
        Ok(())
    }

    /// Make `id` the current thread and load its history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ThreadNotFound`] for unknown ids, or the history
    /// load error.
    pub async fn select_thread(&mut self, id: i64) -> Result<()> {
        let changed = self.chats.select(id)?;
        if changed || self.transcript.thread_id() != Some(id) {
            self.publish(ClientEvent::SelectionChanged);
            self.load_history().await?;
        }
        Ok(())
    }

    /// Replace the transcript with the current thread's history.
    ///
    /// # Errors
    ///
    /// Returns an error if no session is active, nothing is selected, or the
    /// backend call fails (the transcript is left empty).
    pub async fn load_history(&mut self) -> Result<()> {
        let token = self.token()?;
        let thread_id = self.chats.current_id().ok_or(Error::NoThreadSelected)?;

        let ticket = self.transcript.begin_load(thread_id);
        self.publish(ClientEvent::TranscriptChanged);

        let result = self.backend.load_history(&token, thread_id).await;
        match result {
            Ok(history) => {
                self.transcript.finish_load(&ticket, Some(history));
                self.publish(ClientEvent::TranscriptChanged);
                Ok(())
            }
            Err(error) => {
                self.transcript.finish_load(&ticket, None);
                self.publish(ClientEvent::TranscriptChanged);
                self.on_failure("load_history", &error);
                Err(error)
            }
        }
    }

    async fn refresh_transcript(&mut self) {
        if let Err(error) = self.load_history().await {
            debug!(%error, "history reload failed");
        }
    }

    /// Send `text` to the current thread.
    ///
    /// Equivalent to [`begin_send`](Self::begin_send),
    /// [`dispatch_send`](Self::dispatch_send) and
    /// [`finish_send`](Self::finish_send) in sequence.
    ///
    /// # Errors
    ///
    /// Returns an error, without calling the backend, when no session is
    /// active, nothing is selected, the text is blank or another send is
    /// outstanding. Backend failures are reported as [`SendOutcome::Failed`].
    pub async fn send_message(&mut self, text: &str, use_tables: bool) -> Result<SendOutcome> {
        let pending = self.begin_send(text, use_tables)?;
        let result = self.dispatch_send(&pending).await;
        self.finish_send(&pending, result).await
    }

    /// Append the optimistic user message and the placeholder.
    ///
    /// # Errors
    ///
    /// Returns an error when no session is active, nothing is selected, the
    /// text is blank or another send is outstanding.
    pub fn begin_send(&mut self, text: &str, use_tables: bool) -> Result<PendingSend> {
        self.token()?;
        let thread_id = self.chats.current_id().ok_or(Error::NoThreadSelected)?;

        let pending = self.transcript.begin_send(thread_id, text, use_tables)?;
        self.publish(ClientEvent::TranscriptChanged);
        debug!(thread_id, use_tables, "sending message");
        Ok(pending)
    }

    /// Perform the backend call for a send. Leaves all state untouched.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or [`Error::NotAuthenticated`] if the
    /// session ended in the meantime.
    pub async fn dispatch_send(&self, pending: &PendingSend) -> Result<SendResponse> {
        let token = self.token()?;
        self.backend.send(&token, pending.request()).await
    }

    /// Reconcile the transcript with the result of
    /// [`dispatch_send`](Self::dispatch_send).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the answer vanished from the
    /// transcript; backend failures are reported as [`SendOutcome::Failed`].
    pub async fn finish_send(
        &mut self,
        pending: &PendingSend,
        result: Result<SendResponse>,
    ) -> Result<SendOutcome> {
        let reconciled = self
            .transcript
            .complete_send(pending, result.as_ref().ok().cloned());
        self.publish(ClientEvent::TranscriptChanged);

        match (reconciled, result) {
            (Reconciled::Stale, result) => {
                if let Err(error) = result {
                    self.on_failure("send", &error);
                }
                Ok(SendOutcome::Stale)
            }
            (_, Err(error)) => {
                let message = self.last_message()?;
                self.on_failure("send", &error);
                Ok(SendOutcome::Failed { message, error })
            }
            (_, Ok(response)) => {
                let id = response.id.map_or(pending.placeholder, MessageId::Confirmed);
                let message = self
                    .transcript
                    .message(id)
                    .cloned()
                    .ok_or_else(|| Error::InvalidState("answer missing after send".to_string()))?;
                if pending.first_in_thread {
                    // The backend renames a chat after its first message
                    if let Err(error) = self.fetch_threads().await {
                        debug!(%error, "title refresh failed");
                    }
                }
                Ok(SendOutcome::Answered(message))
            }
        }
    }

    fn last_message(&self) -> Result<Message> {
        self.transcript
            .messages()
            .last()
            .cloned()
            .ok_or_else(|| Error::InvalidState("transcript is empty after send".to_string()))
    }

    /// Download the file a citation points at.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be fetched.
    pub async fn fetch_source(&self, source: &SourceDocument) -> Result<Vec<u8>> {
        let name = source.file_name();
        debug!(file = name, "fetching source file");
        self.backend.fetch_file(name).await
    }

    /// Public link for a citation.
    #[must_use]
    pub fn source_url(&self, source: &SourceDocument) -> String {
        self.backend.file_url(source.file_name())
    }
}
