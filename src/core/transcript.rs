//! Message transcript manager for the selected thread.
//!
//! Sends are optimistic: the user message and an AI placeholder are appended
//! before the backend answers, then the placeholder is reconciled by its
//! local id. Every reset bumps a generation counter so late history loads and
//! late send completions for a previous selection are recognised and dropped.

use crate::api::{SendRequest, SendResponse, Sender, ServerMessage, SourceDocument};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Content of the AI placeholder shown while a send is outstanding.
pub const PENDING_MARKER: &str = "...";

/// Terminal message appended when the generation call fails.
pub const SEND_ERROR_TEXT: &str = "Ошибка сервера RAG.";

/// Message identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Client-generated; the entry has no server identity (yet).
    Pending(u64),

    /// Server-assigned.
    Confirmed(i64),
}

impl MessageId {
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// A transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub sources: Vec<SourceDocument>,
}

impl Message {
    fn local(id: u64, sender: Sender, content: &str) -> Self {
        Self {
            id: MessageId::Pending(id),
            sender,
            content: content.to_string(),
            timestamp: None,
            sources: Vec::new(),
        }
    }

    fn answer(placeholder: MessageId, response: SendResponse) -> Self {
        Self {
            id: response.id.map_or(placeholder, MessageId::Confirmed),
            sender: Sender::Ai,
            content: response.content,
            timestamp: response.timestamp,
            sources: response.source_documents.unwrap_or_default(),
        }
    }
}

impl From<ServerMessage> for Message {
    fn from(msg: ServerMessage) -> Self {
        Self {
            id: MessageId::Confirmed(msg.id),
            sender: msg.sender,
            content: msg.content,
            timestamp: msg.timestamp,
            sources: msg.source_documents.unwrap_or_default(),
        }
    }
}

/// Time-seeded monotonic source of local ids.
#[derive(Debug)]
struct LocalIds {
    next: u64,
}

impl Default for LocalIds {
    fn default() -> Self {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        Self { next: now }
    }
}

impl LocalIds {
    fn next(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Handle for an in-progress history load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryTicket {
    pub thread_id: i64,
    generation: u64,
}

/// Handle for an in-progress send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub thread_id: i64,
    pub user_message: MessageId,
    pub placeholder: MessageId,
    /// No confirmed message preceded this one in the thread.
    pub first_in_thread: bool,
    request: SendRequest,
    generation: u64,
}

impl PendingSend {
    /// Body for `POST /chat`.
    #[must_use]
    pub fn request(&self) -> &SendRequest {
        &self.request
    }
}

/// How a send completion was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The placeholder was replaced by the answer.
    Answered,

    /// The placeholder was replaced by the terminal error message.
    Failed,

    /// The transcript moved on; the completion was discarded.
    Stale,
}

/// Messages of the selected thread.
#[derive(Debug, Default)]
pub struct Transcript {
    thread_id: Option<i64>,
    messages: Vec<Message>,
    generation: u64,
    loading: bool,
    in_flight: Option<MessageId>,
    ids: LocalIds,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Thread this transcript belongs to.
    #[must_use]
    pub fn thread_id(&self) -> Option<i64> {
        self.thread_id
    }

    /// Messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Message by id.
    #[must_use]
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether a send is outstanding.
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether `id` is the placeholder of the outstanding send.
    #[must_use]
    pub fn is_placeholder(&self, id: MessageId) -> bool {
        self.in_flight == Some(id)
    }

    /// Whether the thread holds any server-confirmed message.
    #[must_use]
    pub fn has_confirmed_messages(&self) -> bool {
        self.messages.iter().any(|m| !m.id.is_pending())
    }

    /// Discard all messages and attach to `thread_id`.
    ///
    /// Outstanding loads and sends become stale.
    pub fn reset(&mut self, thread_id: Option<i64>) {
        self.thread_id = thread_id;
        self.messages.clear();
        self.generation += 1;
        self.loading = false;
        self.in_flight = None;
    }

    /// Start loading history for `thread_id`, discarding the current messages.
    pub fn begin_load(&mut self, thread_id: i64) -> HistoryTicket {
        self.reset(Some(thread_id));
        self.loading = true;
        HistoryTicket {
            thread_id,
            generation: self.generation,
        }
    }

    /// Apply a history response, or `None` when the load failed.
    ///
    /// Returns `false` when the ticket is stale. Local entries added while the
    /// load was outstanding are kept after the history.
    pub fn finish_load(&mut self, ticket: &HistoryTicket, history: Option<Vec<ServerMessage>>) -> bool {
        if ticket.generation != self.generation {
            debug!(thread_id = ticket.thread_id, "discarding stale history");
            return false;
        }
        self.loading = false;

        let Some(mut history) = history else {
            return true;
        };
        // Server order stands unless every entry is timestamped
        if history.iter().all(|m| m.timestamp.is_some()) {
            history.sort_by_key(|m| m.timestamp);
        }

        let local: Vec<Message> = self.messages.drain(..).filter(|m| m.id.is_pending()).collect();
        self.messages = history.into_iter().map(Message::from).collect();
        self.messages.extend(local);
        true
    }

    /// Validate `text`, append the optimistic user message and placeholder,
    /// and return the send handle.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyMessage`] for blank text
    /// - [`Error::SendInFlight`] while another send is outstanding
    /// - [`Error::InvalidState`] if the transcript belongs to another thread
    pub fn begin_send(&mut self, thread_id: i64, text: &str, use_tables: bool) -> Result<PendingSend> {
        if text.trim().is_empty() {
            return Err(Error::EmptyMessage);
        }
        if self.in_flight.is_some() {
            return Err(Error::SendInFlight);
        }
        if self.thread_id != Some(thread_id) {
            return Err(Error::InvalidState(format!(
                "transcript is not showing chat {thread_id}"
            )));
        }

        let user = Message::local(self.ids.next(), Sender::User, text);
        let placeholder = Message::local(self.ids.next(), Sender::Ai, PENDING_MARKER);
        let pending = PendingSend {
            thread_id,
            user_message: user.id,
            placeholder: placeholder.id,
            first_in_thread: !self.has_confirmed_messages(),
            request: SendRequest {
                chat_id: thread_id,
                query: text.to_string(),
                use_tables,
            },
            generation: self.generation,
        };

        self.messages.push(user);
        self.messages.push(placeholder);
        self.in_flight = Some(pending.placeholder);
        Ok(pending)
    }

    /// Reconcile a send with its answer, or `None` when the call failed.
    pub fn complete_send(&mut self, pending: &PendingSend, reply: Option<SendResponse>) -> Reconciled {
        if pending.generation != self.generation || self.thread_id != Some(pending.thread_id) {
            debug!(thread_id = pending.thread_id, "discarding stale send completion");
            return Reconciled::Stale;
        }
        let Some(index) = self.messages.iter().position(|m| m.id == pending.placeholder) else {
            return Reconciled::Stale;
        };
        if self.in_flight == Some(pending.placeholder) {
            self.in_flight = None;
        }

        match reply {
            Some(response) => {
                self.messages[index] = Message::answer(pending.placeholder, response);
                Reconciled::Answered
            }
            None => {
                self.messages.remove(index);
                let error = Message::local(self.ids.next(), Sender::Ai, SEND_ERROR_TEXT);
                self.messages.push(error);
                Reconciled::Failed
            }
        }
    }
}
