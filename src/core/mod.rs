//! Client-side session and chat state.

pub mod client;
pub mod session;
pub mod threads;
pub mod transcript;

pub use client::{ChatClient, ClientEvent, SendOutcome};
pub use session::SessionStore;
pub use threads::{ChatList, CurrentThread, Refresh, Removal};
pub use transcript::{
    HistoryTicket, Message, MessageId, PENDING_MARKER, PendingSend, Reconciled, SEND_ERROR_TEXT,
    Transcript,
};
