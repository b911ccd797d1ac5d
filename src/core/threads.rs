//! Chat list manager: the cached thread collection and the current selection.
//!
//! This type holds state only; [`ChatClient`](crate::core::ChatClient) issues
//! the backend calls and feeds their results in.

use crate::api::ChatThread;
use crate::error::{Error, Result};

/// Which thread is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurrentThread {
    /// Nothing selected.
    #[default]
    Unset,

    /// The thread with this id.
    Selected(i64),
}

impl CurrentThread {
    /// Selected id, if any.
    #[must_use]
    pub fn id(self) -> Option<i64> {
        match self {
            Self::Unset => None,
            Self::Selected(id) => Some(id),
        }
    }
}

/// Result of applying a fetched thread list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refresh {
    /// The selection moved to a different thread.
    pub selection_changed: bool,

    /// The collection is empty and a thread must be created.
    pub needs_thread: bool,
}

/// Result of removing a deleted thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The id was not cached.
    NotFound,

    /// Removed; the selection moved if `selection_changed`.
    Removed { selection_changed: bool },

    /// Removed the last thread; the selection is unset and a replacement
    /// must be created.
    NeedsReplacement,
}

/// Cached, server-ordered thread collection for the current session.
#[derive(Debug, Default)]
pub struct ChatList {
    threads: Vec<ChatThread>,
    current: CurrentThread,
    loading: bool,
}

impl ChatList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Threads in display order.
    #[must_use]
    pub fn threads(&self) -> &[ChatThread] {
        &self.threads
    }

    /// Current selection.
    #[must_use]
    pub fn current(&self) -> CurrentThread {
        self.current
    }

    /// Current thread id.
    #[must_use]
    pub fn current_id(&self) -> Option<i64> {
        self.current.id()
    }

    /// Current thread.
    #[must_use]
    pub fn current_thread(&self) -> Option<&ChatThread> {
        self.current_id().and_then(|id| self.get(id))
    }

    /// Thread by id.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<&ChatThread> {
        self.threads.iter().find(|t| t.id == id)
    }

    /// Whether a fetch is in progress.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Replace the collection with a server response.
    ///
    /// Keeps the selection when it still exists, otherwise selects the first
    /// thread. An empty response unsets the selection and asks for a new
    /// thread.
    pub fn apply_fetched(&mut self, threads: Vec<ChatThread>) -> Refresh {
        let before = self.current;
        self.threads = threads;

        let keep = before
            .id()
            .is_some_and(|id| self.threads.iter().any(|t| t.id == id));
        if !keep {
            self.current = self
                .threads
                .first()
                .map_or(CurrentThread::Unset, |t| CurrentThread::Selected(t.id));
        }

        Refresh {
            selection_changed: self.current != before,
            needs_thread: self.threads.is_empty(),
        }
    }

    /// Prepend a newly created thread and select it.
    pub fn apply_created(&mut self, thread: ChatThread) {
        self.threads.retain(|t| t.id != thread.id);
        self.current = CurrentThread::Selected(thread.id);
        self.threads.insert(0, thread);
    }

    /// Remove a thread the backend has deleted.
    pub fn apply_deleted(&mut self, id: i64) -> Removal {
        let Some(index) = self.threads.iter().position(|t| t.id == id) else {
            return Removal::NotFound;
        };
        self.threads.remove(index);

        if self.threads.is_empty() {
            self.current = CurrentThread::Unset;
            return Removal::NeedsReplacement;
        }

        if self.current == CurrentThread::Selected(id) {
            self.current = CurrentThread::Selected(self.threads[0].id);
            return Removal::Removed {
                selection_changed: true,
            };
        }

        Removal::Removed {
            selection_changed: false,
        }
    }

    /// Explicit user selection. Returns whether the selection changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ThreadNotFound`] if the id is not cached.
    pub fn select(&mut self, id: i64) -> Result<bool> {
        if self.get(id).is_none() {
            return Err(Error::ThreadNotFound(id));
        }
        let changed = self.current != CurrentThread::Selected(id);
        self.current = CurrentThread::Selected(id);
        Ok(changed)
    }

    /// Forget everything (logout).
    pub fn clear(&mut self) {
        self.threads.clear();
        self.current = CurrentThread::Unset;
        self.loading = false;
    }
}
