//! In-memory token storage for testing.

use crate::error::Result;
use crate::storage::traits::TokenStore;
use std::sync::RwLock;

/// In-memory token store for testing.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a token.
    #[must_use]
    pub fn with_token(token: &str) -> Self {
        Self {
            token: RwLock::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        let token = self.token.read().unwrap();
        Ok(token.clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        let mut slot = self.token.write().unwrap();
        *slot = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self.token.write().unwrap();
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_has_no_token() {
        let store = MemoryTokenStore::new();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_load_clear() {
        let store = MemoryTokenStore::new();
        store.save("T").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("T"));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn with_token_preloads() {
        let store = MemoryTokenStore::with_token("abc");
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn concurrent_save_and_load() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemoryTokenStore::new());
        let mut handles = vec![];

        for i in 0..8 {
            let store_clone = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for j in 0..50 {
                    store_clone.save(&format!("token-{i}-{j}")).unwrap();
                    assert!(store_clone.load().unwrap().is_some());
                }
            }));
        }

        for handle in handles {
            handle.join().expect("Thread panicked");
        }

        // Exactly one token survives
        assert!(store.load().unwrap().unwrap().starts_with("token-"));
    }
}
