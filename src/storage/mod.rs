//! Durable storage for the session token.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;
pub use traits::TokenStore;
