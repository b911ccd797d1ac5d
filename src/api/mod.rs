//! Backend gateway: wire types and the REST client.

pub mod http;
pub mod memory;
pub mod traits;
pub mod types;

pub use http::HttpBackend;
pub use memory::MemoryBackend;
pub use traits::ChatBackend;
pub use types::{
    AuthMode, ChatThread, Credentials, SendRequest, SendResponse, Sender, ServerMessage,
    SourceDocument, TokenResponse,
};
