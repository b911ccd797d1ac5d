//! Terminal view models and rendering.

pub mod composer;
pub mod form;
pub mod render;

pub use composer::{CitationPanels, Composer};
pub use form::{AUTH_ERROR_TEXT, LoginForm, NETWORK_ERROR_TEXT, auth_error_text};
pub use render::{render_prompt, render_thread_list, render_transcript};
