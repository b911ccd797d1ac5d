//! ragchat - terminal client for a retrieval-augmented chat backend.
//!
//! Keeps the login session, the chat list and the open transcript in sync
//! with the backend's REST API.

pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod view;

pub use config::Config;
pub use error::{Error, Result};
