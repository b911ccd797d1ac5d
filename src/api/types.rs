//! Wire types exchanged with the chat backend.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Which unauthenticated endpoint issues the token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    /// Existing account, `POST /token`.
    #[default]
    Login,

    /// New account, `POST /register`.
    Register,
}

impl AuthMode {
    /// Endpoint path segment for this mode.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "token",
            Self::Register => "register",
        }
    }

    /// The other mode.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Login => Self::Register,
            Self::Register => Self::Login,
        }
    }
}

/// Login or registration request body.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Successful login/registration body.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Error body returned on non-success statuses.
///
/// `detail` is a string for application errors and a list of objects for
/// request validation errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// Parse an error body, tolerating non-JSON payloads.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    /// Human-readable detail text.
    #[must_use]
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// A conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatThread {
    pub id: i64,
    pub title: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// `POST /chats/` body.
#[derive(Debug, Clone, Serialize)]
pub struct CreateThreadRequest<'a> {
    pub title: &'a str,
}

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// A retrieved document fragment attached to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Path of the source file on the backend host.
    pub filepath: String,

    /// Excerpt used as context.
    pub content: String,
}

impl SourceDocument {
    /// Last path component of `filepath`, used to address `/files/{name}`.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.filepath
            .rsplit(['/', '\\'])
            .find(|part| !part.is_empty())
            .unwrap_or(&self.filepath)
    }
}

/// A persisted message from `GET /chats/{id}/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerMessage {
    pub id: i64,
    pub content: String,
    pub sender: Sender,
    #[serde(default, alias = "created_at", deserialize_with = "deserialize_opt_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_documents: Option<Vec<SourceDocument>>,
}

/// `POST /chat` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendRequest {
    pub chat_id: i64,
    pub query: String,
    pub use_tables: bool,
}

/// `POST /chat` response: the persisted AI message plus its sources.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub id: Option<i64>,
    pub content: String,
    #[serde(default, alias = "created_at", deserialize_with = "deserialize_opt_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_documents: Option<Vec<SourceDocument>>,
}

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 and naive ISO 8601 (`2024-05-01T10:00:00.123456`), the
/// latter interpreted as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

fn deserialize_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
    }
}
