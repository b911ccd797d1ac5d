//! reqwest-backed implementation of [`ChatBackend`].

use crate::api::traits::ChatBackend;
use crate::api::types::{
    AuthMode, ChatThread, Credentials, CreateThreadRequest, ErrorBody, SendRequest, SendResponse,
    ServerMessage, TokenResponse,
};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client for the chat backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base: Url,
    client: Client,
}

impl HttpBackend {
    /// Build a backend client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be constructed.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base = Url::parse(config.base_url.trim()).map_err(|error| {
            Error::Config(format!("invalid api.base_url {:?}: {error}", config.base_url))
        })?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "api.base_url {:?} cannot be used as a base URL",
                config.base_url
            )));
        }

        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;

        Ok(Self { base, client })
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    ///
    /// A trailing empty segment produces a trailing slash.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn dispatch(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|error| {
            warn!(%error, "backend request failed before a response");
            Error::Transport(error.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = ErrorBody::parse(&body).detail_text();
        debug!(status = status.as_u16(), ?detail, "backend returned error status");
        Err(Error::from_status(status.as_u16(), detail))
    }

    async fn request_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.dispatch(request).await?;
        let body = response
            .text()
            .await
            .map_err(|error| Error::Transport(format!("response read failed: {error}")))?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Body the static file route returns with status 200 when the file is missing.
#[derive(Deserialize)]
struct MissingFile {
    error: String,
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn authenticate(
        &self,
        mode: AuthMode,
        credentials: &Credentials,
    ) -> Result<TokenResponse> {
        debug!(endpoint = mode.path(), username = %credentials.username, "authenticating");
        let request = self.client.post(self.url(&[mode.path()])).json(credentials);
        self.request_json(request).await
    }

    async fn list_threads(&self, token: &str) -> Result<Vec<ChatThread>> {
        let request = self.client.get(self.url(&["chats", ""])).bearer_auth(token);
        self.request_json(request).await
    }

    async fn create_thread(&self, token: &str, title: &str) -> Result<ChatThread> {
        let request = self
            .client
            .post(self.url(&["chats", ""]))
            .bearer_auth(token)
            .json(&CreateThreadRequest { title });
        self.request_json(request).await
    }

    async fn delete_thread(&self, token: &str, id: i64) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&["chats", &id.to_string()]))
            .bearer_auth(token);
        let response = self.dispatch(request).await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            warn!(status = status.as_u16(), id, "delete returned unexpected status");
            Err(Error::Status {
                status: status.as_u16(),
                detail: None,
            })
        }
    }

    async fn load_history(&self, token: &str, thread_id: i64) -> Result<Vec<ServerMessage>> {
        let request = self
            .client
            .get(self.url(&["chats", &thread_id.to_string(), "messages"]))
            .bearer_auth(token);
        self.request_json(request).await
    }

    async fn send(&self, token: &str, request: &SendRequest) -> Result<SendResponse> {
        let request = self
            .client
            .post(self.url(&["chat"]))
            .bearer_auth(token)
            .json(request);
        self.request_json(request).await
    }

    async fn fetch_file(&self, file_name: &str) -> Result<Vec<u8>> {
        let request = self.client.get(self.url(&["files", file_name]));
        let response = self.dispatch(request).await?;

        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        let bytes = response
            .bytes()
            .await
            .map_err(|error| Error::Transport(format!("response read failed: {error}")))?;

        if is_json {
            if let Ok(missing) = serde_json::from_slice::<MissingFile>(&bytes) {
                return Err(Error::Status {
                    status: StatusCode::NOT_FOUND.as_u16(),
                    detail: Some(missing.error),
                });
            }
        }

        Ok(bytes.to_vec())
    }

    fn file_url(&self, file_name: &str) -> String {
        self.url(&["files", file_name]).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base_url: &str) -> HttpBackend {
        HttpBackend::new(&ApiConfig {
            base_url: base_url.to_string(),
            timeout_secs: None,
        })
        .unwrap()
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = HttpBackend::new(&ApiConfig {
            base_url: "not a url".to_string(),
            timeout_secs: None,
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn rejects_non_base_url() {
        let result = HttpBackend::new(&ApiConfig {
            base_url: "mailto:someone@example.com".to_string(),
            timeout_secs: Some(5),
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn builds_collection_url_with_trailing_slash() {
        let api = backend("http://localhost:8000");
        assert_eq!(
            api.url(&["chats", ""]).as_str(),
            "http://localhost:8000/chats/"
        );
    }

    #[test]
    fn builds_nested_urls() {
        let api = backend("http://localhost:8000/");
        assert_eq!(
            api.url(&["chats", "42", "messages"]).as_str(),
            "http://localhost:8000/chats/42/messages"
        );
        assert_eq!(api.url(&["chat"]).as_str(), "http://localhost:8000/chat");
    }

    #[test]
    fn keeps_base_path_prefix() {
        let api = backend("https://example.com/rag/");
        assert_eq!(api.url(&["token"]).as_str(), "https://example.com/rag/token");
    }

    #[test]
    fn file_url_encodes_name() {
        let api = backend("http://localhost:8000");
        assert_eq!(
            api.file_url("annual report.pdf"),
            "http://localhost:8000/files/annual%20report.pdf"
        );
    }
}
