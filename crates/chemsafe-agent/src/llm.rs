//! Chat backends for the review agent.
//!
//! One trait, two implementations: an OpenAI-compatible HTTP client for
//! production and an in-process mock for tests. Failures are always
//! surfaced as [`BackendError`]; the agent never synthesizes a verdict from
//! a failed call.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("chat request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },
    #[error("failed to reach chat endpoint {url}: {message}")]
    Transport { url: String, message: String },
    #[error("chat endpoint returned http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("chat endpoint returned an unexpected response shape: {message}")]
    BadResponse { message: String },
}

/// A synchronous chat completion backend.
pub trait ChatBackend: Send + Sync {
    fn complete(&self, system: &str, user: &str) -> Result<String, BackendError>;
}

/// OpenAI-compatible `/v1/chat/completions` client.
///
/// Temperature is pinned to 0: a safety review should be as reproducible
/// as the backend allows. The underlying HTTP client (and its connection
/// pool) is built once and reused across calls.
pub struct OpenAiChatClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiChatClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport {
                url: base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
            timeout,
        })
    }

    fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl ChatBackend for OpenAiChatClient {
    fn complete(&self, system: &str, user: &str) -> Result<String, BackendError> {
        let url = self.url();
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ]
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout {
                        url: url.clone(),
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    BackendError::Transport {
                        url: url.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(BackendError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp.json().map_err(|e| BackendError::BadResponse {
            message: e.to_string(),
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(BackendError::BadResponse {
                message: "empty completion content".to_string(),
            });
        }
        Ok(content)
    }
}

/// Test backend: replays canned responses in order and counts calls.
#[derive(Default)]
pub struct MockBackend {
    responses: parking_lot::Mutex<Vec<String>>,
    calls: std::sync::atomic::AtomicUsize,
    /// Captured (system, user) pairs for prompt assertions.
    requests: parking_lot::Mutex<Vec<(String, String)>>,
}

impl MockBackend {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(
                responses.into_iter().rev().map(String::from).collect(),
            ),
            calls: std::sync::atomic::AtomicUsize::new(0),
            requests: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }
}

impl ChatBackend for MockBackend {
    fn complete(&self, system: &str, user: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.requests
            .lock()
            .push((system.to_string(), user.to_string()));
        self.responses
            .lock()
            .pop()
            .ok_or_else(|| BackendError::BadResponse {
                message: "mock backend out of canned responses".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_replays_in_order_and_counts() {
        let mock = MockBackend::new(vec!["first", "second"]);
        assert_eq!(mock.complete("s", "u").unwrap(), "first");
        assert_eq!(mock.complete("s", "u").unwrap(), "second");
        assert!(mock.complete("s", "u").is_err());
        assert_eq!(mock.calls(), 3);
        assert_eq!(mock.requests().len(), 3);
    }

    #[test]
    fn client_builds_once_and_normalizes_base_url() {
        let client =
            OpenAiChatClient::new("https://api.example.com/", "k", "m", 64, Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.url(), "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn unreachable_endpoint_is_a_backend_error() {
        // Reserved port on loopback: connection refused (or timeout), never
        // a panic and never a fabricated verdict.
        let client = OpenAiChatClient::new(
            "http://127.0.0.1:9",
            "k",
            "m",
            16,
            Duration::from_millis(300),
        )
        .unwrap();
        let err = client.complete("system", "user").unwrap_err();
        assert!(matches!(
            err,
            BackendError::Transport { .. } | BackendError::Timeout { .. }
        ));
    }
}
