//! Chat-completion client.
//!
//! [`ChatClient`] abstracts the hosted model so the pipeline can be driven by
//! [`HttpChatClient`] in production and [`ScriptedChatClient`] in tests.
//!
//! Every call is a single request: there is no retry and no backoff. A
//! non-2xx status becomes [`Error::UpstreamHttp`], a connection or timeout
//! failure becomes [`Error::Transport`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send one request and return the first choice's message content, if any.
    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>>;
}

/// Client for an Azure-style deployment endpoint, authenticated with an
/// `api-key` header.
pub struct HttpChatClient {
    client: reqwest::Client,
    url: String,
    api_version: String,
    api_key: String,
}

impl HttpChatClient {
    /// Build a client from configuration, reading the key from the
    /// environment variable named by `llm.api_key_env`.
    pub fn from_config(config: &LlmConfig) -> anyhow::Result<Self> {
        if !config.is_configured() {
            anyhow::bail!("llm.endpoint is not configured");
        }
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;
        Self::new(config, api_key)
    }

    pub fn new(config: &LlmConfig, api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.completions_url(),
            api_version: config.api_version.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamHttp {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        Ok(parsed.first_content())
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn first_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
    }
}

/// Client used when no endpoint is configured. Every call fails.
pub struct UnconfiguredChatClient;

#[async_trait]
impl ChatClient for UnconfiguredChatClient {
    async fn complete(&self, _request: &ChatRequest) -> Result<Option<String>> {
        Err(Error::Transport(
            "no chat-completion endpoint configured (set [llm].endpoint)".to_string(),
        ))
    }
}

/// Replays queued responses in order and records every request.
///
/// When the queue is empty, calls fail with a transport error.
#[derive(Default)]
pub struct ScriptedChatClient {
    responses: Mutex<VecDeque<Result<Option<String>>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, content: impl Into<String>) -> Self {
        self.push(Ok(Some(content.into())));
        self
    }

    pub fn fail(self, error: Error) -> Self {
        self.push(Err(error));
        self
    }

    pub fn empty_reply(self) -> Self {
        self.push(Ok(None));
        self
    }

    fn push(&self, response: Result<Option<String>>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self.responses.lock().ok().and_then(|mut q| q.pop_front());
        next.unwrap_or_else(|| Err(Error::Transport("no scripted response left".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_choice_content() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "[]" } },
                { "message": { "role": "assistant", "content": "ignored" } }
            ]
        });
        let parsed: ChatResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.first_content().as_deref(), Some("[]"));
    }

    #[test]
    fn missing_choices_yield_no_content() {
        let parsed: ChatResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(parsed.first_content().is_none());
    }

    #[test]
    fn request_serializes_in_wire_shape() {
        let request = ChatRequest {
            messages: vec![ChatMessage::system("s"), ChatMessage::user("u")],
            max_tokens: 4000,
            temperature: 0.5,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "u");
        assert_eq!(value["max_tokens"], 4000);
        assert_eq!(value["temperature"], 0.5);
    }

    #[tokio::test]
    async fn scripted_client_replays_in_order() {
        let client = ScriptedChatClient::new()
            .reply("first")
            .fail(Error::UpstreamHttp {
                status: 429,
                body: "slow down".to_string(),
            });
        let request = ChatRequest {
            messages: vec![ChatMessage::user("hi")],
            max_tokens: 10,
            temperature: 0.0,
        };

        assert_eq!(client.complete(&request).await.unwrap().as_deref(), Some("first"));
        assert!(matches!(
            client.complete(&request).await,
            Err(Error::UpstreamHttp { status: 429, .. })
        ));
        assert!(matches!(client.complete(&request).await, Err(Error::Transport(_))));
        assert_eq!(client.requests().len(), 3);
    }
}
