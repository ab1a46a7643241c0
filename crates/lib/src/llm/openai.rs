//! OpenAI-compatible chat completion client (POST {base}/chat/completions).

use crate::config::CompletionConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One role-tagged entry of a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    System { content: String },
    User { content: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("completion api error: {0}")]
    Api(String),
    #[error("completion api returned no choices")]
    EmptyChoices,
}

/// Something that turns one user message into one reply.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, message: &str) -> Result<String, CompletionError>;
}

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    instructions: Vec<String>,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: &CompletionConfig, api_key: impl Into<String>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            instructions: config.instructions.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// System instructions (blank entries skipped) followed by exactly one user entry.
    pub fn build_messages(&self, message: &str) -> Vec<ChatMessage> {
        self.instructions
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| ChatMessage::System { content: s.clone() })
            .chain(std::iter::once(ChatMessage::User {
                content: message.to_string(),
            }))
            .collect()
    }

    /// Single attempt; the caller decides what to do with a failure.
    pub async fn chat(&self, message: &str) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: self.build_messages(message),
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CompletionError::Api(format!("{} {}", status, body)));
        }
        let data: ChatResponse = res.json().await?;
        data.first_content().ok_or(CompletionError::EmptyChoices)
    }
}

#[async_trait]
impl Completer for OpenAiClient {
    async fn complete(&self, message: &str) -> Result<String, CompletionError> {
        self.chat(message).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    /// Content of `choices[0]`; a null content counts as an empty reply.
    fn first_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn config(base_url: &str, instructions: &[&str]) -> CompletionConfig {
        CompletionConfig {
            base_url: base_url.to_string(),
            model: "gpt-3.5-turbo".to_string(),
            instructions: instructions.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn messages_put_instructions_before_user() {
        let config = config("http://x", &["You are terse.", " ", "Answer in English."]);
        let client = OpenAiClient::new(&config, "k");
        let messages = client.build_messages("hi");
        assert_eq!(
            messages,
            vec![
                ChatMessage::System {
                    content: "You are terse.".to_string()
                },
                ChatMessage::System {
                    content: "Answer in English.".to_string()
                },
                ChatMessage::User {
                    content: "hi".to_string()
                },
            ]
        );
        assert_eq!(
            serde_json::to_value(&messages[2]).unwrap(),
            json!({"role": "user", "content": "hi"})
        );
    }

    #[test]
    fn no_instructions_sends_only_user_entry() {
        let client = OpenAiClient::new(&config("http://x", &[]), "k");
        assert_eq!(client.build_messages("hi").len(), 1);
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-test")
                .json_body(json!({
                    "model": "gpt-3.5-turbo",
                    "messages": [
                        {"role": "system", "content": "Be nice."},
                        {"role": "user", "content": "hello?"}
                    ]
                }));
            then.status(200).json_body(json!({
                "id": "chatcmpl-1",
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "first"}},
                    {"index": 1, "message": {"role": "assistant", "content": "second"}}
                ]
            }));
        });

        let client = OpenAiClient::new(&config(&server.url("/v1/"), &["Be nice."]), "sk-test");
        let reply = client.complete("hello?").await.expect("completion");
        assert_eq!(reply, "first");
        mock.assert();
    }

    #[tokio::test]
    async fn api_error_carries_status_and_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(401).body("invalid api key");
        });

        let client = OpenAiClient::new(&config(&server.base_url(), &[]), "bad");
        let err = client.complete("hi").await.unwrap_err();
        match err {
            CompletionError::Api(msg) => {
                assert!(msg.contains("401"), "{msg}");
                assert!(msg.contains("invalid api key"), "{msg}");
            }
            other => panic!("expected api error, got {other:?}"),
        }
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({"choices": []}));
        });

        let client = OpenAiClient::new(&config(&server.base_url(), &[]), "k");
        assert!(matches!(
            client.complete("hi").await,
            Err(CompletionError::EmptyChoices)
        ));
    }
}
