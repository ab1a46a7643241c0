//! Slack channel: post replies via the Web API `chat.postMessage`.

use crate::channels::handle::ChannelHandle;
use async_trait::async_trait;
use serde::Deserialize;

const SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("slack request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("slack api error: {0}")]
    Api(String),
}

/// `chat.postMessage` answers HTTP 200 even on failure; `ok` tells the truth.
#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack Web API connector authenticated with a bot token.
pub struct SlackChannel {
    id: String,
    api_base: String,
    token: String,
    client: reqwest::Client,
}

impl SlackChannel {
    pub fn new(api_base: Option<String>, token: impl Into<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| SLACK_API_BASE.to_string());
        Self {
            id: "slack".to_string(),
            api_base,
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Post plain text to a channel. One attempt, no retry.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<(), SlackError> {
        let url = format!("{}/chat.postMessage", self.api_base);
        let body = serde_json::json!({ "channel": channel, "text": text });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SlackError::Api(format!(
                "chat.postMessage failed: {} {}",
                status, body
            )));
        }
        let data: PostMessageResponse = res.json().await?;
        if !data.ok {
            return Err(SlackError::Api(format!(
                "chat.postMessage returned ok: false ({})",
                data.error.as_deref().unwrap_or("unknown error")
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelHandle for SlackChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), SlackError> {
        self.post_message(conversation_id, text).await
    }
}
