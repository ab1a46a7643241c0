//! End-to-end smoke check outside the webhook path: one completion, optionally posted to
//! a debug channel.

use crate::channels::ChannelHandle;
use crate::llm::Completer;
use anyhow::{Context, Result};

pub const DEFAULT_PROBE_MESSAGE: &str = "Hello!";

/// Outcome of a probe run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub reply: String,
    /// Some(true/false) when a debug channel was configured and a post was attempted.
    pub posted: Option<bool>,
}

/// Ask the completion API for a reply to `message`; when `debug_channel` is set, post it there.
/// A completion failure is an error. A failed post is only logged.
pub async fn run_probe(
    completer: &dyn Completer,
    channel: &dyn ChannelHandle,
    debug_channel: Option<&str>,
    message: &str,
) -> Result<ProbeReport> {
    log::info!("probe: requesting completion for {:?}", message);
    let reply = completer
        .complete(message)
        .await
        .context("completion request failed")?;

    let posted = match debug_channel {
        Some(target) => match channel.send_message(target, &reply).await {
            Ok(()) => {
                log::info!("probe: posted reply to {} via {}", target, channel.id());
                Some(true)
            }
            Err(e) => {
                log::error!("probe: failed to send a message to {}: {}", target, e);
                Some(false)
            }
        },
        None => {
            log::debug!("probe: no debug channel configured, skipping post");
            None
        }
    };

    Ok(ProbeReport { reply, posted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::SlackError;
    use crate::llm::CompletionError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Echo;

    #[async_trait]
    impl Completer for Echo {
        async fn complete(&self, message: &str) -> Result<String, CompletionError> {
            Ok(format!("echo: {}", message))
        }
    }

    struct Broken;

    #[async_trait]
    impl Completer for Broken {
        async fn complete(&self, _message: &str) -> Result<String, CompletionError> {
            Err(CompletionError::EmptyChoices)
        }
    }

    #[derive(Default)]
    struct Recorder {
        fail: bool,
        posts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChannelHandle for Recorder {
        fn id(&self) -> &str {
            "recorder"
        }

        async fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), SlackError> {
            self.posts
                .lock()
                .unwrap()
                .push((conversation_id.to_string(), text.to_string()));
            if self.fail {
                Err(SlackError::Api("not_in_channel".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn posts_reply_to_debug_channel() {
        let channel = Recorder::default();
        let report = run_probe(&Echo, &channel, Some("CDEBUG"), DEFAULT_PROBE_MESSAGE)
            .await
            .unwrap();
        assert_eq!(report.reply, "echo: Hello!");
        assert_eq!(report.posted, Some(true));
        assert_eq!(
            *channel.posts.lock().unwrap(),
            vec![("CDEBUG".to_string(), "echo: Hello!".to_string())]
        );
    }

    #[tokio::test]
    async fn skips_post_without_debug_channel() {
        let channel = Recorder::default();
        let report = run_probe(&Echo, &channel, None, "hi").await.unwrap();
        assert_eq!(report.posted, None);
        assert!(channel.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_post_is_reported_not_fatal() {
        let channel = Recorder {
            fail: true,
            ..Default::default()
        };
        let report = run_probe(&Echo, &channel, Some("C1"), "hi").await.unwrap();
        assert_eq!(report.posted, Some(false));
    }

    #[tokio::test]
    async fn completion_failure_is_fatal() {
        let channel = Recorder::default();
        assert!(run_probe(&Broken, &channel, Some("C1"), "hi").await.is_err());
        assert!(channel.posts.lock().unwrap().is_empty());
    }
}
