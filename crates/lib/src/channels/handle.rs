//! Outbound channel seam: where mention replies are delivered.

use crate::channels::slack::SlackError;
use async_trait::async_trait;

/// Handle to a channel connector that can deliver a reply.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "slack").
    fn id(&self) -> &str;
    /// Send a text message to a conversation (e.g. a Slack channel id).
    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), SlackError>;
}
