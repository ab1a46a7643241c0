//! Communication channels (Slack).
//!
//! The gateway holds one `ChannelHandle` and uses it to post replies to app mentions.

mod handle;
mod slack;

pub use handle::ChannelHandle;
pub use slack::{SlackChannel, SlackError};
