//! Slack Events API payload classification.
//!
//! A verified body is one of: a `url_verification` handshake, an `event_callback`
//! carrying an `app_mention`, or a direct chat request `{"message": ...}` with no
//! `type` at all. Anything else that is valid JSON is ignored with a 200.

use crate::inbound::InboundRequest;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

pub const SLACK_RETRY_NUM_HEADER: &str = "X-Slack-Retry-Num";
pub const SLACK_RETRY_REASON_HEADER: &str = "X-Slack-Retry-Reason";

const TYPE_URL_VERIFICATION: &str = "url_verification";
const TYPE_EVENT_CALLBACK: &str = "event_callback";
const INNER_APP_MENTION: &str = "app_mention";

/// Result of classifying one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedEvent {
    /// Endpoint ownership check; the challenge is echoed back verbatim.
    HandshakeChallenge(String),
    /// The bot was mentioned in `channel`; `text` still contains mention markup.
    CallbackMention { channel: String, text: String },
    /// Direct API call without Slack involved.
    PlainChat(String),
    Ignored(IgnoreReason),
}

/// Why a request was answered without doing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Slack redelivery after a slow response; the first delivery is (or was) handled.
    Retry { num: String, reason: Option<String> },
    UnhandledEventType(String),
    UnhandledInnerEvent(String),
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::Retry { num, reason } => write!(
                f,
                "slack retry #{} ({})",
                num,
                reason.as_deref().unwrap_or("no reason given")
            ),
            IgnoreReason::UnhandledEventType(t) => write!(f, "unhandled event type {:?}", t),
            IgnoreReason::UnhandledInnerEvent(t) => {
                write!(f, "unhandled inner event type {:?}", t)
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("request body is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("malformed JSON body: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("missing or invalid field: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct UrlVerification {
    challenge: String,
}

#[derive(Debug, Deserialize)]
struct AppMentionEvent {
    channel: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

/// A non-empty `X-Slack-Retry-Num` header marks a redelivery. Checked before anything else.
pub fn detect_retry(request: &InboundRequest) -> Option<IgnoreReason> {
    let num = request
        .header(SLACK_RETRY_NUM_HEADER)
        .filter(|v| !v.is_empty())?;
    Some(IgnoreReason::Retry {
        num: num.to_string(),
        reason: request
            .header(SLACK_RETRY_REASON_HEADER)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
    })
}

/// Classify a verified request body.
pub fn classify(body: impl AsRef<[u8]>) -> Result<ClassifiedEvent, ClassifyError> {
    let body = std::str::from_utf8(body.as_ref())?;
    let value: Value = serde_json::from_str(body)?;
    let Some(object) = value.as_object() else {
        return Err(ClassifyError::NotAnObject);
    };

    let discriminator = match object.get("type") {
        None | Some(Value::Null) => "",
        Some(Value::String(s)) => s.as_str(),
        Some(other) => {
            return Ok(ClassifiedEvent::Ignored(IgnoreReason::UnhandledEventType(
                other.to_string(),
            )))
        }
    };

    match discriminator {
        TYPE_URL_VERIFICATION => {
            let v: UrlVerification = field_struct(&value, "challenge")?;
            Ok(ClassifiedEvent::HandshakeChallenge(v.challenge))
        }
        TYPE_EVENT_CALLBACK => classify_callback(object.get("event")),
        "" => {
            let chat: ChatRequest = field_struct(&value, "message")?;
            Ok(ClassifiedEvent::PlainChat(chat.message))
        }
        other => Ok(ClassifiedEvent::Ignored(IgnoreReason::UnhandledEventType(
            other.to_string(),
        ))),
    }
}

fn classify_callback(event: Option<&Value>) -> Result<ClassifiedEvent, ClassifyError> {
    let inner_type = event
        .and_then(|e| e.get("type"))
        .and_then(Value::as_str)
        .unwrap_or("");
    match (inner_type, event) {
        (INNER_APP_MENTION, Some(event)) => {
            let mention: AppMentionEvent = serde_json::from_value(event.clone())
                .map_err(|_| ClassifyError::MissingField(missing_mention_field(event)))?;
            Ok(ClassifiedEvent::CallbackMention {
                channel: mention.channel,
                text: mention.text,
            })
        }
        (other, _) => Ok(ClassifiedEvent::Ignored(IgnoreReason::UnhandledInnerEvent(
            other.to_string(),
        ))),
    }
}

fn missing_mention_field(event: &Value) -> &'static str {
    if event.get("channel").and_then(Value::as_str).is_none() {
        "event.channel"
    } else {
        "event.text"
    }
}

/// Deserialize a single-required-field shape, reporting `field` when it is absent or mistyped.
fn field_struct<T: serde::de::DeserializeOwned>(
    value: &Value,
    field: &'static str,
) -> Result<T, ClassifyError> {
    T::deserialize(value).map_err(|_| ClassifyError::MissingField(field))
}
