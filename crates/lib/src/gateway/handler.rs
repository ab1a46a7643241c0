//! Per-request pipeline: retry check, verify, classify, complete, respond.

use crate::channels::{ChannelHandle, SlackChannel, SlackError};
use crate::config::{BootMode, Config, Credentials};
use crate::events::{self, ClassifiedEvent, ClassifyError};
use crate::inbound::InboundRequest;
use crate::llm::{Completer, CompletionError, OpenAiClient};
use crate::mention::strip_mentions;
use crate::verify::{RequestVerifier, VerificationError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Immutable state shared by every request. Built once at startup.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub mode: BootMode,
    pub verifier: Arc<RequestVerifier>,
    pub completer: Arc<dyn Completer>,
    pub channel: Arc<dyn ChannelHandle>,
}

impl GatewayState {
    /// Wire the real OpenAI and Slack clients from config and credentials.
    pub fn new(config: Config, credentials: &Credentials) -> Self {
        let completer = OpenAiClient::new(&config.completion, credentials.openai_api_key.clone());
        let channel = SlackChannel::new(
            Some(config.slack.api_base.clone()),
            credentials.slack_api_token.clone(),
        );
        Self {
            mode: credentials.mode,
            verifier: Arc::new(RequestVerifier::from_credentials(credentials)),
            completer: Arc::new(completer),
            channel: Arc::new(channel),
            config: Arc::new(config),
        }
    }
}

/// Everything that stops a request, with the status it maps to.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Malformed(#[from] ClassifyError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Delivery(#[from] SlackError),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Verification(_) => StatusCode::UNAUTHORIZED,
            HandlerError::Malformed(_) => StatusCode::BAD_REQUEST,
            HandlerError::Completion(_) | HandlerError::Delivery(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Text(String),
    Json(serde_json::Value),
}

/// Status plus body, independent of the HTTP server.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    pub status: StatusCode,
    pub body: ResponseBody,
}

impl HandlerResponse {
    pub fn ok() -> Self {
        Self {
            status: StatusCode::OK,
            body: ResponseBody::Empty,
        }
    }

    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self {
            status,
            body: ResponseBody::Text(text.into()),
        }
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: ResponseBody::Json(value),
        }
    }
}

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> Response {
        match self.body {
            ResponseBody::Empty => self.status.into_response(),
            ResponseBody::Text(text) => (self.status, text).into_response(),
            ResponseBody::Json(value) => (self.status, Json(value)).into_response(),
        }
    }
}

/// Handle one inbound webhook call. Never fails: errors become status + diagnostic body.
pub async fn handle_request(state: &GatewayState, request: &InboundRequest) -> HandlerResponse {
    let request_id = uuid::Uuid::new_v4();
    log::debug!(
        "request {}: headers [{}], {} byte body",
        request_id,
        header_names(request),
        request.body.len()
    );

    if let Some(reason) = events::detect_retry(request) {
        log::info!("request {}: skipping {}", request_id, reason);
        return HandlerResponse::ok();
    }

    match dispatch(state, request).await {
        Ok(response) => response,
        Err(e) => {
            match &e {
                HandlerError::Verification(_) | HandlerError::Malformed(_) => {
                    log::warn!("request {}: rejected: {}", request_id, e)
                }
                HandlerError::Completion(_) | HandlerError::Delivery(_) => {
                    log::error!("request {}: upstream failure: {}", request_id, e)
                }
            }
            HandlerResponse::text(e.status(), e.to_string())
        }
    }
}

async fn dispatch(
    state: &GatewayState,
    request: &InboundRequest,
) -> Result<HandlerResponse, HandlerError> {
    state.verifier.verify(request)?;

    match events::classify(&request.body)? {
        ClassifiedEvent::HandshakeChallenge(challenge) => {
            log::info!("answering url_verification handshake");
            Ok(HandlerResponse::text(StatusCode::OK, challenge))
        }
        ClassifiedEvent::CallbackMention { channel, text } => {
            let message = strip_mentions(&text);
            log::debug!("app mention in {}: requesting completion", channel);
            let reply = state.completer.complete(&message).await?;
            state.channel.send_message(&channel, &reply).await?;
            log::info!("posted reply to {} via {}", channel, state.channel.id());
            Ok(HandlerResponse::ok())
        }
        ClassifiedEvent::PlainChat(message) => {
            log::debug!("direct chat request: requesting completion");
            let reply = state.completer.complete(&message).await?;
            Ok(HandlerResponse::json(json!({ "response": reply })))
        }
        ClassifiedEvent::Ignored(reason) => {
            log::debug!("ignoring event: {}", reason);
            Ok(HandlerResponse::ok())
        }
    }
}

/// Header names only; values may carry credentials.
fn header_names(request: &InboundRequest) -> String {
    let mut names: Vec<&str> = request.headers.keys().map(String::as_str).collect();
    names.sort_unstable();
    names.join(", ")
}
