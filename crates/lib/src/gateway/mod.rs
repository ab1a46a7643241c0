//! Gateway: HTTP webhook endpoint for Slack events and direct chat requests.
//!
//! Each request runs retry check → verify → classify → complete → respond. The only
//! shared state is the immutable `GatewayState` built at startup.

mod handler;
mod server;

pub use handler::{handle_request, GatewayState, HandlerError, HandlerResponse, ResponseBody};
pub use server::{router, run_gateway, run_gateway_with_state};
