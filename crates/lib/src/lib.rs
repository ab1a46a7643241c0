//! chatbridge core library — request verification, Slack event dispatch, completion
//! client and the HTTP gateway used by the CLI.

pub mod channels;
pub mod config;
pub mod events;
pub mod gateway;
pub mod inbound;
pub mod llm;
pub mod mention;
pub mod probe;
pub mod verify;
