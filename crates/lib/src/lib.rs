//! Ticket pipeline core library — identity gate, classification, routing,
//! dispatch, and session state, shared by the CLI and the HTTP gateway.

pub mod classify;
pub mod config;
pub mod dispatch;
pub mod extract;
pub mod gate;
pub mod gateway;
pub mod llm;
pub mod pipeline;
pub mod respond;
pub mod route;
pub mod session;
