//! Gateway: HTTP front end for the ticket pipeline.
//!
//! Serves a health route and `POST /tickets`. Sessions are keyed by the
//! caller-supplied thread id so the two-step identity flow works across
//! independent requests.

mod server;

pub use server::{run_gateway, GatewayState, TicketRequest};
