//! Request handler capability.
//!
//! # Data Flow
//! ```text
//! Handle phase
//!     → RequestHandler::handle(body)
//!     → HandlerOutcome
//!         Success(payload)      → 200 with payload
//!         ClientFault(message)  → 400 with message
//!         InternalFault(detail) → 500 with a generic body, detail logged only
//! ```
//!
//! # Design Decisions
//! - The pipeline never interprets the success payload
//! - Handlers are shared across connections, so they are `Send + Sync`

use std::future::Future;

use bytes::Bytes;

/// Result of handling one request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Payload for a 200 response.
    Success(String),
    /// The request was malformed or semantically invalid; the message is the 400 body.
    ClientFault(String),
    /// A dependency failed; the detail is logged but never sent.
    InternalFault(String),
}

/// Business logic invoked once a complete request body is available.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, body: Bytes) -> impl Future<Output = HandlerOutcome> + Send;
}

/// Handler that answers every request with its own body.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl RequestHandler for EchoHandler {
    async fn handle(&self, body: Bytes) -> HandlerOutcome {
        match std::str::from_utf8(&body) {
            Ok(text) => HandlerOutcome::Success(text.to_owned()),
            Err(_) => HandlerOutcome::ClientFault("body is not valid UTF-8".to_owned()),
        }
    }
}
