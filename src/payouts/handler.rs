//! Request handler answering payout queries.

use std::sync::Arc;

use bytes::Bytes;

use crate::handler::{HandlerOutcome, RequestHandler};
use crate::payouts::store::PayoutStore;
use crate::payouts::types::PayoutQuery;

/// 400 body for payloads that are not a payout query.
pub const INVALID_FORMAT: &str = r#"{ "error": "Invalid request format" }"#;

/// Parses a JSON [`PayoutQuery`] and asks the store for its payout.
#[derive(Debug)]
pub struct PayoutHandler<S> {
    store: Arc<S>,
}

impl<S> PayoutHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> Clone for PayoutHandler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

/// Response body for a successful query.
pub fn payout_body(payout: u64) -> String {
    format!(r#"{{ "payout": {} }}"#, payout)
}

impl<S: PayoutStore> RequestHandler for PayoutHandler<S> {
    async fn handle(&self, body: Bytes) -> HandlerOutcome {
        let query: PayoutQuery = match serde_json::from_slice(&body) {
            Ok(query) => query,
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting payout query");
                return HandlerOutcome::ClientFault(INVALID_FORMAT.to_string());
            }
        };

        match self.store.query(&query).await {
            Ok(payout) => HandlerOutcome::Success(payout_body(payout)),
            Err(e) if e.is_client_error() => HandlerOutcome::ClientFault(e.to_string()),
            Err(e) => HandlerOutcome::InternalFault(e.to_string()),
        }
    }
}
