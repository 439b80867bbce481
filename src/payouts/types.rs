//! Payout query and store error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies the bet whose payout is requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct PayoutQuery {
    /// Race identifier.
    pub race_id: String,
    /// Horse number within the race.
    pub horse_number: u32,
}

/// Errors returned by a payout store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No payout recorded for the query. The caller asked for something that does not exist.
    #[error("no payout for race {race_id} horse {horse_number}")]
    NotFound { race_id: String, horse_number: u32 },

    /// The query is well-formed JSON but semantically invalid.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The backing store could not answer.
    #[error("payout store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the error is caused by the request rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(self, StoreError::NotFound { .. } | StoreError::InvalidQuery(_))
    }
}
