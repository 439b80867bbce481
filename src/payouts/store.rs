//! Payout storage.

use std::collections::HashMap;
use std::future::Future;

use crate::config::PayoutEntry;
use crate::payouts::types::{PayoutQuery, StoreError};

/// Downstream source of payouts.
pub trait PayoutStore: Send + Sync + 'static {
    fn query(&self, query: &PayoutQuery) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

/// Payout table held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    payouts: HashMap<(String, u32), u64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration entries. Later duplicates win.
    pub fn from_entries(entries: &[PayoutEntry]) -> Self {
        let payouts = entries
            .iter()
            .map(|e| ((e.race_id.clone(), e.horse_number), e.payout))
            .collect();
        Self { payouts }
    }

    pub fn with_entry(mut self, race_id: impl Into<String>, horse_number: u32, payout: u64) -> Self {
        self.payouts.insert((race_id.into(), horse_number), payout);
        self
    }

    pub fn len(&self) -> usize {
        self.payouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payouts.is_empty()
    }
}

impl PayoutStore for InMemoryStore {
    async fn query(&self, query: &PayoutQuery) -> Result<u64, StoreError> {
        if query.race_id.trim().is_empty() {
            return Err(StoreError::InvalidQuery("race_id must not be empty".into()));
        }

        self.payouts
            .get(&(query.race_id.clone(), query.horse_number))
            .copied()
            .ok_or_else(|| StoreError::NotFound {
                race_id: query.race_id.clone(),
                horse_number: query.horse_number,
            })
    }
}
