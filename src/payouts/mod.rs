//! Payout query service.
//!
//! # Data Flow
//! ```text
//! request body (JSON)
//!     → handler.rs (parse PayoutQuery)
//!     → store.rs (PayoutStore::query)
//!     → `{ "payout": <n> }` | client fault | internal fault
//! ```

pub mod handler;
pub mod store;
pub mod types;

pub use handler::PayoutHandler;
pub use store::{InMemoryStore, PayoutStore};
pub use types::{PayoutQuery, StoreError};
