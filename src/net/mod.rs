//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limits)
//!     → connection.rs (ID assignment, live connection tracking)
//!     → Hand off to http::driver
//! ```
//!
//! # Design Decisions
//! - Bounded accepts prevent resource exhaustion
//! - Each connection is tracked so shutdown can drain them

pub mod connection;
pub mod listener;
