//! HTTP/1.1 request pipeline.
//!
//! # Data Flow
//! ```text
//! accepted stream
//!     → server.rs (spawn one driver per connection)
//!     → driver.rs (owns transport + context, runs phases)
//!     → phase.rs  ReadHeader → ReadBody → Handle → WriteResponse → loop | close
//!         ├─ transport.rs (suspending reads/writes with idle deadlines)
//!         │     └─ buffer.rs (bytes kept across requests)
//!         ├─ codec.rs (header extraction, response serialization)
//!         └─ context.rs (per-request framing metadata)
//! ```
//!
//! # Design Decisions
//! - Phases are a closed enum; each returns the next phase or a close reason
//! - At most one read or write is outstanding per connection
//! - Length framing only: a missing or invalid `Content-Length` is answered with 400

pub mod buffer;
pub mod codec;
pub mod context;
pub mod driver;
pub mod phase;
pub mod server;
pub mod transport;

pub use codec::{OutgoingMessage, StatusCode};
pub use context::ConnectionContext;
pub use driver::Connection;
pub use phase::{CloseReason, PipelineSettings};
pub use server::HttpServer;
