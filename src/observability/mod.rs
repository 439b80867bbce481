//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Phases and connection driver
//!     → events.rs (PipelineEvent → PipelineObserver)
//!     → TracingObserver
//!         → logging.rs (structured log events)
//!         → metrics.rs (counters, histograms)
//! ```
//!
//! # Design Decisions
//! - Protocol code reports events instead of logging, so it stays testable
//! - Every event carries the connection ID

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{PipelineEvent, PipelineObserver, RecordingObserver, TracingObserver};
