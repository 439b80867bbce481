//! Pipeline events and observers.
//!
//! Phases and the connection driver never log directly. They report
//! [`PipelineEvent`]s to a [`PipelineObserver`]; [`TracingObserver`] turns them
//! into structured `tracing` events and metrics.

use std::sync::Mutex;
use std::time::Duration;

use crate::http::codec::StatusCode;
use crate::http::phase::{CloseReason, FramingError};
use crate::net::connection::ConnectionId;
use crate::observability::metrics;

/// Something that happened while processing a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A header block was received and parsed.
    HeaderReceived {
        header_length: usize,
        body_length: usize,
        keep_alive: bool,
    },
    /// The request framing was rejected and will be answered with a 400.
    FramingRejected(FramingError),
    /// The complete body is available. `read_skipped` is set when it was
    /// already buffered.
    BodyReceived { length: usize, read_skipped: bool },
    /// The handler produced an outcome.
    HandlerCompleted { status: StatusCode, elapsed: Duration },
    /// Internal detail of a handler fault. Never sent to the peer.
    HandlerFault { detail: String },
    /// A response was fully written.
    ResponseWritten { status: StatusCode, length: usize },
    /// The connection reached its terminal state.
    Closed(CloseReason),
}

/// Receives pipeline events for every connection.
pub trait PipelineObserver: Send + Sync + 'static {
    fn on_event(&self, connection: ConnectionId, event: &PipelineEvent);
}

/// Default observer: structured logs and metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, connection: ConnectionId, event: &PipelineEvent) {
        match event {
            PipelineEvent::HeaderReceived {
                header_length,
                body_length,
                keep_alive,
            } => {
                tracing::debug!(
                    connection_id = %connection,
                    header_length,
                    body_length,
                    keep_alive,
                    "Header received"
                );
            }
            PipelineEvent::FramingRejected(error) => {
                tracing::warn!(connection_id = %connection, error = %error, "Rejecting request framing");
                metrics::record_framing_error();
            }
            PipelineEvent::BodyReceived { length, read_skipped } => {
                tracing::trace!(connection_id = %connection, length, read_skipped, "Body received");
            }
            PipelineEvent::HandlerCompleted { status, elapsed } => {
                tracing::debug!(connection_id = %connection, status = %status, elapsed = ?elapsed, "Handler completed");
                metrics::record_handler_latency(*elapsed);
            }
            PipelineEvent::HandlerFault { detail } => {
                tracing::error!(connection_id = %connection, detail = %detail, "Handler failed");
            }
            PipelineEvent::ResponseWritten { status, length } => {
                tracing::debug!(connection_id = %connection, status = %status, length, "Response written");
                metrics::record_response(*status);
            }
            PipelineEvent::Closed(reason) => {
                match reason {
                    CloseReason::Failed { .. } | CloseReason::TimedOut { .. } => {
                        tracing::warn!(connection_id = %connection, reason = %reason, "Connection terminated");
                    }
                    CloseReason::PeerClosed | CloseReason::Completed => {
                        tracing::debug!(connection_id = %connection, reason = %reason, "Connection closed");
                    }
                }
                metrics::record_close_reason(reason);
            }
        }
    }
}

/// Observer that keeps every event in memory. Useful in tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events, oldest first.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, _connection: ConnectionId, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
