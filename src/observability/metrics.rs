//! Metrics collection and exposition.
//!
//! # Metrics
//! - `payout_responses_total` (counter): responses written, by status
//! - `payout_framing_errors_total` (counter): requests rejected for framing
//! - `payout_connections_opened_total` (counter): accepted connections
//! - `payout_active_connections` (gauge): connections currently open
//! - `payout_connections_closed_total` (counter): closed connections, by reason
//! - `payout_handler_duration_seconds` (histogram): handler latency
//!
//! Recording is a no-op until [`init_metrics`] installs a recorder.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::http::codec::StatusCode;
use crate::http::phase::CloseReason;

/// Install the Prometheus recorder and its HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_response(status: StatusCode) {
    metrics::counter!("payout_responses_total", "status" => status.as_u16().to_string()).increment(1);
}

pub fn record_framing_error() {
    metrics::counter!("payout_framing_errors_total").increment(1);
}

pub fn record_handler_latency(elapsed: Duration) {
    metrics::histogram!("payout_handler_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_connection_opened() {
    metrics::counter!("payout_connections_opened_total").increment(1);
    metrics::gauge!("payout_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    metrics::gauge!("payout_active_connections").decrement(1.0);
}

pub fn record_close_reason(reason: &CloseReason) {
    let label = match reason {
        CloseReason::PeerClosed => "peer_closed",
        CloseReason::Completed => "completed",
        CloseReason::TimedOut { .. } => "timed_out",
        CloseReason::Failed { .. } => "failed",
    };
    metrics::counter!("payout_connections_closed_total", "reason" => label).increment(1);
}
