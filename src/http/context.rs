//! Per-connection request metadata.

use crate::http::codec::{ConnectionDirective, TransferMode};

/// Framing metadata of the request currently in flight.
///
/// Created once per connection and reset at the start of every request cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionContext {
    /// Declared body length in bytes.
    pub body_length: usize,
    /// Whether the connection loops back to read another request.
    pub keep_alive: bool,
    pub transfer_mode: TransferMode,
}

impl ConnectionContext {
    pub fn new() -> Self {
        Self {
            body_length: 0,
            keep_alive: true,
            transfer_mode: TransferMode::Identity,
        }
    }

    /// Restore defaults before the next request cycle.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Apply a `Connection` directive. An absent directive keeps the default.
    pub fn apply_directive(&mut self, directive: Option<ConnectionDirective>) {
        match directive {
            Some(ConnectionDirective::Close) => self.keep_alive = false,
            Some(ConnectionDirective::KeepAlive) => self.keep_alive = true,
            None => {}
        }
    }
}

impl Default for ConnectionContext {
    fn default() -> Self {
        Self::new()
    }
}
