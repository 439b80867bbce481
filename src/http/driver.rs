//! Connection driver.
//!
//! # Responsibilities
//! - Own one accepted connection, its buffer and its [`ConnectionContext`]
//! - Run phases one at a time until a terminal step
//! - Release the stream on every exit path
//!
//! The driver is the only place a connection is torn down.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::handler::RequestHandler;
use crate::http::context::ConnectionContext;
use crate::http::phase::{CloseReason, Phase, PhaseEnv, PipelineSettings, Step};
use crate::http::transport::Transport;
use crate::net::connection::ConnectionId;
use crate::observability::events::{PipelineEvent, PipelineObserver};

/// A single connection and everything it owns.
pub struct Connection<S, H> {
    id: ConnectionId,
    transport: Transport<S>,
    context: ConnectionContext,
    handler: Arc<H>,
    observer: Arc<dyn PipelineObserver>,
    settings: PipelineSettings,
}

impl<S, H> Connection<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: RequestHandler,
{
    pub fn new(
        stream: S,
        handler: Arc<H>,
        observer: Arc<dyn PipelineObserver>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            transport: Transport::new(stream, settings.read_timeout, settings.write_timeout),
            context: ConnectionContext::new(),
            handler,
            observer,
            settings,
        }
    }

    /// Use an externally assigned connection ID.
    pub fn with_id(mut self, id: ConnectionId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Drive the phase chain until the connection closes.
    pub async fn run(mut self) -> CloseReason {
        let env = PhaseEnv {
            connection: self.id,
            handler: &*self.handler,
            observer: &*self.observer,
            settings: &self.settings,
        };

        let mut phase = Phase::ReadHeader;
        let reason = loop {
            match phase.run(&mut self.transport, &mut self.context, &env).await {
                Step::Next(next) => phase = next,
                Step::Close(reason) => break reason,
            }
        };

        // The peer may already be gone; nothing left to report on failure.
        let _ = self.transport.shutdown().await;

        self.observer.on_event(self.id, &PipelineEvent::Closed(reason.clone()));
        reason
    }
}

impl<S, H> std::fmt::Debug for Connection<S, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
