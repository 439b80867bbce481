//! Accept loop.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Spawn one connection driver task per connection
//! - On shutdown, stop accepting and wait for live connections to drain

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::ServerConfig;
use crate::handler::RequestHandler;
use crate::http::driver::Connection;
use crate::http::phase::PipelineSettings;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Listener, ListenerError};
use crate::observability::events::{PipelineObserver, TracingObserver};

/// Server running the request pipeline for every accepted connection.
pub struct HttpServer<H> {
    handler: Arc<H>,
    observer: Arc<dyn PipelineObserver>,
    settings: PipelineSettings,
    tracker: ConnectionTracker,
    shutdown_grace: Duration,
}

impl<H: RequestHandler> HttpServer<H> {
    /// Create a new server with the given configuration and handler.
    pub fn new(config: &ServerConfig, handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            observer: Arc::new(TracingObserver),
            settings: config.pipeline_settings(),
            tracker: ConnectionTracker::new(),
            shutdown_grace: Duration::from_secs(config.timeouts.shutdown_grace_secs),
        }
    }

    /// Replace the default tracing observer.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Tracker of the connections this server spawned.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept connections until a shutdown signal arrives, then drain.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "HTTP server starting");
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, peer_addr, permit) = match accepted {
                        Ok(accepted) => accepted,
                        Err(ListenerError::Closed) => break,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };

                    let guard = self.tracker.track();
                    let connection = Connection::new(
                        stream,
                        Arc::clone(&self.handler),
                        Arc::clone(&self.observer),
                        self.settings.clone(),
                    )
                    .with_id(guard.id());

                    tracing::debug!(connection_id = %guard.id(), peer_addr = %peer_addr, "Serving connection");

                    tokio::spawn(async move {
                        let _permit = permit;
                        let _guard = guard;
                        connection.run().await;
                    });
                }
            }
        }

        drop(listener);
        let active = self.tracker.active_count();
        if active > 0 {
            tracing::info!(active, grace = ?self.shutdown_grace, "Draining connections");
            if tokio::time::timeout(self.shutdown_grace, self.tracker.wait_for_idle())
                .await
                .is_err()
            {
                tracing::warn!(
                    remaining = self.tracker.active_count(),
                    "Shutdown grace period elapsed with open connections"
                );
            }
        }

        tracing::info!("HTTP server stopped");
    }
}
