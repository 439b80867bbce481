//! Length-framed HTTP/1.1 payout server library.

pub mod config;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod payouts;

pub use config::ServerConfig;
pub use handler::{HandlerOutcome, RequestHandler};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
