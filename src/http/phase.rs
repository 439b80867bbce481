//! Request phase state machine.
//!
//! # Transitions
//! ```text
//! ReadHeader ──▶ ReadBody ──▶ Handle ──▶ WriteResponse ──▶ ReadHeader (keep-alive)
//!     │              │                        │
//!     │ framing      │ framing                └──▶ close (not keep-alive, write failure)
//!     └──────────────┴──▶ WriteResponse(400) ──▶ close
//!
//! EOF, I/O failure or idle timeout while reading ──▶ close
//! ```
//!
//! Each phase performs exactly one suspending operation and hands back the next
//! phase or a terminal [`CloseReason`]. Failures never escape a phase.

use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::handler::{HandlerOutcome, RequestHandler};
use crate::http::codec::{
    extract_body_length, extract_connection_directive, extract_transfer_mode, serialize_response,
    OutgoingMessage, StatusCode, TransferMode, HEADER_DELIMITER,
};
use crate::http::context::ConnectionContext;
use crate::http::transport::{Transport, TransportError};
use crate::net::connection::ConnectionId;
use crate::observability::events::{PipelineEvent, PipelineObserver};

/// Limits and deadlines applied to every phase of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Idle deadline for a single read.
    pub read_timeout: Duration,
    /// Deadline for writing a whole response.
    pub write_timeout: Duration,
    /// Deadline for the request handler.
    pub handler_timeout: Duration,
    /// Largest accepted header block, delimiter included.
    pub max_header_bytes: usize,
    /// Largest accepted body.
    pub max_body_bytes: usize,
    /// Answer 400 when more bytes than the declared body are already buffered.
    pub reject_excess_body: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(30),
            handler_timeout: Duration::from_secs(30),
            max_header_bytes: 8 * 1024,
            max_body_bytes: 1024 * 1024,
            reject_excess_body: true,
        }
    }
}

/// Request framing problems. Each one is answered with a 400 before closing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    #[error("missing or invalid Content-Length")]
    InvalidLength,

    #[error("chunked transfer encoding is not supported")]
    ChunkedUnsupported,

    #[error("header block exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    #[error("body of {length} bytes exceeds limit of {limit} bytes")]
    BodyTooLarge { length: usize, limit: usize },

    #[error("{buffered} bytes buffered for a body of {expected} bytes")]
    ExcessBody { buffered: usize, expected: usize },
}

impl FramingError {
    /// 400 response describing this error.
    pub fn response(&self) -> OutgoingMessage {
        OutgoingMessage::bad_request(&format!(r#"{{ "error": "{}" }}"#, self))
    }
}

/// Phase names, for events and close reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    ReadHeader,
    ReadBody,
    Handle,
    WriteResponse,
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PhaseKind::ReadHeader => "read_header",
            PhaseKind::ReadBody => "read_body",
            PhaseKind::Handle => "handle",
            PhaseKind::WriteResponse => "write_response",
        };
        f.write_str(name)
    }
}

/// Why a connection reached its terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the connection.
    PeerClosed,
    /// A response was written and the connection is not persistent.
    Completed,
    /// No progress within the idle deadline.
    TimedOut { phase: PhaseKind },
    /// The transport failed.
    Failed { phase: PhaseKind, error: String },
}

impl CloseReason {
    fn from_transport(phase: PhaseKind, error: TransportError) -> Self {
        match error {
            TransportError::PeerClosed => CloseReason::PeerClosed,
            TransportError::TimedOut { .. } => CloseReason::TimedOut { phase },
            other => CloseReason::Failed {
                phase,
                error: other.to_string(),
            },
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::PeerClosed => f.write_str("closed by peer"),
            CloseReason::Completed => f.write_str("completed"),
            CloseReason::TimedOut { phase } => write!(f, "timed out in {}", phase),
            CloseReason::Failed { phase, error } => write!(f, "{} failed: {}", phase, error),
        }
    }
}

/// Outcome of running one phase.
#[derive(Debug)]
pub enum Step {
    Next(Phase),
    Close(CloseReason),
}

/// Collaborators shared by every phase of one connection.
pub struct PhaseEnv<'a, H> {
    pub connection: ConnectionId,
    pub handler: &'a H,
    pub observer: &'a dyn PipelineObserver,
    pub settings: &'a PipelineSettings,
}

impl<H> PhaseEnv<'_, H> {
    fn emit(&self, event: PipelineEvent) {
        self.observer.on_event(self.connection, &event);
    }

    /// Answer a framing error with a 400 and close afterwards.
    fn reject(&self, ctx: &mut ConnectionContext, error: FramingError) -> Step {
        let response = error.response();
        self.emit(PipelineEvent::FramingRejected(error));
        ctx.keep_alive = false;
        Step::Next(Phase::WriteResponse(response))
    }
}

/// One unit of the request chain.
#[derive(Debug)]
pub enum Phase {
    ReadHeader,
    ReadBody,
    Handle(Bytes),
    WriteResponse(OutgoingMessage),
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::ReadHeader => PhaseKind::ReadHeader,
            Phase::ReadBody => PhaseKind::ReadBody,
            Phase::Handle(_) => PhaseKind::Handle,
            Phase::WriteResponse(_) => PhaseKind::WriteResponse,
        }
    }

    /// Run this phase to completion, consuming it.
    pub async fn run<S, H>(
        self,
        transport: &mut Transport<S>,
        ctx: &mut ConnectionContext,
        env: &PhaseEnv<'_, H>,
    ) -> Step
    where
        S: AsyncRead + AsyncWrite + Unpin,
        H: RequestHandler,
    {
        match self {
            Phase::ReadHeader => read_header(transport, ctx, env).await,
            Phase::ReadBody => read_body(transport, ctx, env).await,
            Phase::Handle(body) => handle(body, env).await,
            Phase::WriteResponse(message) => write_response(message, transport, ctx, env).await,
        }
    }
}

async fn read_header<S, H>(
    transport: &mut Transport<S>,
    ctx: &mut ConnectionContext,
    env: &PhaseEnv<'_, H>,
) -> Step
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    ctx.reset();

    let header_length = match transport
        .read_until(HEADER_DELIMITER, env.settings.max_header_bytes)
        .await
    {
        Ok(length) => length,
        Err(TransportError::HeaderTooLarge { limit }) => {
            return env.reject(ctx, FramingError::HeaderTooLarge { limit });
        }
        Err(err) => return Step::Close(CloseReason::from_transport(PhaseKind::ReadHeader, err)),
    };

    let block = transport.buffer_mut().split_to(header_length);
    let header = String::from_utf8_lossy(&block);

    ctx.apply_directive(extract_connection_directive(&header));
    if let Some(mode) = extract_transfer_mode(&header) {
        ctx.transfer_mode = mode;
    }
    if ctx.transfer_mode == TransferMode::Chunked {
        return env.reject(ctx, FramingError::ChunkedUnsupported);
    }

    match extract_body_length(&header) {
        Some(length) => ctx.body_length = length,
        None => return env.reject(ctx, FramingError::InvalidLength),
    }

    env.emit(PipelineEvent::HeaderReceived {
        header_length,
        body_length: ctx.body_length,
        keep_alive: ctx.keep_alive,
    });

    Step::Next(Phase::ReadBody)
}

async fn read_body<S, H>(
    transport: &mut Transport<S>,
    ctx: &mut ConnectionContext,
    env: &PhaseEnv<'_, H>,
) -> Step
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let expected = ctx.body_length;
    if expected > env.settings.max_body_bytes {
        return env.reject(
            ctx,
            FramingError::BodyTooLarge {
                length: expected,
                limit: env.settings.max_body_bytes,
            },
        );
    }

    let buffered = transport.buffer().len();
    if buffered > expected && env.settings.reject_excess_body {
        return env.reject(ctx, FramingError::ExcessBody { buffered, expected });
    }

    let read_skipped = buffered >= expected;
    if !read_skipped {
        if let Err(err) = transport.read_to_len(expected).await {
            return Step::Close(CloseReason::from_transport(PhaseKind::ReadBody, err));
        }
    }

    let body = transport.buffer_mut().split_to(expected);
    env.emit(PipelineEvent::BodyReceived {
        length: body.len(),
        read_skipped,
    });

    Step::Next(Phase::Handle(body))
}

async fn handle<H>(body: Bytes, env: &PhaseEnv<'_, H>) -> Step
where
    H: RequestHandler,
{
    let started = Instant::now();
    let timeout = env.settings.handler_timeout;

    let outcome = match tokio::time::timeout(timeout, env.handler.handle(body)).await {
        Ok(outcome) => outcome,
        Err(_) => HandlerOutcome::InternalFault(format!("handler timed out after {:?}", timeout)),
    };

    let response = match outcome {
        HandlerOutcome::Success(payload) => match serialize_response(StatusCode::Ok, &payload) {
            Ok(message) => message,
            Err(err) => {
                env.emit(PipelineEvent::HandlerFault {
                    detail: format!("unusable success payload: {}", err),
                });
                OutgoingMessage::internal_error()
            }
        },
        HandlerOutcome::ClientFault(message) => OutgoingMessage::bad_request(&message),
        HandlerOutcome::InternalFault(detail) => {
            env.emit(PipelineEvent::HandlerFault { detail });
            OutgoingMessage::internal_error()
        }
    };

    env.emit(PipelineEvent::HandlerCompleted {
        status: response.status(),
        elapsed: started.elapsed(),
    });

    Step::Next(Phase::WriteResponse(response))
}

async fn write_response<S, H>(
    message: OutgoingMessage,
    transport: &mut Transport<S>,
    ctx: &mut ConnectionContext,
    env: &PhaseEnv<'_, H>,
) -> Step
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(err) = transport.write_message(&message).await {
        return Step::Close(CloseReason::from_transport(PhaseKind::WriteResponse, err));
    }

    env.emit(PipelineEvent::ResponseWritten {
        status: message.status(),
        length: message.len(),
    });

    if ctx.keep_alive {
        Step::Next(Phase::ReadHeader)
    } else {
        Step::Close(CloseReason::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::events::RecordingObserver;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream, ReadBuf};

    /// Stream that fails every read and write.
    struct BrokenIo;

    impl AsyncRead for BrokenIo {
        fn poll_read(self: Pin<&mut Self>, _: &mut Context<'_>, _: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "read attempted")))
        }
    }

    impl AsyncWrite for BrokenIo {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "write attempted")))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    struct Fixed(HandlerOutcome);

    impl RequestHandler for Fixed {
        async fn handle(&self, _body: Bytes) -> HandlerOutcome {
            self.0.clone()
        }
    }

    struct Stalled;

    impl RequestHandler for Stalled {
        async fn handle(&self, _body: Bytes) -> HandlerOutcome {
            std::future::pending().await
        }
    }

    fn env<'a, H>(handler: &'a H, observer: &'a RecordingObserver, settings: &'a PipelineSettings) -> PhaseEnv<'a, H> {
        PhaseEnv {
            connection: ConnectionId::new(),
            handler,
            observer,
            settings,
        }
    }

    fn duplex_transport() -> (DuplexStream, Transport<DuplexStream>) {
        let (client, server) = duplex(1024);
        let transport = Transport::new(server, Duration::from_secs(1), Duration::from_secs(1));
        (client, transport)
    }

    fn response_status(step: &Step) -> Option<StatusCode> {
        match step {
            Step::Next(Phase::WriteResponse(message)) => Some(message.status()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn read_header_populates_context() {
        let (mut client, mut transport) = duplex_transport();
        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();

        client
            .write_all(b"POST /q HTTP/1.1\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbody")
            .await
            .unwrap();

        let step = Phase::ReadHeader.run(&mut transport, &mut ctx, &env).await;
        assert!(matches!(step, Step::Next(Phase::ReadBody)));
        assert_eq!(ctx.body_length, 4);
        assert!(!ctx.keep_alive);
        assert_eq!(transport.buffer().as_slice(), b"body");
    }

    #[tokio::test]
    async fn read_header_keeps_pipelined_bytes() {
        let (mut client, mut transport) = duplex_transport();
        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();

        let next_request = b"GET /b HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
        let mut wire = b"GET /a HTTP/1.1\r\nContent-Length: 0\r\n\r\n".to_vec();
        wire.extend_from_slice(next_request);
        client.write_all(&wire).await.unwrap();

        let step = Phase::ReadHeader.run(&mut transport, &mut ctx, &env).await;
        assert!(matches!(step, Step::Next(Phase::ReadBody)));
        assert_eq!(transport.buffer().as_slice(), next_request);
    }

    #[tokio::test]
    async fn read_header_rejects_invalid_length() {
        let (mut client, mut transport) = duplex_transport();
        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();

        client
            .write_all(b"GET /x HTTP/1.1\r\nContent-Length: abc\r\n\r\n")
            .await
            .unwrap();

        let step = Phase::ReadHeader.run(&mut transport, &mut ctx, &env).await;
        assert_eq!(response_status(&step), Some(StatusCode::BadRequest));
        assert!(!ctx.keep_alive);
        assert_eq!(
            observer.events(),
            vec![PipelineEvent::FramingRejected(FramingError::InvalidLength)]
        );
    }

    #[tokio::test]
    async fn read_header_rejects_chunked() {
        let (mut client, mut transport) = duplex_transport();
        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();

        client
            .write_all(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n")
            .await
            .unwrap();

        let step = Phase::ReadHeader.run(&mut transport, &mut ctx, &env).await;
        assert_eq!(response_status(&step), Some(StatusCode::BadRequest));
        assert_eq!(
            observer.events(),
            vec![PipelineEvent::FramingRejected(FramingError::ChunkedUnsupported)]
        );
    }

    #[tokio::test]
    async fn read_header_peer_close_is_silent() {
        let (mut client, mut transport) = duplex_transport();
        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();

        client.write_all(b"GET /x HTTP/1.1\r\nConte").await.unwrap();
        drop(client);

        let step = Phase::ReadHeader.run(&mut transport, &mut ctx, &env).await;
        assert!(matches!(step, Step::Close(CloseReason::PeerClosed)));
        assert!(observer.events().is_empty());
    }

    #[tokio::test]
    async fn read_body_skips_read_when_buffered() {
        let mut transport = Transport::new(BrokenIo, Duration::from_secs(1), Duration::from_secs(1));
        transport.buffer_mut().extend_from_slice(b"hello");

        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();
        ctx.body_length = 5;

        let step = Phase::ReadBody.run(&mut transport, &mut ctx, &env).await;
        match step {
            Step::Next(Phase::Handle(body)) => assert_eq!(&body[..], b"hello"),
            other => panic!("unexpected step: {:?}", other),
        }
        assert!(transport.buffer().is_empty());
        assert_eq!(
            observer.events(),
            vec![PipelineEvent::BodyReceived { length: 5, read_skipped: true }]
        );
    }

    #[tokio::test]
    async fn read_body_reads_missing_bytes() {
        let (mut client, mut transport) = duplex_transport();
        transport.buffer_mut().extend_from_slice(b"he");

        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();
        ctx.body_length = 5;

        client.write_all(b"llo").await.unwrap();

        let step = Phase::ReadBody.run(&mut transport, &mut ctx, &env).await;
        match step {
            Step::Next(Phase::Handle(body)) => assert_eq!(&body[..], b"hello"),
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[tokio::test]
    async fn read_body_rejects_excess_buffered_bytes() {
        let mut transport = Transport::new(BrokenIo, Duration::from_secs(1), Duration::from_secs(1));
        transport.buffer_mut().extend_from_slice(b"hello world");

        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();
        ctx.body_length = 5;

        let step = Phase::ReadBody.run(&mut transport, &mut ctx, &env).await;
        assert_eq!(response_status(&step), Some(StatusCode::BadRequest));
        assert!(!ctx.keep_alive);
    }

    #[tokio::test]
    async fn read_body_keeps_excess_when_pipelining() {
        let mut transport = Transport::new(BrokenIo, Duration::from_secs(1), Duration::from_secs(1));
        transport.buffer_mut().extend_from_slice(b"helloGET");

        let observer = RecordingObserver::new();
        let settings = PipelineSettings {
            reject_excess_body: false,
            ..PipelineSettings::default()
        };
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();
        ctx.body_length = 5;

        let step = Phase::ReadBody.run(&mut transport, &mut ctx, &env).await;
        assert!(matches!(step, Step::Next(Phase::Handle(_))));
        assert_eq!(transport.buffer().as_slice(), b"GET");
    }

    #[tokio::test]
    async fn read_body_enforces_size_limit() {
        let mut transport = Transport::new(BrokenIo, Duration::from_secs(1), Duration::from_secs(1));
        let observer = RecordingObserver::new();
        let settings = PipelineSettings {
            max_body_bytes: 4,
            ..PipelineSettings::default()
        };
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();
        ctx.body_length = 5;

        let step = Phase::ReadBody.run(&mut transport, &mut ctx, &env).await;
        assert_eq!(response_status(&step), Some(StatusCode::BadRequest));
    }

    #[tokio::test]
    async fn read_body_peer_close() {
        let (mut client, mut transport) = duplex_transport();
        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();
        ctx.body_length = 10;

        client.write_all(b"short").await.unwrap();
        drop(client);

        let step = Phase::ReadBody.run(&mut transport, &mut ctx, &env).await;
        assert!(matches!(step, Step::Close(CloseReason::PeerClosed)));
    }

    #[tokio::test]
    async fn handle_maps_outcomes_to_status() {
        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let mut transport = Transport::new(BrokenIo, Duration::from_secs(1), Duration::from_secs(1));
        let mut ctx = ConnectionContext::new();

        let cases = [
            (HandlerOutcome::Success("7".into()), StatusCode::Ok),
            (HandlerOutcome::Success(String::new()), StatusCode::InternalServerError),
            (HandlerOutcome::ClientFault("bad id".into()), StatusCode::BadRequest),
            (HandlerOutcome::InternalFault("db down".into()), StatusCode::InternalServerError),
        ];

        for (outcome, status) in cases {
            let handler = Fixed(outcome);
            let env = env(&handler, &observer, &settings);
            let step = Phase::Handle(Bytes::from_static(b"{}"))
                .run(&mut transport, &mut ctx, &env)
                .await;
            assert_eq!(response_status(&step), Some(status));
        }
    }

    #[tokio::test]
    async fn internal_fault_detail_stays_out_of_response() {
        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let handler = Fixed(HandlerOutcome::InternalFault("password=hunter2".into()));
        let env = env(&handler, &observer, &settings);
        let mut transport = Transport::new(BrokenIo, Duration::from_secs(1), Duration::from_secs(1));
        let mut ctx = ConnectionContext::new();

        let step = Phase::Handle(Bytes::new()).run(&mut transport, &mut ctx, &env).await;
        let Step::Next(Phase::WriteResponse(message)) = step else {
            panic!("expected a response");
        };
        let wire = String::from_utf8_lossy(message.as_bytes()).into_owned();
        assert!(!wire.contains("hunter2"));
        assert!(observer.events().contains(&PipelineEvent::HandlerFault {
            detail: "password=hunter2".into()
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn handler_timeout_becomes_internal_error() {
        let observer = RecordingObserver::new();
        let settings = PipelineSettings {
            handler_timeout: Duration::from_millis(100),
            ..PipelineSettings::default()
        };
        let env = env(&Stalled, &observer, &settings);
        let mut transport = Transport::new(BrokenIo, Duration::from_secs(1), Duration::from_secs(1));
        let mut ctx = ConnectionContext::new();

        let step = Phase::Handle(Bytes::new()).run(&mut transport, &mut ctx, &env).await;
        assert_eq!(response_status(&step), Some(StatusCode::InternalServerError));
    }

    #[tokio::test]
    async fn write_response_loops_on_keep_alive() {
        let (mut client, mut transport) = duplex_transport();
        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();

        let message = serialize_response(StatusCode::Ok, "done").unwrap();
        let expected = message.as_bytes().to_vec();

        let step = Phase::WriteResponse(message).run(&mut transport, &mut ctx, &env).await;
        assert!(matches!(step, Step::Next(Phase::ReadHeader)));

        let mut received = vec![0u8; expected.len()];
        client.read_exact(&mut received).await.unwrap();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn write_response_closes_without_keep_alive() {
        let (_client, mut transport) = duplex_transport();
        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();
        ctx.keep_alive = false;

        let message = serialize_response(StatusCode::Ok, "done").unwrap();
        let step = Phase::WriteResponse(message).run(&mut transport, &mut ctx, &env).await;
        assert!(matches!(step, Step::Close(CloseReason::Completed)));
    }

    #[tokio::test(start_paused = true)]
    async fn write_timeout_closes_connection() {
        let (_client, server) = duplex(8);
        let mut transport = Transport::new(server, Duration::from_secs(1), Duration::from_millis(50));
        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();

        let message = serialize_response(StatusCode::Ok, "a body the peer never drains").unwrap();
        let step = Phase::WriteResponse(message).run(&mut transport, &mut ctx, &env).await;
        assert!(matches!(
            step,
            Step::Close(CloseReason::TimedOut { phase: PhaseKind::WriteResponse })
        ));
        assert!(observer.events().is_empty());
    }

    #[tokio::test]
    async fn write_failure_is_terminal() {
        let mut transport = Transport::new(BrokenIo, Duration::from_secs(1), Duration::from_secs(1));
        let observer = RecordingObserver::new();
        let settings = PipelineSettings::default();
        let handler = Fixed(HandlerOutcome::Success("x".into()));
        let env = env(&handler, &observer, &settings);
        let mut ctx = ConnectionContext::new();

        let step = Phase::WriteResponse(OutgoingMessage::bad_request("nope"))
            .run(&mut transport, &mut ctx, &env)
            .await;
        assert!(matches!(
            step,
            Step::Close(CloseReason::Failed { phase: PhaseKind::WriteResponse, .. })
        ));
        assert!(observer.events().is_empty());
    }
}
