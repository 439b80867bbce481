//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::sync::Arc;

use payout_server::config::{PayoutEntry, ServerConfig};
use payout_server::lifecycle::Shutdown;
use payout_server::net::listener::Listener;
use payout_server::payouts::{InMemoryStore, PayoutHandler};
use payout_server::HttpServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A running server bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
}

/// Config with a small payout table.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.timeouts.shutdown_grace_secs = 1;
    config.store.payouts = vec![
        PayoutEntry {
            race_id: "202401010101".into(),
            horse_number: 3,
            payout: 7,
        },
        PayoutEntry {
            race_id: "202401010101".into(),
            horse_number: 5,
            payout: 1230,
        },
    ];
    config
}

/// Start the payout server with `config`.
pub async fn start_server(config: ServerConfig) -> TestServer {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, config.listener.max_connections);

    let store = Arc::new(InMemoryStore::from_entries(&config.store.payouts));
    let server = HttpServer::new(&config, PayoutHandler::new(store));

    let shutdown = Shutdown::new();
    let task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer { addr, shutdown, task }
}

/// Build a request with a correct `Content-Length`.
pub fn request(body: &str, extra_headers: &str) -> String {
    format!(
        "POST /payout HTTP/1.1\r\nHost: localhost\r\n{}Content-Length: {}\r\n\r\n{}",
        extra_headers,
        body.len(),
        body
    )
}

/// A parsed response.
#[allow(dead_code)]
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub head: String,
    pub body: String,
}

/// Read exactly one length-framed response. Returns `None` on a clean EOF.
#[allow(dead_code)]
pub async fn read_response(stream: &mut TcpStream) -> Option<Response> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await.unwrap() == 0 {
            assert!(head.is_empty(), "connection closed mid-response");
            return None;
        }
        head.push(byte[0]);
    }

    let head = String::from_utf8(head).unwrap();
    let status = head[9..12].parse().unwrap();
    let length: usize = head
        .lines()
        .find_map(|line| line.strip_prefix("Content-Length: "))
        .unwrap()
        .trim()
        .parse()
        .unwrap();

    let mut body = vec![0u8; length];
    stream.read_exact(&mut body).await.unwrap();

    Some(Response {
        status,
        head,
        body: String::from_utf8(body).unwrap(),
    })
}

/// Send one request and read its response.
#[allow(dead_code)]
pub async fn roundtrip(stream: &mut TcpStream, raw: &str) -> Option<Response> {
    stream.write_all(raw.as_bytes()).await.unwrap();
    read_response(stream).await
}

/// Assert the peer closed the connection.
#[allow(dead_code)]
pub async fn assert_closed(stream: &mut TcpStream) {
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty(), "unexpected bytes after close: {:?}", rest);
}
