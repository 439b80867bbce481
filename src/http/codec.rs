//! Framing codec.
//!
//! # Responsibilities
//! - Extract framing metadata (length, connection directive, transfer mode)
//!   from a raw header block
//! - Serialize a status line, headers and body into wire bytes
//!
//! # Design Decisions
//! - Pure functions, no I/O and no state
//! - Total over malformed input: every failure is `None` or `Err`, never a panic
//! - Header names are matched ASCII case-insensitively; the request line is skipped

use bytes::{BufMut, Bytes, BytesMut};

/// Delimiter terminating a header block.
pub const HEADER_DELIMITER: &[u8] = b"\r\n\r\n";

/// Body sent with every 500 response. Handler detail never reaches the wire.
pub const GENERIC_INTERNAL_ERROR: &str = r#"{ "error": "Internal Error" }"#;

/// Body sent with a 400 response when no better diagnostic exists.
pub const GENERIC_BAD_REQUEST: &str = r#"{ "error": "Bad Request" }"#;

const CONTENT_TYPE: &str = "text/html";

/// Response status codes produced by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    BadRequest,
    InternalServerError,
}

impl StatusCode {
    /// Numeric status code.
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Reason phrase for the status line.
    pub fn reason(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason())
    }
}

/// Value of the `Connection` header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDirective {
    KeepAlive,
    Close,
}

/// Body transfer mode announced by the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    /// Body framed by `Content-Length`.
    #[default]
    Identity,
    /// `Transfer-Encoding: chunked`, which this server does not decode.
    Chunked,
}

/// Errors raised while serializing a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Every response carries at least an explanatory payload.
    #[error("response body must not be empty")]
    EmptyBody,
}

/// A fully serialized response, ready to be written as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    status: StatusCode,
    bytes: Bytes,
}

impl OutgoingMessage {
    /// Status carried by this message.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Wire bytes of the whole message.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the wire bytes, status line included.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the message has no wire bytes. Never true for built messages.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 400 response carrying `diagnostic`, or a generic body when it is empty.
    pub fn bad_request(diagnostic: &str) -> Self {
        if diagnostic.is_empty() {
            build(StatusCode::BadRequest, GENERIC_BAD_REQUEST)
        } else {
            build(StatusCode::BadRequest, diagnostic)
        }
    }

    /// 500 response with the generic body.
    pub fn internal_error() -> Self {
        build(StatusCode::InternalServerError, GENERIC_INTERNAL_ERROR)
    }
}

/// Iterate over `(name, value)` pairs of a header block, skipping the request line.
///
/// Lines without a colon are ignored. Values are trimmed of optional whitespace.
fn header_fields(header_block: &str) -> impl Iterator<Item = (&str, &str)> {
    header_block
        .split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim(), value.trim()))
}

fn field_values<'a>(header_block: &'a str, name: &'a str) -> impl Iterator<Item = &'a str> {
    header_fields(header_block)
        .filter(move |(field, _)| field.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// Extract the declared body length.
///
/// Returns `None` when the field is missing, not a decimal integer, or
/// repeated with conflicting values.
pub fn extract_body_length(header_block: &str) -> Option<usize> {
    let mut length = None;

    for value in field_values(header_block, "content-length") {
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let parsed: usize = value.parse().ok()?;
        match length {
            Some(previous) if previous != parsed => return None,
            _ => length = Some(parsed),
        }
    }

    length
}

/// Extract the `Connection` directive. `None` means "use the protocol default".
pub fn extract_connection_directive(header_block: &str) -> Option<ConnectionDirective> {
    let mut directive = None;

    for token in field_values(header_block, "connection").flat_map(|v| v.split(',')) {
        let token = token.trim();
        if token.eq_ignore_ascii_case("close") {
            return Some(ConnectionDirective::Close);
        }
        if token.eq_ignore_ascii_case("keep-alive") {
            directive = Some(ConnectionDirective::KeepAlive);
        }
    }

    directive
}

/// Extract the transfer mode. Only the final coding decides chunked framing.
pub fn extract_transfer_mode(header_block: &str) -> Option<TransferMode> {
    let value = field_values(header_block, "transfer-encoding").last()?;

    let last_coding = value.rsplit(',').next().map(str::trim).unwrap_or_default();
    if last_coding.eq_ignore_ascii_case("chunked") {
        Some(TransferMode::Chunked)
    } else {
        Some(TransferMode::Identity)
    }
}

/// Serialize a response whose `Content-Length` equals the byte length of `body`.
pub fn serialize_response(status: StatusCode, body: &str) -> Result<OutgoingMessage, CodecError> {
    if body.is_empty() {
        return Err(CodecError::EmptyBody);
    }

    Ok(build(status, body))
}

fn build(status: StatusCode, body: &str) -> OutgoingMessage {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
        status,
        CONTENT_TYPE,
        body.len(),
    );

    let mut bytes = BytesMut::with_capacity(head.len() + body.len());
    bytes.put_slice(head.as_bytes());
    bytes.put_slice(body.as_bytes());

    OutgoingMessage {
        status,
        bytes: bytes.freeze(),
    }
}
