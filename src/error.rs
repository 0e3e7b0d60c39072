use std::io;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError;
use tokio::time::error::Elapsed;

use crate::worker::WorkerCommand;

/// Status handed back from a [`crate::callbacks::WebSocketHandler`] callback.
///
/// Mirrors the original C library's `WEBSOCKET_STATUS` enum: `Continue` is the
/// success path (`WEBSOCKET_OK`), any other variant moves the session's FSM
/// into `FsmState::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSocketStatus {
    Continue,
    Error,
}

#[derive(Error, Debug)]
pub enum Error {
    // --- Worker / session-manager errors ---
    #[error("worker is already running")]
    WorkerAlreadyRunning,

    #[error("worker is not running")]
    WorkerNotRunning,

    #[error("failed to dispatch command to worker: {source}")]
    WorkerSend {
        #[from]
        source: SendError<WorkerCommand>,
    },

    #[error("worker channel closed")]
    WorkerChannelClosed,

    #[error("session is not connected")]
    NotConnected,

    #[error("session is already connected")]
    AlreadyConnected,

    #[error("no close observed yet")]
    NoCloseObserved,

    #[error("too many concurrent sessions, limit is {0}")]
    TooManySessions(usize),

    // --- IO / timeout ---
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("operation timed out: {source}")]
    Timeout {
        #[from]
        source: Elapsed,
    },

    #[error("TLS error: {0}")]
    Tls(String),

    // --- URL parsing ---
    #[error("invalid scheme in WebSocket URL, expected ws:// or wss://")]
    InvalidSchemeUrl,

    #[error("URL has no host")]
    UrlNoHost,

    #[error("URL is malformed: {0}")]
    UrlMalformed(String),

    // --- Handshake ---
    #[error("invalid HTTP response status line")]
    InvalidStatusLine,

    #[error("server did not reply with 101 Switching Protocols")]
    NoUpgrade,

    #[error("Connection: Upgrade header missing in the response")]
    NoConnectionHeader,

    #[error("Upgrade: websocket header missing in the response")]
    NoUpgradeHeader,

    #[error("server did not send Sec-WebSocket-Accept")]
    NoSecWebSocketAccept,

    #[error("server sent an invalid Sec-WebSocket-Accept value")]
    InvalidAcceptKey,

    #[error("handshake response headers exceeded the maximum size")]
    HandshakeTooLarge,

    #[error("requested subprotocol {0:?} but the server did not negotiate one")]
    SubprotocolNotSupported(String),

    // --- Framing ---
    #[error("reserved bits must be zero")]
    RsvNotZero,

    #[error("control frames must not be fragmented")]
    ControlFrameFragmented,

    #[error("control frame payload exceeds 125 bytes")]
    ControlFramePayloadTooLarge,

    #[error("invalid opcode: {0}")]
    InvalidOpcode(u8),

    #[error("frame payload of {0} bytes exceeds the configured maximum of {1}")]
    MaxFrameSize(usize, usize),

    #[error("reassembled message of {0} bytes exceeds the configured maximum of {1}")]
    MaxMessageSize(usize, usize),

    #[error("received a continuation frame with no fragmented message in progress")]
    InvalidContinuationFrame,

    #[error("received a new data frame while a fragmented message is already in progress")]
    FragmentedInProgress,

    // --- Parse / encode (generic) ---
    #[error("parse error: {0}")]
    Parse(String),

    #[error("encode error: {0}")]
    Encode(String),
}
