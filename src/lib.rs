//! A client-side WebSocket engine (RFC 6455).
//!
//! Multiplexes many concurrent outbound connections on a single background
//! I/O worker: call [`worker::Worker::init`] once, then create as many
//! [`websocket::WebSocket`] handles as needed and `connect` each with a
//! [`callbacks::WebSocketHandler`]. Every handshake, frame read/write, and
//! callback dispatch for every connection happens on that one worker
//! thread — see `worker.rs` for the concurrency model.
//!
//! Out of scope: server-side WebSocket acceptance, permessage-deflate /
//! extension negotiation, IPv6 literals, HTTP proxy tunnelling, redirects,
//! and UTF-8 validation of text frame payloads.

pub mod callbacks;
pub mod codec;
pub mod config;
pub mod control;
pub mod error;
pub mod frame;
pub mod fsm;
pub mod handshake;
pub mod headers;
mod mask;
pub mod reassembly;
pub mod session;
pub mod transport;
pub mod url;
pub mod websocket;
pub mod worker;

pub use callbacks::WebSocketHandler;
pub use config::{WebSocketConfig, WorkerConfig};
pub use error::{Error, WebSocketStatus};
pub use frame::{CloseCode, CloseInfo, Frame, OpCode, OutboundFrame, SlicePart};
pub use websocket::WebSocket;
pub use worker::Worker;
