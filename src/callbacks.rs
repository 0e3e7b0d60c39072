//! User callback dispatch.
//!
//! `websocket_service.h` registers four independent raw function pointers
//! (`app_websocket_message_event`, `_open_event`, `_close_event`,
//! `_error_event`). Per spec.md §9's design note, this is collapsed into a
//! single trait with four methods instead — the natural idiomatic-Rust
//! shape for "a bundle of related callbacks one object implements".

use crate::error::WebSocketStatus;
use crate::frame::{CloseInfo, Frame};

pub trait WebSocketHandler: Send + 'static {
    /// Fired once, after the handshake completes and before any
    /// `on_message` call for this session.
    fn on_open(&mut self) -> WebSocketStatus {
        WebSocketStatus::Continue
    }

    /// Fired once per fully-reassembled message (a whole, unfragmented
    /// frame or the join of a fragmented sequence).
    fn on_message(&mut self, frame: Frame) -> WebSocketStatus;

    /// Fired exactly once per session, whether the close was local,
    /// remote, or the result of an error.
    fn on_close(&mut self, info: CloseInfo) -> WebSocketStatus {
        let _ = info;
        WebSocketStatus::Continue
    }

    /// Fired when the session transitions to `FsmState::Error`.
    /// `on_close` is still guaranteed to fire afterwards.
    fn on_error(&mut self, message: &str) -> WebSocketStatus {
        let _ = message;
        WebSocketStatus::Continue
    }
}
