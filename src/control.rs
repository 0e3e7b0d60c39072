//! Control frame handling: PING auto-reply, CLOSE echo/reason capture, PONG
//! absorption.
//!
//! Grounded on `websocket_service.c::app_websocket_control_frame_handle`
//! and generalized from the teacher's `stream.rs::poll_messages` match
//! arms, where PONG was a bare no-op comment and CLOSE only echoed the
//! frame without capturing a reason — this engine surfaces both through
//! [`ControlAction`] so the worker can hand a populated [`CloseInfo`] to
//! `on_close`.

use crate::frame::{CloseCode, CloseInfo, Frame, OpCode, OutboundFrame};

pub enum ControlAction {
    /// Reply with this frame (a PONG, echoing the PING's payload).
    Reply(OutboundFrame),
    /// The peer closed the connection; close info was decoded below.
    PeerClosed(CloseInfo),
    /// A PONG was received; nothing to send, just note it arrived.
    PongReceived,
    /// Not a control frame; the caller should treat it as data.
    NotControl(Frame),
}

pub fn handle(frame: Frame) -> ControlAction {
    match frame.opcode {
        OpCode::Ping => ControlAction::Reply(OutboundFrame::message(OpCode::Pong, frame.payload)),
        OpCode::Pong => ControlAction::PongReceived,
        OpCode::Close => ControlAction::PeerClosed(decode_close_payload(&frame.payload)),
        _ => ControlAction::NotControl(frame),
    }
}

/// A close frame's payload is, per RFC 6455 §5.5.1, an optional 2-byte
/// big-endian status code followed by an optional UTF-8 reason string.
fn decode_close_payload(payload: &[u8]) -> CloseInfo {
    if payload.len() < 2 {
        return CloseInfo {
            code: CloseCode::NoStatusReceived,
            reason: String::new(),
        };
    }
    let code = CloseCode::from_u16(u16::from_be_bytes([payload[0], payload[1]]));
    let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
    CloseInfo { code, reason }
}

/// Builds the outbound CLOSE frame this engine sends, either as the local
/// initiator or as the echo reply to a peer-initiated close.
pub fn build_close_frame(info: &CloseInfo) -> OutboundFrame {
    let mut payload = info.code.as_u16().to_be_bytes().to_vec();
    payload.extend_from_slice(info.reason.as_bytes());
    OutboundFrame::message(OpCode::Close, payload)
}
