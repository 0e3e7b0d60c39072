//! Public API surface: one `WebSocket` per outbound connection.
//!
//! Grounded on `websocket_service.h`'s `app_websocket_*` functions — the
//! service-level API the original exposes above the raw framing core.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::callbacks::WebSocketHandler;
use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::frame::{CloseCode, CloseInfo, OpCode, OutboundFrame, SlicePart};
use crate::fsm::FsmState;
use crate::headers::HeaderTable;
use crate::session::{new_shared, Shared};
use crate::url::{self, WsUrl};
use crate::worker::{ConnectRequest, OutboundMessage, Worker};

pub struct WebSocket {
    url: Option<WsUrl>,
    subprotocol: Option<String>,
    headers: HeaderTable,
    config: WebSocketConfig,
    shared: Shared,
    outbound_tx: Option<mpsc::UnboundedSender<OutboundMessage>>,
    client_close: Option<CloseInfo>,
}

impl WebSocket {
    pub fn new() -> Self {
        Self::with_config(WebSocketConfig::default())
    }

    pub fn with_config(config: WebSocketConfig) -> Self {
        Self {
            url: None,
            subprotocol: None,
            headers: HeaderTable::new(config.kv_table_length),
            config,
            shared: new_shared(),
            outbound_tx: None,
            client_close: None,
        }
    }

    pub fn set_url(&mut self, url: &str) -> Result<(), Error> {
        self.url = Some(url::parse(url)?);
        Ok(())
    }

    pub fn set_subprotocol(&mut self, subprotocol: &str) {
        self.subprotocol = Some(subprotocol.to_string());
    }

    pub fn add_header(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.headers.put(key, value)
    }

    /// Sets both the read and write timeout applied to this session's
    /// socket once connected (`websocket_set_timeout` in the original,
    /// which sets `SO_RCVTIMEO` and `SO_SNDTIMEO` to the same value). Must
    /// be called before `connect`.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.read_timeout = Some(timeout);
        self.config.write_timeout = Some(timeout);
    }

    /// Records the code/reason this session will send if `disconnect()` is
    /// called without an explicit reason (`set_close_reason` in the
    /// original). Local to the handle — takes effect on the next
    /// `disconnect()` call.
    pub fn set_close_reason(&mut self, code: CloseCode, reason: &str) {
        self.client_close = Some(CloseInfo {
            code,
            reason: reason.to_string(),
        });
    }

    /// Connects to the configured URL, handing the session to the
    /// background worker. Resolves once the handshake has completed (or
    /// failed) and, on success, after `on_open` has fired.
    pub async fn connect(&mut self, handler: impl WebSocketHandler) -> Result<(), Error> {
        let url = self.url.clone().ok_or(Error::UrlMalformed("no URL set".to_string()))?;

        {
            let shared = self.shared.lock().await;
            if shared.fsm_state != FsmState::Init {
                return Err(Error::AlreadyConnected);
            }
        }

        let host_header = url.host_header();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let request = ConnectRequest {
            url,
            host_header,
            subprotocol: self.subprotocol.clone(),
            headers: self.headers.clone(),
            config: self.config.clone(),
            handler: Box::new(handler),
            shared: self.shared.clone(),
            outbound_rx,
            ready_tx,
        };

        Worker::dispatch(request)?;
        self.outbound_tx = Some(outbound_tx);

        ready_rx.await.map_err(|_| Error::WorkerChannelClosed)?
    }

    /// Disconnects using the reason set by [`Self::set_close_reason`], or a
    /// plain `1000 Normal` close if none was set.
    pub async fn disconnect(&mut self) -> Result<(), Error> {
        let info = self.client_close.clone().unwrap_or(CloseInfo {
            code: CloseCode::Normal,
            reason: String::new(),
        });
        self.disconnect_with_reason(info).await
    }

    pub async fn disconnect_with_reason(&mut self, info: CloseInfo) -> Result<(), Error> {
        let tx = self.outbound_tx.take().ok_or(Error::NotConnected)?;
        let _ = tx.send(OutboundMessage::Close(info));
        Ok(())
    }

    /// Sends one complete data frame. Per spec.md §4.E, only TEXT/BIN are
    /// valid here — control frames go through [`Self::send_ping`],
    /// [`Self::send_pong`], or [`Self::disconnect_with_reason`] instead.
    pub async fn write_data(&self, opcode: OpCode, payload: Vec<u8>) -> Result<(), Error> {
        if opcode.is_control() {
            return Err(Error::Encode(format!(
                "write_data only accepts TEXT/BIN, got {opcode:?}"
            )));
        }
        self.send_frame(OutboundFrame::message(opcode, payload)).await
    }

    /// Writes one piece of a multi-part message (`websocket_write_slice` in
    /// the original), letting a caller stream a large payload without
    /// buffering it all before the first byte goes out.
    pub async fn write_slice(&self, opcode: OpCode, payload: Vec<u8>, slice: SlicePart) -> Result<(), Error> {
        if opcode.is_control() {
            return Err(Error::Encode(format!(
                "write_slice only accepts TEXT/BIN, got {opcode:?}; control frames must not be fragmented"
            )));
        }
        self.send_frame(OutboundFrame { opcode, payload, slice }).await
    }

    pub async fn send_ping(&self, payload: Vec<u8>) -> Result<(), Error> {
        self.send_frame(OutboundFrame::message(OpCode::Ping, payload)).await
    }

    /// Sends an unsolicited PONG (`websocket_send_pong` in the original).
    /// The worker already auto-replies to every PING on this session's
    /// behalf (§4.F); this exists for the rarer case of a one-off
    /// keepalive the application wants to emit without having received a
    /// PING first.
    pub async fn send_pong(&self, payload: Vec<u8>) -> Result<(), Error> {
        self.send_frame(OutboundFrame::message(OpCode::Pong, payload)).await
    }

    async fn send_frame(&self, frame: OutboundFrame) -> Result<(), Error> {
        let tx = self.outbound_tx.as_ref().ok_or(Error::NotConnected)?;
        tx.send(OutboundMessage::Frame(frame)).map_err(|_| Error::NotConnected)
    }

    pub async fn get_close_reason(&self) -> Result<CloseInfo, Error> {
        let shared = self.shared.lock().await;
        shared.close_info.clone().ok_or(Error::NoCloseObserved)
    }

    pub async fn error_reason(&self) -> Option<String> {
        self.shared.lock().await.error_reason.clone()
    }

    /// The subprotocol the server actually negotiated, per
    /// `Sec-WebSocket-Protocol` in its response (spec.md §3's
    /// `subprotocol_negotiated`). `None` until the handshake completes, and
    /// permanently `None` if no subprotocol was requested via
    /// [`Self::set_subprotocol`] in the first place.
    pub async fn subprotocol_negotiated(&self) -> Option<String> {
        self.shared.lock().await.subprotocol_negotiated.clone()
    }

    pub async fn state(&self) -> FsmState {
        self.shared.lock().await.fsm_state
    }
}

impl Default for WebSocket {
    fn default() -> Self {
        Self::new()
    }
}
