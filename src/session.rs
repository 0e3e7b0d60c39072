//! Per-connection state split along the ownership line spec.md §5 and
//! SPEC_FULL.md §5 require: fields the public handle and the worker task
//! must coordinate on live behind a `Mutex`; fields only the worker-driven
//! task ever touches (transport, reassembly buffer, cursor) live in a plain
//! struct owned solely by that task, needing no lock.
//!
//! Grounded on `struct websocket_session` (`websocket.h`) and
//! `struct websocket` (`websocket_service.c`), merged into this one
//! Rust-idiomatic split.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::frame::CloseInfo;
use crate::fsm::FsmState;

/// Fields the public [`crate::websocket::WebSocket`] handle reads and the
/// worker task writes. Guarded by a mutex mirroring the original's
/// per-session `pthread_mutex_t`.
#[derive(Debug)]
pub struct SharedState {
    pub fsm_state: FsmState,
    pub close_info: Option<CloseInfo>,
    pub error_reason: Option<String>,
    pub subprotocol_negotiated: Option<String>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            fsm_state: FsmState::Init,
            close_info: None,
            error_reason: None,
            subprotocol_negotiated: None,
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

pub type Shared = Arc<Mutex<SharedState>>;

pub fn new_shared() -> Shared {
    Arc::new(Mutex::new(SharedState::new()))
}
