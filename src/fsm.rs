//! Per-session finite state machine.
//!
//! A tagged enum, not raw integers, per spec.md §9's design note. Grounded
//! on `websocket_service.c`'s `enum FSM_WEBSOCKET_STATE` and `fsm_driver`;
//! the original's two-phase global pass (phase 1: states < MONITOR, phase
//! 2: states > MONITOR, to guarantee onopen-before-onmessage and exactly
//! one onclose) is replaced by giving each session its own sequential
//! `spawn_local` task that walks these states in order — see
//! `worker.rs` and DESIGN.md's Open Question §1.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmState {
    /// Session created, not yet handed to the worker.
    Init,
    /// TCP (+TLS) connect and HTTP upgrade handshake in flight.
    Connecting,
    /// Handshake complete; `on_open` has fired, now servicing reads/writes.
    Monitor,
    /// A close frame was sent or received; draining in-flight I/O.
    Closing,
    /// Terminal: `on_close` has fired exactly once.
    Closed,
    /// Terminal: `on_error` has fired, session is unusable.
    Error,
}

impl FsmState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FsmState::Closed | FsmState::Error)
    }

    /// True once the handshake has completed and the session is eligible
    /// for user reads/writes.
    pub fn is_open(&self) -> bool {
        matches!(self, FsmState::Monitor | FsmState::Closing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_closed_and_error_only() {
        assert!(FsmState::Closed.is_terminal());
        assert!(FsmState::Error.is_terminal());
        assert!(!FsmState::Init.is_terminal());
        assert!(!FsmState::Connecting.is_terminal());
        assert!(!FsmState::Monitor.is_terminal());
        assert!(!FsmState::Closing.is_terminal());
    }

    #[test]
    fn open_states_allow_user_io() {
        assert!(FsmState::Monitor.is_open());
        assert!(FsmState::Closing.is_open());
        assert!(!FsmState::Init.is_open());
        assert!(!FsmState::Connecting.is_open());
    }
}
