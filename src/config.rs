//! Tunables for a [`crate::websocket::WebSocket`] session and the
//! background [`crate::worker::Worker`].
//!
//! Shaped after the teacher's `config.rs::WebSocketConfig`, with the
//! size/table constants supplemented from `websocket_service.h`
//! (`WEBSOCKET_SERVICE_CACHE_SIZE`, `_KV_TABLE_LENGTH`, `_CACHE_SIZE_MAX`),
//! which the distilled spec.md names but doesn't give Rust-side defaults
//! for.

use std::time::Duration;

/// `WEBSOCKET_SERVICE_CACHE_SIZE` in the original: the reassembly buffer's
/// initial capacity.
pub const DEFAULT_CACHE_SIZE: usize = 1024;

/// `WEBSOCKET_SERVICE_CACHE_SIZE_MAX`: the reassembly buffer's ceiling.
pub const DEFAULT_CACHE_SIZE_MAX: usize = 1024 * 8;

/// `WEBSOCKET_SERVICE_KV_TABLE_LENGTH`: initial header-table capacity.
pub const DEFAULT_KV_TABLE_LENGTH: usize = 20;

/// `APP_WEBSOCKET_POLLFD_MAX` equivalent: how many sessions the worker
/// admits to its active set concurrently (realized as a semaphore, see
/// `worker.rs`).
pub const DEFAULT_MAX_CONCURRENT_SESSIONS: usize = 64;

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub max_frame_size: usize,
    pub cache_size: usize,
    pub cache_size_max: usize,
    pub kv_table_length: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_frame_size: 16 << 20,
            cache_size: DEFAULT_CACHE_SIZE,
            cache_size_max: DEFAULT_CACHE_SIZE_MAX,
            kv_table_length: DEFAULT_KV_TABLE_LENGTH,
            connect_timeout: Duration::from_secs(10),
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub max_concurrent_sessions: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            max_concurrent_sessions: DEFAULT_MAX_CONCURRENT_SESSIONS,
        }
    }
}
