//! The single background I/O worker.
//!
//! Grounded on `websocket_service.c::worker_entry`: one thread polls every
//! active session's socket and dispatches callbacks. The self-pipe wakeup
//! (a byte written to a pipe `poll()` also watches) is realized here as an
//! `mpsc` command channel feeding a `tokio::task::LocalSet` driven by a
//! dedicated OS thread running a `current_thread` runtime — "a single
//! worker thread performs all socket I/O and all callback dispatch"
//! (spec.md §5) holds exactly as written, just with tokio's reactor standing
//! in for a raw `poll()` loop.
//!
//! The original's two-phase per-tick FSM pass (phase 1: states < MONITOR,
//! phase 2: states > MONITOR — see DESIGN.md Open Question §1) is replaced
//! by giving each session its own sequential `spawn_local` task that walks
//! its own `FsmState`s in order; onopen-before-onmessage and exactly-one-
//! onclose fall out of that task simply running top to bottom.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use log::{debug, error, warn};
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::LocalSet;

use crate::callbacks::WebSocketHandler;
use crate::codec::{decode_frame, encode_frame};
use crate::config::{WebSocketConfig, WorkerConfig};
use crate::control::{self, ControlAction};
use crate::error::{Error, WebSocketStatus};
use crate::frame::{CloseCode, CloseInfo, Frame, OutboundFrame};
use crate::handshake::perform_client_handshake;
use crate::headers::HeaderTable;
use crate::reassembly::ReassemblyBuffer;
use crate::session::Shared;
use crate::transport::Transport;
use crate::url::WsUrl;

/// One item on a session's outbound channel: either a frame to write and
/// keep servicing, or an explicit local close that ends the session after
/// it's written. Keeping these distinct (rather than inferring "please
/// close" from the channel itself being dropped) is what lets
/// `disconnect()` send exactly one CLOSE frame instead of racing a second,
/// generic one out of `recv()` returning `None`.
pub enum OutboundMessage {
    Frame(OutboundFrame),
    Close(CloseInfo),
}

pub struct ConnectRequest {
    pub url: WsUrl,
    pub host_header: String,
    pub subprotocol: Option<String>,
    pub headers: HeaderTable,
    pub config: WebSocketConfig,
    pub handler: Box<dyn WebSocketHandler>,
    pub shared: Shared,
    pub outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    pub ready_tx: oneshot::Sender<Result<(), Error>>,
}

pub enum WorkerCommand {
    Connect(Box<ConnectRequest>),
    Shutdown,
}

impl std::fmt::Debug for WorkerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerCommand::Connect(_) => write!(f, "WorkerCommand::Connect"),
            WorkerCommand::Shutdown => write!(f, "WorkerCommand::Shutdown"),
        }
    }
}

static WORKER: OnceLock<WorkerHandle> = OnceLock::new();
static RUNNING: AtomicBool = AtomicBool::new(false);

struct WorkerHandle {
    command_tx: mpsc::UnboundedSender<WorkerCommand>,
    thread: std::thread::JoinHandle<()>,
}

pub struct Worker;

impl Worker {
    /// Starts the single background worker thread. Mirrors
    /// `app_websocket_worker_init`; refuses a second call while one worker
    /// is already running (DESIGN.md Open Question §2).
    pub fn init() -> Result<(), Error> {
        Self::init_with_config(WorkerConfig::default())
    }

    /// Same as [`Self::init`], but with an explicit [`WorkerConfig`] —
    /// chiefly useful for overriding `max_concurrent_sessions`
    /// (`APP_WEBSOCKET_POLLFD_MAX` in the original, default 10) away from
    /// its production default.
    pub fn init_with_config(worker_config: WorkerConfig) -> Result<(), Error> {
        if RUNNING.swap(true, Ordering::SeqCst) {
            return Err(Error::WorkerAlreadyRunning);
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name("websocket-worker".into())
            .spawn(move || run_worker_thread(command_rx, worker_config))
            .expect("failed to spawn websocket worker thread");

        WORKER
            .set(WorkerHandle { command_tx, thread })
            .map_err(|_| Error::WorkerAlreadyRunning)?;

        Ok(())
    }

    pub fn shutdown() -> Result<(), Error> {
        let handle = WORKER.get().ok_or(Error::WorkerNotRunning)?;
        handle.command_tx.send(WorkerCommand::Shutdown)?;
        RUNNING.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub(crate) fn dispatch(request: ConnectRequest) -> Result<(), Error> {
        let handle = WORKER.get().ok_or(Error::WorkerNotRunning)?;
        handle
            .command_tx
            .send(WorkerCommand::Connect(Box::new(request)))?;
        Ok(())
    }
}

fn run_worker_thread(
    mut command_rx: mpsc::UnboundedReceiver<WorkerCommand>,
    worker_config: WorkerConfig,
) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build websocket worker runtime");

    let local = LocalSet::new();
    let max_concurrent_sessions = worker_config.max_concurrent_sessions;
    let semaphore = Arc::new(Semaphore::new(max_concurrent_sessions));

    local.block_on(&runtime, async move {
        while let Some(command) = command_rx.recv().await {
            match command {
                WorkerCommand::Connect(request) => {
                    // APP_WEBSOCKET_POLLFD_MAX in the original: the active
                    // set has a hard ceiling, so a session over the limit
                    // is rejected up front rather than queued indefinitely.
                    let permit = match semaphore.clone().try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            let _ = request
                                .ready_tx
                                .send(Err(Error::TooManySessions(max_concurrent_sessions)));
                            continue;
                        }
                    };
                    tokio::task::spawn_local(async move {
                        let _permit = permit;
                        run_session(*request).await;
                    });
                }
                WorkerCommand::Shutdown => break,
            }
        }
    });
}

/// The per-session sequential FSM walk: connect, handshake, service reads
/// and writes until closed or errored, then call back exactly once for
/// close. This function's own sequencing is what replaces the original's
/// two-phase global pass.
async fn run_session(mut request: ConnectRequest) {
    use crate::fsm::FsmState;

    {
        let mut shared = request.shared.lock().await;
        shared.fsm_state = FsmState::Connecting;
    }

    let connect_result = connect_and_handshake(&request).await;

    let (mut transport, negotiated_subprotocol) = match connect_result {
        Ok(outcome) => outcome,
        Err(err) => {
            let message = err.to_string();
            {
                let mut shared = request.shared.lock().await;
                shared.fsm_state = FsmState::Error;
                shared.error_reason = Some(message.clone());
            }
            request.handler.on_error(&message);
            let _ = request.ready_tx.send(Err(err));
            request.handler.on_close(CloseInfo {
                code: CloseCode::Abnormal,
                reason: message,
            });
            return;
        }
    };

    {
        let mut shared = request.shared.lock().await;
        shared.fsm_state = FsmState::Monitor;
        shared.subprotocol_negotiated = negotiated_subprotocol;
    }
    let _ = request.handler.on_open();
    let _ = request.ready_tx.send(Ok(()));

    let close_info = service_session(&mut transport, &mut request).await;

    {
        let mut shared = request.shared.lock().await;
        shared.fsm_state = FsmState::Closed;
        shared.close_info = Some(close_info.clone());
    }
    request.handler.on_close(close_info);
}

async fn connect_and_handshake(request: &ConnectRequest) -> Result<(Transport, Option<String>), Error> {
    let host_port = format!("{}:{}", request.url.host, request.url.port);
    let mut transport = if request.url.use_tls {
        Transport::connect_tls(&host_port, &request.url.host).await?
    } else {
        Transport::connect_plain(&host_port).await?
    };

    let negotiated_subprotocol = perform_client_handshake(
        &mut transport,
        &request.url,
        &request.host_header,
        request.subprotocol.as_deref(),
        &request.headers,
        request.config.connect_timeout,
    )
    .await?;

    Ok((transport, negotiated_subprotocol))
}

/// Writes one frame, honoring the session's configured write timeout
/// (`websocket_set_timeout`'s `SO_SNDTIMEO` half in the original — realized
/// here as a `tokio::time::timeout` around the write future rather than a
/// socket option, since safe tokio has no raw-fd `setsockopt` surface).
async fn write_frame_timed(
    transport: &mut Transport,
    frame: &OutboundFrame,
    write_timeout: Option<Duration>,
) -> Result<(), Error> {
    match write_timeout {
        Some(duration) => tokio::time::timeout(duration, encode_frame(transport, frame)).await?,
        None => encode_frame(transport, frame).await,
    }
}

/// Reads one frame, honoring the session's configured read timeout
/// (`SO_RCVTIMEO` half of `websocket_set_timeout`).
async fn read_frame_timed(
    transport: &mut Transport,
    max_frame_size: usize,
    read_timeout: Option<Duration>,
) -> Result<Frame, Error> {
    match read_timeout {
        Some(duration) => tokio::time::timeout(duration, decode_frame(transport, max_frame_size)).await?,
        None => decode_frame(transport, max_frame_size).await,
    }
}

/// Services one open session until a close is observed (locally initiated,
/// remotely initiated, or the result of a protocol error), returning the
/// close info to report to `on_close`.
async fn service_session(transport: &mut Transport, request: &mut ConnectRequest) -> CloseInfo {
    let mut reassembly = ReassemblyBuffer::new(request.config.cache_size, request.config.cache_size_max);
    let read_timeout = request.config.read_timeout;
    let write_timeout = request.config.write_timeout;

    loop {
        tokio::select! {
            biased;

            outbound = request.outbound_rx.recv() => {
                match outbound {
                    Some(OutboundMessage::Frame(frame)) => {
                        if let Err(err) = write_frame_timed(transport, &frame, write_timeout).await {
                            warn!("websocket worker: write failed: {err}");
                            return CloseInfo { code: CloseCode::Abnormal, reason: err.to_string() };
                        }
                    }
                    Some(OutboundMessage::Close(info)) => {
                        let _ = write_frame_timed(transport, &control::build_close_frame(&info), write_timeout).await;
                        return info;
                    }
                    None => {
                        // The handle was dropped without calling `disconnect()`.
                        let info = CloseInfo { code: CloseCode::Normal, reason: String::new() };
                        let _ = write_frame_timed(transport, &control::build_close_frame(&info), write_timeout).await;
                        return info;
                    }
                }
            }

            decoded = read_frame_timed(transport, request.config.max_frame_size, read_timeout) => {
                let frame = match decoded {
                    Ok(frame) => frame,
                    Err(err) => {
                        error!("websocket worker: read failed: {err}");
                        let message = err.to_string();
                        request.handler.on_error(&message);
                        return CloseInfo { code: CloseCode::ProtocolError, reason: message };
                    }
                };

                match control::handle(frame) {
                    ControlAction::Reply(reply) => {
                        if let Err(err) = write_frame_timed(transport, &reply, write_timeout).await {
                            warn!("websocket worker: pong reply failed: {err}");
                        }
                    }
                    ControlAction::PongReceived => {
                        debug!("websocket worker: pong received");
                    }
                    ControlAction::PeerClosed(info) => {
                        let _ = write_frame_timed(transport, &control::build_close_frame(&info), write_timeout).await;
                        return info;
                    }
                    ControlAction::NotControl(frame) => {
                        if let Err(err) = deliver_data_frame(frame, &mut reassembly, request.handler.as_mut()) {
                            let message = err.to_string();
                            request.handler.on_error(&message);
                            return CloseInfo { code: CloseCode::ProtocolError, reason: message };
                        }
                    }
                }
            }
        }
    }
}

fn deliver_data_frame(
    frame: Frame,
    reassembly: &mut ReassemblyBuffer,
    handler: &mut dyn WebSocketHandler,
) -> Result<(), Error> {
    use crate::frame::OpCode;

    if frame.opcode == OpCode::Continue {
        reassembly.append(&frame.payload)?;
        if frame.final_fragment {
            let (opcode, payload) = reassembly.finish()?;
            let status = handler.on_message(Frame::new(true, opcode, payload));
            if status == WebSocketStatus::Error {
                return Err(Error::Parse("handler reported an error".to_string()));
            }
        }
        return Ok(());
    }

    if !frame.final_fragment {
        reassembly.begin(frame.opcode)?;
        reassembly.append(&frame.payload)?;
        return Ok(());
    }

    let status = handler.on_message(frame);
    if status == WebSocketStatus::Error {
        return Err(Error::Parse("handler reported an error".to_string()));
    }
    Ok(())
}
