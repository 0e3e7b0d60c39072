//! Client-side HTTP/1.1 upgrade handshake.
//!
//! Request composition follows the teacher's `request.rs::construct_http_request`;
//! response validation follows `websocket.c`'s `websocket_check_header_line`
//! bitmap idea (reworked into named booleans instead of a raw bitmask) and
//! `websocket_recv_and_check_hand_frame`'s line-by-line read.

use base64::prelude::*;
use rand::RngCore;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Duration};

use crate::error::Error;
use crate::headers::HeaderTable;
use crate::url::WsUrl;

const ACCEPT_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const MAX_RESPONSE_HEADER_BYTES: usize = 16 * 1024;

pub fn generate_sec_key() -> String {
    let mut raw = [0u8; 16];
    rand::rng().fill_bytes(&mut raw);
    BASE64_STANDARD.encode(raw)
}

pub fn compute_accept_key(sec_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(sec_key.as_bytes());
    hasher.update(ACCEPT_GUID.as_bytes());
    BASE64_STANDARD.encode(hasher.finalize())
}

pub fn build_request(
    url: &WsUrl,
    host_header: &str,
    sec_key: &str,
    subprotocol: Option<&str>,
    extra_headers: &HeaderTable,
) -> String {
    let mut request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: Upgrade\r\nUpgrade: websocket\r\nSec-WebSocket-Key: {}\r\nSec-WebSocket-Version: 13\r\n",
        url.path, host_header, sec_key,
    );

    if let Some(protocol) = subprotocol {
        request.push_str(&format!("Sec-WebSocket-Protocol: {protocol}\r\n"));
    }

    for (key, value) in extra_headers.iter() {
        request.push_str(&format!("{key}: {value}\r\n"));
    }

    request.push_str("\r\n");
    request
}

/// Named-field equivalent of `websocket_check_header_line`'s bitmask: tracks
/// which of the mandatory upgrade headers have been seen while scanning the
/// response line by line.
#[derive(Debug, Default)]
struct HandshakeChecklist {
    status_ok: bool,
    has_upgrade: bool,
    has_connection: bool,
    accept_key: Option<String>,
    subprotocol: Option<String>,
}

impl HandshakeChecklist {
    fn is_complete(&self) -> bool {
        self.status_ok && self.has_upgrade && self.has_connection && self.accept_key.is_some()
    }
}

/// Runs the request/response exchange and returns the negotiated
/// subprotocol, if any (`None` when the caller didn't request one).
pub async fn perform_client_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    url: &WsUrl,
    host_header: &str,
    subprotocol: Option<&str>,
    extra_headers: &HeaderTable,
    connect_timeout: Duration,
) -> Result<Option<String>, Error> {
    let sec_key = generate_sec_key();
    let expected_accept = compute_accept_key(&sec_key);
    let request = build_request(url, host_header, &sec_key, subprotocol, extra_headers);

    timeout(connect_timeout, stream.write_all(request.as_bytes())).await??;

    let response = timeout(connect_timeout, read_response_headers(stream)).await??;
    validate_response(&response, &expected_accept, subprotocol)
}

async fn read_response_headers<S: AsyncRead + Unpin>(stream: &mut S) -> Result<String, Error> {
    let mut buf = Vec::with_capacity(1024);
    let mut byte = [0u8; 1];

    loop {
        if buf.len() >= MAX_RESPONSE_HEADER_BYTES {
            return Err(Error::HandshakeTooLarge);
        }
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            return Err(Error::InvalidStatusLine);
        }
        buf.push(byte[0]);
        if buf.ends_with(b"\r\n\r\n") {
            break;
        }
    }

    String::from_utf8(buf).map_err(|e| Error::Parse(e.to_string()))
}

fn validate_response(
    response: &str,
    expected_accept: &str,
    requested_subprotocol: Option<&str>,
) -> Result<Option<String>, Error> {
    let mut lines = response.lines();
    let status_line = lines.next().ok_or(Error::InvalidStatusLine)?;
    let mut checklist = HandshakeChecklist::default();
    checklist.status_ok = status_line.starts_with("HTTP/1.1 101 Switching Protocols");

    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        match key.as_str() {
            "upgrade" if value.eq_ignore_ascii_case("websocket") => checklist.has_upgrade = true,
            "connection" if value.to_ascii_lowercase().contains("upgrade") => {
                checklist.has_connection = true
            }
            "sec-websocket-accept" => checklist.accept_key = Some(value.to_string()),
            "sec-websocket-protocol" => checklist.subprotocol = Some(value.to_string()),
            _ => {}
        }
    }

    if !checklist.status_ok {
        return Err(Error::NoUpgrade);
    }
    if !checklist.has_upgrade {
        return Err(Error::NoUpgradeHeader);
    }
    if !checklist.has_connection {
        return Err(Error::NoConnectionHeader);
    }
    let Some(accept_key) = checklist.accept_key else {
        return Err(Error::NoSecWebSocketAccept);
    };
    if accept_key != expected_accept {
        return Err(Error::InvalidAcceptKey);
    }
    if let Some(requested) = requested_subprotocol {
        if checklist.subprotocol.is_none() {
            return Err(Error::SubprotocolNotSupported(requested.to_string()));
        }
    }

    debug_assert!(checklist.is_complete());
    Ok(checklist.subprotocol)
}
