//! Minimal `ws://`/`wss://` URL parsing.
//!
//! Intentionally not the `url` crate: the grammar this engine needs is the
//! narrow one the original C's `websocket_wrl_praser_host/port/path/wss`
//! implement — two fixed schemes, no IPv6 literals, no userinfo, no
//! normalization. A general-purpose URL parser accepts (and normalizes) a
//! great deal this engine should simply reject or never see.

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsUrl {
    pub use_tls: bool,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl WsUrl {
    /// The `Host:port` this engine sends as the request header field.
    /// Spec.md §4.D's request template is `Host: <host>:<port>\r\n` —
    /// always the resolved port, explicit or defaulted — matching the
    /// original's `websocket_send_hand_frame`, which always formats
    /// `"Host: %s:%s\r\n"` regardless of whether the URL carried one.
    pub fn host_header(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn parse(url: &str) -> Result<WsUrl, Error> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| Error::UrlMalformed(url.to_string()))?;

    let (use_tls, default_port) = match scheme {
        "ws" => (false, 80u16),
        "wss" => (true, 443u16),
        _ => return Err(Error::InvalidSchemeUrl),
    };

    if rest.is_empty() {
        return Err(Error::UrlNoHost);
    }

    // Split off the path at the first '/'; if there is none, the path is "/".
    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };

    if authority.is_empty() {
        return Err(Error::UrlNoHost);
    }

    // IPv6 literals (`[::1]:port`) are explicitly out of scope.
    if authority.starts_with('[') {
        return Err(Error::UrlMalformed(
            "IPv6 host literals are not supported".to_string(),
        ));
    }

    let (host, port) = match authority.split_once(':') {
        Some((host, port_str)) => {
            let port: u16 = port_str
                .parse()
                .map_err(|_| Error::UrlMalformed(format!("invalid port: {port_str}")))?;
            (host, port)
        }
        None => (authority, default_port),
    };

    if host.is_empty() {
        return Err(Error::UrlNoHost);
    }

    Ok(WsUrl {
        use_tls,
        host: host.to_string(),
        port,
        path: path.to_string(),
    })
}
