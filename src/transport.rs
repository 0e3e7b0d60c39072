//! Uniform transport over plain TCP or TLS.
//!
//! Grounded on the teacher's `server.rs`, which matches on a
//! `SocketFlowStream::Secure`/`Plain` pair when driving TLS vs. plain
//! connections but never actually defines that enum in the snapshot this
//! repo was distilled from; we complete it here for the client side, using
//! the same rustls stack (`tokio-rustls`, `rustls`, `webpki-roots`) the
//! teacher already depends on.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use pki_types::ServerName;
use rustls::ClientConfig as RustlsClientConfig;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::error::Error;

pub enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Transport {
    pub async fn connect_plain(host_port: &str) -> Result<Self, Error> {
        let stream = TcpStream::connect(host_port).await?;
        stream.set_nodelay(true)?;
        Ok(Transport::Plain(stream))
    }

    pub async fn connect_tls(host_port: &str, host: &str) -> Result<Self, Error> {
        let stream = TcpStream::connect(host_port).await?;
        stream.set_nodelay(true)?;

        let connector = TlsConnector::from(Arc::new(default_client_config()));
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::Tls(format!("invalid DNS name: {host}")))?;
        let tls_stream = connector
            .connect(server_name, stream)
            .await
            .map_err(|e| Error::Tls(e.to_string()))?;

        Ok(Transport::Tls(Box::new(tls_stream)))
    }
}

fn default_client_config() -> RustlsClientConfig {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    RustlsClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_flush(cx),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
