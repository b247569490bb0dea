//! Transport: plain or TLS TCP streams, and the connector seam.

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::config::ProviderConfig;
use crate::{Error, Result};

/// A stream that can be either plaintext or TLS.
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Opens the byte stream a [`Session`](super::Session) talks over.
///
/// [`TcpConnector`] is the production implementation; tests plug in
/// in-memory pipes.
pub trait Connector: Send + Sync {
    /// The stream type produced.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Opens a stream to the configured server.
    fn connect(&self, config: &ProviderConfig)
    -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// Connects over TCP, wrapping in TLS when the config requires it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = ImapStream;

    async fn connect(&self, config: &ProviderConfig) -> Result<ImapStream> {
        let stream = if config.security.requires_tls() {
            connect_tls(&config.host, config.port).await?
        } else {
            connect_plain(&config.host, config.port).await?
        };
        tracing::debug!(
            host = %config.host,
            port = config.port,
            tls = stream.is_tls(),
            "transport open"
        );
        Ok(stream)
    }
}

/// Creates a TLS connector with default root certificates.
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Connects to a server with TLS from the start.
pub async fn connect_tls(host: &str, port: u16) -> Result<ImapStream> {
    let tcp = open_tcp(host, port).await?;

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| Error::ConnectionFailed(format!("invalid server name {host:?}: {e}")))?;
    let tls = create_tls_connector()
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::ConnectionFailed(format!("TLS handshake with {host} failed: {e}")))?;

    Ok(ImapStream::Tls(Box::new(tls)))
}

/// Connects to a server without TLS (for local servers and testing).
pub async fn connect_plain(host: &str, port: u16) -> Result<ImapStream> {
    Ok(ImapStream::Plain(open_tcp(host, port).await?))
}

async fn open_tcp(host: &str, port: u16) -> Result<TcpStream> {
    let addr = format!("{host}:{port}");
    TcpStream::connect(&addr)
        .await
        .map_err(|e| Error::ConnectionFailed(format!("cannot reach {addr}: {e}")))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use tokio::net::TcpListener;

    use crate::connection::Security;

    use super::*;

    #[test]
    fn test_create_tls_connector() {
        let _connector = create_tls_connector();
    }

    #[tokio::test]
    async fn test_plain_connector_reaches_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });

        let config = ProviderConfig::builder("127.0.0.1")
            .port(port)
            .security(Security::None)
            .build();
        let stream = TcpConnector.connect(&config).await.unwrap();
        assert!(!stream.is_tls());
        accept.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_refused_connection_is_connection_failed() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = connect_plain("127.0.0.1", port).await.err().unwrap();
        assert!(matches!(err, Error::ConnectionFailed(_)));
    }
}
