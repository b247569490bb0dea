//! IMAP connection management.
//!
//! This module provides connection handling for IMAP servers, including:
//! - Configuration (host, port, security mode, timeouts)
//! - TLS/plaintext stream abstraction and the [`Connector`] seam
//! - Literal-aware framed I/O
//! - The [`Session`] that serializes commands over one connection

mod config;
pub(crate) mod framed;
mod session;
mod stream;

pub use config::{
    Credentials, DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, ProviderConfig,
    ProviderConfigBuilder, Security,
};
pub use framed::FramedStream;
pub use session::{Session, SessionState};
pub use stream::{
    Connector, ImapStream, TcpConnector, connect_plain, connect_tls, create_tls_connector,
};
