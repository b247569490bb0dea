//! # inboxkit-imap
//!
//! A small IMAP client engine speaking the subset of RFC 3501 a mail triage
//! app needs: log in, list INBOX UIDs, fetch whole messages, delete and
//! archive.
//!
//! ## Features
//!
//! - **Literal-aware framing**: responses are cut on byte counts, never by
//!   splitting decoded text, so message bodies with embedded CRLF survive
//! - **One command in flight**: a [`Session`] holds an async mutex across
//!   each round trip, so it can be shared behind an `Arc`
//! - **Deadlines**: every command races a configurable timeout; a session
//!   that timed out refuses further commands
//! - **TLS via rustls**: secure connections without OpenSSL dependency
//! - **Provider quirks**: "already gone" and bad-credential detection and
//!   archive mailbox names per provider, isolated in [`quirks`]
//! - **Redacted diagnostics**: LOGIN arguments never reach a
//!   [`ProtocolLogger`](logger::ProtocolLogger)
//!
//! ## Quick Start
//!
//! ```ignore
//! use inboxkit_imap::{Credentials, ProviderConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> inboxkit_imap::Result<()> {
//!     let session = Session::new(
//!         ProviderConfig::fastmail(),
//!         Credentials::new("me@fastmail.com", "app-password"),
//!     );
//!     session.connect().await?;
//!
//!     let newest = session.fetch_inbox_uids(10, 0).await?;
//!     if let Some(&uid) = newest.first() {
//!         let message = session.fetch_message(uid).await?;
//!         println!("{uid}: {} bytes, seen={}", message.size(), message.flags.is_seen());
//!
//!         match session.trash_message(uid).await {
//!             Err(e) if e.is_not_found() => println!("already gone"),
//!             other => other?,
//!         }
//!     }
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! Disconnected ─ connect() ─→ Connecting ─→ GreetingReceived ─→ LoggedIn ─→ Ready
//!      ↑                                                                     │
//!      └──────────────────────────── disconnect() ───────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`command`]: IMAP command builders and redaction
//! - [`connection`]: Transport, framing and the session
//! - [`response`]: Completion classification and payload parsers
//! - [`quirks`]: Provider-specific phrasing and mailbox names
//! - [`logger`]: Injected protocol diagnostics
//! - [`types`]: Tags, UIDs, flags and fetched messages

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod logger;
pub mod quirks;
pub mod response;
pub mod types;

pub use command::{Command, FetchAttribute, TagGenerator};
pub use connection::{
    Connector, Credentials, ImapStream, ProviderConfig, ProviderConfigBuilder, Security, Session,
    SessionState, TcpConnector,
};
pub use error::{Error, Result};
pub use logger::{NullLogger, ProtocolLogger, RecordingLogger, TracingLogger};
pub use quirks::Provider;
pub use response::{Completion, Response, Status};
pub use types::{FetchedMessage, Flag, Flags, Tag, Uid};
