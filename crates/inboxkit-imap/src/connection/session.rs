//! IMAP session: connection lifecycle, command dispatch and mailbox
//! operations.
//!
//! ## Design
//!
//! One [`Session`] is one conversation over one socket. Every public method
//! takes `&self`, and each command round trip (write, then read through the
//! tagged completion) runs while holding an async mutex, so at most one
//! command is ever in flight. Callers may share a session behind an `Arc`;
//! concurrent calls simply queue.
//!
//! A session is good for a single connection. After [`Session::disconnect`],
//! a failed [`Session::connect`], or a lost socket, build a new one.
//!
//! ## Example
//!
//! ```ignore
//! use inboxkit_imap::{Credentials, ProviderConfig, Session};
//!
//! let credentials = Credentials::new("me@gmail.com", app_password);
//! let session = Session::new(ProviderConfig::gmail(), credentials);
//! session.connect().await?;
//!
//! for uid in session.fetch_inbox_uids(20, 0).await? {
//!     let message = session.fetch_message(uid).await?;
//!     println!("{uid}: {} bytes", message.size());
//! }
//!
//! session.disconnect().await;
//! ```

use std::sync::{Arc, OnceLock};

use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, timeout};

use super::config::{Credentials, ProviderConfig};
use super::framed::{FramedStream, strip_cr};
use super::stream::{Connector, TcpConnector};
use crate::command::{Command, TagGenerator};
use crate::logger::{ProtocolLogger, TracingLogger};
use crate::quirks::{self, Provider};
use crate::response::{Response, parse_fetch, parse_search};
use crate::types::{FetchedMessage, Uid};
use crate::{Error, Result};

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No open socket.
    #[default]
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// The server greeted us; not yet logged in.
    GreetingReceived,
    /// LOGIN succeeded (or the server pre-authenticated the connection).
    LoggedIn,
    /// INBOX is selected and mailbox operations are allowed.
    Ready,
}

/// State guarded by the round-trip mutex.
struct Inner<S> {
    framed: Option<FramedStream<S>>,
    tags: TagGenerator,
    /// Set once `connect` has been called; a session never connects twice.
    used: bool,
    /// Set when a command timed out: the buffer no longer lines up with the
    /// server's output.
    desynchronized: bool,
}

/// An IMAP session over one connection.
pub struct Session<C: Connector = TcpConnector> {
    config: ProviderConfig,
    credentials: Credentials,
    connector: C,
    logger: Arc<dyn ProtocolLogger>,
    state: watch::Sender<SessionState>,
    provider: OnceLock<Provider>,
    greeting: OnceLock<String>,
    inner: Mutex<Inner<C::Stream>>,
}

impl Session<TcpConnector> {
    /// Creates a session that connects over TCP (with TLS unless the config
    /// says otherwise). Nothing is opened until [`Session::connect`].
    #[must_use]
    pub fn new(config: ProviderConfig, credentials: Credentials) -> Self {
        Self::with_connector(config, credentials, TcpConnector)
    }
}

impl<C: Connector> Session<C> {
    /// Creates a session that opens its stream through `connector`.
    #[must_use]
    pub fn with_connector(config: ProviderConfig, credentials: Credentials, connector: C) -> Self {
        Self {
            config,
            credentials,
            connector,
            logger: Arc::new(TracingLogger),
            state: watch::channel(SessionState::Disconnected).0,
            provider: OnceLock::new(),
            greeting: OnceLock::new(),
            inner: Mutex::new(Inner {
                framed: None,
                tags: TagGenerator::default(),
                used: false,
                desynchronized: false,
            }),
        }
    }

    /// Replaces the protocol logger (the default forwards to `tracing`).
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn ProtocolLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Returns the configuration this session connects with.
    #[must_use]
    pub const fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Returns true unless the session is disconnected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() != SessionState::Disconnected
    }

    /// Returns the provider detected at connect time ([`Provider::Generic`]
    /// before that).
    #[must_use]
    pub fn provider(&self) -> Provider {
        self.provider.get().copied().unwrap_or_default()
    }

    /// Returns the server greeting, once received.
    #[must_use]
    pub fn greeting(&self) -> Option<&str> {
        self.greeting.get().map(String::as_str)
    }

    /// Connects, logs in and selects INBOX.
    ///
    /// Does nothing if the session is already ready.
    ///
    /// # Errors
    ///
    /// - `ConnectionFailed` if the socket cannot be opened, the greeting does
    ///   not arrive in time, or the server greets with BYE.
    /// - `InvalidResponse` if the greeting is not an untagged line.
    /// - `AuthenticationFailed` if the server rejects the credentials.
    /// - `Protocol` for any other failure, or if this session was already
    ///   used for a connection.
    pub async fn connect(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if self.state() == SessionState::Ready {
            return Ok(());
        }
        if inner.used {
            return Err(Error::Protocol(
                "session already used; create a new Session to reconnect".into(),
            ));
        }
        inner.used = true;

        self.transition(SessionState::Connecting);
        let result = self.establish(&mut inner).await;
        if let Err(e) = &result {
            self.logger.on_error("connect", e);
            self.drop_connection(&mut inner).await;
        }
        result
    }

    /// Sends LOGOUT (ignoring the outcome), closes the socket and drops any
    /// buffered bytes. Always ends in [`SessionState::Disconnected`].
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        let logged_in = matches!(
            self.state(),
            SessionState::GreetingReceived | SessionState::LoggedIn | SessionState::Ready
        );
        if logged_in && !inner.desynchronized && inner.framed.is_some() {
            if let Err(e) = self.execute(&mut inner, &Command::Logout).await {
                tracing::debug!(error = %e, "LOGOUT failed during disconnect");
            }
        }
        self.drop_connection(&mut inner).await;
    }

    /// Sends NOOP.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not ready or the server does not
    /// answer OK.
    pub async fn noop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.require_ready()?;
        self.run(&mut inner, &Command::Noop).await.map(|_| ())
    }

    /// Lists INBOX UIDs newest first, skipping `offset` and returning at most
    /// `max_results`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not ready, the search fails, or the
    /// SEARCH response is malformed.
    pub async fn fetch_inbox_uids(&self, max_results: usize, offset: usize) -> Result<Vec<Uid>> {
        let mut inner = self.inner.lock().await;
        self.require_ready()?;
        let response = self.run(&mut inner, &Command::UidSearchAll).await?;
        let uids = parse_search(&response)?;
        Ok(paginate(uids, max_results, offset))
    }

    /// Fetches flags, internal date and the raw RFC 822 bytes of a message.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if the server answers without the message
    /// body, or any error from the round trip.
    pub async fn fetch_message(&self, uid: Uid) -> Result<FetchedMessage> {
        let mut inner = self.inner.lock().await;
        self.require_ready()?;
        let response = self.run(&mut inner, &Command::fetch_message(uid)).await?;
        parse_fetch(&response, uid)
    }

    /// Marks a message `\Deleted` and expunges.
    ///
    /// # Errors
    ///
    /// Returns `MessageNotFound(uid)` if the server says the message does not
    /// exist, or any other error from the round trips.
    pub async fn trash_message(&self, uid: Uid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.require_ready()?;
        self.delete(&mut inner, uid).await
    }

    /// Copies a message into the first candidate mailbox that accepts it,
    /// then deletes it from INBOX.
    ///
    /// Candidates are tried in order. A failed COPY moves on to the next
    /// candidate; once a COPY succeeds, the outcome of the delete is final.
    ///
    /// # Errors
    ///
    /// Returns the last COPY error if every candidate fails, or
    /// `Protocol("no candidates")` if `candidates` is empty.
    pub async fn archive_message<S: AsRef<str>>(&self, uid: Uid, candidates: &[S]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.require_ready()?;

        let mut last_error = None;
        for mailbox in candidates {
            let copy = Command::UidCopy {
                uid,
                mailbox: mailbox.as_ref().to_string(),
            };
            match self.run(&mut inner, &copy).await {
                Ok(_) => return self.delete(&mut inner, uid).await,
                // A lost or desynchronized connection ends the attempt.
                Err(e) if inner.desynchronized || inner.framed.is_none() => return Err(e),
                Err(e) => {
                    tracing::debug!(
                        %uid,
                        mailbox = mailbox.as_ref(),
                        error = %e,
                        "archive candidate rejected"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Protocol("no candidates".into())))
    }

    /// Archives using the detected provider's usual archive mailboxes.
    ///
    /// # Errors
    ///
    /// Same as [`Session::archive_message`].
    pub async fn archive_message_default(&self, uid: Uid) -> Result<()> {
        let candidates = self.provider().archive_candidates();
        self.archive_message(uid, candidates).await
    }

    // === Private helpers ===

    async fn establish(&self, inner: &mut Inner<C::Stream>) -> Result<()> {
        let limit = self.config.connect_timeout;
        let stream = timeout(limit, self.connector.connect(&self.config))
            .await
            .map_err(|_| {
                Error::ConnectionFailed(format!(
                    "connecting to {}:{} timed out after {limit:?}",
                    self.config.host, self.config.port
                ))
            })??;
        let mut framed = FramedStream::new(stream);

        let line = timeout(limit, framed.read_line())
            .await
            .map_err(|_| Error::ConnectionFailed(format!("no greeting within {limit:?}")))??;
        let line = strip_cr(line.strip_suffix(b"\n").unwrap_or(&line[..]));
        let greeting = String::from_utf8_lossy(line).into_owned();
        let preauthenticated = check_greeting(&greeting)?;

        self.logger.on_greeting(&greeting);
        let provider = Provider::detect(&self.config.host, &greeting);
        let _ = self.provider.set(provider);
        let _ = self.greeting.set(greeting);
        inner.framed = Some(framed);
        self.transition(SessionState::GreetingReceived);

        if !preauthenticated {
            let login = Command::Login {
                username: self.credentials.username().to_string(),
                password: self.credentials.password().to_string(),
            };
            let redacted = login.redacted();
            let response = self
                .execute(inner, &login)
                .await
                .map_err(|e| login_failure(&redacted, e))?;
            quirks::check_login(provider, response.completion(), &redacted)?;
        }
        self.transition(SessionState::LoggedIn);

        let select = Command::Select {
            mailbox: "INBOX".into(),
        };
        self.run(inner, &select).await?;
        self.transition(SessionState::Ready);

        tracing::info!(host = %self.config.host, ?provider, "session ready");
        Ok(())
    }

    /// Runs one command and requires an OK completion.
    async fn run(&self, inner: &mut Inner<C::Stream>, command: &Command) -> Result<Response> {
        let response = self.execute(inner, command).await?;
        let redacted = command.redacted();
        response
            .completion()
            .check(&redacted)
            .inspect_err(|e| self.logger.on_error(&redacted, e))?;
        Ok(response)
    }

    /// `UID STORE +FLAGS.SILENT (\Deleted)` then `EXPUNGE`, with not-found
    /// failures remapped.
    async fn delete(&self, inner: &mut Inner<C::Stream>, uid: Uid) -> Result<()> {
        let provider = self.provider();
        for command in [Command::mark_deleted(uid), Command::Expunge] {
            let response = self.execute(inner, &command).await?;
            let redacted = command.redacted();
            quirks::check_delete(provider, response.completion(), uid, &redacted)
                .inspect_err(|e| self.logger.on_error(&redacted, e))?;
        }
        Ok(())
    }

    /// One round trip: tag, write, read through the tagged completion.
    /// The completion is returned unclassified.
    async fn execute(&self, inner: &mut Inner<C::Stream>, command: &Command) -> Result<Response> {
        if inner.desynchronized {
            return Err(Error::Protocol(
                "session desynchronized by an earlier timeout; reconnect with a new Session".into(),
            ));
        }
        let Some(framed) = inner.framed.as_mut() else {
            return Err(Error::Disconnected);
        };

        let tag = inner.tags.next_tag()?;
        let wire = command.serialize(&tag)?;
        let redacted = command.redacted();
        self.logger.on_command(&tag, &redacted);

        let started = Instant::now();
        let limit = self.config.command_timeout;
        let round_trip = async {
            framed.write_command(&wire).await?;
            framed.read_tagged(&tag).await
        };

        let outcome = timeout(limit, round_trip).await;
        let block = match outcome {
            Ok(Ok(block)) => block,
            Ok(Err(e)) => {
                self.logger.on_error(&redacted, &e);
                if matches!(e, Error::Disconnected) {
                    self.drop_connection(inner).await;
                }
                return Err(e);
            }
            Err(_) => {
                inner.desynchronized = true;
                let e = Error::command_timeout(&redacted, limit);
                self.logger.on_error(&redacted, &e);
                return Err(e);
            }
        };

        let response = Response::parse(block, &tag)?;
        self.logger
            .on_completion(&tag, response.completion(), started.elapsed());
        Ok(response)
    }

    fn require_ready(&self) -> Result<()> {
        if self.state() == SessionState::Ready {
            Ok(())
        } else {
            Err(Error::Disconnected)
        }
    }

    async fn drop_connection(&self, inner: &mut Inner<C::Stream>) {
        if let Some(mut framed) = inner.framed.take() {
            framed.close().await;
        }
        self.transition(SessionState::Disconnected);
    }

    fn transition(&self, to: SessionState) {
        let from = self.state.send_replace(to);
        if from != to {
            self.logger.on_state_change(from, to);
        }
    }
}

impl<C: Connector> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("state", &self.state())
            .field("provider", &self.provider())
            .finish_non_exhaustive()
    }
}

/// Validates the greeting. Returns true for `* PREAUTH`.
fn check_greeting(greeting: &str) -> Result<bool> {
    let Some(rest) = greeting.strip_prefix("* ") else {
        return Err(Error::InvalidResponse(format!("unexpected greeting: {greeting}")));
    };
    let status = rest.split(' ').next().unwrap_or_default();
    if status.eq_ignore_ascii_case("OK") {
        Ok(false)
    } else if status.eq_ignore_ascii_case("PREAUTH") {
        Ok(true)
    } else if status.eq_ignore_ascii_case("BYE") {
        Err(Error::ConnectionFailed(format!("server refused connection: {greeting}")))
    } else {
        Err(Error::InvalidResponse(format!("unexpected greeting: {greeting}")))
    }
}

/// Anything that goes wrong during LOGIN, short of the server rejecting the
/// credentials, is a protocol error.
fn login_failure(command: &str, error: Error) -> Error {
    match error {
        Error::Protocol(_) | Error::AuthenticationFailed => error,
        other => Error::Protocol(format!("{command} failed: {other}")),
    }
}

/// Sorts UIDs newest first and takes the `[offset, offset + max_results)`
/// window, clamped to what exists.
pub(crate) fn paginate(mut uids: Vec<Uid>, max_results: usize, offset: usize) -> Vec<Uid> {
    uids.sort_unstable_by(|a, b| b.cmp(a));
    uids.into_iter().skip(offset).take(max_results).collect()
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
    use std::time::Duration;

    use proptest::prelude::*;
    use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};
    use tokio_test::io::Builder;

    use super::*;
    use crate::connection::config::Security;
    use crate::logger::RecordingLogger;

    /// Hands out one pre-built stream.
    struct OneShot<S>(std::sync::Mutex<Option<S>>);

    impl<S> OneShot<S> {
        fn new(stream: S) -> Self {
            Self(std::sync::Mutex::new(Some(stream)))
        }
    }

    impl<S: AsyncRead + AsyncWrite + Unpin + Send> Connector for OneShot<S> {
        type Stream = S;

        async fn connect(&self, _config: &ProviderConfig) -> Result<S> {
            self.0
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| Error::ConnectionFailed("stream already taken".into()))
        }
    }

    fn config() -> ProviderConfig {
        ProviderConfig::builder("imap.test.invalid")
            .security(Security::None)
            .command_timeout(Duration::from_millis(200))
            .build()
    }

    fn session<S: AsyncRead + AsyncWrite + Unpin + Send>(stream: S) -> Session<OneShot<S>> {
        Session::with_connector(config(), Credentials::new("u", "p"), OneShot::new(stream))
    }

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    fn uids(ns: &[u32]) -> Vec<Uid> {
        ns.iter().copied().map(uid).collect()
    }

    /// Scripted handshake shared by the mock-stream tests.
    fn handshake() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN \"u\" \"p\"\r\n")
            .read(b"A0001 OK\r\n")
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"* 3 EXISTS\r\nA0002 OK [READ-WRITE] done\r\n");
        builder
    }

    /// Greets, completes LOGIN and SELECT, then goes silent.
    async fn stalling_server(stream: DuplexStream) {
        let (read, mut write) = tokio::io::split(stream);
        let mut lines = BufReader::new(read).lines();
        write.write_all(b"* OK ready\r\n").await.unwrap();
        while let Ok(Some(line)) = lines.next_line().await {
            let tag = line.split(' ').next().unwrap().to_string();
            if line.contains("LOGIN") || line.contains("SELECT") {
                write.write_all(format!("{tag} OK\r\n").as_bytes()).await.unwrap();
            }
        }
    }

    #[test]
    fn test_paginate() {
        let all = uids(&[3, 9, 5]);
        assert_eq!(paginate(all.clone(), 10, 0), uids(&[9, 5, 3]));
        assert_eq!(paginate(all.clone(), 1, 1), uids(&[5]));
        assert_eq!(paginate(all.clone(), 10, 3), uids(&[]));
        assert_eq!(paginate(all.clone(), 10, 99), uids(&[]));
        assert_eq!(paginate(all, 0, 0), uids(&[]));
    }

    proptest! {
        #[test]
        fn paginate_returns_contiguous_descending_window(
            set in proptest::collection::btree_set(1u32..100_000, 0..64),
            max_results in 0usize..80,
            offset in 0usize..80,
        ) {
            let all: Vec<Uid> = set.iter().copied().map(uid).collect();
            let page = paginate(all.clone(), max_results, offset);

            let n = all.len();
            prop_assert_eq!(page.len(), max_results.min(n.saturating_sub(offset)));

            let mut sorted = all;
            sorted.sort_unstable_by(|a, b| b.cmp(a));
            if !page.is_empty() {
                prop_assert_eq!(&sorted[offset..offset + page.len()], &page[..]);
            }
            prop_assert!(page.windows(2).all(|w| w[0] > w[1]));
        }
    }

    #[test]
    fn test_check_greeting() {
        assert!(!check_greeting("* OK ready").unwrap());
        assert!(check_greeting("* PREAUTH welcome back").unwrap());
        assert!(matches!(
            check_greeting("* BYE too many connections"),
            Err(Error::ConnectionFailed(_))
        ));
        assert!(matches!(
            check_greeting("A0001 OK"),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_and_list_uids() {
        let mock = handshake()
            .write(b"A0003 UID SEARCH ALL\r\n")
            .read(b"* SEARCH 3 5 9\r\nA0003 OK\r\n")
            .build();
        let session = session(mock);

        assert_eq!(session.state(), SessionState::Disconnected);
        session.connect().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.greeting(), Some("* OK ready"));

        let list = session.fetch_inbox_uids(10, 0).await.unwrap();
        assert_eq!(list, uids(&[9, 5, 3]));
    }

    #[tokio::test]
    async fn test_connect_when_ready_is_noop() {
        let session = session(handshake().build());
        session.connect().await.unwrap();
        session.connect().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_preauth_skips_login() {
        let mock = Builder::new()
            .read(b"* PREAUTH hello\r\n")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"A0001 OK\r\n")
            .build();
        let session = session(mock);
        session.connect().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_bye_greeting_is_connection_failed() {
        let mock = Builder::new().read(b"* BYE go away\r\n").build();
        let session = session(mock);
        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed(_)));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_login_rejected_is_authentication_failed() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN \"u\" \"p\"\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .build();
        let session = session(mock);
        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_other_login_failure_is_protocol_error() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN \"u\" \"p\"\r\n")
            .read(b"A0001 NO [UNAVAILABLE] Try again later\r\n")
            .build();
        let session = session(mock);
        match session.connect().await {
            Err(Error::Protocol(detail)) => {
                assert!(detail.starts_with("IMAP NO for command: LOGIN <redacted>"));
                assert!(!detail.contains("\"p\""));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hangup_during_login_is_protocol_error() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN \"u\" \"p\"\r\n")
            .build();
        let session = session(mock);
        match session.connect().await {
            Err(Error::Protocol(detail)) => {
                assert_eq!(detail, "LOGIN <redacted> failed: Disconnected from server");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_session_connects_only_once() {
        let mock = handshake()
            .write(b"A0003 LOGOUT\r\n")
            .read(b"* BYE logging out\r\nA0003 OK\r\n")
            .build();
        let session = session(mock);
        session.connect().await.unwrap();
        session.disconnect().await;
        assert_eq!(session.state(), SessionState::Disconnected);

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let session = session(Builder::new().build());
        assert!(matches!(session.noop().await, Err(Error::Disconnected)));
        assert!(matches!(
            session.fetch_inbox_uids(10, 0).await,
            Err(Error::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_trash_sends_store_then_expunge() {
        let mock = handshake()
            .write(b"A0003 UID STORE 42 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0003 OK\r\n")
            .write(b"A0004 EXPUNGE\r\n")
            .read(b"* 1 EXPUNGE\r\nA0004 OK\r\n")
            .build();
        let session = session(mock);
        session.connect().await.unwrap();
        session.trash_message(uid(42)).await.unwrap();
    }

    #[tokio::test]
    async fn test_trash_remaps_no_such_message() {
        let mock = handshake()
            .write(b"A0003 UID STORE 42 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0003 NO no such message\r\n")
            .build();
        let session = session(mock);
        session.connect().await.unwrap();
        let err = session.trash_message(uid(42)).await.unwrap_err();
        assert!(matches!(err, Error::MessageNotFound(u) if u == uid(42)));
    }

    #[tokio::test]
    async fn test_archive_falls_back_to_next_candidate() {
        let mock = handshake()
            .write(b"A0003 UID COPY 7 \"Archive\"\r\n")
            .read(b"A0003 NO [TRYCREATE] Mailbox does not exist\r\n")
            .write(b"A0004 UID COPY 7 \"Archives\"\r\n")
            .read(b"A0004 OK [COPYUID 1 7 1] done\r\n")
            .write(b"A0005 UID STORE 7 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0005 OK\r\n")
            .write(b"A0006 EXPUNGE\r\n")
            .read(b"A0006 OK\r\n")
            .build();
        let session = session(mock);
        session.connect().await.unwrap();
        session
            .archive_message(uid(7), &["Archive", "Archives"])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_archive_treats_server_timeout_text_as_ordinary_failure() {
        let mock = handshake()
            .write(b"A0003 UID COPY 7 \"Archive\"\r\n")
            .read(b"A0003 NO [UNAVAILABLE] Backend lookup timed out\r\n")
            .write(b"A0004 UID COPY 7 \"Archives\"\r\n")
            .read(b"A0004 OK\r\n")
            .write(b"A0005 UID STORE 7 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0005 OK\r\n")
            .write(b"A0006 EXPUNGE\r\n")
            .read(b"A0006 OK\r\n")
            .build();
        let session = session(mock);
        session.connect().await.unwrap();
        session
            .archive_message(uid(7), &["Archive", "Archives"])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_archive_stops_when_connection_is_lost() {
        let mock = handshake()
            .write(b"A0003 UID COPY 7 \"Archive\"\r\n")
            .build();
        let session = session(mock);
        session.connect().await.unwrap();
        let err = session
            .archive_message(uid(7), &["Archive", "Archives"])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Disconnected));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_archive_reraises_last_error() {
        let mock = handshake()
            .write(b"A0003 UID COPY 7 \"A\"\r\n")
            .read(b"A0003 NO first\r\n")
            .write(b"A0004 UID COPY 7 \"B\"\r\n")
            .read(b"A0004 BAD second\r\n")
            .build();
        let session = session(mock);
        session.connect().await.unwrap();
        match session.archive_message(uid(7), &["A", "B"]).await {
            Err(Error::Protocol(detail)) => {
                assert!(detail.contains("BAD") && detail.contains("second"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_archive_without_candidates() {
        let session = session(handshake().build());
        session.connect().await.unwrap();
        let empty: [&str; 0] = [];
        match session.archive_message(uid(7), &empty).await {
            Err(Error::Protocol(detail)) => assert_eq!(detail, "no candidates"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_desynchronizes_session() {
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(stalling_server(server));
        let session = session(client);
        session.connect().await.unwrap();

        let started = Instant::now();
        let err = session.noop().await.unwrap_err();
        assert!(err.is_timeout(), "{err}");
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(session.is_connected());

        match session.noop().await {
            Err(Error::Protocol(detail)) => assert!(detail.contains("desynchronized")),
            other => panic!("unexpected {other:?}"),
        }

        session.disconnect().await;
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_server_hangup_is_disconnected() {
        let mock = handshake().write(b"A0003 NOOP\r\n").build();
        let session = session(mock);
        session.connect().await.unwrap();
        assert!(matches!(session.noop().await, Err(Error::Disconnected)));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_logger_sees_redacted_login_and_transitions() {
        let logger = Arc::new(RecordingLogger::new());
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN \"alice\" \"hunter2\"\r\n")
            .read(b"A0001 OK\r\n")
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"A0002 OK\r\n")
            .build();
        let session = Session::with_connector(
            config(),
            Credentials::new("alice", "hunter2"),
            OneShot::new(mock),
        )
        .with_logger(logger.clone());
        session.connect().await.unwrap();

        let lines = logger.lines();
        assert!(lines.contains(&"C: A0001 LOGIN <redacted>".to_string()));
        assert!(lines.contains(&"state: LoggedIn -> Ready".to_string()));
        assert!(lines.iter().all(|line| !line.contains("hunter2") && !line.contains("alice")));
    }
}
