//! Error types for the IMAP engine.

use thiserror::Error;

use crate::types::Uid;

/// Errors that can occur during IMAP operations.
///
/// The engine never retries: every failure is surfaced here and the caller
/// decides whether to reconnect or give up.
#[derive(Debug, Error)]
pub enum Error {
    /// The socket could not be opened, the TLS handshake failed, or the
    /// server refused the session in its greeting.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The socket is gone (unexpected EOF or I/O failure on an open stream),
    /// or no connection has been established yet.
    #[error("Disconnected from server")]
    Disconnected,

    /// Generic protocol failure: a NO/BAD completion, a timeout, or a misuse
    /// of the session.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server rejected the LOGIN credentials.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// The message does not exist on the server (already deleted or moved).
    #[error("Message not found: UID {0}")]
    MessageNotFound(Uid),

    /// The server sent output that could not be parsed.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Returns true if this is the benign "message already gone" condition.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::MessageNotFound(_))
    }

    /// Returns true if this error was raised because a command deadline passed.
    ///
    /// Only the dispatcher's own deadline error counts; server text that
    /// happens to mention a timeout does not.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Protocol(detail)
                if detail.starts_with(TIMEOUT_PREFIX) && detail.contains(TIMEOUT_MARKER)
        )
    }

    /// The error a command gets when its deadline passes.
    pub(crate) fn command_timeout(command: &str, limit: std::time::Duration) -> Self {
        Self::Protocol(format!(
            "{TIMEOUT_PREFIX}{command}{TIMEOUT_MARKER}{}ms",
            limit.as_millis()
        ))
    }

    /// Maps an I/O failure on an established stream.
    #[allow(clippy::needless_pass_by_value)]
    pub(crate) fn from_stream_io(err: std::io::Error) -> Self {
        tracing::debug!(error = %err, "stream I/O failure");
        Self::Disconnected
    }
}

const TIMEOUT_PREFIX: &str = "command ";
const TIMEOUT_MARKER: &str = " timed out after ";

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        let uid = Uid::new(42).unwrap();
        assert!(Error::MessageNotFound(uid).is_not_found());
        assert!(!Error::Protocol("IMAP NO".into()).is_not_found());
    }

    #[test]
    fn test_is_timeout() {
        let err = Error::command_timeout("NOOP", std::time::Duration::from_secs(20));
        assert_eq!(err.to_string(), "Protocol error: command NOOP timed out after 20000ms");
        assert!(err.is_timeout());
        assert!(!Error::Protocol("IMAP BAD for command: NOOP".into()).is_timeout());
        assert!(!Error::Disconnected.is_timeout());
    }

    #[test]
    fn test_server_text_mentioning_timeout_is_not_a_timeout() {
        let err = Error::Protocol(
            "IMAP NO for command: UID COPY 7 \"Archive\" \
             ([UNAVAILABLE] Backend lookup timed out after 5s)"
                .into(),
        );
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_display() {
        let uid = Uid::new(7).unwrap();
        assert_eq!(Error::MessageNotFound(uid).to_string(), "Message not found: UID 7");
        assert_eq!(Error::AuthenticationFailed.to_string(), "Authentication failed");
    }
}
