//! Protocol diagnostics sink.
//!
//! A [`Session`](crate::Session) reports what it sends and receives through a
//! [`ProtocolLogger`] handed to it at construction, so nothing in the engine
//! depends on a process-wide logger.
//!
//! Command text reaching a logger has already been redacted: `LOGIN`
//! arguments are replaced by [`REDACTED`](crate::command::REDACTED).
//!
//! # Example
//!
//! ```ignore
//! use inboxkit_imap::logger::ProtocolLogger;
//!
//! struct Counter(std::sync::atomic::AtomicUsize);
//!
//! impl ProtocolLogger for Counter {
//!     fn on_command(&self, _tag: &Tag, _command: &str) {
//!         self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!     }
//! }
//! ```

use std::sync::Mutex;
use std::time::Duration;

use crate::Error;
use crate::connection::SessionState;
use crate::response::Completion;
use crate::types::Tag;

/// Receives protocol events from a session.
///
/// Every method has an empty default, so implementors pick what they need.
pub trait ProtocolLogger: Send + Sync {
    /// A command was written. `command` is redacted.
    fn on_command(&self, tag: &Tag, command: &str) {
        let _ = (tag, command);
    }

    /// The tagged completion for `tag` arrived after `elapsed`.
    fn on_completion(&self, tag: &Tag, completion: &Completion, elapsed: Duration) {
        let _ = (tag, completion, elapsed);
    }

    /// The server greeting was read.
    fn on_greeting(&self, text: &str) {
        let _ = text;
    }

    /// The session moved between lifecycle states.
    fn on_state_change(&self, from: SessionState, to: SessionState) {
        let _ = (from, to);
    }

    /// A command failed. `command` is redacted.
    fn on_error(&self, command: &str, error: &Error) {
        let _ = (command, error);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl ProtocolLogger for NullLogger {}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl ProtocolLogger for TracingLogger {
    fn on_command(&self, tag: &Tag, command: &str) {
        tracing::debug!(%tag, command, "C:");
    }

    fn on_completion(&self, tag: &Tag, completion: &Completion, elapsed: Duration) {
        if completion.status.is_failure() {
            tracing::warn!(
                %tag,
                status = %completion.status,
                text = %completion.text,
                ?elapsed,
                "S:"
            );
        } else {
            tracing::trace!(
                %tag,
                status = %completion.status,
                text = %completion.text,
                ?elapsed,
                "S:"
            );
        }
    }

    fn on_greeting(&self, text: &str) {
        tracing::debug!(text, "greeting");
    }

    fn on_state_change(&self, from: SessionState, to: SessionState) {
        tracing::info!(?from, ?to, "session state");
    }

    fn on_error(&self, command: &str, error: &Error) {
        tracing::warn!(command, %error, "command failed");
    }
}

/// Keeps every event as a formatted line. Useful in tests.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<String>>,
}

impl RecordingLogger {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl ProtocolLogger for RecordingLogger {
    fn on_command(&self, tag: &Tag, command: &str) {
        self.push(format!("C: {tag} {command}"));
    }

    fn on_completion(&self, tag: &Tag, completion: &Completion, _elapsed: Duration) {
        self.push(format!("S: {tag} {} {}", completion.status, completion.text));
    }

    fn on_greeting(&self, text: &str) {
        self.push(format!("S: {text}"));
    }

    fn on_state_change(&self, from: SessionState, to: SessionState) {
        self.push(format!("state: {from:?} -> {to:?}"));
    }

    fn on_error(&self, command: &str, error: &Error) {
        self.push(format!("error: {command}: {error}"));
    }
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
    use super::*;
    use crate::response::Status;

    #[test]
    fn test_recording_logger() {
        let logger = RecordingLogger::new();
        let tag = Tag::new("A0001");
        logger.on_command(&tag, "SELECT INBOX");
        logger.on_completion(
            &tag,
            &Completion {
                status: Status::Ok,
                text: "done".into(),
            },
            Duration::from_millis(3),
        );
        logger.on_state_change(SessionState::LoggedIn, SessionState::Ready);

        assert_eq!(
            logger.lines(),
            vec![
                "C: A0001 SELECT INBOX".to_string(),
                "S: A0001 OK done".to_string(),
                "state: LoggedIn -> Ready".to_string(),
            ]
        );
    }

    #[test]
    fn test_null_and_tracing_loggers_accept_events() {
        let tag = Tag::new("A0002");
        for logger in [&NullLogger as &dyn ProtocolLogger, &TracingLogger] {
            logger.on_command(&tag, "NOOP");
            logger.on_greeting("* OK ready");
            logger.on_error("NOOP", &Error::Disconnected);
        }
    }
}
