//! Core IMAP identifiers.
//!
//! Types for command tags and message UIDs.

use std::num::NonZeroU32;
use std::str::FromStr;

use thiserror::Error;

/// IMAP command tag.
///
/// Each command sent by the client carries a unique tag, and the server's
/// completion line repeats it so the response can be correlated with the
/// command that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(pub String);

impl Tag {
    /// Creates a new tag from a string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the tag as raw bytes, for scanning the receive buffer.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a message within a mailbox.
///
/// UIDs are assigned by the server in increasing order and never reused
/// within a mailbox, which is why sorting them descending gives a
/// newest-first ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(pub NonZeroU32);

impl Uid {
    /// Creates a new UID.
    ///
    /// Returns `None` if the value is 0.
    #[must_use]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    /// Returns the underlying value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a string is not a valid UID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid UID {0:?}: expected a non-zero decimal number")]
pub struct ParseUidError(pub String);

impl FromStr for Uid {
    type Err = ParseUidError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseUidError(s.to_string()));
        }
        s.parse::<u32>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| ParseUidError(s.to_string()))
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

    #[test]
    fn test_tag() {
        let tag = Tag::new("A0001");
        assert_eq!(tag.as_str(), "A0001");
        assert_eq!(tag.as_bytes(), b"A0001");
        assert_eq!(tag.to_string(), "A0001");
    }

    #[test]
    fn test_uid_new() {
        assert!(Uid::new(0).is_none());
        assert_eq!(Uid::new(123).unwrap().get(), 123);
    }

    #[test]
    fn test_uid_from_str() {
        assert_eq!("42".parse::<Uid>().unwrap().get(), 42);
        assert_eq!("4294967295".parse::<Uid>().unwrap().get(), u32::MAX);
    }

    #[test]
    fn test_uid_from_str_rejects_garbage() {
        // Anything that is not a plain number must never reach the wire.
        for input in ["", "0", "-1", "+5", "12 34", "1:*", "7)\r\nA1 LOGOUT", "4294967296"] {
            assert!(input.parse::<Uid>().is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_uid_ordering() {
        let mut uids = vec![Uid::new(3).unwrap(), Uid::new(9).unwrap(), Uid::new(5).unwrap()];
        uids.sort_unstable_by(|a, b| b.cmp(a));
        let rendered: Vec<String> = uids.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["9", "5", "3"]);
    }
}
