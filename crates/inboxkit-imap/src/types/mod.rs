//! Core IMAP types.
//!
//! The identifiers, flags and message shape shared by the framer, the
//! response parsers and the session.

#![allow(clippy::missing_const_for_fn)]

mod flags;
mod identifiers;
mod message;

pub use flags::{Flag, Flags};
pub use identifiers::{ParseUidError, Tag, Uid};
pub use message::FetchedMessage;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn test_fetched_message_size() {
        let message = FetchedMessage {
            uid: Uid::new(9).unwrap(),
            flags: Flags::from_tokens(["\\Seen"]),
            internal_date: None,
            raw: Bytes::from_static(b"Subject: hi\r\n\r\nbody\r\n"),
        };
        assert_eq!(message.size(), 21);
        assert!(message.flags.is_seen());
    }
}
