//! Fetched message representation.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};

use super::{Flags, Uid};

/// A message retrieved with `UID FETCH <uid> (FLAGS INTERNALDATE RFC822)`.
///
/// The body is kept as the exact bytes the server sent; MIME decoding is
/// left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    /// Server-assigned UID.
    pub uid: Uid,
    /// Flags in the order the server listed them.
    pub flags: Flags,
    /// Server-reported arrival time, if present and parsable.
    pub internal_date: Option<DateTime<FixedOffset>>,
    /// Raw RFC 822 message bytes.
    pub raw: Bytes,
}

impl FetchedMessage {
    /// Returns the size of the raw message in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.raw.len()
    }
}
