//! Server responses: completion classification and payload parsing.
//!
//! The framer hands over one block per command: zero or more untagged units
//! followed by the tagged completion line. [`Response`] splits that block,
//! and the submodules extract the data each operation needs.

mod fetch;
pub mod lexer;
mod search;

use std::fmt;

use bytes::Bytes;

use crate::connection::framed::{strip_cr, unit_end};
use crate::types::Tag;
use crate::{Error, Result};

pub use fetch::parse_fetch;
pub use lexer::{Lexer, Token};
pub use search::parse_search;

/// Status of a tagged completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command succeeded.
    Ok,
    /// Command failed.
    No,
    /// Command was rejected as invalid.
    Bad,
}

impl Status {
    fn parse(word: &[u8]) -> Option<Self> {
        if word.eq_ignore_ascii_case(b"OK") {
            Some(Self::Ok)
        } else if word.eq_ignore_ascii_case(b"NO") {
            Some(Self::No)
        } else if word.eq_ignore_ascii_case(b"BAD") {
            Some(Self::Bad)
        } else {
            None
        }
    }

    /// Returns true for `NO` and `BAD`.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        !matches!(self, Self::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
        })
    }
}

/// A tagged completion line: `<tag> OK|NO|BAD [free text]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Completion status.
    pub status: Status,
    /// Free text after the status, including any `[CODE]`.
    pub text: String,
}

impl Completion {
    /// Parses a completion line for `tag`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if the line does not start with the tag or
    /// the status is not `OK`, `NO` or `BAD`.
    pub fn parse(line: &[u8], tag: &Tag) -> Result<Self> {
        let line = strip_cr(line.strip_suffix(b"\n").unwrap_or(line));
        let invalid = || {
            Error::InvalidResponse(format!(
                "unparsable completion: {}",
                String::from_utf8_lossy(line)
            ))
        };

        let rest = line
            .strip_prefix(tag.as_bytes())
            .and_then(|rest| rest.strip_prefix(b" "))
            .ok_or_else(invalid)?;
        let (word, text) = match rest.iter().position(|&b| b == b' ') {
            Some(sp) => (&rest[..sp], &rest[sp + 1..]),
            None => (rest, &b""[..]),
        };
        let status = Status::parse(word).ok_or_else(invalid)?;

        Ok(Self {
            status,
            text: String::from_utf8_lossy(text).trim().to_string(),
        })
    }

    /// Turns a `NO`/`BAD` completion into a protocol error naming the
    /// (already redacted) command.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` unless the status is `OK`.
    pub fn check(&self, command: &str) -> Result<()> {
        if !self.status.is_failure() {
            return Ok(());
        }
        let mut detail = format!("IMAP {} for command: {command}", self.status);
        if !self.text.is_empty() {
            detail.push_str(" (");
            detail.push_str(&self.text);
            detail.push(')');
        }
        Err(Error::Protocol(detail))
    }
}

/// The complete response to one command.
#[derive(Debug, Clone)]
pub struct Response {
    block: Bytes,
    completion_start: usize,
    completion: Completion,
}

impl Response {
    /// Splits a block read by the framer into untagged data and the
    /// completion for `tag`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if the last line is not a valid completion.
    pub fn parse(block: Bytes, tag: &Tag) -> Result<Self> {
        // The block ends with the tagged line, which never spans lines.
        let body = block.strip_suffix(b"\n").unwrap_or(&block[..]);
        let completion_start = body
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |lf| lf + 1);
        let completion = Completion::parse(&block[completion_start..], tag)?;
        Ok(Self {
            block,
            completion_start,
            completion,
        })
    }

    /// Returns the tagged completion.
    #[must_use]
    pub const fn completion(&self) -> &Completion {
        &self.completion
    }

    /// Returns the completion status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.completion.status
    }

    /// Returns the raw block, untagged data and completion line included.
    #[must_use]
    pub const fn block(&self) -> &Bytes {
        &self.block
    }

    /// Iterates over the untagged units (each line with its literals).
    #[must_use]
    pub fn untagged(&self) -> Units<'_> {
        Units {
            data: &self.block[..self.completion_start],
            pos: 0,
        }
    }
}

/// Iterator over the untagged units of a [`Response`].
pub struct Units<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Units<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        // The framer only cuts complete units, so an unterminated tail can
        // only be a trailing fragment.
        let end = match unit_end(self.data, self.pos) {
            Ok(Some(end)) => end,
            Ok(None) | Err(_) => self.data.len(),
        };
        let unit = &self.data[self.pos..end];
        self.pos = end;
        Some(unit)
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

    fn response(raw: &'static [u8], tag: &str) -> Result<Response> {
        Response::parse(Bytes::from_static(raw), &Tag::new(tag))
    }

    #[test]
    fn test_completion_statuses() {
        let tag = Tag::new("A0001");
        let ok = Completion::parse(b"A0001 OK LOGIN completed\r\n", &tag).unwrap();
        assert_eq!(ok.status, Status::Ok);
        assert_eq!(ok.text, "LOGIN completed");

        let no = Completion::parse(b"A0001 no [NONEXISTENT] gone\r\n", &tag).unwrap();
        assert_eq!(no.status, Status::No);
        assert_eq!(no.text, "[NONEXISTENT] gone");

        let bad = Completion::parse(b"A0001 BAD\r\n", &tag).unwrap();
        assert_eq!(bad.status, Status::Bad);
        assert_eq!(bad.text, "");
    }

    #[test]
    fn test_completion_unknown_status_is_invalid() {
        let err = Completion::parse(b"A0001 MAYBE later\r\n", &Tag::new("A0001")).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_completion_wrong_tag_is_invalid() {
        let err = Completion::parse(b"A0002 OK\r\n", &Tag::new("A0001")).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_check_no_and_bad() {
        let tag = Tag::new("A0003");
        let no = Completion::parse(b"A0003 NO Mailbox does not exist\r\n", &tag).unwrap();
        match no.check("UID COPY 7 \"Archive\"") {
            Err(Error::Protocol(detail)) => {
                assert_eq!(
                    detail,
                    "IMAP NO for command: UID COPY 7 \"Archive\" (Mailbox does not exist)"
                );
            }
            other => panic!("unexpected {other:?}"),
        }

        let bad = Completion::parse(b"A0003 BAD\r\n", &tag).unwrap();
        match bad.check("NOOP") {
            Err(Error::Protocol(detail)) => assert_eq!(detail, "IMAP BAD for command: NOOP"),
            other => panic!("unexpected {other:?}"),
        }

        let ok = Completion::parse(b"A0003 OK\r\n", &tag).unwrap();
        assert!(ok.check("NOOP").is_ok());
    }

    #[test]
    fn test_response_splits_untagged_units() {
        let resp = response(
            b"* 1 FETCH (RFC822 {5}\r\nAB\r\nC)\r\n* 2 EXISTS\r\nA0004 OK done\r\n",
            "A0004",
        )
        .unwrap();
        let units: Vec<&[u8]> = resp.untagged().collect();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0], b"* 1 FETCH (RFC822 {5}\r\nAB\r\nC)\r\n");
        assert_eq!(units[1], b"* 2 EXISTS\r\n");
        assert_eq!(resp.status(), Status::Ok);
        assert_eq!(resp.completion().text, "done");
    }

    #[test]
    fn test_response_without_untagged_data() {
        let resp = response(b"A0001 OK\r\n", "A0001").unwrap();
        assert_eq!(resp.untagged().count(), 0);
    }

    #[test]
    fn test_response_with_bare_lf() {
        let resp = response(b"* SEARCH 1\nA0001 OK\n", "A0001").unwrap();
        assert_eq!(resp.untagged().count(), 1);
        assert_eq!(resp.status(), Status::Ok);
    }
}
