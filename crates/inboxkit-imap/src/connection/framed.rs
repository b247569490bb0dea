//! Framed I/O for the IMAP protocol.
//!
//! Server output is a sequence of CRLF-terminated lines, any of which may
//! end in a literal marker `{n}` announcing exactly `n` raw bytes that follow
//! the CRLF. Those bytes can contain CRLF themselves, so framing counts them
//! instead of splitting on newlines.
//!
//! All offsets here are byte offsets into the receive buffer. Nothing is
//! decoded to text until a complete tagged block has been cut out.

#![allow(clippy::missing_errors_doc)]

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::types::Tag;
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
pub(crate) const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum literal size to prevent memory exhaustion.
pub(crate) const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// Result of scanning the buffer for a tagged completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scan {
    /// The block for the tag ends at this offset (exclusive, after CRLF).
    Complete(usize),
    /// More bytes are needed. Everything before `resume` is made of complete
    /// untagged units and does not need rescanning.
    Incomplete {
        /// Offset of the first unit that is not yet complete.
        resume: usize,
    },
}

/// Framed connection: a byte stream plus its receive buffer.
pub struct FramedStream<S> {
    stream: S,
    buffer: BytesMut,
    scanned: usize,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            scanned: 0,
        }
    }

    /// Reads one line (the server greeting), including its CRLF.
    pub async fn read_line(&mut self) -> Result<Bytes> {
        loop {
            if let Some(lf) = find_lf(&self.buffer, 0) {
                self.scanned = 0;
                return Ok(self.buffer.split_to(lf + 1).freeze());
            }
            if self.buffer.len() > MAX_LINE_LENGTH {
                return Err(Error::InvalidResponse("line too long".into()));
            }
            self.fill().await?;
        }
    }

    /// Reads until the completion line for `tag` has arrived and returns the
    /// whole block: untagged lines, their literals, and the tagged line.
    pub async fn read_tagged(&mut self, tag: &Tag) -> Result<Bytes> {
        loop {
            match scan_tagged(&self.buffer, self.scanned, tag)? {
                Scan::Complete(end) => {
                    self.scanned = 0;
                    return Ok(self.buffer.split_to(end).freeze());
                }
                Scan::Incomplete { resume } => {
                    self.scanned = resume;
                    self.fill().await?;
                }
            }
        }
    }

    /// Writes a serialized command and flushes it.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        self.stream
            .write_all(data)
            .await
            .map_err(Error::from_stream_io)?;
        self.stream.flush().await.map_err(Error::from_stream_io)
    }

    /// Shuts the stream down and drops any buffered bytes.
    pub async fn close(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!(error = %e, "error while shutting down stream");
        }
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buffer.len()
    }

    async fn fill(&mut self) -> Result<()> {
        self.buffer.reserve(DEFAULT_BUFFER_SIZE);
        let n = self
            .stream
            .read_buf(&mut self.buffer)
            .await
            .map_err(Error::from_stream_io)?;
        if n == 0 {
            tracing::debug!(buffered = self.buffer.len(), "server closed the connection");
            return Err(Error::Disconnected);
        }
        Ok(())
    }
}

/// Scans `buf` from `from` for a line that starts with `<tag> ` at a unit
/// boundary.
///
/// `from` must be a unit boundary (0, or a `resume` previously returned for
/// the same buffer contents).
pub(crate) fn scan_tagged(buf: &[u8], from: usize, tag: &Tag) -> Result<Scan> {
    let mut pos = from;
    while pos < buf.len() {
        if starts_with_tag(&buf[pos..], tag) {
            return match find_lf(buf, pos) {
                Some(lf) => Ok(Scan::Complete(lf + 1)),
                None if buf.len() - pos > MAX_LINE_LENGTH => {
                    Err(Error::InvalidResponse("line too long".into()))
                }
                None => Ok(Scan::Incomplete { resume: pos }),
            };
        }
        match unit_end(buf, pos)? {
            Some(end) => pos = end,
            None => return Ok(Scan::Incomplete { resume: pos }),
        }
    }
    Ok(Scan::Incomplete { resume: pos })
}

/// Returns the end of the response unit starting at `start`: its line, each
/// literal announced at a line end, and the continuation lines after them.
///
/// Returns `Ok(None)` when the buffer ends before the unit does.
pub(crate) fn unit_end(buf: &[u8], start: usize) -> Result<Option<usize>> {
    let mut pos = start;
    loop {
        let Some(lf) = find_lf(buf, pos) else {
            if buf.len() - pos > MAX_LINE_LENGTH {
                return Err(Error::InvalidResponse("line too long".into()));
            }
            return Ok(None);
        };
        if lf - pos > MAX_LINE_LENGTH {
            return Err(Error::InvalidResponse("line too long".into()));
        }

        let line = strip_cr(&buf[pos..lf]);
        let Some(size) = literal_length(line)? else {
            return Ok(Some(lf + 1));
        };
        if size > MAX_LITERAL_SIZE {
            return Err(Error::InvalidResponse(format!(
                "literal too large: {size} bytes (max {MAX_LITERAL_SIZE})"
            )));
        }

        let after_literal = lf + 1 + size;
        if after_literal > buf.len() {
            return Ok(None);
        }
        pos = after_literal;
    }
}

/// Parses a literal marker at the end of a line (CRLF already stripped).
///
/// Matches `{123}` and the non-synchronizing `{123+}`.
pub(crate) fn literal_length(line: &[u8]) -> Result<Option<usize>> {
    let Some(inner) = line.strip_suffix(b"}") else {
        return Ok(None);
    };
    let Some(open) = inner.iter().rposition(|&b| b == b'{') else {
        return Ok(None);
    };
    let digits = &inner[open + 1..];
    let digits = digits.strip_suffix(b"+").unwrap_or(digits);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Ok(None);
    }

    // All ASCII digits, so the only possible failure is overflow.
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .map(Some)
        .ok_or_else(|| Error::InvalidResponse("literal length out of range".into()))
}

fn starts_with_tag(rest: &[u8], tag: &Tag) -> bool {
    let tag = tag.as_bytes();
    rest.len() > tag.len() && rest.starts_with(tag) && rest[tag.len()] == b' '
}

pub(crate) fn find_lf(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| from + i)
}

pub(crate) fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
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
    use proptest::prelude::*;
    use tokio_test::io::Builder;

    use super::*;

    fn tag(s: &str) -> Tag {
        Tag::new(s)
    }

    #[test]
    fn test_literal_length() {
        assert_eq!(literal_length(b"BODY {123}").unwrap(), Some(123));
        assert_eq!(literal_length(b"BODY {123+}").unwrap(), Some(123));
        assert_eq!(literal_length(b"{0}").unwrap(), Some(0));
        assert_eq!(literal_length(b"no literal").unwrap(), None);
        assert_eq!(literal_length(b"incomplete {123").unwrap(), None);
        assert_eq!(literal_length(b"wrong {abc}").unwrap(), None);
        assert_eq!(literal_length(b"empty {}").unwrap(), None);
        assert!(literal_length(b"{99999999999999999999999999}").is_err());
    }

    #[test]
    fn test_unit_end_plain_line() {
        let buf = b"* SEARCH 3 5 9\r\nA0003 OK\r\n";
        assert_eq!(unit_end(buf, 0).unwrap(), Some(16));
    }

    #[test]
    fn test_unit_end_skips_literal_with_embedded_crlf() {
        let buf = b"* 1 FETCH (RFC822 {5}\r\nAB\r\nC)\r\nA0001 OK\r\n";
        let end = unit_end(buf, 0).unwrap().unwrap();
        assert_eq!(&buf[..end], b"* 1 FETCH (RFC822 {5}\r\nAB\r\nC)\r\n");
    }

    #[test]
    fn test_unit_end_incomplete_literal() {
        let buf = b"* 1 FETCH (RFC822 {10}\r\nshort";
        assert_eq!(unit_end(buf, 0).unwrap(), None);
    }

    #[test]
    fn test_scan_finds_own_tag_only() {
        let buf = b"* OK A0002 is not a tag here\r\nA0001 OK done\r\nA0002 OK\r\n";
        assert_eq!(
            scan_tagged(buf, 0, &tag("A0002")).unwrap(),
            Scan::Complete(buf.len())
        );
        assert_eq!(
            scan_tagged(buf, 0, &tag("A0001")).unwrap(),
            Scan::Complete(45)
        );
    }

    #[test]
    fn test_scan_ignores_tag_inside_literal() {
        let buf = b"* 1 FETCH (RFC822 {14}\r\nA0004 OK lie\r\n)\r\nA0004 OK real\r\n";
        let Scan::Complete(end) = scan_tagged(buf, 0, &tag("A0004")).unwrap() else {
            panic!("expected a complete block");
        };
        assert_eq!(end, buf.len());
    }

    #[test]
    fn test_scan_requires_space_after_tag() {
        let buf = b"A00010 OK other\r\n";
        assert_eq!(
            scan_tagged(buf, 0, &tag("A0001")).unwrap(),
            Scan::Incomplete { resume: buf.len() }
        );
    }

    #[test]
    fn test_scan_accepts_bare_lf() {
        let buf = b"* SEARCH 1\nA0003 OK\n";
        assert_eq!(
            scan_tagged(buf, 0, &tag("A0003")).unwrap(),
            Scan::Complete(buf.len())
        );
    }

    #[test]
    fn test_scan_resume_point() {
        let buf = b"* SEARCH 1 2\r\nA0003 O";
        assert_eq!(
            scan_tagged(buf, 0, &tag("A0003")).unwrap(),
            Scan::Incomplete { resume: 14 }
        );
    }

    #[tokio::test]
    async fn test_read_line() {
        let mock = Builder::new().read(b"* OK ready\r\nA0001").build();
        let mut framed = FramedStream::new(mock);

        let line = framed.read_line().await.unwrap();
        assert_eq!(&line[..], b"* OK ready\r\n");
        assert_eq!(framed.buffered(), 5);
    }

    #[tokio::test]
    async fn test_read_tagged_with_literal_across_reads() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (UID 7 RFC822 {5}\r\nAB")
            .read(b"\r\nC)\r\nA00")
            .read(b"01 OK FETCH completed\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let block = framed.read_tagged(&tag("A0001")).await.unwrap();
        assert_eq!(
            &block[..],
            b"* 1 FETCH (UID 7 RFC822 {5}\r\nAB\r\nC)\r\nA0001 OK FETCH completed\r\n"
        );
        assert_eq!(framed.buffered(), 0);
    }

    #[tokio::test]
    async fn test_read_tagged_leaves_following_bytes() {
        let mock = Builder::new()
            .read(b"A0001 OK\r\n* 4 EXISTS\r\nA0002 OK\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let first = framed.read_tagged(&tag("A0001")).await.unwrap();
        assert_eq!(&first[..], b"A0001 OK\r\n");
        let second = framed.read_tagged(&tag("A0002")).await.unwrap();
        assert_eq!(&second[..], b"* 4 EXISTS\r\nA0002 OK\r\n");
    }

    #[tokio::test]
    async fn test_eof_is_disconnected() {
        let mock = Builder::new().read(b"* SEARCH 1").build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_tagged(&tag("A0001")).await.unwrap_err();
        assert!(matches!(err, Error::Disconnected));
    }

    #[tokio::test]
    async fn test_write_command() {
        let mock = Builder::new().write(b"A0001 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_command(b"A0001 NOOP\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_literal_size_validation() {
        let header = format!("* 1 FETCH (RFC822 {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_tagged(&tag("A0001")).await.unwrap_err();
        assert!(err.to_string().contains("literal too large"));
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_tagged(&tag("A0001")).await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }

    proptest! {
        // Where the network happens to split the stream never changes the frame.
        #[test]
        fn scan_is_independent_of_chunking(cut in 0usize..64) {
            let block: &[u8] =
                b"* 9 FETCH (FLAGS (\\Seen) RFC822 {12}\r\nA0005 OK\r\n\r\n)\r\nA0005 OK done\r\n";
            let cut = cut.min(block.len());
            let scan = scan_tagged(&block[..cut], 0, &tag("A0005")).unwrap();
            let resume = match scan {
                Scan::Complete(end) => {
                    prop_assert_eq!(end, block.len());
                    return Ok(());
                }
                Scan::Incomplete { resume } => resume,
            };
            prop_assert!(resume <= cut);
            prop_assert_eq!(
                scan_tagged(block, resume, &tag("A0005")).unwrap(),
                Scan::Complete(block.len())
            );
        }
    }
}
