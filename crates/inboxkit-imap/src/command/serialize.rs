//! Command serialization helpers.

use crate::{Error, Result};

use crate::types::Flag;

use super::types::FetchAttribute;

/// Writes an IMAP quoted string: `"` and `\` are escaped with a backslash.
///
/// Quoted strings cannot carry CR, LF or NUL, so those are rejected instead
/// of letting a crafted argument terminate the command line early.
pub fn write_quoted(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    if s.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) {
        return Err(Error::Protocol(
            "argument contains a character that cannot be quoted".into(),
        ));
    }
    buf.push(b'"');
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');
    Ok(())
}

/// Writes a parenthesized FETCH attribute list.
pub fn write_fetch_attributes(buf: &mut Vec<u8>, attrs: &[FetchAttribute]) {
    buf.push(b'(');
    for (i, attr) in attrs.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        buf.extend_from_slice(attr.as_str().as_bytes());
    }
    buf.push(b')');
}

/// Writes a STORE data item such as `+FLAGS.SILENT (\Deleted)`.
pub fn write_add_flags_silent(buf: &mut Vec<u8>, flags: &[Flag]) {
    buf.extend_from_slice(b"+FLAGS.SILENT (");
    for (i, flag) in flags.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        buf.extend_from_slice(flag.as_str().as_bytes());
    }
    buf.push(b')');
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn quoted(s: &str) -> String {
        let mut buf = Vec::new();
        write_quoted(&mut buf, s).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_quoted_escaping() {
        assert_eq!(quoted("user"), "\"user\"");
        assert_eq!(quoted(""), "\"\"");
        assert_eq!(quoted("pa\"ss"), "\"pa\\\"ss\"");
        assert_eq!(quoted("back\\slash"), "\"back\\\\slash\"");
        assert_eq!(quoted("[Gmail]/All Mail"), "\"[Gmail]/All Mail\"");
    }

    #[test]
    fn test_quoted_rejects_line_breaks() {
        let mut buf = Vec::new();
        assert!(write_quoted(&mut buf, "pass\r\nA9 LOGOUT").is_err());
        assert!(write_quoted(&mut buf, "nul\0").is_err());
    }

    #[test]
    fn test_add_flags_silent() {
        let mut buf = Vec::new();
        write_add_flags_silent(&mut buf, &[Flag::Deleted]);
        assert_eq!(buf, b"+FLAGS.SILENT (\\Deleted)");

        let mut buf = Vec::new();
        write_add_flags_silent(&mut buf, &[Flag::Deleted, Flag::Seen]);
        assert_eq!(buf, b"+FLAGS.SILENT (\\Deleted \\Seen)");
    }

    #[test]
    fn test_fetch_attributes() {
        let mut buf = Vec::new();
        write_fetch_attributes(
            &mut buf,
            &[
                FetchAttribute::Flags,
                FetchAttribute::InternalDate,
                FetchAttribute::Rfc822,
            ],
        );
        assert_eq!(buf, b"(FLAGS INTERNALDATE RFC822)");
    }
}
