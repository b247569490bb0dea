//! `* n FETCH (...)` payload parsing.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};

use super::lexer::{Lexer, Token};
use super::Response;
use crate::types::{FetchedMessage, Flag, Flags, Uid};
use crate::{Error, Result};

/// IMAP `date-time` format: `dd-MMM-yyyy HH:mm:ss +zzzz`.
const INTERNALDATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S %z";

/// The items of one FETCH line that this engine cares about.
#[derive(Debug, Default)]
struct FetchItems {
    uid: Option<Uid>,
    flags: Flags,
    internal_date: Option<DateTime<FixedOffset>>,
    body: Option<Bytes>,
}

/// Extracts the message fetched with
/// `UID FETCH <uid> (FLAGS INTERNALDATE RFC822)`.
///
/// Unsolicited FETCH lines for other messages are skipped. A line without a
/// `UID` item is accepted when it carries the body, since some servers omit
/// it.
///
/// # Errors
///
/// Returns `InvalidResponse` if a FETCH line is malformed or no line carries
/// an RFC822 literal.
pub fn parse_fetch(response: &Response, uid: Uid) -> Result<FetchedMessage> {
    let mut fallback = None;

    for unit in response.untagged() {
        let Some(items) = parse_fetch_line(unit, response.block())? else {
            continue;
        };
        if items.body.is_none() {
            continue;
        }
        match items.uid {
            Some(found) if found == uid => return Ok(into_message(items, uid)),
            Some(_) => {}
            None => {
                if fallback.is_none() {
                    fallback = Some(items);
                }
            }
        }
    }

    fallback
        .map(|items| into_message(items, uid))
        .ok_or_else(|| {
            Error::InvalidResponse(format!("no RFC822 literal in FETCH response for UID {uid}"))
        })
}

fn into_message(items: FetchItems, uid: Uid) -> FetchedMessage {
    FetchedMessage {
        uid,
        flags: items.flags,
        internal_date: items.internal_date,
        raw: items.body.unwrap_or_default(),
    }
}

/// Parses one untagged unit. Returns `None` if it is not a FETCH line.
fn parse_fetch_line(unit: &[u8], block: &Bytes) -> Result<Option<FetchItems>> {
    let mut lexer = Lexer::new(unit);
    if lexer.next_token()? != Token::Asterisk || lexer.next_token()? != Token::Space {
        return Ok(None);
    }
    if !matches!(lexer.next_token()?, Token::Number(_)) || lexer.next_token()? != Token::Space {
        return Ok(None);
    }
    match lexer.next_token()? {
        Token::Atom(name) if name.eq_ignore_ascii_case("FETCH") => {}
        _ => return Ok(None),
    }
    lexer.expect_space()?;
    lexer.expect(Token::LParen)?;

    let mut items = FetchItems::default();
    loop {
        lexer.skip_spaces();
        let name = match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(name) => name,
            token => {
                return Err(Error::InvalidResponse(format!(
                    "unexpected {token:?} in FETCH item list"
                )));
            }
        };

        match name.to_ascii_uppercase().as_str() {
            "UID" => {
                lexer.expect_space()?;
                let n = lexer.read_number()?;
                items.uid = u32::try_from(n).ok().and_then(Uid::new);
            }
            "FLAGS" => {
                lexer.expect_space()?;
                items.flags = parse_flag_list(&mut lexer)?;
            }
            "INTERNALDATE" => {
                lexer.expect_space()?;
                items.internal_date = match lexer.next_token()? {
                    Token::QuotedString(s) => parse_internal_date(&s),
                    _ => None,
                };
            }
            "RFC822" => {
                lexer.expect_space()?;
                items.body = match lexer.next_token()? {
                    Token::Literal(data) => Some(block.slice_ref(data)),
                    Token::QuotedString(s) => Some(Bytes::from(s)),
                    Token::Nil => None,
                    token => {
                        return Err(Error::InvalidResponse(format!(
                            "expected RFC822 literal, got {token:?}"
                        )));
                    }
                };
            }
            _ => skip_item_value(&mut lexer)?,
        }
    }

    Ok(Some(items))
}

/// Skips the value of an item we do not use, including a `[section]` and
/// `<origin>` glued to its name.
fn skip_item_value(lexer: &mut Lexer<'_>) -> Result<()> {
    if lexer.peek() == Some(b'[') {
        lexer.skip_value()?;
        if lexer.peek() == Some(b'<') {
            lexer.read_atom_string()?;
        }
    }
    lexer.expect_space()?;
    lexer.skip_value()
}

/// Parses a parenthesized flag list.
fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    lexer.expect(Token::LParen)?;

    let mut flags = Flags::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            Token::Space => continue,
            token => {
                return Err(Error::InvalidResponse(format!(
                    "unexpected {token:?} in flag list"
                )));
            }
        }
    }

    Ok(flags)
}

/// Parses an INTERNALDATE value. Days may be space-padded (`" 7-Feb-2024"`).
fn parse_internal_date(s: &str) -> Option<DateTime<FixedOffset>> {
    match DateTime::parse_from_str(s.trim_start(), INTERNALDATE_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            tracing::debug!(value = s, error = %e, "unparsable INTERNALDATE");
            None
        }
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
    use chrono::{Datelike, Timelike};

    use super::*;
    use crate::types::Tag;

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    fn fetch(raw: &'static [u8], n: u32) -> Result<FetchedMessage> {
        let response = Response::parse(Bytes::from_static(raw), &Tag::new("A0004"))?;
        parse_fetch(&response, uid(n))
    }

    #[test]
    fn test_parse_full_fetch() {
        let msg = fetch(
            b"* 1 FETCH (UID 42 FLAGS (\\Seen \\Flagged) \
              INTERNALDATE \"17-Jul-1996 02:44:25 -0700\" \
              RFC822 {5}\r\nAB\r\nC)\r\nA0004 OK done\r\n",
            42,
        )
        .unwrap();

        assert_eq!(msg.uid, uid(42));
        assert_eq!(&msg.raw[..], b"AB\r\nC");
        assert!(msg.flags.is_seen());
        assert!(msg.flags.is_flagged());
        assert_eq!(msg.flags.len(), 2);

        let date = msg.internal_date.unwrap();
        assert_eq!(date.year(), 1996);
        assert_eq!(date.month(), 7);
        assert_eq!(date.day(), 17);
        assert_eq!(date.hour(), 2);
        assert_eq!(date.offset().local_minus_utc(), -7 * 3600);
    }

    #[test]
    fn test_literal_is_not_truncated_at_embedded_crlf() {
        let msg = fetch(
            b"* 3 FETCH (RFC822 {23}\r\nSubject: x\r\n\r\nbody\r\n.\r\n UID 9)\r\nA0004 OK\r\n",
            9,
        )
        .unwrap();
        assert_eq!(&msg.raw[..], b"Subject: x\r\n\r\nbody\r\n.\r\n");
        assert!(msg.flags.is_empty());
        assert!(msg.internal_date.is_none());
    }

    #[test]
    fn test_space_padded_internal_date() {
        let msg = fetch(
            b"* 1 FETCH (INTERNALDATE \" 7-Feb-2024 09:05:00 +0000\" \
              RFC822 {1}\r\nx)\r\nA0004 OK\r\n",
            1,
        )
        .unwrap();
        assert_eq!(msg.internal_date.unwrap().day(), 7);
    }

    #[test]
    fn test_unparsable_internal_date_is_none() {
        let msg = fetch(
            b"* 1 FETCH (INTERNALDATE \"yesterday\" RFC822 {1}\r\nx)\r\nA0004 OK\r\n",
            1,
        )
        .unwrap();
        assert!(msg.internal_date.is_none());
    }

    #[test]
    fn test_missing_literal_is_invalid_response() {
        let err = fetch(b"* 1 FETCH (UID 42 FLAGS (\\Seen))\r\nA0004 OK\r\n", 42).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));

        let err = fetch(b"A0004 OK\r\n", 42).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_unsolicited_fetch_for_other_uid_is_skipped() {
        let msg = fetch(
            b"* 2 FETCH (UID 7 FLAGS (\\Deleted))\r\n\
              * 3 EXISTS\r\n\
              * 5 FETCH (UID 42 RFC822 {2}\r\nhi)\r\n\
              A0004 OK\r\n",
            42,
        )
        .unwrap();
        assert_eq!(&msg.raw[..], b"hi");
    }

    #[test]
    fn test_unknown_items_are_skipped() {
        let msg = fetch(
            b"* 1 FETCH (MODSEQ (12345678901) \
              BODY[HEADER.FIELDS (SUBJECT)]<0> {4}\r\nab\r\n \
              X-GM-LABELS (\"\\\\Inbox\") RFC822 {2}\r\nok UID 42)\r\n\
              A0004 OK\r\n",
            42,
        )
        .unwrap();
        assert_eq!(&msg.raw[..], b"ok");
    }

    #[test]
    fn test_keyword_flags_keep_server_order() {
        let msg = fetch(
            b"* 1 FETCH (FLAGS ($Label1 \\Answered) RFC822 {1}\r\nx)\r\nA0004 OK\r\n",
            1,
        )
        .unwrap();
        let tokens: Vec<&str> = msg.flags.iter().map(Flag::as_str).collect();
        assert_eq!(tokens, vec!["$Label1", "\\Answered"]);
    }

    #[test]
    fn test_body_shares_response_buffer() {
        let raw = Bytes::from_static(b"* 1 FETCH (RFC822 {3}\r\nabc)\r\nA0004 OK\r\n");
        let response = Response::parse(raw.clone(), &Tag::new("A0004")).unwrap();
        let msg = parse_fetch(&response, uid(1)).unwrap();
        let offset = msg.raw.as_ptr() as usize - raw.as_ptr() as usize;
        assert_eq!(&raw[offset..offset + 3], b"abc");
    }
}
