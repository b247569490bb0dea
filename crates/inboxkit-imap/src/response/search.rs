//! `* SEARCH` payload parsing.

use super::lexer::{Lexer, Token};
use super::Response;
use crate::types::Uid;
use crate::{Error, Result};

/// Collects the UIDs from every `* SEARCH` line of a response, in server
/// order.
///
/// A response without a SEARCH line yields an empty list. A trailing
/// `(MODSEQ n)` group is ignored.
///
/// # Errors
///
/// Returns `InvalidResponse` if a SEARCH line holds anything but UIDs.
pub fn parse_search(response: &Response) -> Result<Vec<Uid>> {
    let mut uids = Vec::new();
    for unit in response.untagged() {
        if is_search_line(unit) {
            parse_search_line(unit, &mut uids)?;
        }
    }
    Ok(uids)
}

fn is_search_line(unit: &[u8]) -> bool {
    unit.get(..8)
        .is_some_and(|head| head.eq_ignore_ascii_case(b"* SEARCH"))
        && matches!(unit.get(8), Some(b' ' | b'\r' | b'\n') | None)
}

fn parse_search_line(unit: &[u8], uids: &mut Vec<Uid>) -> Result<()> {
    let mut lexer = Lexer::new(unit);
    lexer.expect(Token::Asterisk)?;
    lexer.expect_space()?;
    lexer.read_atom_string()?;

    loop {
        if lexer.peek() == Some(b'(') {
            lexer.skip_value()?;
            continue;
        }
        match lexer.next_token()? {
            Token::Space => {}
            Token::Number(n) => {
                let uid = u32::try_from(n)
                    .ok()
                    .and_then(Uid::new)
                    .ok_or_else(|| Error::InvalidResponse(format!("invalid UID {n} in SEARCH")))?;
                uids.push(uid);
            }
            Token::Crlf | Token::Eof => return Ok(()),
            token => {
                return Err(Error::InvalidResponse(format!(
                    "unexpected {token:?} in SEARCH response"
                )));
            }
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
    use bytes::Bytes;

    use super::*;
    use crate::types::Tag;

    fn search(raw: &'static [u8]) -> Result<Vec<u32>> {
        let response = Response::parse(Bytes::from_static(raw), &Tag::new("A0003"))?;
        parse_search(&response).map(|uids| uids.into_iter().map(Uid::get).collect())
    }

    #[test]
    fn test_parse_search() {
        assert_eq!(
            search(b"* SEARCH 3 5 9\r\nA0003 OK done\r\n").unwrap(),
            vec![3, 5, 9]
        );
    }

    #[test]
    fn test_parse_empty_search() {
        assert!(search(b"* SEARCH\r\nA0003 OK\r\n").unwrap().is_empty());
        assert!(search(b"A0003 OK\r\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_search_skips_other_untagged_lines() {
        assert_eq!(
            search(b"* 12 EXISTS\r\n* SEARCH 7\r\n* OK [UIDNEXT 8] ok\r\nA0003 OK\r\n").unwrap(),
            vec![7]
        );
    }

    #[test]
    fn test_parse_search_ignores_modseq() {
        assert_eq!(
            search(b"* SEARCH 2 4 (MODSEQ 917162500)\r\nA0003 OK\r\n").unwrap(),
            vec![2, 4]
        );
    }

    #[test]
    fn test_parse_search_lowercase() {
        assert_eq!(search(b"* search 1\r\nA0003 OK\r\n").unwrap(), vec![1]);
    }

    #[test]
    fn test_parse_search_rejects_garbage() {
        assert!(matches!(
            search(b"* SEARCH 1 two\r\nA0003 OK\r\n"),
            Err(Error::InvalidResponse(_))
        ));
        assert!(matches!(
            search(b"* SEARCH 0\r\nA0003 OK\r\n"),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_searching_is_not_search() {
        assert!(search(b"* SEARCHING 1\r\nA0003 OK\r\n").unwrap().is_empty());
    }
}
