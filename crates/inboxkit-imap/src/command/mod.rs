//! IMAP command builder.
//!
//! Covers the handful of RFC 3501 commands the session issues, their wire
//! serialization, and the redacted form used for logs and error messages.

mod serialize;
mod tag_generator;
mod types;

use std::borrow::Cow;

use crate::Result;
use crate::types::{Flag, Tag, Uid};

pub use tag_generator::TagGenerator;
pub use types::FetchAttribute;

use serialize::{write_add_flags_silent, write_fetch_attributes, write_quoted};

/// Marker that replaces LOGIN arguments in anything that may be logged.
pub const REDACTED: &str = "<redacted>";

/// IMAP command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password (app password).
        password: String,
    },
    /// SELECT command.
    Select {
        /// Mailbox to select, sent as an atom.
        mailbox: String,
    },
    /// `UID SEARCH ALL`.
    UidSearchAll,
    /// `UID FETCH <uid> (<items>)`.
    UidFetch {
        /// Message to fetch.
        uid: Uid,
        /// Attributes to request.
        items: Vec<FetchAttribute>,
    },
    /// `UID STORE <uid> +FLAGS.SILENT (<flags>)`. The silent form keeps the
    /// server from echoing an untagged FETCH.
    UidStore {
        /// Message to modify.
        uid: Uid,
        /// Flags to add.
        flags: Vec<Flag>,
    },
    /// `UID COPY <uid> "<mailbox>"`.
    UidCopy {
        /// Message to copy.
        uid: Uid,
        /// Destination mailbox, always sent quoted.
        mailbox: String,
    },
    /// EXPUNGE command.
    Expunge,
}

impl Command {
    /// `UID FETCH <uid> (FLAGS INTERNALDATE RFC822)`.
    #[must_use]
    pub fn fetch_message(uid: Uid) -> Self {
        Self::UidFetch {
            uid,
            items: vec![
                FetchAttribute::Flags,
                FetchAttribute::InternalDate,
                FetchAttribute::Rfc822,
            ],
        }
    }

    /// `UID STORE <uid> +FLAGS.SILENT (\Deleted)`.
    #[must_use]
    pub fn mark_deleted(uid: Uid) -> Self {
        Self::UidStore {
            uid,
            flags: vec![Flag::Deleted],
        }
    }

    /// Serializes the command as `<tag> <text>\r\n`.
    ///
    /// # Errors
    ///
    /// Returns an error if a quoted argument contains CR, LF or NUL.
    pub fn serialize(&self, tag: &Tag) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');
        self.write_text(&mut buf)?;
        buf.extend_from_slice(b"\r\n");
        Ok(buf)
    }

    /// Returns the command text without tag or CRLF, with credentials
    /// replaced by [`REDACTED`]. Safe to log or embed in errors.
    #[must_use]
    pub fn redacted(&self) -> String {
        if matches!(self, Self::Login { .. }) {
            return format!("LOGIN {REDACTED}");
        }
        let mut buf = Vec::new();
        match self.write_text(&mut buf) {
            Ok(()) => redact(&String::from_utf8_lossy(&buf)).into_owned(),
            Err(_) => format!("{} {REDACTED}", self.name()),
        }
    }

    /// Returns the command keyword(s), e.g. `UID FETCH`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::UidSearchAll => "UID SEARCH",
            Self::UidFetch { .. } => "UID FETCH",
            Self::UidStore { .. } => "UID STORE",
            Self::UidCopy { .. } => "UID COPY",
            Self::Expunge => "EXPUNGE",
        }
    }

    fn write_text(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Noop => buf.extend_from_slice(b"NOOP"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
            Self::Expunge => buf.extend_from_slice(b"EXPUNGE"),
            Self::UidSearchAll => buf.extend_from_slice(b"UID SEARCH ALL"),

            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_quoted(buf, username)?;
                buf.push(b' ');
                write_quoted(buf, password)?;
            }

            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                buf.extend_from_slice(mailbox.as_bytes());
            }

            Self::UidFetch { uid, items } => {
                buf.extend_from_slice(format!("UID FETCH {uid} ").as_bytes());
                write_fetch_attributes(buf, items);
            }

            Self::UidStore { uid, flags } => {
                buf.extend_from_slice(format!("UID STORE {uid} ").as_bytes());
                write_add_flags_silent(buf, flags);
            }

            Self::UidCopy { uid, mailbox } => {
                buf.extend_from_slice(format!("UID COPY {uid} ").as_bytes());
                write_quoted(buf, mailbox)?;
            }
        }
        Ok(())
    }
}

// Debug goes through the redacted form so a stray `{:?}` cannot leak a password.
impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Command").field(&self.redacted()).finish()
    }
}

/// Redacts raw command text: anything starting with `LOGIN` keeps only the
/// keyword.
#[must_use]
pub fn redact(text: &str) -> Cow<'_, str> {
    let is_login = text
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("LOGIN"));
    if is_login {
        Cow::Owned(format!("LOGIN {REDACTED}"))
    } else {
        Cow::Borrowed(text)
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

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    fn wire(cmd: &Command, tag: &str) -> String {
        String::from_utf8(cmd.serialize(&Tag::new(tag)).unwrap()).unwrap()
    }

    #[test]
    fn test_login_command() {
        let cmd = Command::Login {
            username: "u".into(),
            password: "p".into(),
        };
        assert_eq!(wire(&cmd, "A0001"), "A0001 LOGIN \"u\" \"p\"\r\n");
    }

    #[test]
    fn test_login_escapes_quotes_and_backslashes() {
        let cmd = Command::Login {
            username: "me@example.com".into(),
            password: "a\"b\\c".into(),
        };
        assert_eq!(
            wire(&cmd, "A0001"),
            "A0001 LOGIN \"me@example.com\" \"a\\\"b\\\\c\"\r\n"
        );
    }

    #[test]
    fn test_login_rejects_crlf_injection() {
        let cmd = Command::Login {
            username: "u".into(),
            password: "p\r\nA0002 DELETE INBOX".into(),
        };
        assert!(cmd.serialize(&Tag::new("A0001")).is_err());
    }

    #[test]
    fn test_select_command() {
        let cmd = Command::Select {
            mailbox: "INBOX".into(),
        };
        assert_eq!(wire(&cmd, "A0002"), "A0002 SELECT INBOX\r\n");
    }

    #[test]
    fn test_uid_search_all() {
        assert_eq!(
            wire(&Command::UidSearchAll, "A0003"),
            "A0003 UID SEARCH ALL\r\n"
        );
    }

    #[test]
    fn test_fetch_message_command() {
        assert_eq!(
            wire(&Command::fetch_message(uid(42)), "A0004"),
            "A0004 UID FETCH 42 (FLAGS INTERNALDATE RFC822)\r\n"
        );
    }

    #[test]
    fn test_mark_deleted_command() {
        assert_eq!(
            wire(&Command::mark_deleted(uid(42)), "A0005"),
            "A0005 UID STORE 42 +FLAGS.SILENT (\\Deleted)\r\n"
        );
    }

    #[test]
    fn test_uid_copy_quotes_mailbox() {
        let cmd = Command::UidCopy {
            uid: uid(7),
            mailbox: "[Gmail]/All Mail".into(),
        };
        assert_eq!(
            wire(&cmd, "A0006"),
            "A0006 UID COPY 7 \"[Gmail]/All Mail\"\r\n"
        );
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(wire(&Command::Expunge, "A0007"), "A0007 EXPUNGE\r\n");
        assert_eq!(wire(&Command::Logout, "A0008"), "A0008 LOGOUT\r\n");
        assert_eq!(wire(&Command::Noop, "A0009"), "A0009 NOOP\r\n");
    }

    #[test]
    fn test_login_is_redacted() {
        let cmd = Command::Login {
            username: "alice@example.com".into(),
            password: "hunter2".into(),
        };
        let redacted = cmd.redacted();
        assert_eq!(redacted, "LOGIN <redacted>");
        assert!(!format!("{cmd:?}").contains("hunter2"));
        assert!(!format!("{cmd:?}").contains("alice"));
    }

    #[test]
    fn test_other_commands_are_not_redacted() {
        assert_eq!(
            Command::mark_deleted(uid(42)).redacted(),
            "UID STORE 42 +FLAGS.SILENT (\\Deleted)"
        );
        assert_eq!(Command::UidSearchAll.redacted(), "UID SEARCH ALL");
    }

    #[test]
    fn test_redact_raw_text() {
        assert_eq!(redact("LOGIN \"a\" \"b\""), "LOGIN <redacted>");
        assert_eq!(redact("login a b"), "LOGIN <redacted>");
        assert_eq!(redact("SELECT INBOX"), "SELECT INBOX");
        assert_eq!(redact("LOG"), "LOG");
    }
}
