//! Provider quirks: how servers phrase failures and name their archive.
//!
//! IMAP completion text is free-form, so telling "the message is already
//! gone" or "wrong password" apart from other failures means matching on
//! words. All of that matching lives here, keyed by [`Provider`], so a new
//! provider only adds rows to the tables below.

use crate::response::{Completion, Status};
use crate::types::Uid;
use crate::{Error, Result};

/// Known mail providers with distinct phrasing or mailbox names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    /// Unknown or generic IMAP server.
    #[default]
    Generic,
    /// Gmail (imap.gmail.com).
    Gmail,
    /// Microsoft Outlook / Office 365.
    Outlook,
    /// Apple iCloud Mail.
    ICloud,
    /// Yahoo Mail.
    Yahoo,
    /// Fastmail.
    Fastmail,
}

/// Phrases that mark a NO/BAD as "no such message" on every server.
const NOT_FOUND_COMMON: &[&str] = &["not", "no such", "[nonexistent]", "[expungeissued]"];

/// Phrases that mark a LOGIN failure as a credentials problem on every server.
const AUTH_COMMON: &[&str] = &["auth", "login", "credentials"];

impl Provider {
    /// Detects the provider from the configured host and the greeting text.
    #[must_use]
    pub fn detect(host: &str, greeting: &str) -> Self {
        let host = host.to_ascii_lowercase();
        let greeting = greeting.to_ascii_lowercase();

        let by_host = [
            ("gmail.com", Self::Gmail),
            ("googlemail.com", Self::Gmail),
            ("office365.com", Self::Outlook),
            ("outlook.com", Self::Outlook),
            ("hotmail.com", Self::Outlook),
            ("me.com", Self::ICloud),
            ("icloud.com", Self::ICloud),
            ("yahoo.com", Self::Yahoo),
            ("fastmail.com", Self::Fastmail),
        ];
        let on_domain = |domain: &str| {
            host == domain
                || host
                    .strip_suffix(domain)
                    .is_some_and(|rest| rest.ends_with('.'))
        };
        if let Some((_, provider)) = by_host.iter().find(|(domain, _)| on_domain(domain)) {
            return *provider;
        }

        if greeting.contains("gimap") || greeting.contains("gmail") {
            Self::Gmail
        } else if greeting.contains("outlook") || greeting.contains("microsoft") {
            Self::Outlook
        } else if greeting.contains("icloud") || greeting.contains("apple") {
            Self::ICloud
        } else if greeting.contains("yahoo") {
            Self::Yahoo
        } else if greeting.contains("fastmail") {
            Self::Fastmail
        } else {
            Self::Generic
        }
    }

    /// Archive mailbox names to try, in order.
    #[must_use]
    pub const fn archive_candidates(self) -> &'static [&'static str] {
        match self {
            Self::Gmail => &["[Gmail]/All Mail", "[Google Mail]/All Mail"],
            Self::Outlook => &["Archive"],
            Self::ICloud => &["Archive"],
            Self::Yahoo => &["Archive"],
            Self::Fastmail => &["Archive", "INBOX.Archive"],
            Self::Generic => &["Archive", "Archives", "INBOX.Archive"],
        }
    }

    /// Provider-specific "no such message" phrases, in addition to the
    /// common ones.
    const fn not_found_phrases(self) -> &'static [&'static str] {
        match self {
            Self::Gmail => &["invalid messageset", "unknown uid"],
            Self::Outlook => &["message set is invalid", "item could not be found"],
            Self::Yahoo => &["invalid message sequence"],
            Self::ICloud | Self::Fastmail | Self::Generic => &[],
        }
    }

    /// Provider-specific credential-failure phrases.
    const fn auth_phrases(self) -> &'static [&'static str] {
        match self {
            Self::Gmail => &["web login required", "application-specific password"],
            Self::Outlook | Self::Yahoo | Self::ICloud | Self::Fastmail | Self::Generic => &[],
        }
    }
}

/// Returns true if a NO/BAD completion means the message no longer exists.
///
/// `OK` completions never match.
#[must_use]
pub fn is_not_found(provider: Provider, completion: &Completion) -> bool {
    completion.status.is_failure()
        && mentions_any(
            &completion.text,
            NOT_FOUND_COMMON.iter().chain(provider.not_found_phrases()),
        )
}

/// Returns true if a failed LOGIN completion blames the credentials.
///
/// Only the server text is inspected; the command itself always says LOGIN.
#[must_use]
pub fn is_auth_failure(provider: Provider, completion: &Completion) -> bool {
    completion.status.is_failure()
        && mentions_any(
            &completion.text,
            AUTH_COMMON.iter().chain(provider.auth_phrases()),
        )
}

/// Classifies the completion of a STORE/EXPUNGE issued to delete `uid`.
///
/// # Errors
///
/// `MessageNotFound(uid)` for a not-found NO/BAD, `Protocol` for any other
/// NO/BAD.
pub fn check_delete(
    provider: Provider,
    completion: &Completion,
    uid: Uid,
    command: &str,
) -> Result<()> {
    if is_not_found(provider, completion) {
        return Err(Error::MessageNotFound(uid));
    }
    completion.check(command)
}

/// Classifies the completion of LOGIN.
///
/// # Errors
///
/// `AuthenticationFailed` when the server text blames the credentials,
/// `Protocol` for any other NO/BAD.
pub fn check_login(provider: Provider, completion: &Completion, command: &str) -> Result<()> {
    if is_auth_failure(provider, completion) {
        return Err(Error::AuthenticationFailed);
    }
    completion.check(command)
}

fn mentions_any<'a>(text: &str, phrases: impl IntoIterator<Item = &'a &'static str>) -> bool {
    let text = text.to_lowercase();
    phrases.into_iter().any(|phrase| text.contains(*phrase))
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

    fn completion(status: Status, text: &str) -> Completion {
        Completion {
            status,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_detect_by_host() {
        assert_eq!(Provider::detect("imap.gmail.com", ""), Provider::Gmail);
        assert_eq!(
            Provider::detect("outlook.office365.com", ""),
            Provider::Outlook
        );
        assert_eq!(Provider::detect("imap.mail.me.com", ""), Provider::ICloud);
        assert_eq!(
            Provider::detect("imap.mail.yahoo.com", ""),
            Provider::Yahoo
        );
        assert_eq!(
            Provider::detect("IMAP.FASTMAIL.COM", ""),
            Provider::Fastmail
        );
        assert_eq!(Provider::detect("imap.home.com", ""), Provider::Generic);
        assert_eq!(
            Provider::detect("mail.example.org", "* OK Dovecot ready."),
            Provider::Generic
        );
    }

    #[test]
    fn test_detect_by_greeting() {
        assert_eq!(
            Provider::detect("imap.corp.example", "* OK Gimap ready for requests"),
            Provider::Gmail
        );
        assert_eq!(
            Provider::detect(
                "127.0.0.1",
                "* OK The Microsoft Exchange IMAP4 service is ready."
            ),
            Provider::Outlook
        );
    }

    #[test]
    fn test_archive_candidates() {
        assert_eq!(
            Provider::Gmail.archive_candidates()[0],
            "[Gmail]/All Mail"
        );
        assert_eq!(Provider::Outlook.archive_candidates(), &["Archive"]);
        assert_eq!(
            Provider::Generic.archive_candidates(),
            &["Archive", "Archives", "INBOX.Archive"]
        );
    }

    /// (provider, status, server text, expected not-found)
    const NOT_FOUND_TABLE: &[(Provider, Status, &str, bool)] = &[
        (Provider::Generic, Status::No, "no such message", true),
        (Provider::Generic, Status::No, "Message does not exist", true),
        (Provider::Generic, Status::Bad, "UID not found", true),
        (Provider::Generic, Status::No, "[NONEXISTENT] Unknown UID", true),
        (Provider::Generic, Status::No, "[EXPUNGEISSUED] Some messages were expunged", true),
        (Provider::Generic, Status::No, "Mailbox is read-only", false),
        (Provider::Generic, Status::Ok, "not really", false),
        (Provider::Gmail, Status::Bad, "Could not parse command", true),
        (Provider::Gmail, Status::No, "Invalid messageset (Failure)", true),
        (Provider::Generic, Status::No, "Invalid messageset (Failure)", false),
        (Provider::Outlook, Status::Bad, "The specified message set is invalid.", true),
        (Provider::Outlook, Status::No, "Item could not be found", true),
        (Provider::Outlook, Status::No, "Server Unavailable. 15", false),
        (Provider::Yahoo, Status::No, "[CLIENTBUG] Invalid message sequence", true),
        (Provider::ICloud, Status::No, "Message UID does not exist", true),
        (Provider::Fastmail, Status::No, "[NONEXISTENT] No matching messages", true),
        (Provider::Fastmail, Status::No, "Over quota", false),
    ];

    #[test]
    fn test_not_found_table() {
        for (provider, status, text, expected) in NOT_FOUND_TABLE {
            assert_eq!(
                is_not_found(*provider, &completion(*status, text)),
                *expected,
                "{provider:?} {status} {text:?}"
            );
        }
    }

    /// (provider, status, server text, expected auth failure)
    const AUTH_TABLE: &[(Provider, Status, &str, bool)] = &[
        (Provider::Gmail, Status::No, "[AUTHENTICATIONFAILED] Invalid credentials (Failure)", true),
        (Provider::Gmail, Status::No, "[ALERT] Web login required", true),
        (Provider::Outlook, Status::No, "LOGIN failed.", true),
        (Provider::ICloud, Status::No, "[AUTHENTICATIONFAILED] Authentication failed.", true),
        (Provider::Yahoo, Status::No, "[AUTHENTICATIONFAILED] LOGIN Invalid credentials", true),
        (Provider::Fastmail, Status::No, "[AUTHENTICATIONFAILED] Authentication failed", true),
        (Provider::Generic, Status::Bad, "Command line too long", false),
        (Provider::Generic, Status::No, "[UNAVAILABLE] Try later", false),
        (Provider::Generic, Status::Ok, "LOGIN completed", false),
    ];

    #[test]
    fn test_auth_table() {
        for (provider, status, text, expected) in AUTH_TABLE {
            assert_eq!(
                is_auth_failure(*provider, &completion(*status, text)),
                *expected,
                "{provider:?} {status} {text:?}"
            );
        }
    }

    #[test]
    fn test_check_delete_remaps_not_found() {
        let gone = completion(Status::No, "no such message");
        let err = check_delete(Provider::Generic, &gone, uid(42), "EXPUNGE").unwrap_err();
        assert!(matches!(err, Error::MessageNotFound(u) if u == uid(42)));
        assert_eq!(err.to_string(), "Message not found: UID 42");
    }

    #[test]
    fn test_check_delete_surfaces_other_failures() {
        let read_only = completion(Status::No, "Mailbox is read-only");
        let err = check_delete(Provider::Generic, &read_only, uid(42), "EXPUNGE").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        let ok = completion(Status::Ok, "done");
        assert!(check_delete(Provider::Generic, &ok, uid(42), "EXPUNGE").is_ok());
    }

    #[test]
    fn test_check_login() {
        let rejected = completion(Status::No, "[AUTHENTICATIONFAILED] Invalid credentials");
        assert!(matches!(
            check_login(Provider::Generic, &rejected, "LOGIN <redacted>"),
            Err(Error::AuthenticationFailed)
        ));

        let other = completion(Status::No, "[UNAVAILABLE] Try later");
        match check_login(Provider::Generic, &other, "LOGIN <redacted>") {
            Err(Error::Protocol(detail)) => {
                assert!(detail.starts_with("IMAP NO for command: LOGIN <redacted>"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
