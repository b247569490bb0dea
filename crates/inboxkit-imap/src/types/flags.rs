//! Message flags.

/// A single message flag token as reported in a `FLAGS (...)` list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `\Seen`: message has been read.
    Seen,
    /// `\Answered`: message has been answered.
    Answered,
    /// `\Flagged`: message is flagged for special attention.
    Flagged,
    /// `\Deleted`: message is marked for removal by the next EXPUNGE.
    Deleted,
    /// `\Draft`: message is a draft.
    Draft,
    /// `\Recent`: first session to see the message.
    Recent,
    /// Any other system flag or keyword, kept verbatim (e.g. `$Forwarded`).
    Keyword(String),
}

/// System flags and their wire spelling.
const SYSTEM_FLAGS: [(Flag, &str); 6] = [
    (Flag::Seen, "\\Seen"),
    (Flag::Answered, "\\Answered"),
    (Flag::Flagged, "\\Flagged"),
    (Flag::Deleted, "\\Deleted"),
    (Flag::Draft, "\\Draft"),
    (Flag::Recent, "\\Recent"),
];

impl Flag {
    /// Parses a flag token. System flags are matched case-insensitively;
    /// anything else is kept as written.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        SYSTEM_FLAGS
            .iter()
            .find(|(_, wire)| wire.eq_ignore_ascii_case(token))
            .map_or_else(|| Self::Keyword(token.to_string()), |(flag, _)| flag.clone())
    }

    /// Returns the flag in its wire form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        if let Self::Keyword(token) = self {
            return token;
        }
        SYSTEM_FLAGS
            .iter()
            .find(|(flag, _)| flag == self)
            .map_or("", |(_, wire)| *wire)
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered collection of message flags, in the order the server listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    flags: Vec<Flag>,
}

impl Flags {
    /// Creates an empty flags collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from raw tokens, dropping repeats.
    pub fn from_tokens<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Self {
        let mut flags = Self::new();
        for token in tokens {
            flags.insert(Flag::parse(token));
        }
        flags
    }

    /// Appends a flag unless it is already present.
    pub fn insert(&mut self, flag: Flag) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    /// Returns true if the flag is present.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    /// Returns true if the message has been seen.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.contains(&Flag::Seen)
    }

    /// Returns true if the message is flagged.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.contains(&Flag::Flagged)
    }

    /// Returns an iterator over the flags.
    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.flags.iter()
    }

    /// Returns the number of flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns true if there are no flags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl IntoIterator for Flags {
    type Item = Flag;
    type IntoIter = std::vec::IntoIter<Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.flags.into_iter()
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
    fn parse_system_flags_case_insensitively() {
        assert_eq!(Flag::parse("\\Seen"), Flag::Seen);
        assert_eq!(Flag::parse("\\SEEN"), Flag::Seen);
        assert_eq!(Flag::parse("\\flagged"), Flag::Flagged);
        assert_eq!(Flag::parse("\\Deleted"), Flag::Deleted);
        assert_eq!(Flag::parse("\\Recent"), Flag::Recent);
    }

    #[test]
    fn parse_keyword_verbatim() {
        assert_eq!(
            Flag::parse("$Forwarded"),
            Flag::Keyword("$Forwarded".to_string())
        );
        assert_eq!(Flag::Keyword("$Junk".to_string()).as_str(), "$Junk");
    }

    #[test]
    fn from_tokens_keeps_server_order() {
        let flags = Flags::from_tokens(["\\Flagged", "$Label1", "\\Seen", "\\Flagged"]);
        let rendered: Vec<&str> = flags.iter().map(Flag::as_str).collect();
        assert_eq!(rendered, ["\\Flagged", "$Label1", "\\Seen"]);
        assert!(flags.is_seen());
        assert!(flags.is_flagged());
    }

    #[test]
    fn wire_form_round_trips_for_system_flags() {
        for (flag, wire) in &SYSTEM_FLAGS {
            assert_eq!(flag.as_str(), *wire);
            assert_eq!(&Flag::parse(wire), flag);
        }
    }

    #[test]
    fn empty() {
        let flags = Flags::from_tokens([]);
        assert!(flags.is_empty());
        assert_eq!(flags.len(), 0);
        assert_eq!(flags.into_iter().count(), 0);
    }
}
