//! Command-related type definitions.

/// Individual FETCH attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// Server arrival time.
    InternalDate,
    /// Full message as a literal (marks the message `\Seen`).
    Rfc822,
}

impl FetchAttribute {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Flags => "FLAGS",
            Self::InternalDate => "INTERNALDATE",
            Self::Rfc822 => "RFC822",
        }
    }
}
