//! IMAP command tag generator.
//!
//! Tags are used to match commands with their completion lines.

use crate::types::Tag;
use crate::{Error, Result};

/// Tag generator for IMAP commands.
///
/// Generates sequential tags `A0001`, `A0002`, ... for the lifetime of one
/// session. The counter is never reset; a fresh session gets a fresh
/// generator.
#[derive(Debug, Clone, Default)]
pub struct TagGenerator {
    counter: u32,
}

impl TagGenerator {

    /// Generates the next tag.
    ///
    /// # Errors
    ///
    /// Returns an error once the counter is exhausted rather than wrapping
    /// around and reusing a tag.
    pub fn next_tag(&mut self) -> Result<Tag> {
        self.counter = self
            .counter
            .checked_add(1)
            .ok_or_else(|| Error::Protocol("tag counter exhausted for this session".into()))?;
        Ok(Tag(format!("A{:04}", self.counter)))
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
    fn test_tag_generation_starts_at_one() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.next_tag().unwrap().as_str(), "A0001");
        assert_eq!(generator.next_tag().unwrap().as_str(), "A0002");
        assert_eq!(generator.next_tag().unwrap().as_str(), "A0003");
    }

    #[test]
    fn test_uniqueness_past_padding() {
        let mut generator = TagGenerator::default();
        let mut seen = std::collections::HashSet::new();

        for _ in 0..10_050 {
            let tag = generator.next_tag().unwrap();
            assert!(seen.insert(tag), "duplicate tag generated");
        }
        assert_eq!(generator.next_tag().unwrap().as_str(), "A10051");
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let mut generator = TagGenerator::default();
        generator.counter = u32::MAX;
        assert!(generator.next_tag().is_err());
    }
}
