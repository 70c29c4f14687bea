//! The working character set: which characters of a text get scrambled.

use std::collections::BTreeSet;

use log::{debug, warn};
use regex::Regex;

use crate::outline::CharMap;
use crate::{Error, Result};

/// CJK Unified Ideographs, `U+4E00..=U+9FFF`.
pub const DEFAULT_PATTERN: &str = r"[\x{4e00}-\x{9fff}]";

/// Matches every character, used for an empty pattern.
const ANY_CHAR: &str = r"[\s\S]";

/// A compiled pattern selecting alphabet characters.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compile a pattern. An empty pattern matches every character.
    pub fn new(pattern: &str) -> Result<Self> {
        let source = if pattern.is_empty() { ANY_CHAR } else { pattern };
        Ok(Self(Regex::new(source)?))
    }

    /// The source of the pattern.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Every character of every match in `text`.
    pub fn matched_chars<'a>(&'a self, text: &'a str) -> impl Iterator<Item = char> + 'a {
        self.0.find_iter(text).flat_map(|m| m.as_str().chars())
    }
}

/// Characters that are never substituted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExclusionSet(BTreeSet<char>);

impl ExclusionSet {
    /// Every distinct character of `text`, ignoring whitespace.
    pub fn from_text(text: &str) -> Self {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// Whether `c` is excluded.
    pub fn contains(&self, c: char) -> bool {
        self.0.contains(&c)
    }

    /// The number of excluded characters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is excluded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The excluded characters in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<char> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = char>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A set of characters, iterated in ascending code point order.
///
/// The order is the canonical order used when generating a mapping, so the
/// same set and seed always produce the same mapping.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Alphabet(BTreeSet<char>);

/// An alphabet restricted to what a font can display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    /// Characters the font has glyphs for.
    pub alphabet: Alphabet,
    /// Characters that matched but have no glyph in the font.
    pub unsupported: BTreeSet<char>,
}

impl Alphabet {
    /// Collect the distinct characters of `text` matched by `pattern`, minus
    /// `exclusions`.
    ///
    /// Fails with [`Error::EmptyAlphabet`] if nothing is left.
    pub fn extract(text: &str, pattern: &Pattern, exclusions: &ExclusionSet) -> Result<Self> {
        let chars: BTreeSet<char> = pattern
            .matched_chars(text)
            .filter(|c| !exclusions.contains(*c))
            .collect();

        if chars.is_empty() {
            return Err(Error::EmptyAlphabet { pattern: pattern.as_str().into() });
        }

        debug!("extracted alphabet of {} characters", chars.len());
        Ok(Self(chars))
    }

    /// Like [`Alphabet::extract`], but characters missing from `char_map`
    /// are moved into [`Coverage::unsupported`] instead of the alphabet.
    ///
    /// Unsupported characters are never substituted, so they stay readable
    /// in the cipher text.
    pub fn extract_supported(
        text: &str,
        pattern: &Pattern,
        exclusions: &ExclusionSet,
        char_map: &CharMap,
    ) -> Result<Coverage> {
        let (supported, unsupported): (BTreeSet<char>, BTreeSet<char>) = pattern
            .matched_chars(text)
            .filter(|c| !exclusions.contains(*c))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .partition(|c| char_map.contains_key(c));

        if !unsupported.is_empty() {
            let listing: String = unsupported.iter().take(32).collect();
            warn!(
                "{} characters have no glyph in the font and stay unscrambled: {listing}",
                unsupported.len()
            );
        }

        if supported.is_empty() {
            return Err(Error::EmptyAlphabet { pattern: pattern.as_str().into() });
        }

        debug!(
            "extracted alphabet of {} characters ({} unsupported)",
            supported.len(),
            unsupported.len()
        );

        Ok(Coverage { alphabet: Self(supported), unsupported })
    }

    /// The number of characters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the alphabet is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `c` is part of the alphabet.
    pub fn contains(&self, c: char) -> bool {
        self.0.contains(&c)
    }

    /// The characters in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.0.iter().copied()
    }

    /// The underlying set.
    pub fn as_set(&self) -> &BTreeSet<char> {
        &self.0
    }
}

impl FromIterator<char> for Alphabet {
    fn from_iter<I: IntoIterator<Item = char>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
