//! Script variants of the same character, e.g. Traditional and Simplified
//! Chinese.
//!
//! A font rewritten for a text must be able to display every variant of the
//! characters in that text, so the set of characters to keep is expanded
//! with their counterparts before subsetting.

use std::collections::{BTreeMap, BTreeSet};

/// A many-to-many relation between variant characters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VariantPairs(BTreeMap<char, BTreeSet<char>>);

impl VariantPairs {
    /// An empty relation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `a` and `b` are variants of each other.
    pub fn insert(&mut self, a: char, b: char) {
        if a == b {
            return;
        }
        self.0.entry(a).or_default().insert(b);
        self.0.entry(b).or_default().insert(a);
    }

    /// Build the relation from pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (char, char)>,
    {
        let mut variants = Self::new();
        for (a, b) in pairs {
            variants.insert(a, b);
        }
        variants
    }

    /// Parse a variant table.
    ///
    /// Every line is a group of mutually equivalent characters, e.g.
    /// `发發髮`. Whitespace separates nothing and is ignored, empty lines are
    /// skipped.
    pub fn parse(table: &str) -> Self {
        let mut variants = Self::new();
        for line in table.lines() {
            let group: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
            for (i, &a) in group.iter().enumerate() {
                for &b in &group[i + 1..] {
                    variants.insert(a, b);
                }
            }
        }
        variants
    }

    /// The counterparts of `c`.
    pub fn variants_of(&self, c: char) -> impl Iterator<Item = char> + '_ {
        self.0.get(&c).into_iter().flat_map(|set| set.iter().copied())
    }

    /// The number of characters taking part in any pair.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no pairs.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Add the counterparts of every character of `chars` to the set.
///
/// Only direct counterparts are added, the expansion is not transitive.
pub fn expand<I>(chars: I, pairs: &VariantPairs) -> BTreeSet<char>
where
    I: IntoIterator<Item = char>,
{
    let mut expanded = BTreeSet::new();
    for c in chars {
        expanded.insert(c);
        expanded.extend(pairs.variants_of(c));
    }
    expanded
}
