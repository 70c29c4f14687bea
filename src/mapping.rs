//! Bijective character mappings.

use std::collections::BTreeMap;

use log::debug;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::alphabet::Alphabet;
use crate::rng::{shuffle, SplitMix64};
use crate::{Error, Result};

/// A bijection from characters to characters of the same set.
///
/// Characters that are not part of the mapping are their own image when the
/// mapping is applied to text.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MappingDocument", into = "BTreeMap<String, String>")]
pub struct CharacterMapping(BTreeMap<char, char>);

impl CharacterMapping {
    /// Generate the mapping for `alphabet` with the permutation seeded by
    /// `seed`.
    ///
    /// The alphabet is sorted, shuffled with [`crate::shuffle`] driven by
    /// [`SplitMix64`], and the sorted sequence is zipped with the shuffled one.
    pub fn generate(alphabet: &Alphabet, seed: u64) -> Self {
        let ordered: Vec<char> = alphabet.iter().collect();
        let mut shuffled = ordered.clone();
        shuffle(&mut shuffled, &mut SplitMix64::seed_from_u64(seed));

        debug!("generated mapping over {} characters with seed {seed}", ordered.len());
        Self(ordered.into_iter().zip(shuffled).collect())
    }

    /// Build a mapping from explicit pairs.
    ///
    /// Fails if a character is mapped twice, two characters share an image,
    /// or the images are not the same set as the keys.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (char, char)>,
    {
        let mut map = BTreeMap::new();
        for (from, to) in pairs {
            if map.insert(from, to).is_some() {
                return Err(Error::InvalidMapping(format!("{from:?} is mapped twice")));
            }
        }

        let mut images: Vec<char> = map.values().copied().collect();
        images.sort_unstable();
        if let Some(w) = images.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::InvalidMapping(format!("{:?} is the image of two characters", w[0])));
        }

        if let Some(c) = images.iter().find(|c| !map.contains_key(c)) {
            return Err(Error::InvalidMapping(format!("{c:?} is an image but not a key")));
        }

        Ok(Self(map))
    }

    /// The image of `c`, if it is mapped.
    pub fn get(&self, c: char) -> Option<char> {
        self.0.get(&c).copied()
    }

    /// Whether `c` is mapped.
    pub fn contains(&self, c: char) -> bool {
        self.0.contains_key(&c)
    }

    /// The inverse mapping.
    pub fn invert(&self) -> Self {
        Self(self.0.iter().map(|(&k, &v)| (v, k)).collect())
    }

    /// The number of mapped characters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The pairs in ascending order of their keys.
    pub fn iter(&self) -> impl Iterator<Item = (char, char)> + '_ {
        self.0.iter().map(|(&k, &v)| (k, v))
    }

    /// Serialize as a pretty-printed JSON object of one-character strings.
    pub fn to_json(&self) -> Result<String> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut ser)?;
        String::from_utf8(out).map_err(|_| Error::InvalidData)
    }

    /// Parse a mapping written by [`CharacterMapping::to_json`], or a
    /// document of the form `{"char_map": {..}, "reverse_char_map": {..}}`.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<CharacterMapping> for BTreeMap<String, String> {
    fn from(mapping: CharacterMapping) -> Self {
        mapping.0.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }
}

/// The accepted shapes of a mapping file.
#[derive(Deserialize)]
#[serde(untagged)]
enum MappingDocument {
    Debug {
        char_map: BTreeMap<String, String>,
        #[serde(default)]
        reverse_char_map: Option<BTreeMap<String, String>>,
    },
    Flat(BTreeMap<String, String>),
}

impl TryFrom<MappingDocument> for CharacterMapping {
    type Error = Error;

    fn try_from(doc: MappingDocument) -> Result<Self> {
        let (map, reverse) = match doc {
            MappingDocument::Debug { char_map, reverse_char_map } => (char_map, reverse_char_map),
            MappingDocument::Flat(map) => (map, None),
        };

        let pairs = map
            .iter()
            .map(|(k, v)| Ok((single_char(k)?, single_char(v)?)))
            .collect::<Result<Vec<_>>>()?;
        let mapping = Self::from_pairs(pairs)?;

        if let Some(reverse) = reverse {
            for (k, v) in &reverse {
                let (k, v) = (single_char(k)?, single_char(v)?);
                if mapping.get(v) != Some(k) {
                    return Err(Error::InvalidMapping(format!(
                        "reverse entry {k:?} -> {v:?} disagrees with the forward map"
                    )));
                }
            }
        }

        Ok(mapping)
    }
}

fn single_char(s: &str) -> Result<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::InvalidMapping(format!("{s:?} is not a single character"))),
    }
}
