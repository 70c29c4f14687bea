/*!
Scrambles text with a character substitution cipher and rewrites a font so
that the scrambled text, rendered with that font, shows the original glyphs.

A reader of the rendered page sees the plain text. A scraper reading the
character codes sees the cipher text, unless it also has the font or the
mapping.

# Example
```no_run
use fontcloak::{Alphabet, CharacterMapping, ExclusionSet, Flavor, Font, Pattern};

# fn main() -> Result<(), Box<dyn std::error::Error>> {
let text = std::fs::read_to_string("chapter.txt")?;
let font = Font::open("SourceHanSerif.ttf", 0)?;

// Characters we are going to scramble.
let pattern = Pattern::new(fontcloak::alphabet::DEFAULT_PATTERN)?;
let alphabet = Alphabet::extract(&text, &pattern, &ExclusionSet::default())?;
let mapping = CharacterMapping::generate(&alphabet, 42);
let cipher_text = fontcloak::cipher::encrypt(&text, &mapping);

// Shrink the font to the alphabet and move the outlines around.
let mut font = font.subset(alphabet.as_set())?;
fontcloak::remap::remap(&mut font, &mapping)?;

std::fs::write("chapter.enc.txt", cipher_text)?;
std::fs::write("decrypt.woff", font.save(Flavor::Woff)?)?;
# Ok(())
# }
```

The pipeline is synchronous. A [`Font`] is owned by the caller and mutated in
place by [`remap::remap`] and [`distort::distort`], always in that order.
*/

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod alphabet;
pub mod cipher;
pub mod distort;
mod font;
pub mod mapping;
pub mod outline;
pub mod pipeline;
pub mod remap;
mod rng;
mod stream;
pub mod variant;

pub use crate::alphabet::{Alphabet, Coverage, ExclusionSet, Pattern};
pub use crate::distort::Distortion;
pub use crate::font::{encode_base64, Flavor, Font};
pub use crate::mapping::CharacterMapping;
pub use crate::outline::{
    CharMap, Glyph, GlyphId, GlyphOutline, Metrics, OutlineKind, OutlineStore,
};
pub use crate::pipeline::{EncryptOptions, Encrypted, Encryptor, RemapMode};
pub use crate::rng::{shuffle, SplitMix64};
pub use crate::variant::VariantPairs;

use std::fmt::{self, Debug, Display, Formatter};

/// A 4-byte OpenType tag.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Tag(pub [u8; 4]);

#[allow(unused)]
impl Tag {
    // General tables.
    pub(crate) const CMAP: Self = Self(*b"cmap");
    pub(crate) const HEAD: Self = Self(*b"head");
    pub(crate) const HHEA: Self = Self(*b"hhea");
    pub(crate) const HMTX: Self = Self(*b"hmtx");
    pub(crate) const MAXP: Self = Self(*b"maxp");
    pub(crate) const NAME: Self = Self(*b"name");
    pub(crate) const OS2: Self = Self(*b"OS/2");
    pub(crate) const POST: Self = Self(*b"post");
    pub(crate) const DSIG: Self = Self(*b"DSIG");

    // TrueType.
    pub(crate) const GLYF: Self = Self(*b"glyf");
    pub(crate) const LOCA: Self = Self(*b"loca");
    pub(crate) const PREP: Self = Self(*b"prep");
    pub(crate) const FPGM: Self = Self(*b"fpgm");
    pub(crate) const CVT: Self = Self(*b"cvt ");
    pub(crate) const GASP: Self = Self(*b"gasp");

    // CFF.
    pub(crate) const CFF: Self = Self(*b"CFF ");
    pub(crate) const CFF2: Self = Self(*b"CFF2");
}

impl Debug for Tag {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.pad(std::str::from_utf8(&self.0).unwrap_or("..."))
    }
}

/// The result type for everything.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while scrambling text or rewriting a font.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No character of the text matched the pattern once exclusions were removed.
    #[error("no characters of the text match `{pattern}` after exclusions")]
    EmptyAlphabet {
        /// The pattern that was applied.
        pattern: String,
    },
    /// The font has no outline form that can be rewritten.
    #[error("unsupported glyph format: {0}")]
    UnsupportedGlyphFormat(String),
    /// Decryption was requested without a mapping.
    #[error("decryption needs a character mapping")]
    MissingMapping,
    /// The alphabet pattern is not a valid regular expression.
    #[error("invalid alphabet pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    /// A character mapping is not a bijection over single characters.
    #[error("invalid character mapping: {0}")]
    InvalidMapping(String),
    /// A parameter is out of its accepted range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The file contains an unknown kind of font.
    #[error("unknown font kind")]
    UnknownKind,
    /// An offset pointed outside of the data.
    #[error("invalid offset")]
    InvalidOffset,
    /// Parsing expected more data.
    #[error("missing more data")]
    MissingData,
    /// Parsed data was invalid.
    #[error("invalid data")]
    InvalidData,
    /// A table that another table depends on is missing.
    #[error("missing {0} table")]
    MissingTable(Tag),
    /// The font relies on a feature that is not implemented.
    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),
    /// A mapping document could not be (de)serialized.
    #[error("mapping json: {0}")]
    Json(#[from] serde_json::Error),
    /// The debugging dump could not be written.
    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Reading or writing a file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
