//! The whole encryption run, from text and font to cipher text and
//! decryption font.

use std::collections::BTreeSet;

use log::{debug, info};
use rand::Rng;

use crate::alphabet::{Alphabet, ExclusionSet, Pattern, DEFAULT_PATTERN};
use crate::distort::{self, Distortion};
use crate::font::Font;
use crate::mapping::CharacterMapping;
use crate::outline::OutlineStore;
use crate::variant::{self, VariantPairs};
use crate::{cipher, remap, Error, Result};

/// How the decryption font is made to show plain glyphs for cipher
/// characters.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RemapMode {
    /// Move outlines between glyph slots and keep the character map.
    #[default]
    Outlines,
    /// Keep the outlines and point cipher characters at other glyphs.
    CharMap,
}

/// Settings of an encryption run.
#[derive(Debug, Clone)]
pub struct EncryptOptions {
    /// The regular expression selecting scrambled characters. Empty means
    /// every character.
    pub pattern: String,
    /// Characters that are never scrambled.
    pub exclusions: ExclusionSet,
    /// The seed of the mapping permutation.
    pub seed: u64,
    /// Variant characters kept in the font next to the ones in the text.
    pub variants: Option<VariantPairs>,
    /// Noise added to the decryption font, if any.
    pub distortion: Option<Distortion>,
    /// How the font is remapped.
    pub remap: RemapMode,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.into(),
            exclusions: ExclusionSet::default(),
            seed: 42,
            variants: None,
            distortion: None,
            remap: RemapMode::Outlines,
        }
    }
}

/// The outputs of [`Encryptor::encrypt`].
#[derive(Debug, Clone)]
pub struct Encrypted {
    /// The scrambled text.
    pub text: String,
    /// The mapping that scrambled it.
    pub mapping: CharacterMapping,
    /// The font that renders the scrambled text as the plain text.
    pub font: Font,
    /// Matched characters without a glyph, left unscrambled.
    pub unsupported: BTreeSet<char>,
}

/// Runs encryptions with one set of options.
#[derive(Debug, Clone)]
pub struct Encryptor {
    options: EncryptOptions,
    pattern: Pattern,
}

impl Encryptor {
    /// Compile the pattern and check the distortion parameters.
    pub fn new(options: EncryptOptions) -> Result<Self> {
        let pattern = Pattern::new(&options.pattern)?;
        if let Some(distortion) = &options.distortion {
            distortion.validate()?;
        }
        Ok(Self { options, pattern })
    }

    /// The options of this encryptor.
    pub fn options(&self) -> &EncryptOptions {
        &self.options
    }

    /// The characters of `text` that get scrambled.
    pub fn alphabet(&self, text: &str) -> Result<Alphabet> {
        Alphabet::extract(text, &self.pattern, &self.options.exclusions)
    }

    /// Scramble `text`, with `mapping` or with a new mapping generated from
    /// the seed.
    pub fn encrypt_text(
        &self,
        text: &str,
        mapping: Option<&CharacterMapping>,
    ) -> Result<(String, CharacterMapping)> {
        let mapping = match mapping {
            Some(mapping) => mapping.clone(),
            None => CharacterMapping::generate(&self.alphabet(text)?, self.options.seed),
        };
        Ok((cipher::encrypt(text, &mapping), mapping))
    }

    /// Unscramble `text`.
    ///
    /// Fails with [`Error::MissingMapping`] without a mapping, since the
    /// seed alone does not tell which alphabet the mapping was made for.
    pub fn decrypt_text(&self, text: &str, mapping: Option<&CharacterMapping>) -> Result<String> {
        let mapping = mapping.ok_or(Error::MissingMapping)?;
        Ok(cipher::decrypt(text, mapping))
    }

    /// Build the decryption font for `text` scrambled with `mapping`.
    ///
    /// The font is subset to the mapped characters, the other matched
    /// characters of the text and their variants, then remapped and
    /// optionally distorted with noise drawn from `rng`.
    pub fn build_font<R: Rng>(
        &self,
        font: &Font,
        text: &str,
        mapping: &CharacterMapping,
        rng: &mut R,
    ) -> Result<Font> {
        let mut keep: BTreeSet<char> = mapping.iter().map(|(plain, _)| plain).collect();
        let matched: BTreeSet<char> = self.pattern.matched_chars(text).collect();
        keep.extend(&matched);
        if let Some(variants) = &self.options.variants {
            let expanded = variant::expand(matched, variants);
            debug!("keeping {} characters with their variants", expanded.len());
            keep.extend(expanded);
        }

        let mut font = font.subset(&keep)?;

        let report = match self.options.remap {
            RemapMode::Outlines => remap::remap(&mut font, mapping)?,
            RemapMode::CharMap => font.remap_char_map(mapping)?,
        };
        info!(
            "remapped {} glyphs, {} pairs without glyphs",
            report.swapped,
            report.skipped.len()
        );

        if let Some(params) = &self.options.distortion {
            let report = distort::distort(&mut font, params, rng)?;
            info!("distorted {} glyphs", report.glyphs);
        }

        Ok(font)
    }

    /// Run the whole encryption of `text` against `font`.
    ///
    /// Without an explicit mapping, only characters the font has glyphs for
    /// are scrambled. The others are reported in [`Encrypted::unsupported`]
    /// and stay as they are.
    pub fn encrypt<R: Rng>(
        &self,
        text: &str,
        font: &Font,
        mapping: Option<&CharacterMapping>,
        rng: &mut R,
    ) -> Result<Encrypted> {
        let (mapping, unsupported) = match mapping {
            Some(mapping) => (mapping.clone(), BTreeSet::new()),
            None => {
                let coverage = Alphabet::extract_supported(
                    text,
                    &self.pattern,
                    &self.options.exclusions,
                    font.char_map(),
                )?;
                let mapping = CharacterMapping::generate(&coverage.alphabet, self.options.seed);
                (mapping, coverage.unsupported)
            }
        };

        let cipher_text = cipher::encrypt(text, &mapping);
        let font = self.build_font(font, text, &mapping, rng)?;
        Ok(Encrypted { text: cipher_text, mapping, font, unsupported })
    }
}
