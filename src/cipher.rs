//! The substitution cipher.
//!
//! There is only one operation, [`apply`]. Encryption applies the mapping,
//! decryption applies its inverse.

use crate::mapping::CharacterMapping;

/// Replace every mapped character of `text` by its image.
///
/// Unmapped characters are passed through unchanged.
pub fn apply(text: &str, table: &CharacterMapping) -> String {
    text.chars().map(|c| table.get(c).unwrap_or(c)).collect()
}

/// Scramble plain text.
pub fn encrypt(text: &str, mapping: &CharacterMapping) -> String {
    apply(text, mapping)
}

/// Recover plain text scrambled with `mapping`.
pub fn decrypt(text: &str, mapping: &CharacterMapping) -> String {
    apply(text, &mapping.invert())
}
