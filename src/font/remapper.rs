use std::collections::{BTreeMap, BTreeSet};

use crate::outline::GlyphId;

/// Assigns new, contiguous glyph ids to a subset of glyphs.
///
/// For a font that keeps the glyphs 4, 9 and 16 the remapping is
/// ```text
/// 0 -> 0 (.notdef is always kept)
/// 4 -> 1
/// 9 -> 2
/// 16 -> 3
/// ```
/// Fonts need glyph ids that start at zero without gaps, so the old ids
/// cannot be reused.
#[derive(Debug, Clone)]
pub struct GlyphRemapper {
    /// Old id to new id.
    forward: BTreeMap<GlyphId, GlyphId>,
    /// New id to old id, by index.
    backward: Vec<GlyphId>,
}

impl GlyphRemapper {
    /// A remapper that has only seen `.notdef`.
    pub fn new() -> Self {
        let mut remapper = Self { forward: BTreeMap::new(), backward: vec![] };
        remapper.remap(0);
        remapper
    }

    /// A remapper that keeps the relative order of `glyphs`.
    pub fn new_from_glyphs(glyphs: &BTreeSet<GlyphId>) -> Self {
        let mut remapper = Self::new();
        for &glyph in glyphs {
            remapper.remap(glyph);
        }
        remapper
    }

    /// The new id of `old`, assigning the next free id if it has none yet.
    ///
    /// A font holds at most 65535 glyphs and a subset never holds more than
    /// its source, so the counter cannot overflow.
    pub fn remap(&mut self, old: GlyphId) -> GlyphId {
        let next = self.backward.len() as GlyphId;
        *self.forward.entry(old).or_insert_with(|| {
            self.backward.push(old);
            next
        })
    }

    /// The new id of `old`, if it has been remapped.
    pub fn get(&self, old: GlyphId) -> Option<GlyphId> {
        self.forward.get(&old).copied()
    }

    /// The number of remapped glyphs.
    pub fn num_gids(&self) -> u16 {
        self.backward.len() as u16
    }

    /// The old ids in the order of their new ids.
    pub fn remapped_gids(&self) -> impl Iterator<Item = GlyphId> + '_ {
        self.backward.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notdef_stays_first() {
        let glyphs: BTreeSet<GlyphId> = [16, 4, 9].into_iter().collect();
        let remapper = GlyphRemapper::new_from_glyphs(&glyphs);
        assert_eq!(remapper.remapped_gids().collect::<Vec<_>>(), vec![0, 4, 9, 16]);
        assert_eq!(remapper.get(9), Some(2));
        assert_eq!(remapper.get(5), None);
        assert_eq!(remapper.num_gids(), 4);
    }
}
