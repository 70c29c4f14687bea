//! Moving outlines between glyph slots.
//!
//! The text shown to the reader is the cipher text. For the reader to see the
//! plain text, the glyph addressed by a cipher character must carry the
//! outline of the plain character it stands for. [`remap`] rewrites the glyph
//! table that way and leaves the character map alone.
//!
//! TrueType composites draw other glyphs by id. A composite that reaches a
//! slot which gets a new outline is flattened into a simple glyph first, so
//! it keeps drawing what it drew before.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace, warn};

use crate::mapping::CharacterMapping;
use crate::outline::{ContourGlyph, Glyph, GlyphId, GlyphOutline, OutlineStore, SimpleGlyph};
use crate::{Error, Result};

/// How deep composites may nest.
const MAX_COMPONENT_DEPTH: usize = 16;

/// Every glyph of a store, decoded once.
///
/// Decoding can be expensive (CFF glyphs are desubroutinized), and the
/// remapper reads each source glyph before any slot is overwritten, so all
/// reads go through this snapshot.
#[derive(Debug, Clone)]
pub struct OutlineCache(Vec<Glyph>);

impl OutlineCache {
    /// Decode all glyphs of `store`.
    pub fn build<S: OutlineStore + ?Sized>(store: &S) -> Result<Self> {
        let glyphs = (0..store.num_glyphs())
            .map(|id| store.glyph(id))
            .collect::<Result<Vec<_>>>()?;
        debug!("cached {} glyph outlines", glyphs.len());
        Ok(Self(glyphs))
    }

    /// The cached glyph `id`.
    pub fn get(&self, id: GlyphId) -> Option<&Glyph> {
        self.0.get(usize::from(id))
    }

    /// The number of cached glyphs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What [`remap`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemapReport {
    /// The number of glyph slots that received a new outline.
    pub swapped: usize,
    /// `(cipher, plain)` pairs where one of the characters has no glyph.
    pub skipped: Vec<(char, char)>,
    /// Composite glyphs turned into simple glyphs because a component
    /// slot was overwritten.
    pub flattened: usize,
}

/// Rewrite `store` so that the glyph of every cipher character shows the
/// outline its plain character had before.
///
/// Pairs with a character the font cannot resolve are skipped. Fails with
/// [`Error::UnsupportedGlyphFormat`] if the store has no outlines it can
/// rewrite.
pub fn remap<S: OutlineStore + ?Sized>(
    store: &mut S,
    mapping: &CharacterMapping,
) -> Result<RemapReport> {
    let kind = store.outline_kind().ok_or_else(|| {
        Error::UnsupportedGlyphFormat("neither contour nor path outlines".into())
    })?;

    let inverse = mapping.invert();
    let char_map = store.char_map().clone();
    let cache = OutlineCache::build(&*store)?;

    let mut report = RemapReport::default();
    let mut moves = vec![];
    for (cipher, plain) in inverse.iter() {
        match (char_map.get(&cipher), char_map.get(&plain)) {
            (Some(&cipher_gid), Some(&plain_gid)) => moves.push((cipher_gid, plain_gid)),
            _ => {
                trace!("skipping {cipher:?} -> {plain:?}, not in the font");
                report.skipped.push((cipher, plain));
            }
        }
    }

    let overwritten: BTreeSet<GlyphId> =
        moves.iter().filter(|(to, from)| to != from).map(|&(to, _)| to).collect();
    let flattened = flatten_affected(&cache, &overwritten)?;

    let source = |id: GlyphId| flattened.get(&id).or_else(|| cache.get(id)).ok_or(Error::InvalidOffset);
    for &(cipher_gid, plain_gid) in &moves {
        let glyph = source(plain_gid)?;
        if glyph.outline.kind() != kind {
            return Err(Error::UnsupportedGlyphFormat(format!(
                "glyph {plain_gid} is not a {kind:?} outline"
            )));
        }

        trace!("glyph {cipher_gid} <- glyph {plain_gid}");
        store.set_glyph(cipher_gid, glyph.clone())?;
        report.swapped += 1;
    }

    // Composites that stay in their slot still point at overwritten glyphs.
    let written: BTreeSet<GlyphId> = moves.iter().map(|&(to, _)| to).collect();
    for (&id, glyph) in &flattened {
        if !written.contains(&id) {
            trace!("glyph {id} flattened in place");
            store.set_glyph(id, glyph.clone())?;
        }
    }
    report.flattened = flattened.len();

    if !report.skipped.is_empty() {
        warn!("{} mapped pairs have no glyph in the font and were skipped", report.skipped.len());
    }
    debug!("remapped {} glyphs", report.swapped);

    Ok(report)
}

/// Flatten every composite whose component tree reaches one of the
/// `overwritten` slots, using the outlines from before the remapping.
fn flatten_affected(
    cache: &OutlineCache,
    overwritten: &BTreeSet<GlyphId>,
) -> Result<BTreeMap<GlyphId, Glyph>> {
    let mut flattened = BTreeMap::new();
    if overwritten.is_empty() {
        return Ok(flattened);
    }

    for (id, glyph) in cache.0.iter().enumerate() {
        let GlyphOutline::Contour(ContourGlyph::Composite(composite)) = &glyph.outline else {
            continue;
        };
        let id = GlyphId::try_from(id).map_err(|_| Error::InvalidOffset)?;
        if !reaches(cache, id, overwritten, 0)? {
            continue;
        }

        let simple = simple_outline(cache, id, 0)?;
        let mut metrics = glyph.metrics;
        if let Some(bbox) = simple.bbox() {
            metrics.lsb = metrics.lsb.saturating_add(bbox.x_min.saturating_sub(composite.bbox.x_min));
        }
        let outline = GlyphOutline::Contour(if simple.points.is_empty() {
            ContourGlyph::Empty
        } else {
            ContourGlyph::Simple(simple)
        });
        flattened.insert(id, Glyph { outline, metrics });
    }

    if !flattened.is_empty() {
        debug!("flattening {} composite glyphs", flattened.len());
    }
    Ok(flattened)
}

/// Whether a component of glyph `id`, at any depth, is in `targets`.
fn reaches(cache: &OutlineCache, id: GlyphId, targets: &BTreeSet<GlyphId>, depth: usize) -> Result<bool> {
    if depth > MAX_COMPONENT_DEPTH {
        return Err(Error::InvalidData);
    }
    let Some(Glyph { outline: GlyphOutline::Contour(ContourGlyph::Composite(composite)), .. }) =
        cache.get(id)
    else {
        return Ok(false);
    };
    for component in composite.components()? {
        if targets.contains(&component) || reaches(cache, component, targets, depth + 1)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// The cached outline of glyph `id` as a simple glyph.
fn simple_outline(cache: &OutlineCache, id: GlyphId, depth: usize) -> Result<SimpleGlyph> {
    if depth > MAX_COMPONENT_DEPTH {
        return Err(Error::InvalidData);
    }
    match &cache.get(id).ok_or(Error::InvalidOffset)?.outline {
        GlyphOutline::Contour(ContourGlyph::Simple(simple)) => Ok(simple.clone()),
        GlyphOutline::Contour(ContourGlyph::Empty) => Ok(SimpleGlyph::default()),
        GlyphOutline::Contour(ContourGlyph::Composite(composite)) => {
            composite.flatten(|component| simple_outline(cache, component, depth + 1))
        }
        GlyphOutline::Path(_) => {
            Err(Error::UnsupportedGlyphFormat(format!("glyph {id} is not a contour outline")))
        }
    }
}
