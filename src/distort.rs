//! Bounded random noise on glyph outlines.
//!
//! The noise makes the rewritten glyphs differ from the stock font, so they
//! cannot be matched back to characters by hashing or template matching,
//! while staying legible.

use std::collections::BTreeSet;

use log::{debug, trace};
use rand::seq::index;
use rand::Rng;

use crate::outline::{ContourGlyph, GlyphId, GlyphOutline, OutlineStore, PathGlyph, SimpleGlyph};
use crate::{Error, Result};

/// Parameters of the distortion.
#[derive(Debug, Clone, PartialEq)]
pub struct Distortion {
    /// The largest change of a coordinate, in font units. At least 1.
    pub magnitude: u16,
    /// The share of eligible points or commands changed per glyph, in `(0, 1]`.
    pub frequency: f64,
    /// Only distort the glyphs of these characters. `None` means all glyphs.
    pub targets: Option<BTreeSet<char>>,
}

impl Default for Distortion {
    fn default() -> Self {
        Self { magnitude: 10, frequency: 0.2, targets: None }
    }
}

impl Distortion {
    /// Check that the parameters are usable.
    pub fn validate(&self) -> Result<()> {
        if self.magnitude == 0 {
            return Err(Error::InvalidParameter("distortion magnitude must be at least 1".into()));
        }
        if !(self.frequency > 0.0 && self.frequency <= 1.0) {
            return Err(Error::InvalidParameter(format!(
                "distortion frequency must be in (0, 1], got {}",
                self.frequency
            )));
        }
        Ok(())
    }

    /// How many of `eligible` items a glyph gets changed.
    fn affected(&self, eligible: usize) -> usize {
        let count = (eligible as f64 * self.frequency).round() as usize;
        count.clamp(1, eligible)
    }
}

/// What [`distort`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DistortReport {
    /// Glyphs that were changed.
    pub glyphs: usize,
    /// Points and commands that were changed, over all glyphs.
    pub perturbed: usize,
    /// Composite glyphs, which are never changed.
    pub composites: usize,
}

/// Add noise to the glyphs of `store`.
///
/// Pass a seeded generator for reproducible output and an entropy-seeded one
/// to get a different font every time. Glyphs without points or move and
/// line commands, and composite glyphs, are left as they are.
pub fn distort<S, R>(store: &mut S, params: &Distortion, rng: &mut R) -> Result<DistortReport>
where
    S: OutlineStore + ?Sized,
    R: Rng,
{
    params.validate()?;
    if store.outline_kind().is_none() {
        return Err(Error::UnsupportedGlyphFormat("neither contour nor path outlines".into()));
    }

    let targets: Vec<GlyphId> = match &params.targets {
        Some(chars) => {
            let map = store.char_map();
            let ids: BTreeSet<GlyphId> = chars.iter().filter_map(|c| map.get(c).copied()).collect();
            ids.into_iter().collect()
        }
        None => (0..store.num_glyphs()).collect(),
    };

    let mut report = DistortReport::default();
    for id in targets {
        let mut glyph = store.glyph(id)?;
        let changed = match &mut glyph.outline {
            GlyphOutline::Contour(ContourGlyph::Simple(simple)) => {
                perturb_points(simple, &mut glyph.metrics.lsb, params, rng)
            }
            GlyphOutline::Contour(ContourGlyph::Composite(_)) => {
                report.composites += 1;
                0
            }
            GlyphOutline::Contour(ContourGlyph::Empty) => 0,
            GlyphOutline::Path(path) => {
                perturb_commands(path, &mut glyph.metrics.lsb, params, rng)
            }
        };

        if changed > 0 {
            trace!("perturbed {changed} items of glyph {id}");
            report.glyphs += 1;
            report.perturbed += changed;
            store.set_glyph(id, glyph)?;
        }
    }

    debug!(
        "distorted {} glyphs ({} points or commands), skipped {} composites",
        report.glyphs, report.perturbed, report.composites
    );

    Ok(report)
}

/// Move some points of a simple glyph.
///
/// The left side bearing follows the change of the minimum x so the
/// outline stays where it was relative to the origin.
fn perturb_points<R: Rng>(
    glyph: &mut SimpleGlyph,
    lsb: &mut i16,
    params: &Distortion,
    rng: &mut R,
) -> usize {
    let n = glyph.points.len();
    if n == 0 {
        return 0;
    }

    let before = glyph.bbox();
    let m = i16::try_from(params.magnitude).unwrap_or(i16::MAX);
    let count = params.affected(n);

    for i in index::sample(rng, n, count) {
        // A sampled point always moves.
        let (dx, dy) = loop {
            let delta = (rng.gen_range(-m..=m), rng.gen_range(-m..=m));
            if delta != (0, 0) {
                break delta;
            }
        };
        let point = &mut glyph.points[i];
        point.x = point.x.saturating_add(dx);
        point.y = point.y.saturating_add(dy);
    }

    if let (Some(before), Some(after)) = (before, glyph.bbox()) {
        *lsb = lsb.saturating_add(after.x_min.saturating_sub(before.x_min));
    }

    count
}

/// Shift one operand of some move and line commands.
///
/// The width operand is never touched. The left side bearing follows the
/// change of the minimum x over all points of the program.
fn perturb_commands<R: Rng>(
    glyph: &mut PathGlyph,
    lsb: &mut i16,
    params: &Distortion,
    rng: &mut R,
) -> usize {
    let eligible: Vec<usize> = glyph
        .commands
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_move_or_line())
        .map(|(i, _)| i)
        .collect();

    if eligible.is_empty() {
        return 0;
    }

    let before = glyph.x_min();
    let m = i32::from(params.magnitude);
    let count = params.affected(eligible.len());

    for k in index::sample(rng, eligible.len(), count) {
        let command = &mut glyph.commands[eligible[k]];
        let operand = rng.gen_range(0..command.operands.len());
        let delta = rng.gen_range(1..=m);
        let delta = if rng.gen_bool(0.5) { delta } else { -delta };
        command.operands[operand] = command.operands[operand].offset(delta);
    }

    if let (Some(before), Some(after)) = (before, glyph.x_min()) {
        let shift = (after - before).round().clamp(f64::from(i16::MIN), f64::from(i16::MAX));
        *lsb = lsb.saturating_add(shift as i16);
    }

    count
}
