//! The `glyf` and `loca` tables.
//!
//! Glyph descriptions are sliced out of `glyf` with the offsets in `loca` and
//! kept as raw bytes until someone asks for an outline. Composite glyphs are
//! only parsed far enough to find and rewrite the ids of their components.

use crate::outline::{BBox, CompositeGlyph, ContourGlyph, GlyphId, Point, SimpleGlyph};
use crate::stream::{Reader, Writer};
use crate::{Error, Result};

const ON_CURVE_POINT: u8 = 0x01;
const X_SHORT_VECTOR: u8 = 0x02;
const Y_SHORT_VECTOR: u8 = 0x04;
const REPEAT_FLAG: u8 = 0x08;
const X_IS_SAME_OR_POSITIVE: u8 = 0x10;
const Y_IS_SAME_OR_POSITIVE: u8 = 0x20;

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const ARGS_ARE_XY_VALUES: u16 = 0x0002;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
const SCALED_COMPONENT_OFFSET: u16 = 0x0800;
const UNSCALED_COMPONENT_OFFSET: u16 = 0x1000;

/// Split `glyf` into one description per glyph.
pub fn read(glyf: &[u8], loca: &[u8], long: bool, num_glyphs: u16) -> Result<Vec<Vec<u8>>> {
    let mut r = Reader::new(loca);
    let mut read_offset = || -> Option<usize> {
        Some(if long { r.read::<u32>()? as usize } else { 2 * usize::from(r.read::<u16>()?) })
    };

    let mut start = read_offset().ok_or(Error::MissingData)?;
    let mut glyphs = Vec::with_capacity(usize::from(num_glyphs));
    for _ in 0..num_glyphs {
        let end = read_offset().ok_or(Error::MissingData)?;
        // Some fonts have descending offsets for empty glyphs.
        let data = if end > start { glyf.get(start..end).ok_or(Error::InvalidOffset)? } else { &[] };
        glyphs.push(data.to_vec());
        start = end;
    }

    Ok(glyphs)
}

/// Concatenate glyph descriptions into new `glyf` and `loca` tables.
///
/// Returns `(glyf, loca, long_loca)`.
pub fn write(glyphs: &[Vec<u8>]) -> (Vec<u8>, Vec<u8>, bool) {
    let size: usize = glyphs.iter().map(|g| g.len() + g.len() % 2).sum();
    let long = size > 2 * usize::from(u16::MAX);

    let mut glyf = Writer::with_capacity(size);
    let mut loca = Writer::new();
    let mut write_offset = |offset: usize| {
        if long {
            loca.write::<u32>(offset as u32);
        } else {
            loca.write::<u16>((offset / 2) as u16);
        }
    };

    for glyph in glyphs {
        write_offset(glyf.len());
        glyf.extend(glyph);
        if !long {
            glyf.align(2);
        }
    }

    // Write the final offset.
    write_offset(glyf.len());

    (glyf.finish(), loca.finish(), long)
}

/// Decode a glyph description.
pub fn decode(data: &[u8]) -> Result<ContourGlyph> {
    if data.is_empty() {
        return Ok(ContourGlyph::Empty);
    }

    let mut r = Reader::new(data);
    let num_contours = r.read::<i16>().ok_or(Error::MissingData)?;
    let bbox = read_bbox(&mut r).ok_or(Error::MissingData)?;

    if num_contours < 0 {
        let data = r.tail().unwrap_or_default().to_vec();
        return Ok(ContourGlyph::Composite(CompositeGlyph { bbox, data }));
    }

    decode_simple(&mut r, num_contours as usize)
        .map(ContourGlyph::Simple)
        .ok_or(Error::InvalidData)
}

fn read_bbox(r: &mut Reader) -> Option<BBox> {
    Some(BBox {
        x_min: r.read::<i16>()?,
        y_min: r.read::<i16>()?,
        x_max: r.read::<i16>()?,
        y_max: r.read::<i16>()?,
    })
}

fn decode_simple(r: &mut Reader, num_contours: usize) -> Option<SimpleGlyph> {
    let end_points = r.read_vector::<u16>(num_contours)?;
    let num_points = end_points.last().map_or(0, |&last| usize::from(last) + 1);

    let instruction_len = r.read::<u16>()?;
    let instructions = r.read_bytes(usize::from(instruction_len))?.to_vec();

    let mut flags = Vec::with_capacity(num_points);
    while flags.len() < num_points {
        let flag = r.read::<u8>()?;
        flags.push(flag);
        if flag & REPEAT_FLAG != 0 {
            let repeat = r.read::<u8>()?;
            flags.extend(std::iter::repeat(flag).take(usize::from(repeat)));
        }
    }
    flags.truncate(num_points);

    let xs = read_coordinates(r, &flags, X_SHORT_VECTOR, X_IS_SAME_OR_POSITIVE)?;
    let ys = read_coordinates(r, &flags, Y_SHORT_VECTOR, Y_IS_SAME_OR_POSITIVE)?;

    let points = flags
        .iter()
        .zip(xs.into_iter().zip(ys))
        .map(|(flag, (x, y))| Point { x, y, on_curve: flag & ON_CURVE_POINT != 0 })
        .collect();

    Some(SimpleGlyph { end_points, points, instructions })
}

fn read_coordinates(r: &mut Reader, flags: &[u8], short: u8, same_or_positive: u8) -> Option<Vec<i16>> {
    let mut value = 0i16;
    let mut coordinates = Vec::with_capacity(flags.len());
    for &flag in flags {
        let delta = if flag & short != 0 {
            let magnitude = i16::from(r.read::<u8>()?);
            if flag & same_or_positive != 0 { magnitude } else { -magnitude }
        } else if flag & same_or_positive != 0 {
            0
        } else {
            r.read::<i16>()?
        };
        value = value.wrapping_add(delta);
        coordinates.push(value);
    }
    Some(coordinates)
}

/// Encode a glyph description.
pub fn encode(glyph: &ContourGlyph) -> Vec<u8> {
    match glyph {
        ContourGlyph::Empty => vec![],
        ContourGlyph::Simple(simple) => encode_simple(simple),
        ContourGlyph::Composite(composite) => {
            let mut w = Writer::with_capacity(10 + composite.data.len());
            w.write::<i16>(-1);
            write_bbox(&mut w, composite.bbox);
            w.extend(&composite.data);
            w.finish()
        }
    }
}

fn write_bbox(w: &mut Writer, bbox: BBox) {
    w.write::<i16>(bbox.x_min);
    w.write::<i16>(bbox.y_min);
    w.write::<i16>(bbox.x_max);
    w.write::<i16>(bbox.y_max);
}

fn encode_simple(glyph: &SimpleGlyph) -> Vec<u8> {
    // A glyph without points is stored as an empty description.
    let Some(bbox) = glyph.bbox() else {
        return vec![];
    };

    let mut w = Writer::new();
    w.write::<i16>(glyph.end_points.len() as i16);
    write_bbox(&mut w, bbox);
    glyph.end_points.iter().for_each(|v| w.write(v));
    w.write::<u16>(glyph.instructions.len() as u16);
    w.extend(&glyph.instructions);

    let mut flags = Vec::with_capacity(glyph.points.len());
    let mut xs = Writer::new();
    let mut ys = Writer::new();
    let mut last = Point::default();

    for point in &glyph.points {
        let mut flag = if point.on_curve { ON_CURVE_POINT } else { 0 };
        flag |= write_delta(&mut xs, point.x.wrapping_sub(last.x), X_SHORT_VECTOR, X_IS_SAME_OR_POSITIVE);
        flag |= write_delta(&mut ys, point.y.wrapping_sub(last.y), Y_SHORT_VECTOR, Y_IS_SAME_OR_POSITIVE);
        flags.push(flag);
        last = *point;
    }

    // Runs of equal flags are stored once with a repeat count.
    let mut i = 0;
    while i < flags.len() {
        let flag = flags[i];
        let run = flags[i..].iter().take(256).take_while(|&&f| f == flag).count();
        if run > 1 {
            w.write::<u8>(flag | REPEAT_FLAG);
            w.write::<u8>((run - 1) as u8);
        } else {
            w.write::<u8>(flag);
        }
        i += run;
    }

    w.extend(&xs.finish());
    w.extend(&ys.finish());
    w.finish()
}

fn write_delta(w: &mut Writer, delta: i16, short: u8, same_or_positive: u8) -> u8 {
    if delta == 0 {
        same_or_positive
    } else if (-255..=255).contains(&delta) {
        w.write::<u8>(delta.unsigned_abs() as u8);
        if delta > 0 { short | same_or_positive } else { short }
    } else {
        w.write::<i16>(delta);
        0
    }
}

/// The byte offsets and ids of the components of a composite glyph, where
/// `data` is everything after the glyph header.
pub fn components(data: &[u8]) -> Option<Vec<(usize, GlyphId)>> {
    let mut r = Reader::new(data);
    let mut components = vec![];

    loop {
        let flags = r.read::<u16>()?;
        let offset = r.offset();
        components.push((offset, r.read::<GlyphId>()?));

        let mut skip = if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_SCALE != 0 {
            skip += 2;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            skip += 4;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            skip += 8;
        }
        r.skip_bytes(skip)?;

        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }

    Some(components)
}

/// How a component is placed in its composite glyph.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Placement {
    /// Move the component by `(dx, dy)`.
    Offset(i32, i32),
    /// Move the component so its point `child` lands on point `parent` of
    /// the points assembled so far.
    Anchor { parent: u16, child: u16 },
}

/// One component record of a composite glyph.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Component {
    /// The referenced glyph.
    pub glyph: GlyphId,
    /// The placement arguments.
    pub placement: Placement,
    /// The linear part of the transform as `[xx, yx, xy, yy]`.
    pub matrix: [f32; 4],
    /// Whether the offset is transformed by the matrix too.
    pub scaled_offset: bool,
}

impl Component {
    fn apply(&self, x: i16, y: i16) -> (f32, f32) {
        let [xx, yx, xy, yy] = self.matrix;
        let (x, y) = (f32::from(x), f32::from(y));
        (xx * x + xy * y, yx * x + yy * y)
    }
}

fn read_f2dot14(r: &mut Reader) -> Option<f32> {
    Some(f32::from(r.read::<i16>()?) / 16384.0)
}

/// Parse every component record of composite glyph data.
pub fn component_records(data: &[u8]) -> Option<Vec<Component>> {
    let mut r = Reader::new(data);
    let mut components = vec![];

    loop {
        let flags = r.read::<u16>()?;
        let glyph = r.read::<GlyphId>()?;

        let xy = flags & ARGS_ARE_XY_VALUES != 0;
        let (a, b) = if flags & ARG_1_AND_2_ARE_WORDS != 0 {
            let (a, b) = (r.read::<u16>()?, r.read::<u16>()?);
            if xy {
                (i32::from(a as i16), i32::from(b as i16))
            } else {
                (i32::from(a), i32::from(b))
            }
        } else {
            let (a, b) = (r.read::<u8>()?, r.read::<u8>()?);
            if xy {
                (i32::from(a as i8), i32::from(b as i8))
            } else {
                (i32::from(a), i32::from(b))
            }
        };

        let placement = if xy {
            Placement::Offset(a, b)
        } else {
            Placement::Anchor { parent: a as u16, child: b as u16 }
        };

        let matrix = if flags & WE_HAVE_A_SCALE != 0 {
            let scale = read_f2dot14(&mut r)?;
            [scale, 0.0, 0.0, scale]
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            [read_f2dot14(&mut r)?, 0.0, 0.0, read_f2dot14(&mut r)?]
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            [read_f2dot14(&mut r)?, read_f2dot14(&mut r)?, read_f2dot14(&mut r)?, read_f2dot14(&mut r)?]
        } else {
            [1.0, 0.0, 0.0, 1.0]
        };

        let scaled_offset =
            flags & SCALED_COMPONENT_OFFSET != 0 && flags & UNSCALED_COMPONENT_OFFSET == 0;
        components.push(Component { glyph, placement, matrix, scaled_offset });

        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }

    Some(components)
}

/// Assemble the points of a composite glyph into a single simple glyph.
///
/// `resolve` returns the simple outline of a component; nested composites
/// must already be flattened by it. Instructions are dropped.
pub fn flatten(
    data: &[u8],
    mut resolve: impl FnMut(GlyphId) -> Result<SimpleGlyph>,
) -> Result<SimpleGlyph> {
    let mut out = SimpleGlyph::default();

    for component in component_records(data).ok_or(Error::InvalidData)? {
        let child = resolve(component.glyph)?;
        let moved: Vec<(f32, f32)> = child.points.iter().map(|p| component.apply(p.x, p.y)).collect();

        let (dx, dy) = match component.placement {
            Placement::Offset(dx, dy) if component.scaled_offset => {
                let [xx, yx, xy, yy] = component.matrix;
                let (dx, dy) = (dx as f32, dy as f32);
                (xx * dx + xy * dy, yx * dx + yy * dy)
            }
            Placement::Offset(dx, dy) => (dx as f32, dy as f32),
            Placement::Anchor { parent, child: anchor } => {
                let target = out.points.get(usize::from(parent)).ok_or(Error::InvalidData)?;
                let &(cx, cy) = moved.get(usize::from(anchor)).ok_or(Error::InvalidData)?;
                (f32::from(target.x) - cx, f32::from(target.y) - cy)
            }
        };

        let base = u16::try_from(out.points.len()).map_err(|_| Error::InvalidData)?;
        for end in &child.end_points {
            out.end_points.push(base.checked_add(*end).ok_or(Error::InvalidData)?);
        }
        for (point, (x, y)) in child.points.iter().zip(moved) {
            out.points.push(Point {
                x: (x + dx).round() as i16,
                y: (y + dy).round() as i16,
                on_curve: point.on_curve,
            });
        }
    }

    Ok(out)
}

/// The component ids of a raw glyph description, empty for non-composites.
pub fn component_ids(glyph: &[u8]) -> Result<Vec<GlyphId>> {
    match glyph.get(..2) {
        Some(&[a, b]) if i16::from_be_bytes([a, b]) < 0 => {
            let data = glyph.get(10..).ok_or(Error::MissingData)?;
            let components = components(data).ok_or(Error::InvalidData)?;
            Ok(components.into_iter().map(|(_, id)| id).collect())
        }
        _ => Ok(vec![]),
    }
}

/// The bounding box in the header of a raw glyph description.
pub fn bbox(glyph: &[u8]) -> Option<BBox> {
    read_bbox(&mut Reader::new_at(glyph, 2))
}

/// Rewrite the component ids of a raw glyph description, if it is a
/// composite.
pub fn remap_glyph(glyph: &mut [u8], map: impl FnMut(GlyphId) -> Option<GlyphId>) -> Result<()> {
    match glyph.get(..2) {
        Some(&[a, b]) if i16::from_be_bytes([a, b]) < 0 => {
            let data = glyph.get_mut(10..).ok_or(Error::MissingData)?;
            remap_components(data, map)
        }
        _ => Ok(()),
    }
}

/// Rewrite the component ids of composite glyph data in place.
pub fn remap_components(data: &mut [u8], mut map: impl FnMut(GlyphId) -> Option<GlyphId>) -> Result<()> {
    for (offset, id) in components(data).ok_or(Error::InvalidData)? {
        let new = map(id).ok_or(Error::InvalidData)?;
        data[offset..offset + 2].copy_from_slice(&new.to_be_bytes());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> SimpleGlyph {
        SimpleGlyph {
            end_points: vec![3, 6],
            points: vec![
                Point { x: 10, y: 0, on_curve: true },
                Point { x: 500, y: 0, on_curve: true },
                Point { x: 500, y: 700, on_curve: true },
                Point { x: 10, y: 700, on_curve: true },
                Point { x: 100, y: 100, on_curve: true },
                Point { x: 250, y: -300, on_curve: false },
                Point { x: 100, y: 400, on_curve: true },
            ],
            instructions: vec![0xB0, 0x01],
        }
    }

    #[test]
    fn simple_glyph_survives_encoding() {
        let glyph = ContourGlyph::Simple(square());
        let data = encode(&glyph);
        assert_eq!(decode(&data).unwrap(), glyph);
        assert_eq!(i16::from_be_bytes([data[2], data[3]]), 10);
        assert_eq!(i16::from_be_bytes([data[4], data[5]]), -300);
    }

    #[test]
    fn empty_glyphs_have_no_data() {
        assert!(encode(&ContourGlyph::Empty).is_empty());
        assert_eq!(decode(&[]).unwrap(), ContourGlyph::Empty);
    }

    #[test]
    fn loca_switches_to_long_offsets() {
        let glyphs = vec![vec![0; 20], vec![], vec![0; 3]];
        let (glyf, loca, long) = write(&glyphs);
        assert!(!long);
        assert_eq!(glyf.len(), 24);
        assert_eq!(loca, vec![0, 0, 0, 10, 0, 10, 0, 12]);
        assert_eq!(read(&glyf, &loca, long, 3).unwrap()[0].len(), 20);

        let big = vec![vec![0; 70_000], vec![0; 70_000]];
        assert!(write(&big).2);
    }

    #[test]
    fn component_ids_are_rewritten() {
        // Two components, the first with word arguments and a scale.
        let mut data = vec![];
        data.extend(0x0029u16.to_be_bytes()); // words + scale + more components
        data.extend(5u16.to_be_bytes());
        data.extend([0, 1, 0, 2, 0x40, 0]);
        data.extend(0x0000u16.to_be_bytes());
        data.extend(9u16.to_be_bytes());
        data.extend([3, 4]);

        let found: Vec<GlyphId> = components(&data).unwrap().into_iter().map(|(_, id)| id).collect();
        assert_eq!(found, vec![5, 9]);

        remap_components(&mut data, |id| Some(id - 4)).unwrap();
        let found: Vec<GlyphId> = components(&data).unwrap().into_iter().map(|(_, id)| id).collect();
        assert_eq!(found, vec![1, 5]);
    }
}
