//! The `cmap` table maps character codes to glyph ids.
//!
//! Reading merges all Unicode subtables of format 4 and 12 into one map,
//! with full-repertoire subtables taking precedence. Writing produces a
//! format 4 subtable for the BMP and, if needed, a format 12 subtable for
//! everything.

use crate::outline::{CharMap, GlyphId};
use crate::stream::{read_at, Reader, Writer};
use crate::{Error, Result};

struct EncodingRecord {
    platform_id: u16,
    encoding_id: u16,
    subtable_offset: u32,
}

impl EncodingRecord {
    fn read(r: &mut Reader) -> Option<Self> {
        Some(Self {
            platform_id: r.read::<u16>()?,
            encoding_id: r.read::<u16>()?,
            subtable_offset: r.read::<u32>()?,
        })
    }

    fn write(&self, w: &mut Writer) {
        w.write::<u16>(self.platform_id);
        w.write::<u16>(self.encoding_id);
        w.write::<u32>(self.subtable_offset);
    }

    fn is_unicode(&self) -> bool {
        self.platform_id == 0
            || (self.platform_id == 3 && [0, 1, 10].contains(&self.encoding_id))
    }
}

/// Read the best Unicode map, dropping entries for `.notdef` and for glyph
/// ids beyond `num_glyphs`.
pub fn read(data: &[u8], num_glyphs: u16) -> Result<CharMap> {
    let mut r = Reader::new(data);
    r.read::<u16>().ok_or(Error::MissingData)?; // version
    let num_tables = r.read::<u16>().ok_or(Error::MissingData)?;

    let mut bmp = vec![];
    let mut full = vec![];

    for _ in 0..num_tables {
        let record = EncodingRecord::read(&mut r).ok_or(Error::MissingData)?;
        if !record.is_unicode() {
            continue;
        }

        let subtable = data.get(record.subtable_offset as usize..).ok_or(Error::InvalidOffset)?;
        match read_at::<u16>(subtable, 0) {
            Some(4) => {
                let table = Subtable4::read(subtable).ok_or(Error::InvalidData)?;
                table.codepoints(|c| {
                    if let Some(g) = table.glyph_index(c) {
                        bmp.push((c, g));
                    }
                });
            }
            Some(12) => {
                let table = Subtable12::read(subtable).ok_or(Error::InvalidData)?;
                table.mappings(|c, g| full.push((c, g)));
            }
            _ => {}
        }
    }

    // Later inserts win, so full-repertoire entries override BMP ones.
    let map: CharMap = bmp
        .into_iter()
        .chain(full)
        .filter(|&(_, g)| g != 0 && g < num_glyphs)
        .filter_map(|(c, g)| Some((char::from_u32(c)?, g)))
        .collect();

    Ok(map)
}

/// Write a `cmap` table for `map`.
pub fn write(map: &CharMap) -> Vec<u8> {
    let mut subtables: Vec<(EncodingRecord, Vec<u8>)> = vec![];

    let bmp: Vec<(u16, GlyphId)> = map
        .iter()
        .filter_map(|(&c, &g)| Some((u16::try_from(u32::from(c)).ok()?, g)))
        .filter(|&(c, _)| c != 0xFFFF)
        .collect();
    let has_supplementary = bmp.len() < map.len();

    let format4 = Subtable4::build(&bmp).and_then(|table| table.write());
    let has_format4 = format4.is_some();
    if let Some(data) = format4 {
        subtables.push((EncodingRecord { platform_id: 3, encoding_id: 1, subtable_offset: 0 }, data));
    }

    if has_supplementary || !has_format4 {
        let full: Vec<(u32, GlyphId)> = map.iter().map(|(&c, &g)| (u32::from(c), g)).collect();
        let data = Subtable12::build(&full).write();
        subtables.push((EncodingRecord { platform_id: 3, encoding_id: 10, subtable_offset: 0 }, data));
    }

    let num_tables = subtables.len() as u16;
    let mut subtable_offset = 4 + 8 * u32::from(num_tables);

    let mut w = Writer::new();
    w.write::<u16>(0);
    w.write::<u16>(num_tables);

    for (record, data) in &mut subtables {
        record.subtable_offset = subtable_offset;
        record.write(&mut w);
        subtable_offset += data.len() as u32;
    }

    for (_, data) in &subtables {
        w.extend(data);
    }

    w.finish()
}

/// A format 4 subtable.
struct Subtable4<'a> {
    language: u16,
    end_codes: Vec<u16>,
    start_codes: Vec<u16>,
    id_deltas: Vec<i16>,
    id_range_offsets: Vec<u16>,
    glyph_id_array: &'a [u8],
}

impl<'a> Subtable4<'a> {
    fn read(data: &'a [u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        r.skip_bytes(4)?; // format + length
        let language = r.read::<u16>()?;
        let seg_count_x2 = r.read::<u16>()?;
        if seg_count_x2 < 2 {
            return None;
        }

        let seg_count = usize::from(seg_count_x2 / 2);
        r.skip_bytes(6)?; // search range + entry selector + range shift
        let end_codes = r.read_vector::<u16>(seg_count)?;
        r.skip_bytes(2)?; // reserved pad
        let start_codes = r.read_vector::<u16>(seg_count)?;
        let id_deltas = r.read_vector::<i16>(seg_count)?;
        // Range offsets are relative to their own position.
        let glyph_id_array = r.tail()?;
        let id_range_offsets = r.read_vector::<u16>(seg_count)?;

        Some(Self { language, end_codes, start_codes, id_deltas, id_range_offsets, glyph_id_array })
    }

    /// The glyph of a code point, if it is mapped.
    fn glyph_index(&self, code_point: u32) -> Option<GlyphId> {
        let code_point = u16::try_from(code_point).ok()?;
        let index = self.end_codes.partition_point(|&end| end < code_point);

        let start = *self.start_codes.get(index)?;
        if start > code_point {
            return None;
        }

        let id_range_offset = *self.id_range_offsets.get(index)?;
        let id_delta = *self.id_deltas.get(index)?;
        if id_range_offset == 0 {
            return Some(code_point.wrapping_add(id_delta as u16));
        } else if id_range_offset == 0xFFFF {
            // Broken fonts use this in the final segment.
            return None;
        }

        let pos = index * 2
            + usize::from(id_range_offset)
            + 2 * usize::from(code_point - start);
        let glyph = read_at::<u16>(self.glyph_id_array, pos)?;
        if glyph == 0 {
            return None;
        }

        Some(glyph.wrapping_add(id_delta as u16))
    }

    /// Calls `f` for each code point covered by a segment.
    fn codepoints(&self, mut f: impl FnMut(u32)) {
        for (&start, &end) in self.start_codes.iter().zip(&self.end_codes) {
            // The final 0xFFFF segment only terminates the search.
            if start == 0xFFFF && end == 0xFFFF {
                break;
            }

            for code_point in start..=end {
                f(u32::from(code_point));
            }
        }
    }

    /// Build a subtable with delta-only segments from sorted pairs.
    fn build(pairs: &[(u16, GlyphId)]) -> Option<Self> {
        let delta = |(c, g): (u16, GlyphId)| (i32::from(g) - i32::from(c)) as i16;

        let mut segments: Vec<(u16, u16, i16)> = vec![];
        let mut iter = pairs.iter().copied();
        if let Some(first) = iter.next() {
            let (mut cur_start, mut cur_end, mut cur_delta) = (first.0, first.0, delta(first));
            for next in iter {
                if u32::from(next.0) == u32::from(cur_end) + 1 && delta(next) == cur_delta {
                    cur_end = next.0;
                    continue;
                }

                segments.push((cur_start, cur_end, cur_delta));
                (cur_start, cur_end, cur_delta) = (next.0, next.0, delta(next));
            }
            segments.push((cur_start, cur_end, cur_delta));
        }

        // The search terminates at a final 0xFFFF segment.
        segments.push((0xFFFF, 0xFFFF, 1));

        // The length field must fit into 16 bits.
        if 16 + 8 * segments.len() > usize::from(u16::MAX) {
            return None;
        }

        Some(Self {
            language: 0,
            start_codes: segments.iter().map(|s| s.0).collect(),
            end_codes: segments.iter().map(|s| s.1).collect(),
            id_deltas: segments.iter().map(|s| s.2).collect(),
            id_range_offsets: vec![0; segments.len()],
            glyph_id_array: &[],
        })
    }

    fn write(&self) -> Option<Vec<u8>> {
        let seg_count = u16::try_from(self.end_codes.len()).ok()?;
        let length = u16::try_from(16 + 8 * usize::from(seg_count) + self.glyph_id_array.len()).ok()?;

        let mut w = Writer::new();
        w.write::<u16>(4);
        w.write::<u16>(length);
        w.write::<u16>(self.language);

        let seg_count_x2 = 2 * seg_count;
        let floor_log_2 = (u16::BITS - seg_count.leading_zeros()) - 1;
        let search_range = 2 * 2u16.pow(floor_log_2);
        w.write::<u16>(seg_count_x2);
        w.write::<u16>(search_range);
        w.write::<u16>(floor_log_2 as u16);
        w.write::<u16>(seg_count_x2 - search_range);

        self.end_codes.iter().for_each(|v| w.write(v));
        w.write::<u16>(0); // reserved pad
        self.start_codes.iter().for_each(|v| w.write(v));
        self.id_deltas.iter().for_each(|v| w.write(v));
        self.id_range_offsets.iter().for_each(|v| w.write(v));
        w.extend(self.glyph_id_array);

        Some(w.finish())
    }
}

struct SequentialMapGroup {
    start_char_code: u32,
    end_char_code: u32,
    start_glyph_id: u32,
}

/// A format 12 subtable.
struct Subtable12 {
    language: u32,
    groups: Vec<SequentialMapGroup>,
}

impl Subtable12 {
    fn read(data: &[u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        r.skip_bytes(8)?; // format + reserved + length
        let language = r.read::<u32>()?;
        let num_groups = r.read::<u32>()?;

        let mut groups = Vec::with_capacity(num_groups.min(0x10000) as usize);
        for _ in 0..num_groups {
            groups.push(SequentialMapGroup {
                start_char_code: r.read::<u32>()?,
                end_char_code: r.read::<u32>()?,
                start_glyph_id: r.read::<u32>()?,
            });
        }

        Some(Self { language, groups })
    }

    /// Calls `f` for every mapping, skipping glyph ids beyond 16 bits.
    fn mappings(&self, mut f: impl FnMut(u32, GlyphId)) {
        for group in &self.groups {
            // Code points end at 0x10FFFF.
            let end = group.end_char_code.min(0x10FFFF);
            for code_point in group.start_char_code..=end {
                let id = group.start_glyph_id.checked_add(code_point - group.start_char_code);
                if let Some(Ok(id)) = id.map(GlyphId::try_from) {
                    f(code_point, id);
                }
            }
        }
    }

    /// Build a subtable from sorted pairs.
    fn build(pairs: &[(u32, GlyphId)]) -> Self {
        let mut groups: Vec<SequentialMapGroup> = vec![];
        for &(c, g) in pairs {
            let g = u32::from(g);
            if let Some(last) = groups.last_mut() {
                let run = last.end_char_code - last.start_char_code;
                if c == last.end_char_code + 1 && g == last.start_glyph_id + run + 1 {
                    last.end_char_code = c;
                    continue;
                }
            }
            groups.push(SequentialMapGroup { start_char_code: c, end_char_code: c, start_glyph_id: g });
        }

        Self { language: 0, groups }
    }

    fn write(&self) -> Vec<u8> {
        // format + reserved + length + language + num_groups + groups
        let length = 2 + 2 + 4 + 4 + 4 + 12 * self.groups.len();

        let mut w = Writer::new();
        w.write::<u16>(12);
        w.write::<u16>(0);
        w.write::<u32>(length as u32);
        w.write::<u32>(self.language);
        w.write::<u32>(self.groups.len() as u32);
        for group in &self.groups {
            w.write::<u32>(group.start_char_code);
            w.write::<u32>(group.end_char_code);
            w.write::<u32>(group.start_glyph_id);
        }

        w.finish()
    }
}
