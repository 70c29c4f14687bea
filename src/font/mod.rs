//! Reading, subsetting and writing OpenType fonts.
//!
//! A [`Font`] owns its tables. Glyph descriptions are sliced out of `glyf` or
//! `CFF ` once and kept per slot as raw bytes, so untouched glyphs survive a
//! save byte for byte. Glyphs written through [`OutlineStore::set_glyph`] are
//! kept decoded and only encoded again when the font is saved.

mod cff;
mod cmap;
pub(crate) mod glyf;
mod hmtx;
mod remapper;
mod ttx;
mod woff;

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use base64::Engine;
use log::{debug, warn};
use rustc_hash::FxHashMap;

use self::remapper::GlyphRemapper;
use crate::mapping::CharacterMapping;
use crate::outline::{
    BBox, CharMap, Glyph, GlyphId, GlyphOutline, Metrics, OutlineKind, OutlineStore,
};
use crate::remap::RemapReport;
use crate::stream::{read_at, Reader, Writer};
use crate::{Error, Result, Tag};

/// Offset of `indexToLocFormat` in `head`.
const INDEX_TO_LOC_FORMAT_OFFSET: usize = 50;
/// Offset of the font bounding box in `head`.
const HEAD_BBOX_OFFSET: usize = 36;
/// Offset of `numGlyphs` in `maxp`.
const NUM_GLYPHS_OFFSET: usize = 4;

/// Tables that do not depend on glyph ids and survive subsetting as they are.
const PASSTHROUGH: &[Tag] = &[
    Tag::HEAD,
    Tag::HHEA,
    Tag::MAXP,
    Tag::NAME,
    Tag::OS2,
    Tag::POST,
    Tag::CVT,
    Tag::FPGM,
    Tag::PREP,
    Tag::GASP,
];

/// The container format of a saved font.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Flavor {
    /// A plain `.ttf` or `.otf` file.
    Sfnt,
    /// WOFF 1.0 with zlib-compressed tables.
    Woff,
    /// WOFF 2.0, which cannot be written.
    Woff2,
    /// A TTX-like XML dump for debugging.
    Xml,
}

impl Flavor {
    /// Pick the flavor from the extension of `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("ttf" | "otf") => Ok(Self::Sfnt),
            Some("woff") => Ok(Self::Woff),
            Some("woff2") => Ok(Self::Woff2),
            Some("ttx" | "xml") => Ok(Self::Xml),
            _ => Err(Error::InvalidParameter(format!(
                "cannot tell the font flavor of {}",
                path.display()
            ))),
        }
    }
}

/// Encode font data as standard base64 text.
pub fn encode_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// An OpenType font.
#[derive(Debug, Clone)]
pub struct Font {
    kind: FontKind,
    tables: BTreeMap<Tag, Vec<u8>>,
    char_map: CharMap,
    outlines: Outlines,
    metrics: Vec<Metrics>,
    num_glyphs: u16,
    /// Whether `cmap` must be rebuilt from `char_map`.
    cmap_dirty: bool,
    /// Whether the outline and metric tables must be rebuilt.
    glyphs_dirty: bool,
}

/// The glyph descriptions of a font.
#[derive(Debug, Clone)]
enum Outlines {
    Contour(Vec<Slot>),
    Path { table: cff::Table, slots: Vec<Slot> },
    /// The font has outlines that cannot be rewritten.
    Unsupported(String),
}

#[derive(Debug, Clone)]
enum Slot {
    Raw(Vec<u8>),
    Decoded(GlyphOutline),
}

impl Font {
    /// Load a font from `.ttf`, `.otf`, `.ttc` or `.woff` data.
    ///
    /// The `index` selects the face of a font collection and is ignored
    /// otherwise.
    pub fn load(data: &[u8], index: u32) -> Result<Self> {
        let signature = read_at::<u32>(data, 0).ok_or(Error::MissingData)?;
        let (kind, tables) = match signature {
            woff::SIGNATURE => {
                let (flavor, tables) = woff::decode(data)?;
                let kind = match FontKind::from_signature(flavor) {
                    Some(FontKind::Collection) | None => return Err(Error::UnknownKind),
                    Some(kind) => kind,
                };
                (kind, tables.into_iter().collect())
            }
            woff::SIGNATURE_2 => return Err(Error::Unimplemented("WOFF2 input")),
            _ => parse(data, index)?,
        };

        Self::from_tables(kind, tables)
    }

    /// Read and load a font file.
    pub fn open(path: impl AsRef<Path>, index: u32) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::load(&data, index)
    }

    fn from_tables(kind: FontKind, tables: BTreeMap<Tag, Vec<u8>>) -> Result<Self> {
        let table = |tag| tables.get(&tag).map(Vec::as_slice).ok_or(Error::MissingTable(tag));

        let num_glyphs =
            read_at::<u16>(table(Tag::MAXP)?, NUM_GLYPHS_OFFSET).ok_or(Error::MissingData)?;
        let metrics = hmtx::read(table(Tag::HHEA)?, table(Tag::HMTX)?, num_glyphs)?;
        let char_map = cmap::read(table(Tag::CMAP)?, num_glyphs)?;
        let outlines = read_outlines(&tables, num_glyphs)?;

        match &outlines {
            Outlines::Unsupported(reason) => {
                debug!("loaded font with {num_glyphs} glyphs and unsupported outlines: {reason}")
            }
            _ => debug!("loaded font with {num_glyphs} glyphs and {} mapped characters", char_map.len()),
        }

        Ok(Self {
            kind,
            tables,
            char_map,
            outlines,
            metrics,
            num_glyphs,
            cmap_dirty: false,
            glyphs_dirty: false,
        })
    }

    /// A new font with only the glyphs needed to render `keep`.
    ///
    /// `.notdef` and the components of kept composite glyphs are always
    /// kept. Characters the font has no glyph for are ignored. Glyph ids are
    /// renumbered without gaps in their original order, and tables that refer
    /// to glyph ids without being rebuilt here (layout, kerning, vertical
    /// metrics) are dropped.
    pub fn subset(&self, keep: &BTreeSet<char>) -> Result<Font> {
        let is_contour = match &self.outlines {
            Outlines::Contour(_) => true,
            Outlines::Path { .. } => false,
            Outlines::Unsupported(reason) => {
                return Err(Error::UnsupportedGlyphFormat(reason.clone()));
            }
        };

        let mut glyphs: BTreeSet<GlyphId> =
            keep.iter().filter_map(|c| self.char_map.get(c).copied()).collect();
        glyphs.insert(0);

        let missing = keep.iter().filter(|c| !self.char_map.contains_key(c)).count();
        if missing > 0 {
            debug!("{missing} characters to keep have no glyph and are ignored");
        }

        // Collect the descriptions of all kept glyphs and their components.
        let mut raws: FxHashMap<GlyphId, Vec<u8>> = FxHashMap::default();
        let mut queue: Vec<GlyphId> = glyphs.iter().copied().collect();
        while let Some(id) = queue.pop() {
            if raws.contains_key(&id) {
                continue;
            }

            let raw = self.raw_glyph(id)?.into_owned();
            if is_contour {
                for component in glyf::component_ids(&raw)? {
                    if glyphs.insert(component) {
                        queue.push(component);
                    }
                }
            }
            raws.insert(id, raw);
        }

        let remapper = GlyphRemapper::new_from_glyphs(&glyphs);
        let mut slots = Vec::with_capacity(glyphs.len());
        let mut metrics = Vec::with_capacity(glyphs.len());
        for old in remapper.remapped_gids() {
            let mut raw = raws.remove(&old).ok_or(Error::InvalidData)?;
            if is_contour {
                glyf::remap_glyph(&mut raw, |id| remapper.get(id))?;
            }
            slots.push(Slot::Raw(raw));
            metrics.push(*self.metrics.get(usize::from(old)).ok_or(Error::InvalidOffset)?);
        }

        let outlines = match &self.outlines {
            Outlines::Path { table, .. } => {
                let mut table = table.clone();
                table.subset_charset(remapper.remapped_gids());
                Outlines::Path { table, slots }
            }
            _ => Outlines::Contour(slots),
        };

        let char_map: CharMap = keep
            .iter()
            .filter_map(|&c| Some((c, remapper.get(*self.char_map.get(&c)?)?)))
            .collect();

        let mut tables: BTreeMap<Tag, Vec<u8>> = self
            .tables
            .iter()
            .filter(|(tag, _)| PASSTHROUGH.contains(*tag))
            .map(|(&tag, data)| (tag, data.clone()))
            .collect();

        // Glyph names are dropped with the glyph order they belong to.
        if let Some(post) = tables.get_mut(&Tag::POST) {
            post.truncate(32);
            if let Some(version) = post.get_mut(..4) {
                version.copy_from_slice(&0x0003_0000_u32.to_be_bytes());
            }
        }

        debug!(
            "subset font to {} glyphs for {} characters",
            remapper.num_gids(),
            char_map.len()
        );

        Ok(Self {
            kind: self.kind,
            tables,
            char_map,
            outlines,
            metrics,
            num_glyphs: remapper.num_gids(),
            cmap_dirty: true,
            glyphs_dirty: true,
        })
    }

    /// Point every cipher character at the glyph its plain character had.
    ///
    /// This leaves the outlines alone and rewrites the character map instead,
    /// the alternative to [`crate::remap::remap`]. Pairs whose plain
    /// character has no glyph are skipped.
    pub fn remap_char_map(&mut self, mapping: &CharacterMapping) -> Result<RemapReport> {
        let original = self.char_map.clone();
        let mut report = RemapReport::default();

        for (cipher, plain) in mapping.invert().iter() {
            match original.get(&plain) {
                Some(&gid) => {
                    self.char_map.insert(cipher, gid);
                    report.swapped += 1;
                }
                None => report.skipped.push((cipher, plain)),
            }
        }

        if !report.skipped.is_empty() {
            warn!("{} mapped pairs have no glyph in the font and were skipped", report.skipped.len());
        }
        debug!("pointed {} characters at new glyphs", report.swapped);

        self.cmap_dirty = true;
        Ok(report)
    }

    /// Write the font in the given container format.
    pub fn save(&self, flavor: Flavor) -> Result<Vec<u8>> {
        match flavor {
            Flavor::Sfnt => Ok(construct(self.kind, self.compile()?)),
            Flavor::Woff => woff::encode(&construct(self.kind, self.compile()?)),
            Flavor::Woff2 => Err(Error::Unimplemented("WOFF2 output")),
            Flavor::Xml => ttx::dump(self),
        }
    }

    /// The final tables, with everything that changed rebuilt.
    fn compile(&self) -> Result<BTreeMap<Tag, Vec<u8>>> {
        let mut tables = self.tables.clone();

        // Any signature is invalid after rewriting.
        tables.remove(&Tag::DSIG);

        if self.cmap_dirty {
            tables.insert(Tag::CMAP, cmap::write(&self.char_map));
        }

        if !self.glyphs_dirty {
            return Ok(tables);
        }

        let hhea = tables.get(&Tag::HHEA).ok_or(Error::MissingTable(Tag::HHEA))?;
        let (hmtx, hhea) = hmtx::write(hhea, &self.metrics)?;
        tables.insert(Tag::HMTX, hmtx);
        tables.insert(Tag::HHEA, hhea);

        let maxp = tables.get_mut(&Tag::MAXP).ok_or(Error::MissingTable(Tag::MAXP))?;
        maxp.get_mut(NUM_GLYPHS_OFFSET..NUM_GLYPHS_OFFSET + 2)
            .ok_or(Error::MissingData)?
            .copy_from_slice(&self.num_glyphs.to_be_bytes());

        let raws = (0..self.num_glyphs)
            .map(|id| self.raw_glyph(id).map(Cow::into_owned))
            .collect::<Result<Vec<_>>>()?;

        match &self.outlines {
            Outlines::Contour(_) => {
                let bbox = raws
                    .iter()
                    .filter_map(|raw| glyf::bbox(raw))
                    .reduce(BBox::union)
                    .unwrap_or_default();

                let (glyf, loca, long) = glyf::write(&raws);
                tables.insert(Tag::GLYF, glyf);
                tables.insert(Tag::LOCA, loca);

                let head = tables.get_mut(&Tag::HEAD).ok_or(Error::MissingTable(Tag::HEAD))?;
                let mut w = Writer::new();
                w.write::<i16>(bbox.x_min);
                w.write::<i16>(bbox.y_min);
                w.write::<i16>(bbox.x_max);
                w.write::<i16>(bbox.y_max);
                head.get_mut(HEAD_BBOX_OFFSET..HEAD_BBOX_OFFSET + 8)
                    .ok_or(Error::MissingData)?
                    .copy_from_slice(&w.finish());
                head.get_mut(INDEX_TO_LOC_FORMAT_OFFSET..INDEX_TO_LOC_FORMAT_OFFSET + 2)
                    .ok_or(Error::MissingData)?
                    .copy_from_slice(&i16::from(long).to_be_bytes());
            }
            Outlines::Path { table, .. } => {
                tables.insert(Tag::CFF, table.write(&raws));
            }
            Outlines::Unsupported(reason) => {
                return Err(Error::UnsupportedGlyphFormat(reason.clone()));
            }
        }

        Ok(tables)
    }

    /// The slot of glyph `id`.
    fn slot(&self, id: GlyphId) -> Result<&Slot> {
        let slots = match &self.outlines {
            Outlines::Contour(slots) | Outlines::Path { slots, .. } => slots,
            Outlines::Unsupported(reason) => {
                return Err(Error::UnsupportedGlyphFormat(reason.clone()));
            }
        };
        slots.get(usize::from(id)).ok_or(Error::InvalidOffset)
    }

    /// The binary description of glyph `id`, encoded if it was replaced.
    fn raw_glyph(&self, id: GlyphId) -> Result<Cow<'_, [u8]>> {
        match (&self.outlines, self.slot(id)?) {
            (_, Slot::Raw(data)) => Ok(Cow::Borrowed(data.as_slice())),
            (Outlines::Contour(_), Slot::Decoded(GlyphOutline::Contour(glyph))) => {
                Ok(Cow::Owned(glyf::encode(glyph)))
            }
            (Outlines::Path { table, .. }, Slot::Decoded(GlyphOutline::Path(glyph))) => {
                Ok(Cow::Owned(table.encode(glyph)))
            }
            _ => Err(Error::InvalidData),
        }
    }

    /// The name of glyph `id` for debugging output.
    fn glyph_name(&self, id: GlyphId) -> String {
        let name = match &self.outlines {
            Outlines::Path { table, .. } => table.glyph_name(id),
            _ => None,
        };
        name.unwrap_or_else(|| match id {
            0 => ".notdef".into(),
            _ => format!("glyph{id:05}"),
        })
    }
}

impl OutlineStore for Font {
    fn outline_kind(&self) -> Option<OutlineKind> {
        match self.outlines {
            Outlines::Contour(_) => Some(OutlineKind::Contour),
            Outlines::Path { .. } => Some(OutlineKind::Path),
            Outlines::Unsupported(_) => None,
        }
    }

    fn char_map(&self) -> &CharMap {
        &self.char_map
    }

    fn num_glyphs(&self) -> u16 {
        self.num_glyphs
    }

    fn glyph(&self, id: GlyphId) -> Result<Glyph> {
        let outline = match (&self.outlines, self.slot(id)?) {
            (_, Slot::Decoded(outline)) => outline.clone(),
            (Outlines::Contour(_), Slot::Raw(data)) => GlyphOutline::Contour(glyf::decode(data)?),
            (Outlines::Path { table, .. }, Slot::Raw(data)) => GlyphOutline::Path(table.decode(data)?),
            (Outlines::Unsupported(reason), _) => {
                return Err(Error::UnsupportedGlyphFormat(reason.clone()));
            }
        };
        let metrics = *self.metrics.get(usize::from(id)).ok_or(Error::InvalidOffset)?;
        Ok(Glyph { outline, metrics })
    }

    fn set_glyph(&mut self, id: GlyphId, glyph: Glyph) -> Result<()> {
        let slots = match (&mut self.outlines, glyph.outline.kind()) {
            (Outlines::Contour(slots), OutlineKind::Contour)
            | (Outlines::Path { slots, .. }, OutlineKind::Path) => slots,
            (Outlines::Unsupported(reason), _) => {
                return Err(Error::UnsupportedGlyphFormat(reason.clone()));
            }
            (_, kind) => {
                return Err(Error::UnsupportedGlyphFormat(format!(
                    "cannot store a {kind:?} outline in glyph {id}"
                )));
            }
        };

        let slot = slots.get_mut(usize::from(id)).ok_or(Error::InvalidOffset)?;
        let metrics = self.metrics.get_mut(usize::from(id)).ok_or(Error::InvalidOffset)?;
        *slot = Slot::Decoded(glyph.outline);
        *metrics = glyph.metrics;
        self.glyphs_dirty = true;
        Ok(())
    }
}

/// Pick the outlines of a font.
fn read_outlines(tables: &BTreeMap<Tag, Vec<u8>>, num_glyphs: u16) -> Result<Outlines> {
    if let (Some(glyf), Some(loca)) = (tables.get(&Tag::GLYF), tables.get(&Tag::LOCA)) {
        let head = tables.get(&Tag::HEAD).ok_or(Error::MissingTable(Tag::HEAD))?;
        let long = read_at::<i16>(head, INDEX_TO_LOC_FORMAT_OFFSET).ok_or(Error::MissingData)? != 0;
        let glyphs = glyf::read(glyf, loca, long, num_glyphs)?;
        return Ok(Outlines::Contour(glyphs.into_iter().map(Slot::Raw).collect()));
    }

    if let Some(data) = tables.get(&Tag::CFF) {
        if let Some(reason) = cff::unsupported_reason(data) {
            return Ok(Outlines::Unsupported(reason.into()));
        }

        return match cff::Table::read(data, num_glyphs) {
            Ok((table, char_strings)) => {
                let slots = char_strings.into_iter().map(Slot::Raw).collect();
                Ok(Outlines::Path { table, slots })
            }
            Err(Error::Unimplemented(what)) => Ok(Outlines::Unsupported(what.into())),
            Err(err) => Err(err),
        };
    }

    let reason = if tables.contains_key(&Tag::CFF2) {
        "CFF2 outlines"
    } else {
        "no glyf or CFF table"
    };
    Ok(Outlines::Unsupported(reason.into()))
}

/// Parse the tables of a font face from OpenType data.
fn parse(data: &[u8], index: u32) -> Result<(FontKind, BTreeMap<Tag, Vec<u8>>)> {
    let mut r = Reader::new(data);
    let mut kind = r.read::<u32>().and_then(FontKind::from_signature).ok_or(Error::UnknownKind)?;

    // Parse font collection header if necessary.
    if kind == FontKind::Collection {
        let offset = read_at::<u32>(data, 12 + 4 * (index as usize)).ok_or(Error::MissingData)?;
        r = Reader::new_at(data, offset as usize);
        kind = r.read::<u32>().and_then(FontKind::from_signature).ok_or(Error::UnknownKind)?;
        if kind == FontKind::Collection {
            return Err(Error::UnknownKind);
        }
    }

    // Read number of table records.
    let count = r.read::<u16>().ok_or(Error::MissingData)?;
    r.skip_bytes(6).ok_or(Error::MissingData)?;

    let mut tables = BTreeMap::new();
    for _ in 0..count {
        let record = TableRecord::read(&mut r).ok_or(Error::MissingData)?;
        let start = record.offset as usize;
        let end = start.checked_add(record.length as usize).ok_or(Error::InvalidOffset)?;
        let table = data.get(start..end).ok_or(Error::InvalidOffset)?;
        tables.insert(record.tag, table.to_vec());
    }

    Ok((kind, tables))
}

/// Construct a brand new font.
fn construct(kind: FontKind, mut tables: BTreeMap<Tag, Vec<u8>>) -> Vec<u8> {
    let mut w = Writer::new();
    w.write::<u32>(kind.signature());

    // Write table directory. A `BTreeMap` is already sorted by tag.
    let count = tables.len() as u16;
    let entry_selector = (count as f32).log2().floor() as u16;
    let search_range = 2u16.pow(u32::from(entry_selector)) * 16;
    let range_shift = count * 16 - search_range;
    w.write(count);
    w.write(search_range);
    w.write(entry_selector);
    w.write(range_shift);

    // The checksum adjustment in `head` can only be written once the whole
    // font has been checksummed.
    let mut checksum_adjustment_offset = None;

    // Write table records.
    let mut offset = 12 + tables.len() * 16;
    for (&tag, data) in &mut tables {
        if tag == Tag::HEAD {
            if let Some(field) = data.get_mut(8..12) {
                field.fill(0);
                checksum_adjustment_offset = Some(offset + 8);
            }
        }

        let len = data.len();
        TableRecord {
            tag,
            checksum: checksum(data),
            offset: offset as u32,
            length: len as u32,
        }
        .write(&mut w);

        // Increase offset, plus padding zeros to align to 4 bytes.
        offset += len;
        while offset % 4 != 0 {
            offset += 1;
        }
    }

    // Write tables.
    for data in tables.values() {
        w.extend(data);
        w.align(4);
    }

    // Write checksum adjustment field in head table.
    let mut data = w.finish();
    if let Some(i) = checksum_adjustment_offset {
        let sum = checksum(&data);
        let val = 0xB1B0AFBA_u32.wrapping_sub(sum);
        data[i..i + 4].copy_from_slice(&val.to_be_bytes());
    }

    data
}

/// Calculate a checksum over the sliced data as a sum of u32s. If the data
/// length is not a multiple of four, it is treated as if padded with zero to a
/// length that is a multiple of four.
fn checksum(data: &[u8]) -> u32 {
    let mut sum = 0u32;
    for chunk in data.chunks(4) {
        let mut bytes = [0; 4];
        bytes[..chunk.len()].copy_from_slice(chunk);
        sum = sum.wrapping_add(u32::from_be_bytes(bytes));
    }
    sum
}

/// An entry of the table directory.
#[derive(Debug, Copy, Clone)]
struct TableRecord {
    tag: Tag,
    checksum: u32,
    offset: u32,
    length: u32,
}

impl TableRecord {
    fn read(r: &mut Reader) -> Option<Self> {
        Some(Self {
            tag: Tag(r.read::<[u8; 4]>()?),
            checksum: r.read::<u32>()?,
            offset: r.read::<u32>()?,
            length: r.read::<u32>()?,
        })
    }

    fn write(&self, w: &mut Writer) {
        w.write::<[u8; 4]>(self.tag.0);
        w.write::<u32>(self.checksum);
        w.write::<u32>(self.offset);
        w.write::<u32>(self.length);
    }
}

/// What kind of contents the font has.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum FontKind {
    /// TrueType outlines.
    TrueType,
    /// CFF outlines
    Cff,
    /// A font collection.
    Collection,
}

impl FontKind {
    fn from_signature(signature: u32) -> Option<Self> {
        match signature {
            0x00010000 | 0x74727565 => Some(Self::TrueType),
            0x4F54544F => Some(Self::Cff),
            0x74746366 => Some(Self::Collection),
            _ => None,
        }
    }

    fn signature(self) -> u32 {
        match self {
            Self::TrueType => 0x00010000,
            Self::Cff => 0x4F54544F,
            Self::Collection => 0x74746366,
        }
    }
}
