//! Synthetic fonts and an in-memory glyph store for the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use fontcloak::outline::{
    CharMap, ContourGlyph, Glyph, GlyphId, GlyphOutline, Metrics, OutlineKind, OutlineStore,
    Point, SimpleGlyph,
};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// The characters of [`cjk_font`], in glyph order after `.notdef`.
pub const CJK: [char; 6] = ['一', '丁', '七', '三', '上', '下'];

/// A glyph of a synthetic TrueType font.
#[derive(Debug, Clone)]
pub enum TestGlyph {
    Empty,
    Simple(Vec<Vec<(i16, i16)>>),
    Composite(Vec<u16>),
    /// Components moved by `(dx, dy)`.
    Placed(Vec<(u16, i16, i16)>),
}

impl TestGlyph {
    fn components(&self) -> Vec<(u16, i16, i16)> {
        match self {
            TestGlyph::Composite(ids) => ids.iter().map(|&id| (id, 0, 0)).collect(),
            TestGlyph::Placed(components) => components.clone(),
            _ => vec![],
        }
    }
}

/// A closed square contour.
pub fn square(x: i16, y: i16, size: i16) -> Vec<(i16, i16)> {
    vec![(x, y), (x + size, y), (x + size, y + size), (x, y + size)]
}

/// A TrueType font with one differently sized square per character of
/// [`CJK`] plus `A`, each with its own advance.
pub fn cjk_font() -> Vec<u8> {
    let mut glyphs = vec![(TestGlyph::Empty, 500)];
    let mut chars = vec![];
    for (i, &c) in CJK.iter().chain(['A'].iter()).enumerate() {
        let i = i as i16;
        let contours = vec![square(10 + i, 0, 100 + 50 * i), square(300, 300 + i, 20)];
        glyphs.push((TestGlyph::Simple(contours), 600 + 10 * i as u16));
        chars.push((c, i as u16 + 1));
    }
    truetype(&glyphs, &chars)
}

/// Build a TrueType font. Glyph `i` of `glyphs` gets id `i`.
pub fn truetype(glyphs: &[(TestGlyph, u16)], chars: &[(char, u16)]) -> Vec<u8> {
    fn points(glyphs: &[(TestGlyph, u16)], g: &TestGlyph) -> Vec<(i16, i16)> {
        match g {
            TestGlyph::Simple(contours) => contours.iter().flatten().copied().collect(),
            TestGlyph::Empty => vec![],
            _ => g
                .components()
                .into_iter()
                .flat_map(|(id, dx, dy)| {
                    points(glyphs, &glyphs[usize::from(id)].0)
                        .into_iter()
                        .map(move |(x, y)| (x + dx, y + dy))
                })
                .collect(),
        }
    }

    let mut glyf = vec![];
    let mut loca = vec![];
    let mut hmtx = vec![];
    for (glyph, advance) in glyphs {
        loca.extend((glyf.len() as u32).to_be_bytes());
        let bbox = bbox(&points(glyphs, glyph));

        match glyph {
            TestGlyph::Empty => {}
            TestGlyph::Simple(contours) => {
                glyf.extend((contours.len() as i16).to_be_bytes());
                glyf.extend(bbox.iter().flat_map(|v| v.to_be_bytes()));
                let mut end = 0u16;
                for contour in contours {
                    end += contour.len() as u16;
                    glyf.extend((end - 1).to_be_bytes());
                }
                glyf.extend(0u16.to_be_bytes()); // instructions
                let all = points(glyphs, glyph);
                glyf.extend(std::iter::repeat(0x01).take(all.len()));
                let mut prev = (0i16, 0i16);
                for &(x, _) in &all {
                    glyf.extend((x - prev.0).to_be_bytes());
                    prev.0 = x;
                }
                for &(_, y) in &all {
                    glyf.extend((y - prev.1).to_be_bytes());
                    prev.1 = y;
                }
            }
            TestGlyph::Composite(_) | TestGlyph::Placed(_) => {
                glyf.extend((-1i16).to_be_bytes());
                glyf.extend(bbox.iter().flat_map(|v| v.to_be_bytes()));
                let components = glyph.components();
                for (i, &(id, dx, dy)) in components.iter().enumerate() {
                    let more = if i + 1 < components.len() { 0x0020 } else { 0 };
                    // Word arguments that are x and y offsets.
                    glyf.extend((0x0003u16 | more).to_be_bytes());
                    glyf.extend(id.to_be_bytes());
                    glyf.extend(dx.to_be_bytes());
                    glyf.extend(dy.to_be_bytes());
                }
            }
        }

        while glyf.len() % 4 != 0 {
            glyf.push(0);
        }

        hmtx.extend(advance.to_be_bytes());
        hmtx.extend(bbox[0].to_be_bytes());
    }
    loca.extend((glyf.len() as u32).to_be_bytes());

    let num_glyphs = glyphs.len() as u16;
    let tables = vec![
        (*b"head", head(1)),
        (*b"hhea", hhea(num_glyphs)),
        (*b"maxp", maxp(num_glyphs)),
        (*b"hmtx", hmtx),
        (*b"cmap", cmap(chars)),
        (*b"loca", loca),
        (*b"glyf", glyf),
        (*b"post", post(num_glyphs)),
        (*b"LTSH", vec![0, 0, 0, 1]),
    ];
    sfnt(0x00010000, tables)
}

/// Build a CFF font with one charstring per glyph and optional local
/// subroutines.
pub fn cff(
    char_strings: &[Vec<u8>],
    local_subrs: &[Vec<u8>],
    advances: &[u16],
    chars: &[(char, u16)],
) -> Vec<u8> {
    let num_glyphs = char_strings.len() as u16;

    let mut names = vec![];
    write_index(&mut names, &[b"Test".to_vec()]);
    let mut strings = vec![];
    write_index(&mut strings, &[]);
    let mut global_subrs = vec![];
    write_index(&mut global_subrs, &[]);

    let mut charset = vec![0];
    for sid in 1..num_glyphs {
        charset.extend(sid.to_be_bytes());
    }

    let mut char_strings_index = vec![];
    write_index(&mut char_strings_index, char_strings);

    // nominalWidthX 0, then Subrs right after the dict.
    let mut private = vec![139, 21];
    if !local_subrs.is_empty() {
        private.extend(int(8));
        private.push(19);
    }
    let mut subrs_index = vec![];
    if !local_subrs.is_empty() {
        write_index(&mut subrs_index, local_subrs);
    }

    // Top DICT entries have a fixed size, so offsets can be computed upfront.
    let top_dict_len = 6 + 6 + 11;
    let top_index_len = 2 + 1 + 2 * 4 + top_dict_len;
    let charset_offset = 4 + names.len() + top_index_len + strings.len() + global_subrs.len();
    let char_strings_offset = charset_offset + charset.len();
    let private_offset = char_strings_offset + char_strings_index.len();

    let mut top_dict = vec![];
    top_dict.extend(int(charset_offset as i32));
    top_dict.push(15);
    top_dict.extend(int(char_strings_offset as i32));
    top_dict.push(17);
    top_dict.extend(int(private.len() as i32));
    top_dict.extend(int(private_offset as i32));
    top_dict.push(18);
    assert_eq!(top_dict.len(), top_dict_len);

    let mut data = vec![1, 0, 4, 4];
    data.extend(names);
    write_index(&mut data, &[top_dict]);
    data.extend(strings);
    data.extend(global_subrs);
    assert_eq!(data.len(), charset_offset);
    data.extend(charset);
    data.extend(char_strings_index);
    data.extend(private);
    data.extend(subrs_index);

    let mut hmtx = vec![];
    for &advance in advances {
        hmtx.extend(advance.to_be_bytes());
        hmtx.extend(0i16.to_be_bytes());
    }

    let tables = vec![
        (*b"head", head(0)),
        (*b"hhea", hhea(num_glyphs)),
        (*b"maxp", maxp(num_glyphs)),
        (*b"hmtx", hmtx),
        (*b"cmap", cmap(chars)),
        (*b"CFF ", data),
        (*b"post", post(num_glyphs)),
    ];
    sfnt(0x4F54544F, tables)
}

/// A charstring operand as a three-byte integer.
pub fn num(v: i16) -> Vec<u8> {
    let mut bytes = vec![28];
    bytes.extend(v.to_be_bytes());
    bytes
}

/// A charstring drawing a `w` by `h` rectangle at `(x, y)`.
pub fn rect_charstring(x: i16, y: i16, w: i16, h: i16) -> Vec<u8> {
    let mut cs = vec![];
    cs.extend(num(x));
    cs.extend(num(y));
    cs.push(21); // rmoveto
    cs.extend(num(w));
    cs.extend(num(0));
    cs.extend(num(0));
    cs.extend(num(h));
    cs.extend(num(-w));
    cs.extend(num(0));
    cs.push(5); // rlineto
    cs.push(14); // endchar
    cs
}

fn int(v: i32) -> Vec<u8> {
    let mut bytes = vec![29];
    bytes.extend(v.to_be_bytes());
    bytes
}

fn write_index(out: &mut Vec<u8>, items: &[Vec<u8>]) {
    out.extend((items.len() as u16).to_be_bytes());
    if items.is_empty() {
        return;
    }
    out.push(4);
    let mut offset = 1u32;
    out.extend(offset.to_be_bytes());
    for item in items {
        offset += item.len() as u32;
        out.extend(offset.to_be_bytes());
    }
    for item in items {
        out.extend(item);
    }
}

fn bbox(points: &[(i16, i16)]) -> [i16; 4] {
    if points.is_empty() {
        return [0; 4];
    }
    let xs = points.iter().map(|p| p.0);
    let ys = points.iter().map(|p| p.1);
    [
        xs.clone().min().unwrap_or(0),
        ys.clone().min().unwrap_or(0),
        xs.max().unwrap_or(0),
        ys.max().unwrap_or(0),
    ]
}

fn head(index_to_loc_format: i16) -> Vec<u8> {
    let mut t = vec![];
    t.extend(0x00010000u32.to_be_bytes()); // version
    t.extend(0x00010000u32.to_be_bytes()); // revision
    t.extend(0u32.to_be_bytes()); // checksum adjustment
    t.extend(0x5F0F3CF5u32.to_be_bytes()); // magic
    t.extend(0u16.to_be_bytes()); // flags
    t.extend(1000u16.to_be_bytes()); // units per em
    t.extend([0; 16]); // created, modified
    t.extend([0; 8]); // bbox
    t.extend(0u16.to_be_bytes()); // mac style
    t.extend(8u16.to_be_bytes()); // lowest rec ppem
    t.extend(2i16.to_be_bytes()); // direction hint
    t.extend(index_to_loc_format.to_be_bytes());
    t.extend(0i16.to_be_bytes()); // glyph data format
    assert_eq!(t.len(), 54);
    t
}

fn hhea(num_h_metrics: u16) -> Vec<u8> {
    let mut t = vec![];
    t.extend(0x00010000u32.to_be_bytes());
    t.extend(800i16.to_be_bytes());
    t.extend((-200i16).to_be_bytes());
    t.extend(0i16.to_be_bytes());
    t.extend([0; 22]); // advance max up to reserved fields
    t.extend(0i16.to_be_bytes()); // metric data format
    t.extend(num_h_metrics.to_be_bytes());
    assert_eq!(t.len(), 36);
    t
}

fn maxp(num_glyphs: u16) -> Vec<u8> {
    let mut t = vec![];
    t.extend(0x00005000u32.to_be_bytes());
    t.extend(num_glyphs.to_be_bytes());
    t
}

/// A version 2 `post` table naming every glyph `.notdef`.
fn post(num_glyphs: u16) -> Vec<u8> {
    let mut t = vec![];
    t.extend(0x00020000u32.to_be_bytes());
    t.extend([0; 28]);
    t.extend(num_glyphs.to_be_bytes());
    for _ in 0..num_glyphs {
        t.extend(0u16.to_be_bytes());
    }
    t
}

/// A `cmap` with a single format 4 subtable and one segment per character.
fn cmap(chars: &[(char, u16)]) -> Vec<u8> {
    let mut sorted: Vec<(u16, u16)> = chars.iter().map(|&(c, g)| (c as u16, g)).collect();
    sorted.sort();
    sorted.push((0xFFFF, 0));

    let seg_count = sorted.len() as u16;
    let entry_selector = (seg_count as f32).log2().floor() as u16;
    let search_range = 2 * 2u16.pow(u32::from(entry_selector));

    let mut sub = vec![];
    sub.extend(4u16.to_be_bytes());
    sub.extend((16 + 8 * seg_count).to_be_bytes());
    sub.extend(0u16.to_be_bytes());
    sub.extend((2 * seg_count).to_be_bytes());
    sub.extend(search_range.to_be_bytes());
    sub.extend(entry_selector.to_be_bytes());
    sub.extend((2 * seg_count - search_range).to_be_bytes());
    for &(c, _) in &sorted {
        sub.extend(c.to_be_bytes());
    }
    sub.extend(0u16.to_be_bytes());
    for &(c, _) in &sorted {
        sub.extend(c.to_be_bytes());
    }
    for &(c, g) in &sorted {
        let delta = if c == 0xFFFF { 1 } else { g.wrapping_sub(c) };
        sub.extend(delta.to_be_bytes());
    }
    for _ in &sorted {
        sub.extend(0u16.to_be_bytes());
    }

    let mut t = vec![];
    t.extend(0u16.to_be_bytes());
    t.extend(1u16.to_be_bytes());
    t.extend(3u16.to_be_bytes());
    t.extend(1u16.to_be_bytes());
    t.extend(12u32.to_be_bytes());
    t.extend(sub);
    t
}

fn sfnt(version: u32, mut tables: Vec<([u8; 4], Vec<u8>)>) -> Vec<u8> {
    tables.sort_by_key(|(tag, _)| *tag);
    let count = tables.len() as u16;
    let entry_selector = (count as f32).log2().floor() as u16;
    let search_range = 2u16.pow(u32::from(entry_selector)) * 16;

    let mut data = vec![];
    data.extend(version.to_be_bytes());
    data.extend(count.to_be_bytes());
    data.extend(search_range.to_be_bytes());
    data.extend(entry_selector.to_be_bytes());
    data.extend((count * 16 - search_range).to_be_bytes());

    let mut offset = 12 + 16 * tables.len();
    for (tag, table) in &tables {
        data.extend(tag);
        data.extend(0u32.to_be_bytes());
        data.extend((offset as u32).to_be_bytes());
        data.extend((table.len() as u32).to_be_bytes());
        offset += (table.len() + 3) & !3;
    }
    for (_, table) in &tables {
        data.extend(table);
        while data.len() % 4 != 0 {
            data.push(0);
        }
    }
    data
}

/// Records an outline as text, one command per entry.
#[derive(Debug, Default)]
pub struct Recorder(pub Vec<String>);

impl ttf_parser::OutlineBuilder for Recorder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.push(format!("M {x} {y}"));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.push(format!("L {x} {y}"));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.push(format!("Q {x1} {y1} {x} {y}"));
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.push(format!("C {x1} {y1} {x2} {y2} {x} {y}"));
    }

    fn close(&mut self) {
        self.0.push("Z".into());
    }
}

/// The outline `face` renders for `c`, independent of the glyph id.
pub fn outline_of(face: &ttf_parser::Face, c: char) -> Option<Vec<String>> {
    let id = face.glyph_index(c)?;
    let mut recorder = Recorder::default();
    face.outline_glyph(id, &mut recorder)?;
    Some(recorder.0)
}

/// The advance `face` uses for `c`.
pub fn advance_of(face: &ttf_parser::Face, c: char) -> Option<u16> {
    face.glyph_hor_advance(face.glyph_index(c)?)
}

/// A glyph store without any binary format behind it.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    pub kind: Option<OutlineKind>,
    pub char_map: CharMap,
    pub glyphs: Vec<Glyph>,
}

impl MemoryStore {
    /// One simple glyph per character, each a square of a different size.
    pub fn contours(chars: &[char]) -> Self {
        let mut glyphs = vec![simple_glyph(&[], 0)];
        let mut char_map = BTreeMap::new();
        for (i, &c) in chars.iter().enumerate() {
            let i = i as i16;
            glyphs.push(simple_glyph(&square(5 * i, 0, 100 + 10 * i), 500 + i as u16));
            char_map.insert(c, i as GlyphId + 1);
        }
        Self { kind: Some(OutlineKind::Contour), char_map, glyphs }
    }
}

pub fn simple_glyph(points: &[(i16, i16)], advance: u16) -> Glyph {
    let outline = if points.is_empty() {
        ContourGlyph::Empty
    } else {
        ContourGlyph::Simple(SimpleGlyph {
            end_points: vec![points.len() as u16 - 1],
            points: points.iter().map(|&(x, y)| Point { x, y, on_curve: true }).collect(),
            instructions: vec![],
        })
    };
    let lsb = points.iter().map(|p| p.0).min().unwrap_or(0);
    Glyph { outline: GlyphOutline::Contour(outline), metrics: Metrics { advance, lsb } }
}

impl OutlineStore for MemoryStore {
    fn outline_kind(&self) -> Option<OutlineKind> {
        self.kind
    }

    fn char_map(&self) -> &CharMap {
        &self.char_map
    }

    fn num_glyphs(&self) -> u16 {
        self.glyphs.len() as u16
    }

    fn glyph(&self, id: GlyphId) -> fontcloak::Result<Glyph> {
        self.glyphs.get(usize::from(id)).cloned().ok_or(fontcloak::Error::InvalidOffset)
    }

    fn set_glyph(&mut self, id: GlyphId, glyph: Glyph) -> fontcloak::Result<()> {
        let slot = self.glyphs.get_mut(usize::from(id)).ok_or(fontcloak::Error::InvalidOffset)?;
        *slot = glyph;
        Ok(())
    }
}
