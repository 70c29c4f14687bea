//! The `CFF ` table.
//!
//! Only name-keyed fonts with a single Private DICT are rewritten. CID-keyed
//! fonts and fonts with a custom encoding are reported as unsupported.

mod charstring;
mod dict;
mod index;

use std::ops::Range;

use log::debug;

use self::charstring::Subroutines;
use self::dict::{private, top, Dict};
use crate::outline::{GlyphId, PathGlyph};
use crate::stream::{Reader, Writer};
use crate::{Error, Result};

/// A parsed CFF table, without its charstrings.
#[derive(Debug, Clone)]
pub struct Table {
    names: Vec<Vec<u8>>,
    top_dict: Dict,
    strings: Vec<Vec<u8>>,
    global_subrs: Vec<Vec<u8>>,
    /// The string id of every glyph, `.notdef` included.
    charset: Vec<u16>,
    private_dict: Option<Dict>,
    local_subrs: Vec<Vec<u8>>,
}

/// Recorded offsets that will be written into DICTs.
#[derive(Default)]
struct Offsets {
    charset: usize,
    char_strings: usize,
    private_dict: Option<Range<usize>>,
    local_subrs: Option<usize>,
}

/// Why a CFF table cannot be rewritten, if it cannot.
pub fn unsupported_reason(cff: &[u8]) -> Option<&'static str> {
    let Some(top_dict) = read_top_dict(cff) else {
        return Some("malformed CFF table");
    };

    if top_dict.contains(top::ROS) {
        Some("CID-keyed CFF outlines")
    } else if top_dict.get_offset(top::ENCODING).is_some_and(|offset| offset > 1) {
        Some("CFF outlines with a custom encoding")
    } else if top_dict.get_offset(top::CHARSTRING_TYPE).is_some_and(|t| t != 2) {
        Some("Type 1 charstrings")
    } else {
        None
    }
}

fn read_top_dict(cff: &[u8]) -> Option<Dict> {
    let header_size = usize::from(*cff.get(2)?);
    let mut r = Reader::new_at(cff, header_size);
    index::read(&mut r)?; // names
    let top_dicts = index::read(&mut r)?;
    Dict::read(top_dicts.first()?)
}

impl Table {
    /// Parse the table and return it with the raw charstrings.
    pub fn read(cff: &[u8], num_glyphs: u16) -> Result<(Self, Vec<Vec<u8>>)> {
        let major = *cff.first().ok_or(Error::MissingData)?;
        if major != 1 {
            return Err(Error::Unimplemented("CFF versions other than 1"));
        }

        let header_size = usize::from(*cff.get(2).ok_or(Error::MissingData)?);
        let mut r = Reader::new_at(cff, header_size);

        // Read four indices at fixed positions.
        let names = owned(index::read(&mut r).ok_or(Error::MissingData)?);
        let top_dicts = index::read(&mut r).ok_or(Error::MissingData)?;
        let strings = owned(index::read(&mut r).ok_or(Error::MissingData)?);
        let global_subrs = owned(index::read(&mut r).ok_or(Error::MissingData)?);

        let top_dict = top_dicts.first().and_then(|data| Dict::read(data)).ok_or(Error::InvalidData)?;

        let char_strings = {
            let offset = top_dict.get_offset(top::CHAR_STRINGS).ok_or(Error::MissingData)?;
            owned(index::read_at(cff, offset).ok_or(Error::InvalidOffset)?)
        };
        if char_strings.len() != usize::from(num_glyphs) {
            return Err(Error::InvalidData);
        }

        let charset = match top_dict.get_offset(top::CHARSET).unwrap_or(0) {
            // ISOAdobe: the string id equals the glyph id.
            0 => (0..num_glyphs).collect(),
            1 | 2 => return Err(Error::Unimplemented("expert charsets")),
            offset => {
                let data = cff.get(offset..).ok_or(Error::InvalidOffset)?;
                read_charset(data, num_glyphs).ok_or(Error::InvalidData)?
            }
        };

        // Read Private DICT with local subroutines.
        let mut private_dict = None;
        let mut local_subrs = vec![];
        if let Some(range) = top_dict.get_range(top::PRIVATE) {
            let start = range.start;
            let data = cff.get(range).ok_or(Error::InvalidOffset)?;
            let dict = Dict::read(data).ok_or(Error::InvalidData)?;

            if let Some(offset) = dict.get_offset(private::SUBRS) {
                local_subrs = owned(index::read_at(cff, start + offset).ok_or(Error::InvalidOffset)?);
            }

            private_dict = Some(dict);
        }

        debug!(
            "read CFF table with {} charstrings, {} global and {} local subroutines",
            char_strings.len(),
            global_subrs.len(),
            local_subrs.len()
        );

        let table = Self { names, top_dict, strings, global_subrs, charset, private_dict, local_subrs };
        Ok((table, char_strings))
    }

    /// Decode a charstring of this font.
    pub fn decode(&self, data: &[u8]) -> Result<PathGlyph> {
        let subrs = Subroutines { global: &self.global_subrs, local: &self.local_subrs };
        charstring::decode(data, &subrs)
    }

    /// Encode a charstring for this font.
    pub fn encode(&self, glyph: &PathGlyph) -> Vec<u8> {
        charstring::encode(glyph)
    }

    /// The nominal and default width from the Private DICT.
    pub fn widths(&self) -> (f64, f64) {
        let get = |op| {
            self.private_dict
                .as_ref()
                .and_then(|dict| dict.get(op))
                .and_then(|values| values.first().copied())
                .unwrap_or(0.0)
        };
        (get(private::NOMINAL_WIDTH_X), get(private::DEFAULT_WIDTH_X))
    }

    /// The glyph name of `id`, if the font has one.
    pub fn glyph_name(&self, id: GlyphId) -> Option<String> {
        let sid = usize::from(*self.charset.get(usize::from(id))?);
        if sid < NUM_STANDARD_STRINGS {
            return STANDARD_STRINGS.get(sid).map(|&name| name.into());
        }
        let string = self.strings.get(sid - NUM_STANDARD_STRINGS)?;
        std::str::from_utf8(string).ok().map(Into::into)
    }

    /// Keep only the charset entries of `old_gids`, in that order.
    pub fn subset_charset(&mut self, old_gids: impl Iterator<Item = GlyphId>) {
        self.charset = old_gids.map(|g| self.charset.get(usize::from(g)).copied().unwrap_or(0)).collect();
    }

    /// Construct a new CFF table with `char_strings`.
    pub fn write(&self, char_strings: &[Vec<u8>]) -> Vec<u8> {
        let mut top_dict = self.top_dict.clone();
        let mut private_dict = self.private_dict.clone();
        let has_local_subrs = !self.local_subrs.is_empty();
        if !has_local_subrs {
            if let Some(dict) = &mut private_dict {
                dict.remove(private::SUBRS);
            }
        }

        // Offset entries have a fixed size, so placeholders in the first run
        // already give the final layout.
        let mut offsets = Offsets {
            private_dict: private_dict.is_some().then_some(0..0),
            local_subrs: (private_dict.is_some() && has_local_subrs).then_some(0),
            ..Offsets::default()
        };
        let mut data = vec![];

        // The second run writes the offsets recorded in the first one.
        for _ in 0..2 {
            top_dict.set_offset(top::CHARSET, offsets.charset);
            top_dict.set_offset(top::CHAR_STRINGS, offsets.char_strings);
            if let Some(range) = &offsets.private_dict {
                top_dict.set_range(top::PRIVATE, range);
            }
            if let (Some(dict), Some(offset)) = (&mut private_dict, offsets.local_subrs) {
                dict.set_offset(private::SUBRS, offset);
            }

            // Write header.
            let mut w = Writer::new();
            w.write::<u8>(1);
            w.write::<u8>(0);
            w.write::<u8>(4);
            w.write::<u8>(4);

            // Write the four fixed indices.
            index::write(&mut w, &self.names);
            let mut top_data = Writer::new();
            top_dict.write(&mut top_data);
            index::write(&mut w, &[top_data.finish()]);
            index::write(&mut w, &self.strings);
            index::write(&mut w, &self.global_subrs);

            // Write charset in format 0.
            offsets.charset = w.len();
            w.write::<u8>(0);
            for &sid in self.charset.iter().skip(1) {
                w.write::<u16>(sid);
            }

            offsets.char_strings = w.len();
            index::write(&mut w, char_strings);

            // Write private dict.
            let private_start = w.len();
            if let Some(dict) = &private_dict {
                dict.write(&mut w);
                offsets.private_dict = Some(private_start..w.len());
            }

            // Write local subroutines.
            if private_dict.is_some() && has_local_subrs {
                offsets.local_subrs = Some(w.len() - private_start);
                index::write(&mut w, &self.local_subrs);
            }

            data = w.finish();
        }

        data
    }
}

fn owned(items: Vec<&[u8]>) -> Vec<Vec<u8>> {
    items.into_iter().map(<[u8]>::to_vec).collect()
}

/// Parse a charset into the string id of every glyph.
fn read_charset(data: &[u8], num_glyphs: u16) -> Option<Vec<u16>> {
    let mut r = Reader::new(data);
    let total = usize::from(num_glyphs);
    let mut sids = Vec::with_capacity(total);
    sids.push(0);

    let format = r.read::<u8>()?;
    while sids.len() < total {
        match format {
            0 => sids.push(r.read::<u16>()?),
            1 | 2 => {
                let first = r.read::<u16>()?;
                let left = if format == 1 { u16::from(r.read::<u8>()?) } else { r.read::<u16>()? };
                for i in 0..=left {
                    sids.push(first.checked_add(i)?);
                }
            }
            _ => return None,
        }
    }

    sids.truncate(total);
    Some(sids)
}

/// The number of predefined strings before the String INDEX.
const NUM_STANDARD_STRINGS: usize = 391;

/// The first standard strings, enough to name the glyphs of the ISOAdobe
/// charset up to `z`.
const STANDARD_STRINGS: &[&str] = &[
    ".notdef", "space", "exclam", "quotedbl", "numbersign", "dollar", "percent",
    "ampersand", "quoteright", "parenleft", "parenright", "asterisk", "plus", "comma",
    "hyphen", "period", "slash", "zero", "one", "two", "three", "four", "five", "six",
    "seven", "eight", "nine", "colon", "semicolon", "less", "equal", "greater",
    "question", "at", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M",
    "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z", "bracketleft",
    "backslash", "bracketright", "asciicircum", "underscore", "quoteleft", "a", "b",
    "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s",
    "t", "u", "v", "w", "x", "y", "z",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_formats() {
        // Format 0 with two glyphs after .notdef.
        assert_eq!(read_charset(&[0, 0, 5, 0, 9], 3), Some(vec![0, 5, 9]));
        // Format 1 with one range of four glyphs.
        assert_eq!(read_charset(&[1, 0, 100, 3], 5), Some(vec![0, 100, 101, 102, 103]));
        // Format 2 ranges are truncated at the glyph count.
        assert_eq!(read_charset(&[2, 0, 7, 0, 10], 3), Some(vec![0, 7, 8]));
    }
}
