//! CFF DICT data.
//!
//! Entries keep their operands in encoded form, so copying a dictionary does
//! not round real numbers. Only the offset entries are decoded and rewritten.

use std::ops::Range;

use crate::stream::{Reader, Writer};

const TWO_BYTE_OPERATOR_MARK: u8 = 12;
const END_OF_FLOAT_FLAG: u8 = 0xF;

/// Top DICT operators.
pub mod top {
    pub const CHARSET: u16 = 15;
    pub const ENCODING: u16 = 16;
    pub const CHAR_STRINGS: u16 = 17;
    pub const PRIVATE: u16 = 18;
    pub const CHARSTRING_TYPE: u16 = 1206;
    pub const ROS: u16 = 1230;
}

/// Private DICT operators.
pub mod private {
    pub const SUBRS: u16 = 19;
    pub const DEFAULT_WIDTH_X: u16 = 20;
    pub const NOMINAL_WIDTH_X: u16 = 21;
}

/// A DICT entry.
#[derive(Debug, Clone)]
struct Pair {
    operator: u16,
    operands: Vec<u8>,
}

/// A DICT.
#[derive(Debug, Clone, Default)]
pub struct Dict(Vec<Pair>);

impl Dict {
    /// Parse a DICT.
    pub fn read(data: &[u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let mut pairs = vec![];
        let mut start = 0;

        while !r.at_end() {
            let b = r.peak::<u8>()?;
            if is_operator(b) {
                let operands = data.get(start..r.offset())?.to_vec();
                r.read::<u8>()?;
                let operator = if b == TWO_BYTE_OPERATOR_MARK {
                    1200 + u16::from(r.read::<u8>()?)
                } else {
                    u16::from(b)
                };
                pairs.push(Pair { operator, operands });
                start = r.offset();
            } else {
                skip_number(&mut r)?;
            }
        }

        Some(Self(pairs))
    }

    /// Write the DICT.
    pub fn write(&self, w: &mut Writer) {
        for pair in &self.0 {
            w.extend(&pair.operands);
            if pair.operator >= 1200 {
                w.write::<u8>(TWO_BYTE_OPERATOR_MARK);
                w.write::<u8>((pair.operator - 1200) as u8);
            } else {
                w.write::<u8>(pair.operator as u8);
            }
        }
    }

    /// Whether the DICT has an entry for `operator`.
    pub fn contains(&self, operator: u16) -> bool {
        self.0.iter().any(|pair| pair.operator == operator)
    }

    /// The decoded operands of `operator`.
    pub fn get(&self, operator: u16) -> Option<Vec<f64>> {
        let pair = self.0.iter().find(|pair| pair.operator == operator)?;
        let mut r = Reader::new(&pair.operands);
        let mut numbers = vec![];
        while !r.at_end() {
            numbers.push(read_number(&mut r)?);
        }
        Some(numbers)
    }

    /// The single operand of `operator` as an offset.
    pub fn get_offset(&self, operator: u16) -> Option<usize> {
        match self.get(operator)?.as_slice() {
            &[offset] if offset >= 0.0 => Some(offset as usize),
            _ => None,
        }
    }

    /// The `[size offset]` operands of `operator` as a range.
    pub fn get_range(&self, operator: u16) -> Option<Range<usize>> {
        match self.get(operator)?.as_slice() {
            &[len, start] if len >= 0.0 && start >= 0.0 => {
                let start = start as usize;
                Some(start..start.checked_add(len as usize)?)
            }
            _ => None,
        }
    }

    /// Remove the entry for `operator`.
    pub fn remove(&mut self, operator: u16) {
        self.0.retain(|pair| pair.operator != operator);
    }

    /// Set an offset entry. Offsets are always written with five bytes so
    /// that the size of the DICT does not depend on their values.
    pub fn set_offset(&mut self, operator: u16, offset: usize) {
        let mut w = Writer::new();
        write_fixed_int(&mut w, offset as i32);
        self.set(operator, w.finish());
    }

    /// Set a `[size offset]` entry.
    pub fn set_range(&mut self, operator: u16, range: &Range<usize>) {
        let mut w = Writer::new();
        write_fixed_int(&mut w, range.len() as i32);
        write_fixed_int(&mut w, range.start as i32);
        self.set(operator, w.finish());
    }

    fn set(&mut self, operator: u16, operands: Vec<u8>) {
        match self.0.iter_mut().find(|pair| pair.operator == operator) {
            Some(pair) => pair.operands = operands,
            None => self.0.push(Pair { operator, operands }),
        }
    }
}

fn write_fixed_int(w: &mut Writer, n: i32) {
    w.write::<u8>(29);
    w.write::<i32>(n);
}

/// One-byte DICT operators, see Adobe Technical Note #5176, Appendix H.
fn is_operator(b: u8) -> bool {
    matches!(b, 0..=27 | 31 | 255)
}

fn skip_number(r: &mut Reader) -> Option<()> {
    read_number(r).map(|_| ())
}

fn read_number(r: &mut Reader) -> Option<f64> {
    let b0 = r.read::<u8>()?;
    Some(match b0 {
        28 => f64::from(r.read::<i16>()?),
        29 => f64::from(r.read::<i32>()?),
        30 => read_real(r)?,
        32..=246 => f64::from(i32::from(b0) - 139),
        247..=250 => f64::from((i32::from(b0) - 247) * 256 + i32::from(r.read::<u8>()?) + 108),
        251..=254 => f64::from(-(i32::from(b0) - 251) * 256 - i32::from(r.read::<u8>()?) - 108),
        _ => return None,
    })
}

fn read_real(r: &mut Reader) -> Option<f64> {
    let mut s = String::new();
    loop {
        let b = r.read::<u8>()?;
        for nibble in [b >> 4, b & 0xF] {
            match nibble {
                0..=9 => s.push(char::from(b'0' + nibble)),
                0xA => s.push('.'),
                0xB => s.push('E'),
                0xC => s.push_str("E-"),
                0xE => s.push('-'),
                END_OF_FLOAT_FLAG => return s.parse().ok(),
                _ => return None,
            }
        }
    }
}
