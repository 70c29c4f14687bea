//! Type 2 charstrings.
//!
//! Decoding executes subroutine calls and records the operators they
//! produce, so the resulting [`PathGlyph`] no longer depends on the
//! subroutine INDEXes of its font.

use crate::outline::{Number, Operator, PathCommand, PathGlyph};
use crate::stream::{Reader, Writer};
use crate::{Error, Result};

const TWO_BYTE_OPERATOR_MARK: u8 = 12;
const FIXED_16_16: u8 = 255;
const MAX_ARGUMENTS: usize = 48;
const MAX_CALL_DEPTH: u8 = 10;

/// The subroutines available to a charstring.
pub struct Subroutines<'a> {
    pub global: &'a [Vec<u8>],
    pub local: &'a [Vec<u8>],
}

/// Decoding state shared across subroutine calls.
struct Decompiler<'a> {
    subrs: &'a Subroutines<'a>,
    stack: Vec<Number>,
    stems: usize,
    width_parsed: bool,
    glyph: PathGlyph,
}

impl Decompiler<'_> {
    /// Take the width from the bottom of the stack if there are more
    /// operands than the first stack-clearing operator expects.
    fn parse_width(&mut self, has_extra: bool) {
        if !self.width_parsed {
            if has_extra && !self.stack.is_empty() {
                self.glyph.width = Some(self.stack.remove(0));
            }
            self.width_parsed = true;
        }
    }

    fn emit(&mut self, operator: Operator) {
        let operands = std::mem::take(&mut self.stack);
        self.glyph.commands.push(PathCommand::new(operator, operands));
    }

    /// Run a program. Returns `true` once `endchar` was seen.
    fn run(&mut self, data: &[u8], depth: u8) -> Result<bool> {
        if depth > MAX_CALL_DEPTH {
            return Err(Error::InvalidData);
        }

        let mut r = Reader::new(data);
        while !r.at_end() {
            let b0 = r.read::<u8>().ok_or(Error::MissingData)?;
            let number = match b0 {
                28 => Some(Number::Integer(i32::from(r.read::<i16>().ok_or(Error::MissingData)?))),
                32..=246 => Some(Number::Integer(i32::from(b0) - 139)),
                247..=250 => {
                    let b1 = i32::from(r.read::<u8>().ok_or(Error::MissingData)?);
                    Some(Number::Integer((i32::from(b0) - 247) * 256 + b1 + 108))
                }
                251..=254 => {
                    let b1 = i32::from(r.read::<u8>().ok_or(Error::MissingData)?);
                    Some(Number::Integer(-(i32::from(b0) - 251) * 256 - b1 - 108))
                }
                FIXED_16_16 => Some(Number::Fixed(r.read::<i32>().ok_or(Error::MissingData)?)),
                _ => None,
            };

            if let Some(number) = number {
                if self.stack.len() >= MAX_ARGUMENTS {
                    return Err(Error::InvalidData);
                }
                self.stack.push(number);
                continue;
            }

            let operator = if b0 == TWO_BYTE_OPERATOR_MARK {
                Operator(1200 + u16::from(r.read::<u8>().ok_or(Error::MissingData)?))
            } else {
                Operator(u16::from(b0))
            };

            match operator {
                Operator::HSTEM | Operator::VSTEM | Operator::HSTEMHM | Operator::VSTEMHM => {
                    self.parse_width(self.stack.len() % 2 == 1);
                    self.stems += self.stack.len() / 2;
                    self.emit(operator);
                }
                Operator::HINTMASK | Operator::CNTRMASK => {
                    // Operands before a mask are an implicit vstem.
                    self.parse_width(self.stack.len() % 2 == 1);
                    self.stems += self.stack.len() / 2;
                    let len = (self.stems + 7) / 8;
                    let mask = r.read_bytes(len).ok_or(Error::MissingData)?.to_vec();
                    self.emit(operator);
                    if let Some(command) = self.glyph.commands.last_mut() {
                        command.mask = mask;
                    }
                }
                Operator::RMOVETO => {
                    self.parse_width(self.stack.len() > 2);
                    self.emit(operator);
                }
                Operator::HMOVETO | Operator::VMOVETO => {
                    self.parse_width(self.stack.len() > 1);
                    self.emit(operator);
                }
                Operator::ENDCHAR => {
                    self.parse_width(self.stack.len() == 1 || self.stack.len() == 5);
                    self.emit(operator);
                    return Ok(true);
                }
                Operator::CALLSUBR | Operator::CALLGSUBR => {
                    let subrs = if operator == Operator::CALLSUBR {
                        self.subrs.local
                    } else {
                        self.subrs.global
                    };
                    let biased = self.stack.pop().and_then(Number::as_i32).ok_or(Error::InvalidData)?;
                    let index = biased.checked_add(bias(subrs.len())).ok_or(Error::InvalidData)?;
                    let subr = usize::try_from(index)
                        .ok()
                        .and_then(|i| subrs.get(i))
                        .ok_or(Error::InvalidOffset)?;
                    if self.run(subr, depth + 1)? {
                        return Ok(true);
                    }
                }
                Operator::RETURN => return Ok(false),
                Operator::RLINETO
                | Operator::HLINETO
                | Operator::VLINETO
                | Operator::RRCURVETO
                | Operator::RCURVELINE
                | Operator::RLINECURVE
                | Operator::VVCURVETO
                | Operator::HHCURVETO
                | Operator::VHCURVETO
                | Operator::HVCURVETO
                | Operator::HFLEX
                | Operator::FLEX
                | Operator::HFLEX1
                | Operator::FLEX1 => {
                    self.width_parsed = true;
                    self.emit(operator);
                }
                _ => return Err(Error::Unimplemented("charstring arithmetic operators")),
            }
        }

        Ok(false)
    }
}

/// The subroutine bias for an INDEX with `count` entries.
fn bias(count: usize) -> i32 {
    if count < 1240 {
        107
    } else if count < 33900 {
        1131
    } else {
        32768
    }
}

/// Decode a charstring, inlining all subroutine calls.
pub fn decode(data: &[u8], subrs: &Subroutines) -> Result<PathGlyph> {
    let mut decompiler = Decompiler {
        subrs,
        stack: vec![],
        stems: 0,
        width_parsed: false,
        glyph: PathGlyph::default(),
    };

    decompiler.run(data, 0)?;
    Ok(decompiler.glyph)
}

/// Encode a self-contained charstring.
pub fn encode(glyph: &PathGlyph) -> Vec<u8> {
    let mut w = Writer::new();
    if let Some(width) = glyph.width {
        write_number(&mut w, width);
    }

    for command in &glyph.commands {
        for &operand in &command.operands {
            write_number(&mut w, operand);
        }

        let Operator(op) = command.operator;
        if op >= 1200 {
            w.write::<u8>(TWO_BYTE_OPERATOR_MARK);
            w.write::<u8>((op - 1200) as u8);
        } else {
            w.write::<u8>(op as u8);
        }

        w.extend(&command.mask);
    }

    w.finish()
}

fn write_number(w: &mut Writer, number: Number) {
    match number {
        Number::Integer(n) => match n {
            -107..=107 => w.write::<u8>((n + 139) as u8),
            108..=1131 => {
                let n = n - 108;
                w.write::<u8>((n / 256 + 247) as u8);
                w.write::<u8>((n % 256) as u8);
            }
            -1131..=-108 => {
                let n = -n - 108;
                w.write::<u8>((n / 256 + 251) as u8);
                w.write::<u8>((n % 256) as u8);
            }
            -32768..=32767 => {
                w.write::<u8>(28);
                w.write::<i16>(n as i16);
            }
            // Larger integers only fit as 16.16 numbers.
            _ => {
                w.write::<u8>(FIXED_16_16);
                w.write::<i32>(n.clamp(-32768, 32767) << 16);
            }
        },
        Number::Fixed(raw) => {
            w.write::<u8>(FIXED_16_16);
            w.write::<i32>(raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i32) -> Number {
        Number::Integer(n)
    }

    #[test]
    fn number_encoding_covers_all_ranges() {
        for n in [0, 107, -107, 108, 1131, -108, -1131, 1132, -32768, 32767] {
            let glyph = PathGlyph {
                width: None,
                commands: vec![PathCommand::new(Operator::HMOVETO, vec![int(n)])],
            };
            let subrs = Subroutines { global: &[], local: &[] };
            assert_eq!(decode(&encode(&glyph), &subrs).unwrap(), glyph);
        }
    }

    #[test]
    fn subroutines_are_inlined() {
        // Local subroutine 0 draws a line and returns.
        let local = vec![vec![139 + 10, 139 + 20, 5, 11]];
        let subrs = Subroutines { global: &[], local: &local };
        // width 50, rmoveto 1 2, callsubr 0, endchar
        let data = [139 + 50, 139 + 1, 139 + 2, 21, 139 - 107, 10, 14];

        let glyph = decode(&data, &subrs).unwrap();
        assert_eq!(glyph.width, Some(int(50)));
        assert_eq!(
            glyph.commands,
            vec![
                PathCommand::new(Operator::RMOVETO, vec![int(1), int(2)]),
                PathCommand::new(Operator::RLINETO, vec![int(10), int(20)]),
                PathCommand::new(Operator::ENDCHAR, vec![]),
            ]
        );
    }

    #[test]
    fn hint_masks_follow_the_stem_count() {
        // hstemhm with 10 stems (20 operands), hintmask with two bytes.
        let mut data: Vec<u8> = std::iter::repeat(139 + 1).take(20).collect();
        data.extend([18, 19, 0xFF, 0xC0, 139, 139, 21, 14]);

        let subrs = Subroutines { global: &[], local: &[] };
        let glyph = decode(&data, &subrs).unwrap();
        assert_eq!(glyph.width, None);
        assert_eq!(glyph.commands[1].mask, vec![0xFF, 0xC0]);
        assert_eq!(encode(&glyph), data);
    }
}
