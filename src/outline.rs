//! Glyph outlines in the two forms a font can carry, and the capability
//! trait the remapper and the distortion engine work against.
//!
//! TrueType fonts store quadratic contours as point lists (`glyf`), CFF fonts
//! store Type 2 charstring programs. Both are represented by [`GlyphOutline`],
//! and all outline-touching code dispatches on its variant.

use std::collections::BTreeMap;

use crate::{Error, Result};

/// A glyph identifier, distinct from the character code it renders.
pub type GlyphId = u16;

/// A character to glyph map.
pub type CharMap = BTreeMap<char, GlyphId>;

/// Which outline form a font carries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OutlineKind {
    /// Quadratic contours with on/off-curve points (`glyf`).
    Contour,
    /// Type 2 charstring path commands (`CFF `).
    Path,
}

/// Access to the glyphs of a font.
///
/// This is everything the core needs from a font library. [`crate::Font`]
/// implements it for OpenType data.
pub trait OutlineStore {
    /// The outline form of the font, or `None` if it has no rewritable outlines.
    fn outline_kind(&self) -> Option<OutlineKind>;

    /// The best Unicode character map of the font.
    fn char_map(&self) -> &CharMap;

    /// The number of glyphs in the font.
    fn num_glyphs(&self) -> u16;

    /// Decode a single glyph.
    ///
    /// This may be expensive (decompression, subroutine expansion), callers
    /// that touch many glyphs repeatedly should cache the result.
    fn glyph(&self, id: GlyphId) -> Result<Glyph>;

    /// Replace the contents of a glyph slot.
    fn set_glyph(&mut self, id: GlyphId, glyph: Glyph) -> Result<()>;
}

/// A glyph: its outline plus the horizontal metrics that belong to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// The outline.
    pub outline: GlyphOutline,
    /// Advance width and left side bearing.
    pub metrics: Metrics,
}

/// Horizontal metrics of a glyph.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Metrics {
    /// The advance width.
    pub advance: u16,
    /// The left side bearing.
    pub lsb: i16,
}

/// The outline of a glyph in either form.
#[derive(Debug, Clone, PartialEq)]
pub enum GlyphOutline {
    /// A TrueType glyph.
    Contour(ContourGlyph),
    /// A CFF charstring.
    Path(PathGlyph),
}

impl GlyphOutline {
    /// The form of this outline.
    pub fn kind(&self) -> OutlineKind {
        match self {
            Self::Contour(_) => OutlineKind::Contour,
            Self::Path(_) => OutlineKind::Path,
        }
    }
}

/// A TrueType glyph description.
#[derive(Debug, Clone, PartialEq)]
pub enum ContourGlyph {
    /// A glyph without any outline, e.g. a space.
    Empty,
    /// A glyph that owns its points.
    Simple(SimpleGlyph),
    /// A glyph assembled from references to other glyphs.
    Composite(CompositeGlyph),
}

/// A glyph that owns its contour points.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SimpleGlyph {
    /// Index of the last point of each contour.
    pub end_points: Vec<u16>,
    /// All points of all contours.
    pub points: Vec<Point>,
    /// TrueType hinting instructions.
    pub instructions: Vec<u8>,
}

impl SimpleGlyph {
    /// The bounding box of the points, `None` if there are none.
    pub fn bbox(&self) -> Option<BBox> {
        let first = self.points.first()?;
        let init = BBox { x_min: first.x, y_min: first.y, x_max: first.x, y_max: first.y };
        Some(self.points.iter().fold(init, |b, p| BBox {
            x_min: b.x_min.min(p.x),
            y_min: b.y_min.min(p.y),
            x_max: b.x_max.max(p.x),
            y_max: b.y_max.max(p.y),
        }))
    }
}

/// A point of a TrueType contour.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Point {
    /// The x coordinate.
    pub x: i16,
    /// The y coordinate.
    pub y: i16,
    /// Whether the point is on the curve or a quadratic control point.
    pub on_curve: bool,
}

/// A composite glyph, kept in its binary form.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeGlyph {
    /// The bounding box stored in the glyph header.
    pub bbox: BBox,
    /// Component records and instructions, everything after the header.
    pub data: Vec<u8>,
}

impl CompositeGlyph {
    /// The ids of the referenced glyphs, in order.
    pub fn components(&self) -> Result<Vec<GlyphId>> {
        let components = crate::font::glyf::components(&self.data).ok_or(Error::InvalidData)?;
        Ok(components.into_iter().map(|(_, id)| id).collect())
    }

    /// Resolve the components and merge their transformed points into one
    /// simple glyph.
    ///
    /// `resolve` yields the simple outline of a component id.
    pub fn flatten(&self, resolve: impl FnMut(GlyphId) -> Result<SimpleGlyph>) -> Result<SimpleGlyph> {
        crate::font::glyf::flatten(&self.data, resolve)
    }
}

/// A bounding box in font units.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BBox {
    /// Minimum x.
    pub x_min: i16,
    /// Minimum y.
    pub y_min: i16,
    /// Maximum x.
    pub x_max: i16,
    /// Maximum y.
    pub y_max: i16,
}

impl BBox {
    /// The smallest box containing both boxes.
    pub fn union(self, other: Self) -> Self {
        Self {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }
}

/// A self-contained Type 2 charstring, with subroutine calls inlined.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PathGlyph {
    /// The advance width operand, relative to the nominal width.
    pub width: Option<Number>,
    /// The program, in order.
    pub commands: Vec<PathCommand>,
}

impl PathGlyph {
    /// The smallest x over all on-curve and control points, `None` if the
    /// program draws nothing.
    pub fn x_min(&self) -> Option<f64> {
        self.points().into_iter().map(|(x, _)| x).reduce(f64::min)
    }

    /// Every point the program visits, on-curve and control points alike,
    /// in absolute coordinates.
    pub fn points(&self) -> Vec<(f64, f64)> {
        let mut pen = Pen::default();
        for command in &self.commands {
            let args: Vec<f64> = command.operands.iter().map(|n| n.as_f64()).collect();
            pen.run(command.operator, &args);
        }
        pen.points
    }
}

/// Walks the relative coordinates of a charstring.
#[derive(Default)]
struct Pen {
    x: f64,
    y: f64,
    points: Vec<(f64, f64)>,
}

impl Pen {
    fn step(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
        self.points.push((self.x, self.y));
    }

    fn curve(&mut self, [a, b, c, d, e, f]: [f64; 6]) {
        self.step(a, b);
        self.step(c, d);
        self.step(e, f);
    }

    fn run(&mut self, operator: Operator, args: &[f64]) {
        match operator {
            Operator::RMOVETO | Operator::RLINETO => {
                args.chunks_exact(2).for_each(|p| self.step(p[0], p[1]));
            }
            Operator::HMOVETO => args.first().into_iter().for_each(|&dx| self.step(dx, 0.0)),
            Operator::VMOVETO => args.first().into_iter().for_each(|&dy| self.step(0.0, dy)),
            Operator::HLINETO | Operator::VLINETO => {
                let mut horizontal = operator == Operator::HLINETO;
                for &d in args {
                    if horizontal {
                        self.step(d, 0.0);
                    } else {
                        self.step(0.0, d);
                    }
                    horizontal = !horizontal;
                }
            }
            Operator::RRCURVETO => {
                for c in args.chunks_exact(6) {
                    self.curve([c[0], c[1], c[2], c[3], c[4], c[5]]);
                }
            }
            Operator::RCURVELINE => {
                let curves = args.len().saturating_sub(2) / 6 * 6;
                self.run(Operator::RRCURVETO, &args[..curves]);
                self.run(Operator::RLINETO, &args[curves..]);
            }
            Operator::RLINECURVE => {
                let lines = args.len().saturating_sub(6);
                self.run(Operator::RLINETO, &args[..lines]);
                self.run(Operator::RRCURVETO, &args[lines..]);
            }
            Operator::HHCURVETO | Operator::VVCURVETO => {
                let (mut first, rest) = match args.len() % 2 {
                    1 => (args[0], &args[1..]),
                    _ => (0.0, args),
                };
                for c in rest.chunks_exact(4) {
                    if operator == Operator::HHCURVETO {
                        self.curve([c[0], first, c[1], c[2], c[3], 0.0]);
                    } else {
                        self.curve([first, c[0], c[1], c[2], 0.0, c[3]]);
                    }
                    first = 0.0;
                }
            }
            Operator::HVCURVETO | Operator::VHCURVETO => {
                let mut horizontal = operator == Operator::HVCURVETO;
                let mut rest = args;
                while rest.len() >= 4 {
                    let last = if rest.len() == 5 { rest[4] } else { 0.0 };
                    if horizontal {
                        self.curve([rest[0], 0.0, rest[1], rest[2], last, rest[3]]);
                    } else {
                        self.curve([0.0, rest[0], rest[1], rest[2], rest[3], last]);
                    }
                    rest = &rest[4..];
                    horizontal = !horizontal;
                }
            }
            Operator::FLEX => self.run(Operator::RRCURVETO, &args[..args.len().min(12)]),
            Operator::HFLEX => {
                if let &[dx1, dx2, dy2, dx3, dx4, dx5, dx6, ..] = args {
                    self.curve([dx1, 0.0, dx2, dy2, dx3, 0.0]);
                    self.curve([dx4, 0.0, dx5, -dy2, dx6, 0.0]);
                }
            }
            Operator::HFLEX1 => {
                if let &[dx1, dy1, dx2, dy2, dx3, dx4, dx5, dy5, dx6, ..] = args {
                    self.curve([dx1, dy1, dx2, dy2, dx3, 0.0]);
                    self.curve([dx4, 0.0, dx5, dy5, dx6, -(dy1 + dy2 + dy5)]);
                }
            }
            Operator::FLEX1 => {
                if let &[dx1, dy1, dx2, dy2, dx3, dy3, dx4, dy4, dx5, dy5, d6, ..] = args {
                    let dx = dx1 + dx2 + dx3 + dx4 + dx5;
                    let dy = dy1 + dy2 + dy3 + dy4 + dy5;
                    let last = if dx.abs() > dy.abs() { (d6, -dy) } else { (-dx, d6) };
                    self.curve([dx1, dy1, dx2, dy2, dx3, dy3]);
                    self.curve([dx4, dy4, dx5, dy5, last.0, last.1]);
                }
            }
            _ => {}
        }
    }
}

/// One operator with the operands that precede it.
#[derive(Debug, Clone, PartialEq)]
pub struct PathCommand {
    /// The operator.
    pub operator: Operator,
    /// Its operands, in stack order.
    pub operands: Vec<Number>,
    /// The mask bytes following `hintmask` and `cntrmask`.
    pub mask: Vec<u8>,
}

impl PathCommand {
    /// A command without mask bytes.
    pub fn new(operator: Operator, operands: Vec<Number>) -> Self {
        Self { operator, operands, mask: vec![] }
    }

    /// Whether this command moves the pen or draws a straight line and has
    /// coordinate operands.
    pub fn is_move_or_line(&self) -> bool {
        self.operator.is_move_or_line() && !self.operands.is_empty()
    }
}

/// A charstring operator. Two-byte operators are stored as `1200 + b1`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Operator(pub u16);

#[allow(missing_docs)]
impl Operator {
    pub const HSTEM: Self = Self(1);
    pub const VSTEM: Self = Self(3);
    pub const VMOVETO: Self = Self(4);
    pub const RLINETO: Self = Self(5);
    pub const HLINETO: Self = Self(6);
    pub const VLINETO: Self = Self(7);
    pub const RRCURVETO: Self = Self(8);
    pub const CALLSUBR: Self = Self(10);
    pub const RETURN: Self = Self(11);
    pub const ENDCHAR: Self = Self(14);
    pub const HSTEMHM: Self = Self(18);
    pub const HINTMASK: Self = Self(19);
    pub const CNTRMASK: Self = Self(20);
    pub const RMOVETO: Self = Self(21);
    pub const HMOVETO: Self = Self(22);
    pub const VSTEMHM: Self = Self(23);
    pub const RCURVELINE: Self = Self(24);
    pub const RLINECURVE: Self = Self(25);
    pub const VVCURVETO: Self = Self(26);
    pub const HHCURVETO: Self = Self(27);
    pub const CALLGSUBR: Self = Self(29);
    pub const VHCURVETO: Self = Self(30);
    pub const HVCURVETO: Self = Self(31);
    pub const HFLEX: Self = Self(1234);
    pub const FLEX: Self = Self(1235);
    pub const HFLEX1: Self = Self(1236);
    pub const FLEX1: Self = Self(1237);

    /// Whether the operator is a move or straight line operator.
    pub fn is_move_or_line(self) -> bool {
        matches!(
            self,
            Self::RMOVETO
                | Self::HMOVETO
                | Self::VMOVETO
                | Self::RLINETO
                | Self::HLINETO
                | Self::VLINETO
        )
    }

    /// Whether the operator declares stem hints.
    pub fn is_stem(self) -> bool {
        matches!(self, Self::HSTEM | Self::VSTEM | Self::HSTEMHM | Self::VSTEMHM)
    }
}

/// A charstring operand.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Number {
    /// An integer.
    Integer(i32),
    /// A 16.16 fixed point number, stored as its raw bits.
    Fixed(i32),
}

impl Number {
    /// The numeric value.
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(n) => f64::from(n),
            Self::Fixed(n) => f64::from(n) / 65536.0,
        }
    }

    /// The value as an integer, if it is one.
    pub fn as_i32(self) -> Option<i32> {
        match self {
            Self::Integer(n) => Some(n),
            Self::Fixed(n) if n & 0xFFFF == 0 => Some(n >> 16),
            Self::Fixed(_) => None,
        }
    }

    /// Shift the value by a whole number of font units.
    pub fn offset(self, delta: i32) -> Self {
        match self {
            Self::Integer(n) => Self::Integer(n.saturating_add(delta)),
            Self::Fixed(n) => Self::Fixed(n.saturating_add(delta.saturating_mul(65536))),
        }
    }
}
