//! A TTX-like XML dump of a font, for looking at what a rewrite did.
//!
//! Only the tables this crate rewrites are expanded. All others are listed
//! with their length.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{Font, FontKind};
use crate::outline::{
    ContourGlyph, GlyphOutline, Number, Operator, OutlineKind, OutlineStore, PathGlyph,
};
use crate::{Result, Tag};

/// Tables whose contents are dumped.
const EXPANDED: &[Tag] = &[Tag::CMAP, Tag::HMTX, Tag::GLYF, Tag::LOCA, Tag::CFF];

type XmlWriter = Writer<Vec<u8>>;

/// Dump `font` as indented XML.
pub fn dump(font: &Font) -> Result<Vec<u8>> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let version = match font.kind {
        FontKind::Cff => "OTTO",
        _ => "\\x00\\x01\\x00\\x00",
    };
    w.write_event(Event::Start(BytesStart::new("ttFont").with_attributes([("sfntVersion", version)])))?;

    let names: Vec<String> = (0..font.num_glyphs).map(|id| font.glyph_name(id)).collect();
    let name = |id: u16| names.get(usize::from(id)).map_or("?", String::as_str);

    start(&mut w, "GlyphOrder")?;
    for (id, glyph_name) in names.iter().enumerate() {
        let id = id.to_string();
        empty(&mut w, "GlyphID", &[("id", id.as_str()), ("name", glyph_name.as_str())])?;
    }
    end(&mut w, "GlyphOrder")?;

    start(&mut w, "cmap")?;
    for (&c, &id) in font.char_map() {
        let code = format!("{:#x}", u32::from(c));
        empty(&mut w, "map", &[("code", code.as_str()), ("name", name(id))])?;
    }
    end(&mut w, "cmap")?;

    start(&mut w, "hmtx")?;
    for (id, metrics) in font.metrics.iter().enumerate() {
        let width = metrics.advance.to_string();
        let lsb = metrics.lsb.to_string();
        empty(&mut w, "mtx", &[("name", name(id as u16)), ("width", width.as_str()), ("lsb", lsb.as_str())])?;
    }
    end(&mut w, "hmtx")?;

    if let Some(kind) = font.outline_kind() {
        let tables: &[&str] = match kind {
            OutlineKind::Contour => &["glyf"],
            OutlineKind::Path => &["CFF", "CharStrings"],
        };
        for table in tables {
            start(&mut w, table)?;
        }
        for id in 0..font.num_glyphs {
            match font.glyph(id)?.outline {
                GlyphOutline::Contour(glyph) => write_contour(&mut w, name(id), &glyph, &name)?,
                GlyphOutline::Path(glyph) => write_path(&mut w, name(id), &glyph)?,
            }
        }
        for table in tables.iter().rev() {
            end(&mut w, table)?;
        }
    }

    for (tag, data) in &font.tables {
        if EXPANDED.contains(tag) {
            continue;
        }
        let tag = tag.to_string();
        let length = data.len().to_string();
        empty(&mut w, "table", &[("tag", tag.as_str()), ("length", length.as_str())])?;
    }

    end(&mut w, "ttFont")?;
    Ok(w.into_inner())
}

fn start(w: &mut XmlWriter, name: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn end(w: &mut XmlWriter, name: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn empty(w: &mut XmlWriter, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
    let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
    w.write_event(Event::Empty(element))?;
    Ok(())
}

fn write_contour<'a>(
    w: &mut XmlWriter,
    name: &str,
    glyph: &ContourGlyph,
    glyph_name: &impl Fn(u16) -> &'a str,
) -> Result<()> {
    match glyph {
        ContourGlyph::Empty => empty(w, "TTGlyph", &[("name", name)]),
        ContourGlyph::Simple(simple) => {
            let bbox = simple.bbox().unwrap_or_default();
            let bounds = [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max].map(|v| v.to_string());
            let element = BytesStart::new("TTGlyph").with_attributes([
                ("name", name),
                ("xMin", bounds[0].as_str()),
                ("yMin", bounds[1].as_str()),
                ("xMax", bounds[2].as_str()),
                ("yMax", bounds[3].as_str()),
            ]);
            w.write_event(Event::Start(element))?;

            let mut first = 0;
            for &last in &simple.end_points {
                start(w, "contour")?;
                let points = simple.points.get(first..=usize::from(last)).unwrap_or_default();
                for point in points {
                    let (x, y) = (point.x.to_string(), point.y.to_string());
                    let on = if point.on_curve { "1" } else { "0" };
                    empty(w, "pt", &[("x", x.as_str()), ("y", y.as_str()), ("on", on)])?;
                }
                end(w, "contour")?;
                first = usize::from(last) + 1;
            }

            end(w, "TTGlyph")
        }
        ContourGlyph::Composite(composite) => {
            let bbox = composite.bbox;
            let bounds = [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max].map(|v| v.to_string());
            let element = BytesStart::new("TTGlyph").with_attributes([
                ("name", name),
                ("xMin", bounds[0].as_str()),
                ("yMin", bounds[1].as_str()),
                ("xMax", bounds[2].as_str()),
                ("yMax", bounds[3].as_str()),
            ]);
            w.write_event(Event::Start(element))?;
            for (_, id) in super::glyf::components(&composite.data).unwrap_or_default() {
                empty(w, "component", &[("glyphName", glyph_name(id))])?;
            }
            end(w, "TTGlyph")
        }
    }
}

fn write_path(w: &mut XmlWriter, name: &str, glyph: &PathGlyph) -> Result<()> {
    let mut program = vec![];
    if let Some(width) = glyph.width {
        program.push(format_number(width));
    }

    for command in &glyph.commands {
        program.extend(command.operands.iter().map(|&n| format_number(n)));
        program.push(operator_name(command.operator));
        if !command.mask.is_empty() {
            program.push(command.mask.iter().map(|b| format!("{b:08b}")).collect());
        }
    }

    w.write_event(Event::Start(BytesStart::new("CharString").with_attributes([("name", name)])))?;
    w.write_event(Event::Text(BytesText::new(&program.join(" "))))?;
    end(w, "CharString")
}

fn format_number(number: Number) -> String {
    match number {
        Number::Integer(n) => n.to_string(),
        Number::Fixed(_) => number.as_f64().to_string(),
    }
}

fn operator_name(operator: Operator) -> String {
    let name = match operator {
        Operator::HSTEM => "hstem",
        Operator::VSTEM => "vstem",
        Operator::VMOVETO => "vmoveto",
        Operator::RLINETO => "rlineto",
        Operator::HLINETO => "hlineto",
        Operator::VLINETO => "vlineto",
        Operator::RRCURVETO => "rrcurveto",
        Operator::ENDCHAR => "endchar",
        Operator::HSTEMHM => "hstemhm",
        Operator::HINTMASK => "hintmask",
        Operator::CNTRMASK => "cntrmask",
        Operator::RMOVETO => "rmoveto",
        Operator::HMOVETO => "hmoveto",
        Operator::VSTEMHM => "vstemhm",
        Operator::RCURVELINE => "rcurveline",
        Operator::RLINECURVE => "rlinecurve",
        Operator::VVCURVETO => "vvcurveto",
        Operator::HHCURVETO => "hhcurveto",
        Operator::VHCURVETO => "vhcurveto",
        Operator::HVCURVETO => "hvcurveto",
        Operator::HFLEX => "hflex",
        Operator::FLEX => "flex",
        Operator::HFLEX1 => "hflex1",
        Operator::FLEX1 => "flex1",
        Operator(op) => return format!("op{op}"),
    };
    name.into()
}
