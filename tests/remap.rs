mod common;

use std::collections::BTreeSet;

use fontcloak::distort::{self, Distortion};
use fontcloak::outline::{
    ContourGlyph, Glyph, GlyphOutline, Metrics, Number, Operator, OutlineKind, OutlineStore,
    PathCommand, PathGlyph,
};
use fontcloak::remap::{self, OutlineCache};
use fontcloak::{CharacterMapping, Error, Font};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ttf_parser::Face;

use self::common::*;

#[test]
fn remap_moves_plain_outlines_to_cipher_glyphs() -> Result<()> {
    let mut store = MemoryStore::contours(&['a', 'b', 'c', 'd']);
    let before = store.clone();
    let mapping = CharacterMapping::from_pairs([('a', 'b'), ('b', 'c'), ('c', 'a')])?;

    let report = remap::remap(&mut store, &mapping)?;
    assert_eq!(report.swapped, 3);
    assert!(report.skipped.is_empty());

    // The cipher character shows what its plain character showed before.
    for (plain, cipher) in mapping.iter() {
        let expected = before.glyph(before.char_map[&plain])?;
        assert_eq!(store.glyph(store.char_map[&cipher])?, expected);
    }

    // Unmapped glyphs and the character map stay as they were.
    assert_eq!(store.glyphs[0], before.glyphs[0]);
    assert_eq!(store.glyph(store.char_map[&'d'])?, before.glyph(before.char_map[&'d'])?);
    assert_eq!(store.char_map, before.char_map);
    Ok(())
}

#[test]
fn remap_skips_pairs_without_glyphs() -> Result<()> {
    let mut store = MemoryStore::contours(&['a', 'b']);
    let mapping = CharacterMapping::from_pairs([('a', 'b'), ('b', 'x'), ('x', 'a')])?;

    let report = remap::remap(&mut store, &mapping)?;
    assert_eq!(report.swapped, 1);
    assert_eq!(report.skipped.len(), 2);
    Ok(())
}

#[test]
fn remap_needs_outlines() -> Result<()> {
    let mut store = MemoryStore::contours(&['a', 'b']);
    store.kind = None;
    let mapping = CharacterMapping::from_pairs([('a', 'b'), ('b', 'a')])?;
    assert!(matches!(
        remap::remap(&mut store, &mapping),
        Err(Error::UnsupportedGlyphFormat(_))
    ));
    Ok(())
}

#[test]
fn outline_cache_holds_every_glyph() -> Result<()> {
    let store = MemoryStore::contours(&['a', 'b', 'c']);
    let cache = OutlineCache::build(&store)?;
    assert_eq!(cache.len(), 4);
    assert_eq!(cache.get(2), Some(&store.glyphs[2]));
    assert_eq!(cache.get(4), None);
    Ok(())
}

/// Remap a font and check with ttf-parser that every cipher character
/// renders like its plain character did.
fn check_font_remap(data: &[u8], chars: &[char], seed: u64) -> Result<()> {
    let font = Font::load(data, 0)?;
    let keep: BTreeSet<char> = chars.iter().copied().collect();
    let alphabet = chars.iter().copied().collect();
    let mapping = CharacterMapping::generate(&alphabet, seed);

    let mut subset = font.subset(&keep)?;
    remap::remap(&mut subset, &mapping)?;
    let output = subset.save(fontcloak::Flavor::Sfnt)?;

    let original = Face::parse(data, 0)?;
    let remapped = Face::parse(&output, 0)?;

    for (plain, cipher) in mapping.iter() {
        assert!(outline_of(&original, plain).is_some());
        assert_eq!(outline_of(&remapped, cipher), outline_of(&original, plain));
        assert_eq!(advance_of(&remapped, cipher), advance_of(&original, plain));
    }

    Ok(())
}

#[test]
fn truetype_font_renders_cipher_as_plain() -> Result<()> {
    check_font_remap(&cjk_font(), &CJK, 42)?;
    check_font_remap(&cjk_font(), &CJK[..3], 7)
}

#[test]
fn cff_font_renders_cipher_as_plain() -> Result<()> {
    let char_strings = vec![
        rect_charstring(0, 0, 400, 600),
        rect_charstring(10, 20, 100, 100),
        rect_charstring(30, 40, 200, 50),
        // A glyph drawn by a local subroutine.
        [num(-107), vec![10, 14]].concat(),
    ];
    let mut subr = rect_charstring(50, 60, 70, 80);
    subr.pop();
    subr.push(11); // return

    let chars = [('一', 1), ('丁', 2), ('七', 3)];
    let data = cff(&char_strings, &[subr], &[500, 510, 520, 530], &chars);
    check_font_remap(&data, &['一', '丁', '七'], 42)
}

/// `a` and `c` are squares, `b` draws `a`, `d` draws `b` moved and `c`.
fn composite_font() -> Vec<u8> {
    let glyphs = [
        (TestGlyph::Empty, 500),
        (TestGlyph::Simple(vec![square(0, 0, 100)]), 600),
        (TestGlyph::Composite(vec![1]), 610),
        (TestGlyph::Simple(vec![square(0, 0, 300)]), 620),
        (TestGlyph::Placed(vec![(2, 40, -20), (3, 500, 0)]), 900),
        (TestGlyph::Simple(vec![square(7, 7, 50)]), 630),
    ];
    truetype(&glyphs, &[('a', 1), ('b', 2), ('c', 3), ('d', 4), ('e', 5)])
}

#[test]
fn unmapped_composites_keep_their_shape() -> Result<()> {
    let data = composite_font();
    let mut font = Font::load(&data, 0)?;
    let mapping = CharacterMapping::from_pairs([('a', 'c'), ('c', 'a')])?;

    let report = remap::remap(&mut font, &mapping)?;
    assert_eq!(report.swapped, 2);
    assert_eq!(report.flattened, 2);
    assert!(matches!(font.glyph(2)?.outline, GlyphOutline::Contour(ContourGlyph::Simple(_))));

    let output = font.save(fontcloak::Flavor::Sfnt)?;
    let original = Face::parse(&data, 0)?;
    let remapped = Face::parse(&output, 0)?;
    for c in ['b', 'd', 'e'] {
        assert_eq!(outline_of(&remapped, c), outline_of(&original, c), "{c}");
        assert_eq!(advance_of(&remapped, c), advance_of(&original, c));
    }
    assert_eq!(outline_of(&remapped, 'a'), outline_of(&original, 'c'));
    assert_eq!(outline_of(&remapped, 'c'), outline_of(&original, 'a'));
    Ok(())
}

#[test]
fn mapped_composites_keep_their_shape() -> Result<()> {
    let data = composite_font();
    let mut font = Font::load(&data, 0)?;
    let mapping =
        CharacterMapping::from_pairs([('a', 'c'), ('c', 'a'), ('b', 'e'), ('e', 'd'), ('d', 'b')])?;

    let report = remap::remap(&mut font, &mapping)?;
    assert_eq!(report.swapped, 5);
    assert_eq!(report.flattened, 2);

    let output = font.save(fontcloak::Flavor::Sfnt)?;
    let original = Face::parse(&data, 0)?;
    let remapped = Face::parse(&output, 0)?;
    for (plain, cipher) in mapping.iter() {
        assert_eq!(outline_of(&remapped, cipher), outline_of(&original, plain), "{plain}");
        assert_eq!(advance_of(&remapped, cipher), advance_of(&original, plain));
    }
    Ok(())
}

#[test]
fn composites_are_untouched_when_their_components_stay() -> Result<()> {
    let mut font = Font::load(&composite_font(), 0)?;
    let composite = font.glyph(2)?;
    let mapping = CharacterMapping::from_pairs([('c', 'e'), ('e', 'c')])?;

    let report = remap::remap(&mut font, &mapping)?;
    assert_eq!(report.flattened, 1);
    assert_eq!(font.glyph(2)?, composite);
    Ok(())
}

#[test]
fn distortion_stays_within_magnitude() -> Result<()> {
    let mut store = MemoryStore::contours(&['a', 'b', 'c']);
    let before = store.clone();
    let params = Distortion { magnitude: 5, frequency: 1.0, targets: None };

    let report = distort::distort(&mut store, &params, &mut StdRng::seed_from_u64(1))?;
    assert_eq!(report.glyphs, 3);
    assert_eq!(report.perturbed, 12);

    for (old, new) in before.glyphs.iter().zip(&store.glyphs) {
        let (GlyphOutline::Contour(old_outline), GlyphOutline::Contour(new_outline)) =
            (&old.outline, &new.outline)
        else {
            panic!("outline kind changed");
        };
        match (old_outline, new_outline) {
            (ContourGlyph::Simple(a), ContourGlyph::Simple(b)) => {
                assert_eq!(a.end_points, b.end_points);
                assert_eq!(a.points.len(), b.points.len());
                for (p, q) in a.points.iter().zip(&b.points) {
                    assert!((p.x - q.x).abs() <= 5);
                    assert!((p.y - q.y).abs() <= 5);
                    assert_eq!(p.on_curve, q.on_curve);
                }
                assert_eq!(old.metrics.advance, new.metrics.advance);
            }
            (ContourGlyph::Empty, ContourGlyph::Empty) => {}
            _ => panic!("glyph structure changed"),
        }
    }
    Ok(())
}

/// How many of `n` items a glyph gets changed at `frequency`.
fn affected(n: usize, frequency: f64) -> usize {
    ((n as f64 * frequency).round() as usize).max(1)
}

#[test]
fn distortion_leaves_unsampled_points_alone() -> Result<()> {
    let ten: Vec<(i16, i16)> = (0..10).map(|i| (i * 10, (i % 3) * 7)).collect();
    let mut store = MemoryStore {
        kind: Some(OutlineKind::Contour),
        char_map: [('a', 1), ('b', 2), ('c', 3)].into_iter().collect(),
        glyphs: vec![
            simple_glyph(&[], 500),
            simple_glyph(&ten, 600),
            simple_glyph(&square(0, 0, 50), 600),
            simple_glyph(&[(3, 3)], 600),
        ],
    };
    let before = store.clone();
    let params = Distortion { magnitude: 4, frequency: 0.5, targets: None };

    let report = distort::distort(&mut store, &params, &mut StdRng::seed_from_u64(17))?;
    assert_eq!(report.glyphs, 3);
    assert_eq!(report.perturbed, 5 + 2 + 1);

    for (old, new) in before.glyphs.iter().zip(&store.glyphs).skip(1) {
        let (
            GlyphOutline::Contour(ContourGlyph::Simple(a)),
            GlyphOutline::Contour(ContourGlyph::Simple(b)),
        ) = (&old.outline, &new.outline)
        else {
            panic!("glyph structure changed");
        };

        let changed = a.points.iter().zip(&b.points).filter(|(p, q)| p != q).count();
        assert_eq!(changed, affected(a.points.len(), 0.5));
        for (p, q) in a.points.iter().zip(&b.points) {
            assert!((p.x - q.x).abs() <= 4 && (p.y - q.y).abs() <= 4);
            assert_eq!(p.on_curve, q.on_curve);
        }
        assert_eq!(a.end_points, b.end_points);
        assert_eq!(old.metrics.advance, new.metrics.advance);
    }
    Ok(())
}

fn int(n: i32) -> Number {
    Number::Integer(n)
}

fn path_glyph() -> PathGlyph {
    PathGlyph {
        width: Some(int(-20)),
        commands: vec![
            PathCommand::new(Operator::HSTEM, vec![int(0), int(50)]),
            PathCommand::new(Operator::RMOVETO, vec![int(10), int(20)]),
            PathCommand::new(Operator::RLINETO, vec![int(100), int(0), int(0), int(100)]),
            PathCommand::new(Operator::RRCURVETO, (1..=6).map(|i| int(10 * i)).collect()),
            PathCommand::new(Operator::HLINETO, vec![int(-50), int(-30)]),
            PathCommand::new(Operator::VLINETO, vec![int(-40)]),
            PathCommand::new(Operator::HVCURVETO, vec![int(10), int(20), int(30), int(40)]),
            PathCommand::new(Operator::ENDCHAR, vec![]),
        ],
    }
}

fn path_store() -> MemoryStore {
    let glyph = |path: PathGlyph, lsb| Glyph {
        outline: GlyphOutline::Path(path),
        metrics: Metrics { advance: 480, lsb },
    };
    MemoryStore {
        kind: Some(OutlineKind::Path),
        char_map: [('a', 1)].into_iter().collect(),
        glyphs: vec![glyph(PathGlyph::default(), 0), glyph(path_glyph(), 10)],
    }
}

#[test]
fn path_points_follow_the_program() {
    let points = path_glyph().points();
    assert_eq!(points.len(), 12);
    assert_eq!(points[0], (10.0, 20.0));
    assert_eq!(points[2], (110.0, 120.0));
    assert_eq!(points[5], (200.0, 240.0));
    assert_eq!(points[7], (150.0, 210.0));
    assert_eq!(points[8], (150.0, 170.0));
    assert_eq!(points[11], (180.0, 240.0));
    assert_eq!(path_glyph().x_min(), Some(10.0));
    assert_eq!(PathGlyph::default().x_min(), None);
}

#[test]
fn path_distortion_only_moves_move_and_line_operands() -> Result<()> {
    for frequency in [0.5, 1.0] {
        let mut store = path_store();
        let params = Distortion { magnitude: 6, frequency, targets: None };
        let report = distort::distort(&mut store, &params, &mut StdRng::seed_from_u64(23))?;
        assert_eq!(report.glyphs, 1);

        let old = path_glyph();
        let new = store.glyph(1)?;
        let GlyphOutline::Path(path) = &new.outline else {
            panic!("outline kind changed");
        };
        assert_eq!(path.width, old.width);
        assert_eq!(path.commands.len(), old.commands.len());

        let mut changed = 0;
        for (a, b) in old.commands.iter().zip(&path.commands) {
            assert_eq!(a.operator, b.operator);
            assert_eq!(a.operands.len(), b.operands.len());
            if !a.operator.is_move_or_line() {
                assert_eq!(a, b);
                continue;
            }

            let moved: Vec<f64> = a
                .operands
                .iter()
                .zip(&b.operands)
                .map(|(x, y)| (y.as_f64() - x.as_f64()).abs())
                .filter(|&d| d > 0.0)
                .collect();
            assert!(moved.len() <= 1);
            assert!(moved.iter().all(|&d| d <= 6.0));
            changed += moved.len();
        }
        assert_eq!(changed, affected(4, frequency));
        assert_eq!(report.perturbed, changed);

        // The side bearing follows the leftmost point.
        let shift = path.x_min().unwrap_or(0.0) - old.x_min().unwrap_or(0.0);
        assert_eq!(f64::from(new.metrics.lsb), 10.0 + shift.round());
        assert_eq!(new.metrics.advance, 480);
    }
    Ok(())
}

#[test]
fn distortion_is_reproducible_with_a_seed() -> Result<()> {
    let params = Distortion { magnitude: 20, frequency: 0.5, targets: None };
    let mut a = MemoryStore::contours(&['a', 'b', 'c']);
    let mut b = a.clone();
    distort::distort(&mut a, &params, &mut StdRng::seed_from_u64(9))?;
    distort::distort(&mut b, &params, &mut StdRng::seed_from_u64(9))?;
    assert_eq!(a.glyphs, b.glyphs);
    Ok(())
}

#[test]
fn distortion_only_touches_targets() -> Result<()> {
    let mut store = MemoryStore::contours(&['a', 'b', 'c']);
    let before = store.clone();
    let params = Distortion {
        magnitude: 10,
        frequency: 1.0,
        targets: Some(['b'].into_iter().collect()),
    };

    let report = distort::distort(&mut store, &params, &mut StdRng::seed_from_u64(3))?;
    assert!(report.glyphs <= 1);
    for c in ['a', 'c'] {
        let id = usize::from(store.char_map[&c]);
        assert_eq!(store.glyphs[id], before.glyphs[id]);
    }
    Ok(())
}

#[test]
fn distortion_skips_composites() -> Result<()> {
    let glyphs = [
        (TestGlyph::Empty, 500),
        (TestGlyph::Simple(vec![square(0, 0, 100)]), 600),
        (TestGlyph::Composite(vec![1]), 600),
    ];
    let data = truetype(&glyphs, &[('a', 1), ('b', 2)]);
    let mut font = Font::load(&data, 0)?;
    let composite = font.glyph(2)?;

    let params = Distortion { magnitude: 10, frequency: 1.0, targets: None };
    let report = distort::distort(&mut font, &params, &mut StdRng::seed_from_u64(5))?;
    assert_eq!(report.composites, 1);
    assert_eq!(report.glyphs, 1);
    assert_eq!(font.glyph(2)?, composite);
    Ok(())
}

#[test]
fn distortion_rejects_bad_frequency() {
    let mut store = MemoryStore::contours(&['a']);
    let params = Distortion { magnitude: 10, frequency: 0.0, targets: None };
    let result = distort::distort(&mut store, &params, &mut StdRng::seed_from_u64(0));
    assert!(matches!(result, Err(Error::InvalidParameter(_))));
}

#[test]
fn distorted_cff_font_still_parses() -> Result<()> {
    let char_strings = vec![rect_charstring(0, 0, 400, 600), rect_charstring(10, 20, 100, 100)];
    let data = cff(&char_strings, &[], &[500, 510], &[('a', 1)]);
    let mut font = Font::load(&data, 0)?;

    let params = Distortion { magnitude: 30, frequency: 1.0, targets: None };
    let report = distort::distort(&mut font, &params, &mut StdRng::seed_from_u64(11))?;
    assert_eq!(report.glyphs, 2);

    let output = font.save(fontcloak::Flavor::Sfnt)?;
    let face = Face::parse(&output, 0)?;
    let outline = outline_of(&face, 'a').unwrap();
    assert!(outline[0].starts_with('M'));
    Ok(())
}
