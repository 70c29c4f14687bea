//! The `hmtx` table and the fields of `hhea` that describe it.

use crate::outline::Metrics;
use crate::stream::{read_at, Reader, Writer};
use crate::{Error, Result};

/// Offset of `numberOfHMetrics` in `hhea`.
const NUM_H_METRICS_OFFSET: usize = 34;
/// Offset of `advanceWidthMax` in `hhea`.
const ADVANCE_WIDTH_MAX_OFFSET: usize = 10;

/// Read the metrics of all glyphs.
pub fn read(hhea: &[u8], hmtx: &[u8], num_glyphs: u16) -> Result<Vec<Metrics>> {
    let num_h_metrics =
        read_at::<u16>(hhea, NUM_H_METRICS_OFFSET).ok_or(Error::MissingData)?.min(num_glyphs);
    if num_h_metrics == 0 && num_glyphs > 0 {
        return Err(Error::InvalidData);
    }

    let mut r = Reader::new(hmtx);
    let mut metrics = Vec::with_capacity(usize::from(num_glyphs));
    for _ in 0..num_h_metrics {
        let advance = r.read::<u16>().ok_or(Error::MissingData)?;
        let lsb = r.read::<i16>().ok_or(Error::MissingData)?;
        metrics.push(Metrics { advance, lsb });
    }

    // The remaining glyphs repeat the last advance.
    let advance = metrics.last().map_or(0, |m| m.advance);
    for _ in num_h_metrics..num_glyphs {
        // Some fonts truncate the side bearings.
        let lsb = r.read::<i16>().unwrap_or(0);
        metrics.push(Metrics { advance, lsb });
    }

    Ok(metrics)
}

/// Write `hmtx` and update `hhea` to match it.
pub fn write(hhea: &[u8], metrics: &[Metrics]) -> Result<(Vec<u8>, Vec<u8>)> {
    // Trailing glyphs with the same advance only store their side bearing.
    let mut num_h_metrics = metrics.len();
    while num_h_metrics > 1 && metrics[num_h_metrics - 1].advance == metrics[num_h_metrics - 2].advance {
        num_h_metrics -= 1;
    }

    let mut w = Writer::with_capacity(4 * metrics.len());
    for (i, m) in metrics.iter().enumerate() {
        if i < num_h_metrics {
            w.write::<u16>(m.advance);
        }
        w.write::<i16>(m.lsb);
    }

    let mut sub_hhea = hhea.to_vec();
    let advance_max = metrics.iter().map(|m| m.advance).max().unwrap_or(0);
    sub_hhea
        .get_mut(ADVANCE_WIDTH_MAX_OFFSET..ADVANCE_WIDTH_MAX_OFFSET + 2)
        .ok_or(Error::MissingData)?
        .copy_from_slice(&advance_max.to_be_bytes());
    sub_hhea
        .get_mut(NUM_H_METRICS_OFFSET..NUM_H_METRICS_OFFSET + 2)
        .ok_or(Error::MissingData)?
        .copy_from_slice(&(num_h_metrics as u16).to_be_bytes());

    Ok((w.finish(), sub_hhea))
}
