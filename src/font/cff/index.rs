use crate::stream::{Reader, Writer, U24};

/// Parse an INDEX into its items.
pub fn read<'a>(r: &mut Reader<'a>) -> Option<Vec<&'a [u8]>> {
    let count = r.read::<u16>()?;
    if count == 0 {
        return Some(vec![]);
    }

    let offset_size = r.read::<u8>()?;
    let mut offsets = Vec::with_capacity(usize::from(count) + 1);
    for _ in 0..=count {
        let offset = match offset_size {
            1 => u32::from(r.read::<u8>()?),
            2 => u32::from(r.read::<u16>()?),
            3 => r.read::<U24>()?.0,
            4 => r.read::<u32>()?,
            _ => return None,
        };
        // Offsets are one-based.
        offsets.push(offset.checked_sub(1)? as usize);
    }

    let data = r.read_bytes(*offsets.last()?)?;
    offsets
        .windows(2)
        .map(|w| data.get(w[0]..w[1]))
        .collect()
}

/// Parse an INDEX at `offset` of `data`.
pub fn read_at(data: &[u8], offset: usize) -> Option<Vec<&[u8]>> {
    read(&mut Reader::new_at(data, offset))
}

/// Write an INDEX with the smallest offset size that fits.
pub fn write<T: AsRef<[u8]>>(w: &mut Writer, items: &[T]) {
    w.write::<u16>(items.len() as u16);
    if items.is_empty() {
        return;
    }

    let total: usize = items.iter().map(|item| item.as_ref().len()).sum();
    let last_offset = total + 1;
    let offset_size: u8 = match last_offset {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    };

    w.write::<u8>(offset_size);
    let write_offset = |w: &mut Writer, offset: usize| match offset_size {
        1 => w.write::<u8>(offset as u8),
        2 => w.write::<u16>(offset as u16),
        3 => w.write::<U24>(U24(offset as u32)),
        _ => w.write::<u32>(offset as u32),
    };

    let mut offset = 1;
    write_offset(w, offset);
    for item in items {
        offset += item.as_ref().len();
        write_offset(w, offset);
    }

    for item in items {
        w.extend(item.as_ref());
    }
}
