//! WOFF 1.0 containers.
//!
//! A WOFF file wraps the tables of an sfnt, each compressed with zlib when
//! that makes it smaller.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::TableRecord;
use crate::stream::{Reader, Writer};
use crate::{Error, Result, Tag};

/// The `wOFF` signature.
pub const SIGNATURE: u32 = 0x774F_4646;
/// The `wOF2` signature.
pub const SIGNATURE_2: u32 = 0x774F_4632;

const HEADER_SIZE: usize = 44;
const ENTRY_SIZE: usize = 20;

/// Extract the flavor and the decompressed tables of a WOFF file.
pub fn decode(data: &[u8]) -> Result<(u32, Vec<(Tag, Vec<u8>)>)> {
    let mut r = Reader::new(data);
    if r.read::<u32>() != Some(SIGNATURE) {
        return Err(Error::UnknownKind);
    }

    let flavor = r.read::<u32>().ok_or(Error::MissingData)?;
    r.read::<u32>().ok_or(Error::MissingData)?; // length
    let num_tables = r.read::<u16>().ok_or(Error::MissingData)?;
    r.jump(HEADER_SIZE);

    let mut tables = Vec::with_capacity(usize::from(num_tables));
    for _ in 0..num_tables {
        let tag = Tag(r.read::<[u8; 4]>().ok_or(Error::MissingData)?);
        let offset = r.read::<u32>().ok_or(Error::MissingData)? as usize;
        let comp_length = r.read::<u32>().ok_or(Error::MissingData)? as usize;
        let orig_length = r.read::<u32>().ok_or(Error::MissingData)? as usize;
        r.read::<u32>().ok_or(Error::MissingData)?; // checksum

        let end = offset.checked_add(comp_length).ok_or(Error::InvalidOffset)?;
        let stored = data.get(offset..end).ok_or(Error::InvalidOffset)?;

        let table = if comp_length < orig_length {
            // The declared length is untrusted, so it only bounds the read.
            let mut table = Vec::with_capacity(orig_length.min(comp_length.saturating_mul(64)));
            ZlibDecoder::new(stored).take(orig_length as u64 + 1).read_to_end(&mut table)?;
            if table.len() != orig_length {
                return Err(Error::InvalidData);
            }
            table
        } else {
            stored.to_vec()
        };

        tables.push((tag, table));
    }

    Ok((flavor, tables))
}

/// Wrap a finished sfnt into a WOFF file.
pub fn encode(sfnt: &[u8]) -> Result<Vec<u8>> {
    let mut r = Reader::new(sfnt);
    let flavor = r.read::<u32>().ok_or(Error::MissingData)?;
    let num_tables = r.read::<u16>().ok_or(Error::MissingData)?;
    r.jump(12);

    let mut records = vec![];
    for _ in 0..num_tables {
        records.push(TableRecord::read(&mut r).ok_or(Error::MissingData)?);
    }

    let mut entries = vec![];
    for record in &records {
        let start = record.offset as usize;
        let table = sfnt.get(start..start + record.length as usize).ok_or(Error::InvalidOffset)?;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(table)?;
        let compressed = encoder.finish()?;

        let stored = if compressed.len() < table.len() { compressed } else { table.to_vec() };
        entries.push((record, stored));
    }

    let directory_end = HEADER_SIZE + ENTRY_SIZE * entries.len();
    let total_sfnt_size = 12
        + 16 * records.len()
        + records.iter().map(|r| (r.length as usize + 3) & !3).sum::<usize>();

    let mut offset = directory_end;
    let mut directory = Writer::new();
    for (record, stored) in &entries {
        directory.write::<[u8; 4]>(record.tag.0);
        directory.write::<u32>(offset as u32);
        directory.write::<u32>(stored.len() as u32);
        directory.write::<u32>(record.length);
        directory.write::<u32>(record.checksum);
        offset += (stored.len() + 3) & !3;
    }

    let mut w = Writer::with_capacity(offset);
    w.write::<u32>(SIGNATURE);
    w.write::<u32>(flavor);
    w.write::<u32>(offset as u32);
    w.write::<u16>(entries.len() as u16);
    w.write::<u16>(0); // reserved
    w.write::<u32>(total_sfnt_size as u32);
    w.write::<u16>(1); // major version
    w.write::<u16>(0); // minor version
    w.write::<u32>(0); // meta offset
    w.write::<u32>(0); // meta length
    w.write::<u32>(0); // meta original length
    w.write::<u32>(0); // private offset
    w.write::<u32>(0); // private length
    w.extend(&directory.finish());

    for (_, stored) in &entries {
        w.extend(stored);
        w.align(4);
    }

    Ok(w.finish())
}
