//! Decoding the first entries of a located name table.
//!
//! A correct table starts with `None`, so a short preview is the quickest
//! sanity check a user can do on a result.

use encoding_rs::{UTF_16LE, WINDOWS_1252};
use tracing::debug;

use crate::memory::layout::{MAX_PREVIEW_NAME_LEN, name_array, name_pool};
use crate::memory::{ReadMemory, is_plausible_pointer};
use crate::offset::StructureKind;

/// Name every table stores at index 0
pub const FIRST_NAME: &str = "None";

/// Read chunk used while looking for a name terminator
const NAME_READ_CHUNK: usize = 64;

fn decode_name(bytes: &[u8], wide: bool) -> String {
    let (text, _) = if wide {
        UTF_16LE.decode_without_bom_handling(bytes)
    } else {
        WINDOWS_1252.decode_without_bom_handling(bytes)
    };
    text.into_owned()
}

/// Decode up to `count` names from the table at `address`.
///
/// Stops quietly at the first entry that cannot be read or decoded.
pub fn preview_names<R: ReadMemory + ?Sized>(
    reader: &R,
    kind: StructureKind,
    address: u64,
    count: usize,
) -> Vec<String> {
    let names = match kind {
        StructureKind::NamePool => pool_names(reader, address, count),
        StructureKind::NameArray => array_names(reader, address, count),
    };
    debug!("Previewed {} of {} names at 0x{:X}", names.len(), count, address);
    names
}

/// Entries of the first block, walked header by header.
fn pool_names<R: ReadMemory + ?Sized>(reader: &R, pool: u64, count: usize) -> Vec<String> {
    let Ok(block) = reader.read_u64(pool + name_pool::BLOCKS) else {
        return Vec::new();
    };
    if !is_plausible_pointer(block) {
        return Vec::new();
    }

    let mut names = Vec::new();
    let mut entry = block;
    while names.len() < count {
        let Ok(header) = reader.read_u16(entry) else {
            break;
        };
        let len = (header >> name_pool::HEADER_LEN_SHIFT) as usize;
        let wide = header & name_pool::HEADER_WIDE_BIT != 0;
        if len == 0 || len > MAX_PREVIEW_NAME_LEN {
            break;
        }

        let byte_len = if wide { len * 2 } else { len };
        let Ok(bytes) = reader.read_bytes(entry + name_pool::HEADER_SIZE, byte_len) else {
            break;
        };
        names.push(decode_name(&bytes, wide));

        let end = entry + name_pool::HEADER_SIZE + byte_len as u64;
        entry = end.next_multiple_of(name_pool::ENTRY_STRIDE);
    }
    names
}

/// Entries reached through the array's pointer table. Null slots are skipped.
fn array_names<R: ReadMemory + ?Sized>(reader: &R, global: u64, count: usize) -> Vec<String> {
    let Ok(inner) = reader.read_u64(global) else {
        return Vec::new();
    };
    let Ok(data) = reader.read_u64(inner + name_array::DATA) else {
        return Vec::new();
    };
    let total = reader
        .read_u32(inner + name_array::COUNT)
        .map(|n| n as usize)
        .unwrap_or(0);

    let mut names = Vec::new();
    for index in 0..total.min(count) as u64 {
        let Ok(entry) = reader.read_u64(data + index * name_array::ENTRY_SLOT_SIZE) else {
            break;
        };
        if entry == 0 {
            continue;
        }
        let Ok(tag) = reader.read_u32(entry + name_array::ENTRY_INDEX) else {
            break;
        };
        let wide = tag & name_array::ENTRY_WIDE_BIT != 0;
        match read_terminated(reader, entry + name_array::ENTRY_NAME, wide) {
            Some(name) => names.push(name),
            None => break,
        }
    }
    names
}

/// Read a null-terminated name of at most `MAX_PREVIEW_NAME_LEN` characters.
fn read_terminated<R: ReadMemory + ?Sized>(reader: &R, address: u64, wide: bool) -> Option<String> {
    let unit = if wide { 2 } else { 1 };
    let limit = MAX_PREVIEW_NAME_LEN * unit;
    let mut bytes = Vec::new();

    while bytes.len() < limit {
        let chunk = reader
            .read_bytes(address + bytes.len() as u64, NAME_READ_CHUNK)
            .ok()?;
        for pair in chunk.chunks_exact(unit) {
            if pair.iter().all(|&b| b == 0) {
                return Some(decode_name(&bytes, wide));
            }
            bytes.extend_from_slice(pair);
        }
    }
    None
}
