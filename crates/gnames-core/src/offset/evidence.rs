//! Corroborating literal lookup.
//!
//! A structure candidate is only trusted when `"ByteProperty"` shows up close
//! to the code that produced it. The literal may sit inline (narrow or UTF-16LE
//! string data inside the window) or be referenced from the window by a
//! RIP-relative `lea`.

use std::cell::OnceCell;

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use tracing::trace;

use crate::memory::{BytePattern, ModuleMemory, ReadMemory, SCAN_CHUNK_SIZE};
use crate::offset::signature::LiteralPatterns;
use crate::offset::{Encoding, PatternCursor, decode_bytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EvidenceKind {
    /// Single-byte string data
    Narrow,
    /// UTF-16LE string data
    Wide,
    /// A `lea` loading the address of the literal
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evidence {
    pub address: u64,
    pub kind: EvidenceKind,
}

/// First verbatim occurrence of the literal in `[start, start + len)`.
///
/// Both encodings are searched; the lower address wins. The window is clamped
/// to the module.
pub fn find_literal<R: ReadMemory + ?Sized>(
    memory: ModuleMemory<'_, R>,
    literal: &LiteralPatterns,
    start: u64,
    len: u64,
) -> Option<Evidence> {
    let narrow = memory
        .scan_bounded(start, len, &literal.narrow)
        .ok()
        .flatten()
        .map(|address| Evidence {
            address,
            kind: EvidenceKind::Narrow,
        });
    let wide = memory
        .scan_bounded(start, len, &literal.wide)
        .ok()
        .flatten()
        .map(|address| Evidence {
            address,
            kind: EvidenceKind::Wide,
        });

    match (narrow, wide) {
        (Some(n), Some(w)) => Some(if w.address < n.address { w } else { n }),
        (n, w) => n.or(w),
    }
}

/// Every occurrence of the literal in the module, both encodings, by address.
pub fn literal_occurrences<R: ReadMemory + ?Sized>(
    memory: ModuleMemory<'_, R>,
    literal: &LiteralPatterns,
    limit: usize,
) -> Vec<Evidence> {
    let base = memory.space().base();
    let mut found: Vec<Evidence> = PatternCursor::new(memory, &literal.narrow, base)
        .take(limit)
        .map(|address| Evidence {
            address,
            kind: EvidenceKind::Narrow,
        })
        .chain(
            PatternCursor::new(memory, &literal.wide, base)
                .take(limit)
                .map(|address| Evidence {
                    address,
                    kind: EvidenceKind::Wide,
                }),
        )
        .collect();
    found.sort_unstable_by_key(|e| e.address);
    found
}

/// Instructions in `[start, start + len)` matching one of `patterns` whose
/// RIP-relative operand resolves to one of `targets`.
///
/// The window is read in large chunks (overlapping by one instruction) and
/// searched locally, so this is cheap enough to run over the whole module.
/// Returns at most `limit` instruction addresses in ascending order.
pub fn find_references<R: ReadMemory + ?Sized>(
    memory: ModuleMemory<'_, R>,
    patterns: &[BytePattern],
    targets: &[u64],
    start: u64,
    len: u64,
    limit: usize,
) -> Vec<u64> {
    let space = memory.space();
    if targets.is_empty() || limit == 0 || !space.contains(start) {
        return Vec::new();
    }

    let end = start.saturating_add(len).min(space.end());
    let overlap = Encoding::Load.length() as usize - 1;
    let mut results = Vec::new();
    let mut addr = start;

    while addr < end {
        let chunk_len = ((end - addr) as usize).min(SCAN_CHUNK_SIZE);
        let buffer = match memory.read_window(addr, chunk_len + overlap) {
            Ok(buffer) => buffer,
            Err(failure) => {
                trace!("Reference scan skipped chunk at 0x{:X}: {}", addr, failure);
                addr += chunk_len as u64;
                continue;
            }
        };

        let mut hits: Vec<usize> = patterns
            .iter()
            .flat_map(|pattern| pattern.find_all(&buffer))
            .filter(|&pos| pos < chunk_len)
            .collect();
        hits.sort_unstable();
        hits.dedup();

        for pos in hits {
            let site = addr + pos as u64;
            let Some(target) = decode_bytes(&buffer[pos..], site, Encoding::Load) else {
                continue;
            };
            if targets.contains(&target) {
                results.push(site);
                if results.len() >= limit {
                    return results;
                }
            }
        }

        addr += chunk_len as u64;
    }

    results
}

/// Evidence lookup for windows of code, with the module's literal addresses
/// resolved on first use
pub struct EvidenceFinder<'s, R: ReadMemory + ?Sized> {
    memory: ModuleMemory<'s, R>,
    literal: &'s LiteralPatterns,
    references: &'s [BytePattern],
    occurrence_limit: usize,
    literal_addresses: OnceCell<Vec<u64>>,
}

impl<'s, R: ReadMemory + ?Sized> EvidenceFinder<'s, R> {
    pub fn new(
        memory: ModuleMemory<'s, R>,
        literal: &'s LiteralPatterns,
        references: &'s [BytePattern],
        occurrence_limit: usize,
    ) -> Self {
        Self {
            memory,
            literal,
            references,
            occurrence_limit,
            literal_addresses: OnceCell::new(),
        }
    }

    pub fn literal_addresses(&self) -> &[u64] {
        self.literal_addresses.get_or_init(|| {
            literal_occurrences(self.memory, self.literal, self.occurrence_limit)
                .into_iter()
                .map(|e| e.address)
                .collect()
        })
    }

    /// Inline literal first, then a reference to one of its copies.
    pub fn find(&self, start: u64, len: u64) -> Option<Evidence> {
        if let Some(evidence) = find_literal(self.memory, self.literal, start, len) {
            return Some(evidence);
        }

        find_references(
            self.memory,
            self.references,
            self.literal_addresses(),
            start,
            len,
            1,
        )
        .first()
        .map(|&address| Evidence {
            address,
            kind: EvidenceKind::Reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{AddressSpace, MockMemoryBuilder};
    use crate::offset::signature::{BYTE_PROPERTY, SignatureSet};

    const BASE: u64 = 0x1_4000_0000;
    const SIZE: u64 = 0x1000;

    fn space() -> AddressSpace {
        AddressSpace::new(BASE, SIZE)
    }

    #[test]
    fn test_find_literal_narrow() {
        let reader = MockMemoryBuilder::new()
            .region(BASE, SIZE as usize)
            .write_bytes(BASE + 0x120, BYTE_PROPERTY.as_bytes())
            .build();
        let literal = LiteralPatterns::new(BYTE_PROPERTY).unwrap();
        let memory = ModuleMemory::new(&reader, space());

        let evidence = find_literal(memory, &literal, BASE + 0x100, 0x100).unwrap();
        assert_eq!(evidence.address, BASE + 0x120);
        assert_eq!(evidence.kind, EvidenceKind::Narrow);
    }

    #[test]
    fn test_find_literal_wide() {
        let reader = MockMemoryBuilder::new()
            .region(BASE, SIZE as usize)
            .write_utf16(BASE + 0x140, BYTE_PROPERTY)
            .build();
        let literal = LiteralPatterns::new(BYTE_PROPERTY).unwrap();
        let memory = ModuleMemory::new(&reader, space());

        let evidence = find_literal(memory, &literal, BASE + 0x100, 0x100).unwrap();
        assert_eq!(evidence.address, BASE + 0x140);
        assert_eq!(evidence.kind, EvidenceKind::Wide);
    }

    #[test]
    fn test_find_literal_lowest_address_wins() {
        let reader = MockMemoryBuilder::new()
            .region(BASE, SIZE as usize)
            .write_bytes(BASE + 0x180, BYTE_PROPERTY.as_bytes())
            .write_utf16(BASE + 0x110, BYTE_PROPERTY)
            .build();
        let literal = LiteralPatterns::new(BYTE_PROPERTY).unwrap();
        let memory = ModuleMemory::new(&reader, space());

        let evidence = find_literal(memory, &literal, BASE + 0x100, 0x100).unwrap();
        assert_eq!(evidence.address, BASE + 0x110);
    }

    #[test]
    fn test_find_literal_outside_window() {
        let reader = MockMemoryBuilder::new()
            .region(BASE, SIZE as usize)
            .write_bytes(BASE + 0x300, BYTE_PROPERTY.as_bytes())
            .build();
        let literal = LiteralPatterns::new(BYTE_PROPERTY).unwrap();
        let memory = ModuleMemory::new(&reader, space());

        assert_eq!(find_literal(memory, &literal, BASE + 0x100, 0x100), None);
        // Window straddling the module end is clamped, not rejected
        assert_eq!(find_literal(memory, &literal, BASE + 0xF00, 0x1000), None);
    }

    #[test]
    fn test_literal_occurrences_sorted_across_encodings() {
        let reader = MockMemoryBuilder::new()
            .region(BASE, SIZE as usize)
            .write_utf16(BASE + 0x200, BYTE_PROPERTY)
            .write_bytes(BASE + 0x800, BYTE_PROPERTY.as_bytes())
            .write_bytes(BASE + 0x100, BYTE_PROPERTY.as_bytes())
            .build();
        let literal = LiteralPatterns::new(BYTE_PROPERTY).unwrap();
        let memory = ModuleMemory::new(&reader, space());

        let found = literal_occurrences(memory, &literal, 16);
        let addresses: Vec<u64> = found.iter().map(|e| e.address).collect();
        assert_eq!(addresses, vec![BASE + 0x100, BASE + 0x200, BASE + 0x800]);
        assert_eq!(found[1].kind, EvidenceKind::Wide);
    }

    #[test]
    fn test_find_references_resolves_lea_targets() {
        // lea rdx, [rip + disp] at +0x40 -> +0x800
        // lea rcx, [rip + disp] at +0x60 -> +0x900 (not a target)
        let reader = MockMemoryBuilder::new()
            .region(BASE, SIZE as usize)
            .write_bytes(BASE + 0x40, &[0x48, 0x8D, 0x15])
            .write_i32(BASE + 0x43, 0x800 - 0x47)
            .write_bytes(BASE + 0x60, &[0x48, 0x8D, 0x0D])
            .write_i32(BASE + 0x63, 0x900 - 0x67)
            .build();
        let set = SignatureSet::builtin().unwrap();
        let memory = ModuleMemory::new(&reader, space());

        let refs = find_references(memory, &set.literal_refs, &[BASE + 0x800], BASE, SIZE, 16);
        assert_eq!(refs, vec![BASE + 0x40]);

        let none = find_references(memory, &set.literal_refs, &[], BASE, SIZE, 16);
        assert!(none.is_empty());
    }

    #[test]
    fn test_finder_falls_back_to_reference() {
        // Literal far away at +0x800, referenced by a lea inside the window
        let reader = MockMemoryBuilder::new()
            .region(BASE, SIZE as usize)
            .write_bytes(BASE + 0x800, BYTE_PROPERTY.as_bytes())
            .write_bytes(BASE + 0x30, &[0x4C, 0x8D, 0x05])
            .write_i32(BASE + 0x33, 0x800 - 0x37)
            .build();
        let set = SignatureSet::builtin().unwrap();
        let memory = ModuleMemory::new(&reader, space());
        let finder = EvidenceFinder::new(memory, &set.literal, &set.literal_refs, 16);

        let evidence = finder.find(BASE, 0x100).unwrap();
        assert_eq!(evidence.address, BASE + 0x30);
        assert_eq!(evidence.kind, EvidenceKind::Reference);
        assert_eq!(finder.literal_addresses(), &[BASE + 0x800]);

        assert_eq!(finder.find(BASE + 0x100, 0x100), None);
    }
}
