//! Structural checks on a located global.
//!
//! A candidate only counts once the memory behind it looks like the
//! structure its locator claims. Every read failure is a rejection.

use crate::config::SearchLimits;
use crate::memory::layout::{name_array, name_pool};
use crate::memory::{ReadMemory, is_plausible_pointer, is_readable, is_user_space_pointer};
use crate::offset::{Candidate, StructureKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Unreadable(u64),
    BlockCountOutOfRange(u32),
    CursorOutOfRange(u32),
    NoValidBlocks,
    BadArrayPointer(u64),
    CountOutOfRange(u32),
    CapacityOutOfRange { count: u32, capacity: u32 },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

pub fn validate_candidate<R: ReadMemory + ?Sized>(
    reader: &R,
    candidate: &Candidate,
    limits: &SearchLimits,
) -> ValidationResult {
    match candidate.kind {
        StructureKind::NamePool => validate_name_pool(reader, candidate.address, limits),
        StructureKind::NameArray => validate_name_array(reader, candidate.address, limits),
    }
}

/// Block count and cursor within bounds, and at least one of the first block
/// slots holding a readable user-space pointer.
pub fn validate_name_pool<R: ReadMemory + ?Sized>(
    reader: &R,
    address: u64,
    limits: &SearchLimits,
) -> ValidationResult {
    let count_addr = address + name_pool::CURRENT_BLOCK;
    let Ok(count) = reader.read_u32(count_addr) else {
        return ValidationResult::Unreadable(count_addr);
    };
    if count == 0 || count > limits.pool_max_blocks {
        return ValidationResult::BlockCountOutOfRange(count);
    }

    let cursor_addr = address + name_pool::CURRENT_CURSOR;
    let Ok(cursor) = reader.read_u32(cursor_addr) else {
        return ValidationResult::Unreadable(cursor_addr);
    };
    if cursor == 0 || cursor > limits.pool_max_cursor {
        return ValidationResult::CursorOutOfRange(cursor);
    }

    let valid_blocks = (0..limits.pool_block_slots as u64)
        .map(|slot| address + name_pool::BLOCKS + slot * name_pool::BLOCK_SLOT_SIZE)
        .map_while(|slot_addr| reader.read_u64(slot_addr).ok())
        .filter(|&block| is_user_space_pointer(block) && is_readable(reader, block))
        .count();

    if valid_blocks == 0 {
        return ValidationResult::NoValidBlocks;
    }
    ValidationResult::Valid
}

/// The global points at an array object whose count and capacity are sane.
pub fn validate_name_array<R: ReadMemory + ?Sized>(
    reader: &R,
    address: u64,
    limits: &SearchLimits,
) -> ValidationResult {
    let Ok(inner) = reader.read_u64(address) else {
        return ValidationResult::Unreadable(address);
    };
    if !is_plausible_pointer(inner) || !is_readable(reader, inner) {
        return ValidationResult::BadArrayPointer(inner);
    }

    let count_addr = inner + name_array::COUNT;
    let capacity_addr = inner + name_array::CAPACITY;
    let (Ok(count), Ok(capacity)) = (reader.read_u32(count_addr), reader.read_u32(capacity_addr))
    else {
        return ValidationResult::Unreadable(count_addr);
    };

    if count == 0 || count > limits.array_max_count {
        return ValidationResult::CountOutOfRange(count);
    }
    if capacity <= count || capacity > limits.array_max_capacity {
        return ValidationResult::CapacityOutOfRange { count, capacity };
    }
    ValidationResult::Valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MockMemoryBuilder;

    const POOL: u64 = 0x1_4000_8000;
    const HEAP: u64 = 0x2_0000_0000;

    fn pool_reader(count: u32, cursor: u32, block: u64) -> impl ReadMemory {
        MockMemoryBuilder::new()
            .region(POOL, 0x100)
            .region(HEAP, 0x1000)
            .write_u32(POOL + 0x08, count)
            .write_u32(POOL + 0x0C, cursor)
            .write_u64(POOL + 0x10, block)
            .build()
    }

    #[test]
    fn test_name_pool_accepts_valid_shape() {
        let reader = pool_reader(5, 0x4000, HEAP);
        let limits = SearchLimits::default();
        assert_eq!(validate_name_pool(&reader, POOL, &limits), ValidationResult::Valid);
    }

    #[test]
    fn test_name_pool_accepts_valid_block_in_later_slot() {
        let reader = MockMemoryBuilder::new()
            .region(POOL, 0x100)
            .region(HEAP, 0x1000)
            .write_u32(POOL + 0x08, 5)
            .write_u32(POOL + 0x0C, 0x4000)
            .write_u64(POOL + 0x10, 0x42)
            .write_u64(POOL + 0x18, HEAP + 0x800)
            .build();
        let limits = SearchLimits::default();
        assert!(validate_name_pool(&reader, POOL, &limits).is_valid());
    }

    #[test]
    fn test_name_pool_rejects_zero_count() {
        let reader = pool_reader(0, 0x4000, HEAP);
        let limits = SearchLimits::default();
        assert_eq!(
            validate_name_pool(&reader, POOL, &limits),
            ValidationResult::BlockCountOutOfRange(0)
        );
    }

    #[test]
    fn test_name_pool_rejects_count_above_bound() {
        let reader = pool_reader(0x2001, 0x4000, HEAP);
        let limits = SearchLimits::default();
        assert!(!validate_name_pool(&reader, POOL, &limits).is_valid());
    }

    #[test]
    fn test_name_pool_rejects_zero_cursor() {
        let reader = pool_reader(5, 0, HEAP);
        let limits = SearchLimits::default();
        assert_eq!(
            validate_name_pool(&reader, POOL, &limits),
            ValidationResult::CursorOutOfRange(0)
        );
    }

    #[test]
    fn test_name_pool_rejects_when_no_block_is_valid() {
        let limits = SearchLimits::default();

        // Unmapped but plausible
        let reader = pool_reader(5, 0x4000, 0x3_0000_0000);
        assert_eq!(
            validate_name_pool(&reader, POOL, &limits),
            ValidationResult::NoValidBlocks
        );

        // Kernel-range pointer
        let reader = pool_reader(5, 0x4000, 0xFFFF_8000_0000_0000);
        assert_eq!(
            validate_name_pool(&reader, POOL, &limits),
            ValidationResult::NoValidBlocks
        );
    }

    #[test]
    fn test_name_pool_unreadable_candidate() {
        let reader = MockMemoryBuilder::new().region(HEAP, 0x10).build();
        let limits = SearchLimits::default();
        assert_eq!(
            validate_name_pool(&reader, POOL, &limits),
            ValidationResult::Unreadable(POOL + 0x08)
        );
    }

    const GLOBAL: u64 = 0x1_4000_A000;

    fn array_reader(count: u32, capacity: u32) -> impl ReadMemory {
        MockMemoryBuilder::new()
            .region(GLOBAL, 0x10)
            .region(HEAP, 0x100)
            .write_u64(GLOBAL, HEAP)
            .write_u64(HEAP, HEAP + 0x80)
            .write_u32(HEAP + 0x08, count)
            .write_u32(HEAP + 0x0C, capacity)
            .build()
    }

    #[test]
    fn test_name_array_accepts_valid_shape() {
        let reader = array_reader(120_000, 200_000);
        let limits = SearchLimits::default();
        assert_eq!(validate_name_array(&reader, GLOBAL, &limits), ValidationResult::Valid);
    }

    #[test]
    fn test_name_array_rejects_capacity_not_above_count() {
        let reader = array_reader(120_000, 120_000);
        let limits = SearchLimits::default();
        assert_eq!(
            validate_name_array(&reader, GLOBAL, &limits),
            ValidationResult::CapacityOutOfRange {
                count: 120_000,
                capacity: 120_000
            }
        );
    }

    #[test]
    fn test_name_array_rejects_zero_count() {
        let reader = array_reader(0, 200_000);
        let limits = SearchLimits::default();
        assert_eq!(
            validate_name_array(&reader, GLOBAL, &limits),
            ValidationResult::CountOutOfRange(0)
        );
    }

    #[test]
    fn test_name_array_rejects_count_above_bound() {
        let reader = array_reader(0x40_0001, 0x50_0000);
        let limits = SearchLimits::default();
        assert_eq!(
            validate_name_array(&reader, GLOBAL, &limits),
            ValidationResult::CountOutOfRange(0x40_0001)
        );
    }

    #[test]
    fn test_name_array_rejects_capacity_above_bound() {
        let reader = array_reader(0x40_0000, 0x80_0001);
        let limits = SearchLimits::default();
        assert!(!validate_name_array(&reader, GLOBAL, &limits).is_valid());
    }

    #[test]
    fn test_name_array_rejects_bad_inner_pointer() {
        let reader = MockMemoryBuilder::new()
            .region(GLOBAL, 0x10)
            .write_u64(GLOBAL, 0x1234)
            .build();
        let limits = SearchLimits::default();
        assert_eq!(
            validate_name_array(&reader, GLOBAL, &limits),
            ValidationResult::BadArrayPointer(0x1234)
        );
    }

    #[test]
    fn test_validate_candidate_dispatches_on_kind() {
        let reader = array_reader(120_000, 200_000);
        let limits = SearchLimits::default();
        let candidate = Candidate {
            address: GLOBAL,
            kind: StructureKind::NameArray,
            evidence: None,
        };
        assert!(validate_candidate(&reader, &candidate, &limits).is_valid());

        let as_pool = Candidate {
            kind: StructureKind::NamePool,
            ..candidate
        };
        assert!(!validate_candidate(&reader, &as_pool, &limits).is_valid());
    }
}
