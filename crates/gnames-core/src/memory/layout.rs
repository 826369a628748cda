//! Memory layout constants for the name table structures
//!
//! Constants are organized by structure type.

/// FNamePool: a reader/writer lock followed by the block allocator state.
///
/// ```text
/// +0x00  lock            (8 bytes)
/// +0x08  current block   (u32)
/// +0x0C  byte cursor     (u32)
/// +0x10  block pointers  (8 bytes each)
/// ```
pub mod name_pool {
    pub const CURRENT_BLOCK: u64 = 0x08;
    pub const CURRENT_CURSOR: u64 = 0x0C;
    pub const BLOCKS: u64 = 0x10;
    pub const BLOCK_SLOT_SIZE: u64 = 8;

    /// Entries are aligned to this stride inside a block
    pub const ENTRY_STRIDE: u64 = 2;
    /// Entry header: `len << 6 | probe_hash << 1 | is_wide`
    pub const HEADER_SIZE: u64 = 2;
    pub const HEADER_LEN_SHIFT: u16 = 6;
    pub const HEADER_WIDE_BIT: u16 = 1;
}

/// Name array: the global holds a pointer to an array object.
///
/// ```text
/// global -> +0x00  entry pointer table
///           +0x08  count      (u32)
///           +0x0C  capacity   (u32)
/// ```
pub mod name_array {
    pub const DATA: u64 = 0x00;
    pub const COUNT: u64 = 0x08;
    pub const CAPACITY: u64 = 0x0C;
    pub const ENTRY_SLOT_SIZE: u64 = 8;

    /// Entry: index (u32), padding, hash-chain pointer, then the name
    pub const ENTRY_INDEX: u64 = 0x00;
    pub const ENTRY_NAME: u64 = 0x10;
    /// Low bit of the index marks a UTF-16 name
    pub const ENTRY_WIDE_BIT: u32 = 1;
}

/// Longest name decoded by the preview
pub const MAX_PREVIEW_NAME_LEN: usize = 1024;
