//! Address range and pointer validity checks.
//!
//! Everything the searcher reads out of the module image goes through
//! [`ModuleMemory`], which refuses addresses outside the module before the
//! read is attempted. Values obtained by dereferencing a global (heap blocks,
//! inner arrays) are checked with [`is_readable`] instead.

use serde::{Deserialize, Serialize};

use crate::memory::ReadMemory;
use crate::memory::pattern::BytePattern;
use crate::offset::{Encoding, SearchFailure, decode_relative};

/// Values at or below this are treated as small integers, not pointers
pub const MIN_POINTER_VALUE: u64 = 0x10000;

/// Highest canonical user-mode address on x86-64
pub const MAX_USER_ADDRESS: u64 = 0x7FFF_FFFF_FFFF;

/// The attached module's span: `[base, base + size)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSpace {
    base: u64,
    size: u64,
}

impl AddressSpace {
    pub fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// One past the last address; saturates at `u64::MAX`.
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    /// `base <= address < base + size`
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address - self.base < self.size
    }

    /// Whether all of `[address, address + len)` lies in the module.
    pub fn contains_range(&self, address: u64, len: u64) -> bool {
        if len == 0 {
            return self.contains(address);
        }
        self.contains(address)
            && address
                .checked_add(len - 1)
                .is_some_and(|last| self.contains(last))
    }

    /// Number of bytes from `address` to the end of the module.
    pub fn remaining(&self, address: u64) -> u64 {
        if self.contains(address) {
            self.end() - address
        } else {
            0
        }
    }

    pub fn offset_of(&self, address: u64) -> Option<u64> {
        self.contains(address).then(|| address - self.base)
    }
}

/// Nonzero and above the reserved low-memory threshold.
///
/// Not a page-validity check; it only filters out nulls and small integers.
pub fn is_plausible_pointer(value: u64) -> bool {
    value != 0 && value > MIN_POINTER_VALUE
}

/// Plausible and inside the canonical user-mode range.
pub fn is_user_space_pointer(value: u64) -> bool {
    is_plausible_pointer(value) && value <= MAX_USER_ADDRESS
}

/// A one-byte read at `address` succeeds.
pub fn is_readable<R: ReadMemory + ?Sized>(reader: &R, address: u64) -> bool {
    reader.read_u8(address).is_ok()
}

/// Reads restricted to the module image.
///
/// Every method checks containment first and answers `OutOfRange` without
/// touching the reader; read faults come back as `Unreadable`.
pub struct ModuleMemory<'a, R: ReadMemory + ?Sized> {
    reader: &'a R,
    space: AddressSpace,
}

impl<R: ReadMemory + ?Sized> Clone for ModuleMemory<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: ReadMemory + ?Sized> Copy for ModuleMemory<'_, R> {}

impl<'a, R: ReadMemory + ?Sized> ModuleMemory<'a, R> {
    pub fn new(reader: &'a R, space: AddressSpace) -> Self {
        Self { reader, space }
    }

    pub fn reader(&self) -> &'a R {
        self.reader
    }

    pub fn space(&self) -> AddressSpace {
        self.space
    }

    /// Read up to `len` bytes, truncated at the end of the module.
    pub fn read_window(&self, address: u64, len: usize) -> Result<Vec<u8>, SearchFailure> {
        if !self.space.contains(address) {
            return Err(SearchFailure::OutOfRange);
        }
        let len = (len as u64).min(self.space.remaining(address)) as usize;
        self.reader
            .read_bytes(address, len)
            .map_err(|_| SearchFailure::Unreadable)
    }

    pub fn read_u64(&self, address: u64) -> Result<u64, SearchFailure> {
        if !self.space.contains_range(address, 8) {
            return Err(SearchFailure::OutOfRange);
        }
        self.reader
            .read_u64(address)
            .map_err(|_| SearchFailure::Unreadable)
    }

    /// Decode the instruction at `address`; the whole instruction must lie in
    /// the module. The decoded target itself is not checked.
    pub fn decode(&self, address: u64, encoding: Encoding) -> Result<u64, SearchFailure> {
        if !self.space.contains_range(address, encoding.length()) {
            return Err(SearchFailure::OutOfRange);
        }
        decode_relative(self.reader, address, encoding).map_err(|_| SearchFailure::Unreadable)
    }

    /// Next match of `pattern` in `[start, end of module)`.
    pub fn scan(&self, start: u64, pattern: &BytePattern) -> Result<Option<u64>, SearchFailure> {
        self.scan_bounded(start, self.space.remaining(start), pattern)
    }

    /// Next match of `pattern` in `[start, start + len)`, clamped to the module.
    pub fn scan_bounded(
        &self,
        start: u64,
        len: u64,
        pattern: &BytePattern,
    ) -> Result<Option<u64>, SearchFailure> {
        if !self.space.contains(start) {
            return Err(SearchFailure::OutOfRange);
        }
        let len = len.min(self.space.remaining(start)) as usize;
        self.reader
            .scan_pattern(start, len, pattern)
            .map_err(|_| SearchFailure::Unreadable)
    }
}
