//! In-memory `ReadMemory` for tests.
//!
//! Memory is a set of non-overlapping regions. Reads must fall entirely
//! inside one region, as a read across an unmapped page would fail on a
//! real process.

use crate::error::{Error, Result};
use crate::memory::ReadMemory;
use crate::memory::pattern::BytePattern;

#[derive(Debug, Clone)]
struct Region {
    base: u64,
    data: Vec<u8>,
}

impl Region {
    fn contains(&self, address: u64, size: usize) -> bool {
        address >= self.base
            && (address - self.base)
                .checked_add(size as u64)
                .is_some_and(|end| end <= self.data.len() as u64)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockMemoryReader {
    regions: Vec<Region>,
}

impl MockMemoryReader {
    fn region(&self, address: u64, size: usize) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains(address, size))
    }
}

impl ReadMemory for MockMemoryReader {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let region = self
            .region(address, size)
            .ok_or_else(|| Error::read_failed(address, format!("unmapped ({} bytes)", size)))?;
        let start = (address - region.base) as usize;
        Ok(region.data[start..start + size].to_vec())
    }

    fn scan_pattern(&self, start: u64, length: usize, pattern: &BytePattern) -> Result<Option<u64>> {
        let mut hits = Vec::new();
        let mut any_mapped = false;
        let end = start.saturating_add(length as u64);

        for region in &self.regions {
            let region_end = region.base + region.data.len() as u64;
            if region_end <= start || region.base >= end {
                continue;
            }
            any_mapped = true;
            let from = start.max(region.base);
            let to = end.min(region_end);
            let slice = &region.data[(from - region.base) as usize..(to - region.base) as usize];
            if let Some(pos) = pattern.find_in(slice) {
                hits.push(from + pos as u64);
            }
        }

        if !any_mapped && length > 0 {
            return Err(Error::read_failed(start, "scan range unmapped"));
        }
        Ok(hits.into_iter().min())
    }
}

/// Builder for [`MockMemoryReader`].
///
/// Writes panic when they do not fit a previously declared region; this is
/// test scaffolding and a bad layout should fail loudly.
#[derive(Debug, Default)]
pub struct MockMemoryBuilder {
    regions: Vec<Region>,
}

impl MockMemoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `size` zero bytes at `base`.
    pub fn region(mut self, base: u64, size: usize) -> Self {
        let end = base + size as u64;
        let overlaps = self
            .regions
            .iter()
            .any(|r| base < r.base + r.data.len() as u64 && r.base < end);
        assert!(!overlaps, "mock region at {:#x} overlaps an existing region", base);

        self.regions.push(Region {
            base,
            data: vec![0; size],
        });
        self
    }

    pub fn write_bytes(mut self, address: u64, bytes: &[u8]) -> Self {
        let region = self
            .regions
            .iter_mut()
            .find(|r| r.contains(address, bytes.len()))
            .unwrap_or_else(|| {
                panic!(
                    "mock write of {} bytes at {:#x} is outside every region",
                    bytes.len(),
                    address
                )
            });
        let start = (address - region.base) as usize;
        region.data[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn write_u32(self, address: u64, value: u32) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_i32(self, address: u64, value: i32) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_u64(self, address: u64, value: u64) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    /// Write a string as UTF-16LE without terminator.
    pub fn write_utf16(self, address: u64, text: &str) -> Self {
        let bytes: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        self.write_bytes(address, &bytes)
    }

    pub fn build(self) -> MockMemoryReader {
        MockMemoryReader {
            regions: self.regions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_read_back() {
        let reader = MockMemoryBuilder::new()
            .region(0x1000, 0x10)
            .write_bytes(0x1002, &[0x01, 0x02, 0x03])
            .build();

        assert_eq!(reader.read_bytes(0x1002, 3).unwrap(), vec![1, 2, 3]);
        assert_eq!(reader.read_bytes(0x1000, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_mock_read_across_region_end_fails() {
        let reader = MockMemoryBuilder::new().region(0x1000, 0x10).build();
        assert!(reader.read_bytes(0x100C, 8).is_err());
        assert!(reader.read_bytes(0x0FFF, 1).is_err());
    }

    #[test]
    fn test_mock_scan_returns_lowest_hit() {
        let pattern = BytePattern::parse("AA ?? CC").unwrap();
        let reader = MockMemoryBuilder::new()
            .region(0x3000, 0x10)
            .region(0x1000, 0x10)
            .write_bytes(0x3004, &[0xAA, 0x11, 0xCC])
            .write_bytes(0x1008, &[0xAA, 0xFF, 0xCC])
            .build();

        assert_eq!(reader.scan_pattern(0x1000, 0x3000, &pattern).unwrap(), Some(0x1008));
        assert_eq!(reader.scan_pattern(0x1009, 0x3000, &pattern).unwrap(), Some(0x3004));
        assert_eq!(reader.scan_pattern(0x3005, 0x100, &pattern).unwrap(), None);
    }

    #[test]
    fn test_write_utf16() {
        let reader = MockMemoryBuilder::new()
            .region(0x1000, 0x10)
            .write_utf16(0x1000, "Ab")
            .build();
        assert_eq!(reader.read_bytes(0x1000, 4).unwrap(), vec![b'A', 0, b'b', 0]);
    }

    #[test]
    #[should_panic(expected = "outside every region")]
    fn test_write_outside_regions_panics() {
        let _ = MockMemoryBuilder::new().region(0x1000, 0x10).write_u64(0x100C, 1);
    }
}
