//! Raw module dumps loaded from disk.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::memory::pattern::BytePattern;
use crate::memory::{AddressSpace, ReadMemory};

/// `ReadMemory` over a module image mapped at a chosen base address.
///
/// The dump is expected to be laid out as in memory (sections at their
/// virtual addresses), which is what process dumpers write.
#[derive(Debug, Clone)]
pub struct ImageReader {
    base: u64,
    data: Vec<u8>,
}

impl ImageReader {
    pub fn open<P: AsRef<Path>>(path: P, base: u64) -> Result<Self> {
        let data = fs::read(&path)?;
        debug!(
            "Loaded image {} ({} bytes) at 0x{:X}",
            path.as_ref().display(),
            data.len(),
            base
        );
        Ok(Self::from_bytes(base, data))
    }

    pub fn from_bytes(base: u64, data: Vec<u8>) -> Self {
        Self { base, data }
    }

    pub fn address_space(&self) -> AddressSpace {
        AddressSpace::new(self.base, self.data.len() as u64)
    }

    fn slice(&self, address: u64, size: usize) -> Option<&[u8]> {
        let start = usize::try_from(address.checked_sub(self.base)?).ok()?;
        let end = start.checked_add(size)?;
        self.data.get(start..end)
    }
}

impl ReadMemory for ImageReader {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        self.slice(address, size)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::read_failed(address, format!("outside image ({} bytes)", size)))
    }

    fn scan_pattern(&self, start: u64, length: usize, pattern: &BytePattern) -> Result<Option<u64>> {
        let space = self.address_space();
        if !space.contains(start) {
            return Err(Error::read_failed(start, "scan starts outside image"));
        }
        let length = length.min(space.remaining(start) as usize);
        let window = self
            .slice(start, length)
            .ok_or_else(|| Error::read_failed(start, "scan window outside image"))?;
        Ok(pattern.find_in(window).map(|pos| start + pos as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASE: u64 = 0x1_4000_0000;

    #[test]
    fn test_open_reads_file_at_base() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x4D, 0x5A, 0x90, 0x00, 0x03]).unwrap();

        let image = ImageReader::open(file.path(), BASE).unwrap();
        assert_eq!(image.address_space(), AddressSpace::new(BASE, 5));
        assert_eq!(image.read_u16(BASE).unwrap(), 0x5A4D);
        assert_eq!(image.read_u8(BASE + 4).unwrap(), 0x03);
        assert!(image.read_u16(BASE + 4).is_err());
        assert!(image.read_u8(BASE - 1).is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let err = ImageReader::open("/nonexistent/module.bin", BASE).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_scan_pattern_is_clamped_to_image() {
        let mut data = vec![0u8; 0x40];
        data[0x10..0x13].copy_from_slice(&[0xAA, 0x01, 0xCC]);
        data[0x3D..0x40].copy_from_slice(&[0xAA, 0x02, 0xCC]);
        let image = ImageReader::from_bytes(BASE, data);
        let pattern = BytePattern::parse("AA ?? CC").unwrap();

        assert_eq!(image.scan_pattern(BASE, 0x1000, &pattern).unwrap(), Some(BASE + 0x10));
        assert_eq!(
            image.scan_pattern(BASE + 0x11, 0x1000, &pattern).unwrap(),
            Some(BASE + 0x3D)
        );
        assert_eq!(image.scan_pattern(BASE + 0x3E, 0x1000, &pattern).unwrap(), None);
        assert!(image.scan_pattern(BASE + 0x40, 0x10, &pattern).is_err());
    }
}
