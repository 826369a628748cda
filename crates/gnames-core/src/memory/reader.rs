use crate::error::{Error, Result};
use crate::memory::ProcessHandle;
use crate::memory::pattern::BytePattern;

/// Chunk size used when scanning a large range for a pattern (1MB)
pub const SCAN_CHUNK_SIZE: usize = 1024 * 1024;

/// Read access to the memory of an attached target.
///
/// Implementors only provide `read_bytes`; the typed reads and the pattern
/// scan are built on top of it. Scanning implementations backed by a local
/// buffer may override `scan_pattern` to avoid the chunked copy.
pub trait ReadMemory {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    fn read_u8(&self, address: u64) -> Result<u8> {
        let bytes = self.read_bytes(address, 1)?;
        bytes
            .first()
            .copied()
            .ok_or_else(|| Error::read_failed(address, "short read"))
    }

    fn read_u16(&self, address: u64) -> Result<u16> {
        Ok(u16::from_le_bytes(to_array(self.read_bytes(address, 2)?, address)?))
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        Ok(u32::from_le_bytes(to_array(self.read_bytes(address, 4)?, address)?))
    }

    fn read_i32(&self, address: u64) -> Result<i32> {
        Ok(i32::from_le_bytes(to_array(self.read_bytes(address, 4)?, address)?))
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        Ok(u64::from_le_bytes(to_array(self.read_bytes(address, 8)?, address)?))
    }

    /// Find the first match of `pattern` in `[start, start + length)`.
    fn scan_pattern(&self, start: u64, length: usize, pattern: &BytePattern) -> Result<Option<u64>> {
        scan_chunked(self, start, length, pattern, SCAN_CHUNK_SIZE)
    }
}

fn to_array<const N: usize>(bytes: Vec<u8>, address: u64) -> Result<[u8; N]> {
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        Error::read_failed(
            address,
            format!("short read: expected {} bytes, got {}", N, bytes.len()),
        )
    })
}

/// Chunked pattern scan over `[start, start + length)`.
///
/// Unreadable chunks are skipped. Matches may straddle chunk boundaries: the
/// last `pattern.len() - 1` bytes of each chunk are carried into the next one.
/// Fails only when not a single chunk of the range could be read.
pub fn scan_chunked<R: ReadMemory + ?Sized>(
    reader: &R,
    start: u64,
    length: usize,
    pattern: &BytePattern,
    chunk_size: usize,
) -> Result<Option<u64>> {
    let chunk_size = chunk_size.max(pattern.len());
    let mut offset = 0usize;
    let mut tail: Vec<u8> = Vec::new();
    let mut first_error: Option<Error> = None;
    let mut any_read = false;

    while offset < length {
        let read_size = (length - offset).min(chunk_size);
        let addr = start + offset as u64;

        let chunk = match reader.read_bytes(addr, read_size) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::trace!("Pattern scan skipped chunk at {:#x}: {}", addr, e);
                first_error.get_or_insert(e);
                tail.clear();
                offset += read_size;
                continue;
            }
        };
        any_read = true;

        let mut data = Vec::with_capacity(tail.len() + chunk.len());
        data.extend_from_slice(&tail);
        data.extend_from_slice(&chunk);
        let data_base = addr - tail.len() as u64;

        if let Some(pos) = pattern.find_in(&data) {
            return Ok(Some(data_base + pos as u64));
        }

        let keep = pattern.len() - 1;
        tail = data[data.len().saturating_sub(keep)..].to_vec();
        offset += read_size;
    }

    match first_error {
        Some(e) if !any_read => Err(e),
        _ => Ok(None),
    }
}

/// `ReadMemory` over a live process handle
pub struct MemoryReader<'a> {
    process: &'a ProcessHandle,
}

impl<'a> MemoryReader<'a> {
    pub fn new(process: &'a ProcessHandle) -> Self {
        Self { process }
    }

    pub fn process(&self) -> &ProcessHandle {
        self.process
    }
}

impl ReadMemory for MemoryReader<'_> {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        self.process.read_bytes(address, size)
    }
}
