use crate::memory::{BytePattern, ModuleMemory, ReadMemory};
use crate::offset::SearchFailure;

/// Successive matches of a pattern in `[start, end)`.
///
/// Each scan resumes at the previous hit + 1, so overlapping matches are all
/// reported. A read fault ends the iteration and is kept in [`failure`].
///
/// [`failure`]: PatternCursor::failure
pub struct PatternCursor<'s, R: ReadMemory + ?Sized> {
    memory: ModuleMemory<'s, R>,
    pattern: &'s BytePattern,
    next: u64,
    end: u64,
    failure: Option<SearchFailure>,
}

impl<'s, R: ReadMemory + ?Sized> PatternCursor<'s, R> {
    /// Cursor over the rest of the module from `start`.
    pub fn new(memory: ModuleMemory<'s, R>, pattern: &'s BytePattern, start: u64) -> Self {
        let end = memory.space().end();
        Self::bounded(memory, pattern, start, end.saturating_sub(start))
    }

    /// Cursor over `[start, start + len)`, clamped to the module.
    pub fn bounded(
        memory: ModuleMemory<'s, R>,
        pattern: &'s BytePattern,
        start: u64,
        len: u64,
    ) -> Self {
        let end = start.saturating_add(len).min(memory.space().end());
        Self {
            memory,
            pattern,
            next: start,
            end,
            failure: None,
        }
    }

    pub fn failure(&self) -> Option<SearchFailure> {
        self.failure
    }
}

impl<R: ReadMemory + ?Sized> Iterator for PatternCursor<'_, R> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.next >= self.end {
            return None;
        }

        match self
            .memory
            .scan_bounded(self.next, self.end - self.next, self.pattern)
        {
            Ok(Some(hit)) => {
                self.next = hit + 1;
                Some(hit)
            }
            Ok(None) => {
                self.next = self.end;
                None
            }
            Err(failure) => {
                self.failure = Some(failure);
                self.next = self.end;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{AddressSpace, MockMemoryBuilder};

    const BASE: u64 = 0x1_4000_0000;

    #[test]
    fn test_cursor_yields_every_match_in_order() {
        let reader = MockMemoryBuilder::new()
            .region(BASE, 0x100)
            .write_bytes(BASE + 0x10, &[0xAA, 0x11, 0xCC])
            .write_bytes(BASE + 0x80, &[0xAA, 0xFF, 0xCC])
            .write_bytes(BASE + 0x90, &[0xAA, 0xBB, 0xDD])
            .build();
        let memory = ModuleMemory::new(&reader, AddressSpace::new(BASE, 0x100));
        let pattern = BytePattern::parse("AA ?? CC").unwrap();

        let hits: Vec<u64> = PatternCursor::new(memory, &pattern, BASE).collect();
        assert_eq!(hits, vec![BASE + 0x10, BASE + 0x80]);
    }

    #[test]
    fn test_cursor_reports_overlapping_matches() {
        let reader = MockMemoryBuilder::new()
            .region(BASE, 0x10)
            .write_bytes(BASE, &[0xAA, 0xAA, 0xAA])
            .build();
        let memory = ModuleMemory::new(&reader, AddressSpace::new(BASE, 0x10));
        let pattern = BytePattern::parse("AA AA").unwrap();

        let hits: Vec<u64> = PatternCursor::new(memory, &pattern, BASE).collect();
        assert_eq!(hits, vec![BASE, BASE + 1]);
    }

    #[test]
    fn test_bounded_cursor_stops_at_window_end() {
        let reader = MockMemoryBuilder::new()
            .region(BASE, 0x100)
            .write_bytes(BASE + 0x08, &[0xFF, 0x15])
            .write_bytes(BASE + 0x60, &[0xFF, 0x15])
            .build();
        let memory = ModuleMemory::new(&reader, AddressSpace::new(BASE, 0x100));
        let pattern = BytePattern::parse("FF 15").unwrap();

        let hits: Vec<u64> = PatternCursor::bounded(memory, &pattern, BASE, 0x50).collect();
        assert_eq!(hits, vec![BASE + 0x08]);
    }

    #[test]
    fn test_cursor_never_leaves_the_module() {
        // Match in mapped memory just past the module end
        let reader = MockMemoryBuilder::new()
            .region(BASE, 0x200)
            .write_bytes(BASE + 0x180, &[0xAA, 0x00, 0xCC])
            .build();
        let memory = ModuleMemory::new(&reader, AddressSpace::new(BASE, 0x100));
        let pattern = BytePattern::parse("AA ?? CC").unwrap();

        let mut cursor = PatternCursor::bounded(memory, &pattern, BASE, 0x1000);
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.failure(), None);
    }

    #[test]
    fn test_cursor_records_read_failure() {
        let reader = MockMemoryBuilder::new().region(BASE + 0x1000, 0x10).build();
        let memory = ModuleMemory::new(&reader, AddressSpace::new(BASE, 0x100));
        let pattern = BytePattern::parse("AA").unwrap();

        let mut cursor = PatternCursor::new(memory, &pattern, BASE);
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.failure(), Some(SearchFailure::Unreadable));
    }
}
