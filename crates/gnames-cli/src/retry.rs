//! Repeated searches against a game that is still starting up.

use std::time::{Duration, Instant};

use gnames_core::{GNamesSearcher, ReadMemory, SearchResult};
use tracing::{info, warn};

use crate::shutdown::ShutdownSignal;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    pub interval: Duration,
}

/// Search until GNames is found or the retries run out.
///
/// Returns the last result with the duration of the attempt that produced
/// it, or `None` if shutdown was signaled, including during a search.
pub fn search_with_retry<R: ReadMemory + ?Sized>(
    searcher: &GNamesSearcher<'_, R>,
    policy: &RetryPolicy,
    shutdown: &ShutdownSignal,
) -> Option<(SearchResult, Duration)> {
    let total = policy.retries.saturating_add(1);
    let mut attempts = 0u32;
    loop {
        if shutdown.is_shutdown() {
            return None;
        }
        attempts += 1;

        let start = Instant::now();
        let result = searcher.search();
        let elapsed = start.elapsed();
        if shutdown.is_shutdown() {
            return None;
        }

        if result.found || attempts >= total {
            return Some((result, elapsed));
        }

        let reason = result
            .reason
            .map(|reason| reason.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        if attempts == 1 {
            info!("GNames not found ({}), the game may still be loading", reason);
        }
        warn!(
            "Retrying in {}s (attempt {}/{})",
            policy.interval.as_secs(),
            attempts + 1,
            total
        );

        if shutdown.wait(policy.interval) {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnames_core::memory::{MockMemoryBuilder, MockMemoryReader};
    use gnames_core::{AddressSpace, SearchConfig, SearchFailure};

    const BASE: u64 = 0x1_4000_0000;

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            interval: Duration::ZERO,
        }
    }

    #[test]
    fn test_gives_up_with_last_result() {
        let reader = MockMemoryBuilder::new().region(BASE, 0x1000).build();
        let searcher =
            GNamesSearcher::new(&reader, AddressSpace::new(BASE, 0x1000), &SearchConfig::default())
                .unwrap();

        let (result, _) = search_with_retry(&searcher, &policy(2), &ShutdownSignal::new()).unwrap();
        assert!(!result.found);
        assert_eq!(result.reason, Some(SearchFailure::PatternNotFound));
    }

    /// Signals shutdown on the first read, as Ctrl-C during a search would
    struct InterruptingReader<'a> {
        inner: MockMemoryReader,
        shutdown: &'a ShutdownSignal,
    }

    impl ReadMemory for InterruptingReader<'_> {
        fn read_bytes(&self, address: u64, size: usize) -> gnames_core::Result<Vec<u8>> {
            self.shutdown.trigger();
            self.inner.read_bytes(address, size)
        }
    }

    #[test]
    fn test_interrupt_during_single_attempt_discards_result() {
        let shutdown = ShutdownSignal::new();
        let reader = InterruptingReader {
            inner: MockMemoryBuilder::new().region(BASE, 0x1000).build(),
            shutdown: &shutdown,
        };
        let searcher =
            GNamesSearcher::new(&reader, AddressSpace::new(BASE, 0x1000), &SearchConfig::default())
                .unwrap();

        assert!(search_with_retry(&searcher, &policy(0), &shutdown).is_none());
        assert!(shutdown.is_shutdown());
    }

    #[test]
    fn test_shutdown_stops_before_searching() {
        let reader = MockMemoryBuilder::new().region(BASE, 0x1000).build();
        let searcher =
            GNamesSearcher::new(&reader, AddressSpace::new(BASE, 0x1000), &SearchConfig::default())
                .unwrap();
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        assert!(search_with_retry(&searcher, &policy(5), &shutdown).is_none());
    }
}
