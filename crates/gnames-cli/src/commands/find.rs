use anyhow::Result;
use gnames_core::{MemoryReader, SearchReport};
use tracing::info;

use super::{SearchOptions, Target};
use crate::output;
use crate::retry::{RetryPolicy, search_with_retry};
use crate::shutdown::ShutdownSignal;

/// Search the main module of a running process.
///
/// Returns whether GNames was found.
pub fn run(target: &Target, policy: &RetryPolicy, options: &SearchOptions) -> Result<bool> {
    let shutdown = ShutdownSignal::install()?;

    let process = target.open()?;
    let space = process.address_space();
    info!(
        "Searching {} (PID {}) at 0x{:X}, {} bytes",
        process.module_name,
        process.pid,
        space.base(),
        space.size()
    );

    let reader = MemoryReader::new(&process);
    let searcher = options.searcher(&reader, space)?;
    let Some((result, elapsed)) = search_with_retry(&searcher, policy, &shutdown) else {
        info!("Search interrupted");
        return Ok(false);
    };

    let report = SearchReport::new(
        &process.module_name,
        space,
        result,
        &reader,
        options.preview,
        elapsed,
    );
    output::emit(&report, options)
}
