use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use gnames_core::{ImageReader, SearchReport};
use tracing::info;

use super::SearchOptions;
use super::hex_utils::parse_hex_address;
use crate::output;

/// Search a module image dumped from memory.
///
/// `base` is the address the image was mapped at, so reported addresses
/// line up with the live process.
pub fn run(path: &Path, base: &str, options: &SearchOptions) -> Result<bool> {
    let base = parse_hex_address(base)?;
    let image = ImageReader::open(path, base)
        .with_context(|| format!("Failed to load image {}", path.display()))?;
    let space = image.address_space();
    info!(
        "Searching {} at 0x{:X}, {} bytes",
        path.display(),
        space.base(),
        space.size()
    );

    let start = Instant::now();
    let result = options.searcher(&image, space)?.search();
    let elapsed = start.elapsed();

    let module = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let report = SearchReport::new(&module, space, result, &image, options.preview, elapsed);
    output::emit(&report, options)
}
