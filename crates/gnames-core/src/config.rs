//! Search configuration.
//!
//! The window sizes and validation bounds are heuristics tuned against real
//! builds. They live here so that a caller can widen or tighten them (or cap
//! the work done per search) without touching the search code.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::memory::BytePattern;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    /// Pattern occurrences a strategy may examine before giving up
    pub max_occurrences: usize,
    /// Bytes of the name-pool constructor searched for the lock call
    pub lock_call_window: u64,
    /// Bytes from the constructor searched for the corroborating literal
    pub evidence_window: u64,
    /// Bytes before an anchor searched (backwards) for the accessor call
    pub call_window: u64,
    /// Bytes of the accessor searched for the global load
    pub load_window: u64,
    /// Code references to the literal collected as extra anchors
    pub max_literal_references: usize,
    /// Upper bound of the name-pool block count
    pub pool_max_blocks: u32,
    /// Upper bound of the name-pool byte cursor
    pub pool_max_cursor: u32,
    /// Block slots inspected by the name-pool validator
    pub pool_block_slots: usize,
    /// Upper bound of the name-array element count
    pub array_max_count: u32,
    /// Upper bound of the name-array capacity
    pub array_max_capacity: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_occurrences: 0x100,
            lock_call_window: 0x50,
            evidence_window: 0x2A0,
            call_window: 0x100,
            load_window: 0x100,
            max_literal_references: 16,
            pool_max_blocks: 0x2000,
            pool_max_cursor: 0x20000,
            pool_block_slots: 10,
            array_max_count: 0x40_0000,
            array_max_capacity: 0x80_0000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub limits: SearchLimits,
    /// Additional name-array accessor patterns, tried after the built-in ones
    pub extra_array_patterns: Vec<String>,
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        let limits = &self.limits;
        let windows = [
            ("lock_call_window", limits.lock_call_window),
            ("evidence_window", limits.evidence_window),
            ("call_window", limits.call_window),
            ("load_window", limits.load_window),
        ];
        if let Some((name, _)) = windows.iter().find(|(_, size)| *size == 0) {
            return Err(Error::InvalidConfig(format!("{} must be non-zero", name)));
        }
        if limits.max_occurrences == 0 {
            return Err(Error::InvalidConfig(
                "max_occurrences must be non-zero".to_string(),
            ));
        }
        if limits.pool_block_slots == 0 {
            return Err(Error::InvalidConfig(
                "pool_block_slots must be non-zero".to_string(),
            ));
        }
        if limits.array_max_capacity <= limits.array_max_count {
            return Err(Error::InvalidConfig(format!(
                "array_max_capacity ({}) must exceed array_max_count ({})",
                limits.array_max_capacity, limits.array_max_count
            )));
        }

        self.array_patterns().map(|_| ())
    }

    /// Parse `extra_array_patterns`.
    pub fn array_patterns(&self) -> Result<Vec<BytePattern>> {
        self.extra_array_patterns
            .iter()
            .map(|text| BytePattern::parse(text))
            .collect()
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SearchConfig> {
    let content = fs::read_to_string(&path)?;
    let config: SearchConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &SearchConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}
