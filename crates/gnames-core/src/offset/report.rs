use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::{AddressSpace, ReadMemory};
use crate::offset::{SearchResult, StructureKind, preview_names};

/// Bytes of the located structure captured in the report
pub const SAMPLE_SIZE: usize = 32;

/// Search outcome bundled with the context needed to reproduce it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub timestamp: DateTime<Utc>,
    pub module: String,
    pub base_address: String,
    pub module_size: String,
    /// Absolute address of the table global, when found
    pub address: Option<String>,
    pub result: SearchResult,
    /// First entries of the table
    pub names: Vec<String>,
    /// Hex dump of the first bytes at `address`
    pub sample: Option<String>,
    pub elapsed_ms: u64,
}

impl SearchReport {
    pub fn new<R: ReadMemory + ?Sized>(
        module: &str,
        space: AddressSpace,
        result: SearchResult,
        reader: &R,
        preview: usize,
        elapsed: Duration,
    ) -> Self {
        let address = result.address(space.base());
        let names = match (address, result.kind) {
            (Some(addr), Some(kind)) if preview > 0 => preview_names(reader, kind, addr, preview),
            _ => Vec::new(),
        };
        let sample = address.map(|addr| Self::read_memory_hex(reader, addr, SAMPLE_SIZE));

        Self {
            timestamp: Utc::now(),
            module: module.to_string(),
            base_address: format!("0x{:X}", space.base()),
            module_size: format!("0x{:X}", space.size()),
            address: address.map(|addr| format!("0x{:X}", addr)),
            result,
            names,
            sample,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn kind(&self) -> Option<StructureKind> {
        self.result.kind
    }

    fn read_memory_hex<R: ReadMemory + ?Sized>(reader: &R, address: u64, size: usize) -> String {
        match reader.read_bytes(address, size) {
            Ok(bytes) => bytes
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" "),
            Err(_) => "(read failed)".to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save report to JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
