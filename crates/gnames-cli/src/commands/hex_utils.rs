//! Hex address parsing and formatting.

use anyhow::{Result, anyhow};

/// Parse a hex address with or without the 0x prefix.
pub fn parse_hex_address(s: &str) -> Result<u64> {
    let digits = s
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X")
        .replace('`', "");
    u64::from_str_radix(&digits, 16).map_err(|e| anyhow!("Invalid hex address {:?}: {}", s, e))
}

pub fn format_hex_address(addr: u64) -> String {
    format!("0x{:X}", addr)
}
