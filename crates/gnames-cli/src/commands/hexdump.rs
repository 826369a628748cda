//! Raw memory dump of the target process.
//!
//! ```text
//! 0x14A5B3F00: 00 00 00 00 00 00 00 00  05 00 00 00 00 40 00 00  |.............@..|
//! ```

use anyhow::Result;
use gnames_core::{MemoryReader, ReadMemory};

use super::Target;
use super::hex_utils::{format_hex_address, parse_hex_address};

const BYTES_PER_LINE: usize = 16;

pub fn run(address: &str, size: usize, ascii: bool, target: &Target) -> Result<()> {
    let address = parse_hex_address(address)?;
    let process = target.open()?;
    let reader = MemoryReader::new(&process);
    let bytes = reader.read_bytes(address, size)?;

    println!(
        "Hexdump at {} ({} bytes, {}):",
        format_hex_address(address),
        size,
        describe(address, process.address_space().offset_of(address))
    );
    println!();
    for line in format_lines(address, &bytes, ascii) {
        println!("{}", line);
    }
    Ok(())
}

fn describe(address: u64, module_offset: Option<u64>) -> String {
    match module_offset {
        Some(offset) => format!("module + 0x{:X}", offset),
        None => format!("outside module at {}", format_hex_address(address)),
    }
}

fn format_lines(address: u64, bytes: &[u8], ascii: bool) -> Vec<String> {
    bytes
        .chunks(BYTES_PER_LINE)
        .enumerate()
        .map(|(i, chunk)| {
            let mut line = format!("0x{:X}: ", address + (i * BYTES_PER_LINE) as u64);
            for j in 0..BYTES_PER_LINE {
                if j == 8 {
                    line.push(' ');
                }
                match chunk.get(j) {
                    Some(byte) => line.push_str(&format!("{:02X} ", byte)),
                    None => line.push_str("   "),
                }
            }
            if ascii {
                let text: String = chunk
                    .iter()
                    .map(|&b| if (0x20..0x7F).contains(&b) { b as char } else { '.' })
                    .collect();
                line.push_str(&format!(" |{:<16}|", text));
            }
            line.trim_end().to_string()
        })
        .collect()
}
