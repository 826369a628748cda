//! RIP-relative target resolution for the few x86-64 encodings the search uses.
//!
//! | encoding       | example                 | disp at | length |
//! |----------------|-------------------------|---------|--------|
//! | `Call`         | `E8 rel32`              | +1      | 5      |
//! | `Load`         | `48 8B 05 rel32` / LEA  | +3      | 7      |
//! | `IndirectCall` | `FF 15 rel32`           | +2      | 6      |
//!
//! The target is `address + length + disp`. Nothing here validates the
//! result; callers range-check it before dereferencing.

use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{Error, Result};
use crate::memory::ReadMemory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Encoding {
    /// 5-byte relative call
    Call,
    /// 7-byte REX.W load or LEA with a RIP-relative operand
    Load,
    /// 6-byte call through a RIP-relative pointer
    IndirectCall,
}

impl Encoding {
    pub const fn displacement_offset(self) -> u64 {
        match self {
            Encoding::Call => 1,
            Encoding::Load => 3,
            Encoding::IndirectCall => 2,
        }
    }

    pub const fn length(self) -> u64 {
        match self {
            Encoding::Call => 5,
            Encoding::Load => 7,
            Encoding::IndirectCall => 6,
        }
    }
}

/// `address + length + displacement`, wrapping.
pub fn resolve_target(address: u64, encoding: Encoding, displacement: i32) -> u64 {
    address
        .wrapping_add(encoding.length())
        .wrapping_add_signed(displacement as i64)
}

/// Decode from instruction bytes already in hand.
///
/// `bytes` starts at the instruction; `None` when it is too short to hold
/// the displacement.
pub fn decode_bytes(bytes: &[u8], address: u64, encoding: Encoding) -> Option<u64> {
    let at = encoding.displacement_offset() as usize;
    let disp: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(resolve_target(address, encoding, i32::from_le_bytes(disp)))
}

/// Read the displacement of the instruction at `address` and resolve it.
pub fn decode_relative<R: ReadMemory + ?Sized>(
    reader: &R,
    address: u64,
    encoding: Encoding,
) -> Result<u64> {
    let at = address
        .checked_add(encoding.displacement_offset())
        .ok_or_else(|| Error::read_failed(address, "displacement past end of address space"))?;
    let disp = reader.read_i32(at)?;
    Ok(resolve_target(address, encoding, disp))
}
