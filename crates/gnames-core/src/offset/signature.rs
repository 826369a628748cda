//! Built-in code signatures and literals.

use crate::config::SearchConfig;
use crate::error::Result;
use crate::memory::{BytePattern, PatternByte};

/// Name registered first by every build after `None`; its presence near
/// a candidate is the corroborating evidence
pub const BYTE_PROPERTY: &str = "ByteProperty";

/// `lea rcx, [pool]; call FNamePool::FNamePool`
pub const NAME_POOL_CTOR: &str = "48 8D 0D ?? ?? ?? ?? E8 ?? ?? ?? ??";
/// Offset of the constructor call inside [`NAME_POOL_CTOR`]
pub const NAME_POOL_CALL_OFFSET: u64 = 7;

/// `call qword ptr [rip + disp]`, the lock initialization in the constructor
pub const LOCK_CALL: &str = "FF 15";
/// `call rel32`
pub const DIRECT_CALL: &str = "E8";
/// `mov r64, [rip + disp]`
pub const GLOBAL_LOAD: [u8; 2] = [0x48, 0x8B];

/// Accessors that load the name array global and test it for null
pub const NAME_ARRAY_ACCESSORS: [&str; 3] = [
    "48 8B 05 ?? ?? ?? ?? 48 85 C0 75 ?? B9",
    "48 8B 1D ?? ?? ?? ?? 48 85 DB 75 ?? B9",
    "48 8B 05 ?? ?? ?? ?? 48 85 C0 75 ?? 48 8D",
];

/// `lea r64, [rip + disp]` with REX.W or REX.WR
pub const LITERAL_REFERENCES: [[u8; 2]; 2] = [[0x48, 0x8D], [0x4C, 0x8D]];

/// Two opcode bytes followed by a ModRM selecting `[rip + disp32]`
fn rip_relative(opcode: [u8; 2]) -> Result<BytePattern> {
    // mod=00 rm=101
    BytePattern::new(vec![
        PatternByte::exact(opcode[0]),
        PatternByte::exact(opcode[1]),
        PatternByte::masked(0x05, 0xC7),
    ])
}

/// The literal as it appears in single-byte and UTF-16LE string data
#[derive(Debug, Clone)]
pub struct LiteralPatterns {
    pub text: String,
    pub narrow: BytePattern,
    pub wide: BytePattern,
}

impl LiteralPatterns {
    pub fn new(text: &str) -> Result<Self> {
        let wide: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        Ok(Self {
            text: text.to_string(),
            narrow: BytePattern::literal(text.as_bytes())?,
            wide: BytePattern::literal(&wide)?,
        })
    }
}

/// Every pattern a search needs, compiled once
#[derive(Debug, Clone)]
pub struct SignatureSet {
    pub name_pool_ctor: BytePattern,
    pub lock_call: BytePattern,
    pub direct_call: BytePattern,
    pub global_load: BytePattern,
    pub literal_refs: Vec<BytePattern>,
    pub array_accessors: Vec<BytePattern>,
    pub literal: LiteralPatterns,
}

impl SignatureSet {
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            name_pool_ctor: BytePattern::parse(NAME_POOL_CTOR)?,
            lock_call: BytePattern::parse(LOCK_CALL)?,
            direct_call: BytePattern::parse(DIRECT_CALL)?,
            global_load: rip_relative(GLOBAL_LOAD)?,
            literal_refs: LITERAL_REFERENCES
                .into_iter()
                .map(rip_relative)
                .collect::<Result<_>>()?,
            array_accessors: NAME_ARRAY_ACCESSORS
                .iter()
                .map(|text| BytePattern::parse(text))
                .collect::<Result<_>>()?,
            literal: LiteralPatterns::new(BYTE_PROPERTY)?,
        })
    }

    /// Built-in patterns followed by the configured extra accessors.
    pub fn with_config(config: &SearchConfig) -> Result<Self> {
        let mut set = Self::builtin()?;
        set.array_accessors.extend(config.array_patterns()?);
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_patterns_compile() {
        let set = SignatureSet::builtin().unwrap();
        assert_eq!(set.name_pool_ctor.len(), 12);
        assert_eq!(set.array_accessors.len(), 3);
        assert_eq!(set.literal_refs.len(), 2);
        assert_eq!(set.name_pool_ctor.to_string(), NAME_POOL_CTOR);
    }

    #[test]
    fn test_ctor_call_offset_points_at_e8() {
        let set = SignatureSet::builtin().unwrap();
        let byte = set.name_pool_ctor.bytes()[NAME_POOL_CALL_OFFSET as usize];
        assert_eq!(byte.exact_value(), Some(0xE8));
    }

    #[test]
    fn test_literal_encodings() {
        let literal = LiteralPatterns::new("None").unwrap();
        assert!(literal.narrow.matches_at(b"None"));
        assert!(literal.wide.matches_at(&[b'N', 0, b'o', 0, b'n', 0, b'e', 0]));
        assert_eq!(literal.wide.len(), 8);
    }

    #[test]
    fn test_lea_pattern_requires_rip_relative_modrm() {
        let set = SignatureSet::builtin().unwrap();
        let lea = &set.literal_refs[0];
        assert!(lea.matches_at(&[0x48, 0x8D, 0x0D]));
        assert!(lea.matches_at(&[0x48, 0x8D, 0x15]));
        assert!(lea.matches_at(&[0x48, 0x8D, 0x3D]));
        // [rcx + disp8] is not RIP-relative
        assert!(!lea.matches_at(&[0x48, 0x8D, 0x41]));
        assert!(!lea.matches_at(&[0x48, 0x8D, 0x45]));
        assert!(set.literal_refs[1].matches_at(&[0x4C, 0x8D, 0x05]));
    }

    #[test]
    fn test_global_load_skips_register_operands() {
        let set = SignatureSet::builtin().unwrap();
        assert!(set.global_load.matches_at(&[0x48, 0x8B, 0x05]));
        assert!(set.global_load.matches_at(&[0x48, 0x8B, 0x1D]));
        // mov rcx, rax
        assert!(!set.global_load.matches_at(&[0x48, 0x8B, 0xC8]));
    }

    #[test]
    fn test_extra_accessors_follow_builtin() {
        let config = SearchConfig {
            extra_array_patterns: vec!["48 8B 0D ?? ?? ?? ?? 48 85 C9".to_string()],
            ..Default::default()
        };
        let set = SignatureSet::with_config(&config).unwrap();
        assert_eq!(set.array_accessors.len(), 4);
        assert_eq!(set.array_accessors[3].to_string(), "48 8B 0D ?? ?? ?? ?? 48 85 C9");
    }
}
