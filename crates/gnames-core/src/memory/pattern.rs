//! Byte patterns with wildcard bytes and wildcard nibbles.
//!
//! Patterns are written the usual way, one token per byte:
//!
//! ```text
//! 48 8D 0D ?? ?? ?? ?? E8     exact bytes and full wildcards
//! 4? 8D                        high nibble fixed, low nibble wildcard
//! ```
//!
//! The same type is used for code signatures and for string literals, so
//! every search in the crate goes through one matching routine.

use std::fmt;
use std::str::FromStr;

use memchr::memmem;

use crate::error::{Error, Result};

/// One position of a pattern: the bits selected by `mask` must equal `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternByte {
    value: u8,
    mask: u8,
}

impl PatternByte {
    pub const WILDCARD: PatternByte = PatternByte { value: 0, mask: 0 };

    pub const fn exact(value: u8) -> Self {
        Self { value, mask: 0xFF }
    }

    pub const fn masked(value: u8, mask: u8) -> Self {
        Self {
            value: value & mask,
            mask,
        }
    }

    #[inline]
    pub fn matches(self, byte: u8) -> bool {
        byte & self.mask == self.value
    }

    pub fn is_wildcard(self) -> bool {
        self.mask == 0
    }

    pub fn exact_value(self) -> Option<u8> {
        (self.mask == 0xFF).then_some(self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytePattern {
    bytes: Vec<PatternByte>,
    /// Set when every position is exact, so the search can use `memmem`.
    needle: Option<Vec<u8>>,
}

impl BytePattern {
    pub fn new(bytes: Vec<PatternByte>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidPattern("Signature pattern is empty".to_string()));
        }

        let needle = bytes
            .iter()
            .map(|b| b.exact_value())
            .collect::<Option<Vec<u8>>>();

        Ok(Self { bytes, needle })
    }

    /// Parse a pattern such as `"48 8B 05 ?? ?? ?? ?? 4? 85"`.
    pub fn parse(pattern: &str) -> Result<Self> {
        let bytes = pattern
            .split_whitespace()
            .map(parse_token)
            .collect::<Result<Vec<_>>>()?;
        Self::new(bytes)
    }

    /// Pattern matching the given bytes verbatim.
    pub fn literal(bytes: &[u8]) -> Result<Self> {
        Self::new(bytes.iter().copied().map(PatternByte::exact).collect())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[PatternByte] {
        &self.bytes
    }

    /// Whether the pattern matches at the start of `data`.
    pub fn matches_at(&self, data: &[u8]) -> bool {
        data.len() >= self.bytes.len()
            && self
                .bytes
                .iter()
                .zip(data)
                .all(|(pattern, &byte)| pattern.matches(byte))
    }

    /// Find the first match in `haystack` starting at index `from`.
    pub fn find_from(&self, haystack: &[u8], from: usize) -> Option<usize> {
        let len = self.bytes.len();
        if haystack.len() < len || from > haystack.len() - len {
            return None;
        }
        let last = haystack.len() - len;

        if let Some(needle) = &self.needle {
            return memmem::find(&haystack[from..], needle).map(|pos| pos + from);
        }

        match self.bytes[0].exact_value() {
            Some(first) => memchr::memchr_iter(first, &haystack[from..=last])
                .map(|pos| pos + from)
                .find(|&pos| self.matches_at(&haystack[pos..])),
            None => (from..=last).find(|&pos| self.matches_at(&haystack[pos..])),
        }
    }

    pub fn find_in(&self, haystack: &[u8]) -> Option<usize> {
        self.find_from(haystack, 0)
    }

    /// All match positions, overlapping matches included.
    pub fn find_all(&self, haystack: &[u8]) -> Vec<usize> {
        let mut results = Vec::new();
        let mut from = 0;
        while let Some(pos) = self.find_from(haystack, from) {
            results.push(pos);
            from = pos + 1;
        }
        results
    }
}

impl FromStr for BytePattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BytePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match byte.mask {
                0xFF => write!(f, "{:02X}", byte.value)?,
                0x00 => f.write_str("??")?,
                0xF0 => write!(f, "{:X}?", byte.value >> 4)?,
                0x0F => write!(f, "?{:X}", byte.value)?,
                _ => write!(f, "{:02X}/{:02X}", byte.value, byte.mask)?,
            }
        }
        Ok(())
    }
}

fn parse_token(token: &str) -> Result<PatternByte> {
    if token == "??" || token == "?" {
        return Ok(PatternByte::WILDCARD);
    }

    let chars: Vec<char> = token.chars().collect();
    if chars.len() != 2 {
        return Err(Error::InvalidPattern(format!(
            "Invalid signature token '{}'",
            token
        )));
    }

    let nibble = |c: char| -> Result<Option<u8>> {
        if c == '?' {
            return Ok(None);
        }
        c.to_digit(16).map(|d| Some(d as u8)).ok_or_else(|| {
            Error::InvalidPattern(format!("Invalid signature token '{}'", token))
        })
    };

    let byte = match (nibble(chars[0])?, nibble(chars[1])?) {
        (Some(hi), Some(lo)) => PatternByte::exact(hi << 4 | lo),
        (Some(hi), None) => PatternByte::masked(hi << 4, 0xF0),
        (None, Some(lo)) => PatternByte::masked(lo, 0x0F),
        (None, None) => PatternByte::WILDCARD,
    };
    Ok(byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pattern_with_wildcards() {
        let pattern = BytePattern::parse("48 8D 0D ?? ?? ?? ??").unwrap();
        assert_eq!(pattern.len(), 7);
        assert_eq!(pattern.bytes()[0], PatternByte::exact(0x48));
        assert_eq!(pattern.bytes()[2], PatternByte::exact(0x0D));
        assert!(pattern.bytes()[3].is_wildcard());
    }

    #[test]
    fn test_parse_nibble_wildcards() {
        let pattern = BytePattern::parse("4? ?D").unwrap();
        assert!(pattern.matches_at(&[0x48, 0x8D]));
        assert!(pattern.matches_at(&[0x4C, 0x0D]));
        assert!(!pattern.matches_at(&[0x58, 0x8D]));
        assert!(!pattern.matches_at(&[0x48, 0x8C]));
    }

    #[test]
    fn test_parse_rejects_bad_tokens() {
        assert!(BytePattern::parse("").is_err());
        assert!(BytePattern::parse("GG").is_err());
        assert!(BytePattern::parse("123").is_err());
    }

    #[test]
    fn test_format_roundtrip() {
        let text = "48 8D 0D ?? 4? ?5 FF";
        let pattern = BytePattern::parse(text).unwrap();
        assert_eq!(pattern.to_string(), text);
        assert_eq!(BytePattern::parse(&pattern.to_string()).unwrap(), pattern);
    }

    #[test]
    fn test_wildcard_middle_byte() {
        let pattern = BytePattern::parse("AA ?? CC").unwrap();
        assert!(pattern.matches_at(&[0xAA, 0x11, 0xCC]));
        assert!(pattern.matches_at(&[0xAA, 0xFF, 0xCC]));
        assert!(!pattern.matches_at(&[0xAA, 0xBB, 0xDD]));
    }

    #[test]
    fn test_find_all_overlapping() {
        let pattern = BytePattern::parse("AA ?? AA").unwrap();
        let data = [0xAA, 0x01, 0xAA, 0x02, 0xAA];
        assert_eq!(pattern.find_all(&data), vec![0, 2]);
    }

    #[test]
    fn test_find_with_leading_wildcard() {
        let pattern = BytePattern::parse("?? 8B 05").unwrap();
        let data = [0x00, 0x00, 0x48, 0x8B, 0x05];
        assert_eq!(pattern.find_in(&data), Some(2));
    }

    #[test]
    fn test_literal_uses_exact_search() {
        let pattern = BytePattern::literal(b"None").unwrap();
        let data = b"xxNoNoneyy";
        assert_eq!(pattern.find_in(data), Some(4));
        assert_eq!(pattern.find_from(data, 5), None);
    }

    #[test]
    fn test_find_in_short_haystack() {
        let pattern = BytePattern::parse("AA BB CC").unwrap();
        assert_eq!(pattern.find_in(&[0xAA, 0xBB]), None);
        assert_eq!(pattern.find_from(&[0xAA, 0xBB, 0xCC], 1), None);
    }
}
