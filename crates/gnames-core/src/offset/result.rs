use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::memory::AddressSpace;

/// The two in-memory representations of the global name table
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum StructureKind {
    /// Block allocator of packed name entries (newer builds)
    NamePool,
    /// Array of pointers to name entries (older builds)
    NameArray,
}

/// Why a candidate, a strategy or a whole search came up empty.
///
/// None of these are fatal; each one only ends the current candidate or
/// strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchFailure {
    #[error("signature not found in the module")]
    PatternNotFound,
    #[error("decoded address lies outside the module")]
    OutOfRange,
    #[error("memory read failed")]
    Unreadable,
    #[error("candidate failed structural validation")]
    ValidationFailed,
    #[error("attempt ceiling reached without a surviving candidate")]
    SearchExhausted,
}

/// A structurally matched address waiting for validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub address: u64,
    pub kind: StructureKind,
    /// Where the corroborating literal (or its reference) was found
    pub evidence: Option<u64>,
}

/// How one strategy ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub kind: StructureKind,
    pub candidates: usize,
    pub failure: Option<SearchFailure>,
}

/// The outcome of a search: the only value the core hands out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub found: bool,
    /// `address - base`; zero when nothing was found
    pub offset_from_base: u64,
    pub kind: Option<StructureKind>,
    pub reason: Option<SearchFailure>,
    /// Offset of the corroborating evidence, if any
    pub evidence_offset: Option<u64>,
    #[serde(default)]
    pub strategies: Vec<StrategyOutcome>,
}

impl SearchResult {
    pub fn found(space: AddressSpace, candidate: &Candidate) -> Self {
        Self {
            found: true,
            offset_from_base: candidate.address.wrapping_sub(space.base()),
            kind: Some(candidate.kind),
            reason: None,
            evidence_offset: candidate.evidence.and_then(|addr| space.offset_of(addr)),
            strategies: Vec::new(),
        }
    }

    pub fn not_found(reason: SearchFailure) -> Self {
        Self {
            found: false,
            offset_from_base: 0,
            kind: None,
            reason: Some(reason),
            evidence_offset: None,
            strategies: Vec::new(),
        }
    }

    /// Absolute address for the given module base
    pub fn address(&self, base: u64) -> Option<u64> {
        self.found.then(|| base.wrapping_add(self.offset_from_base))
    }
}
