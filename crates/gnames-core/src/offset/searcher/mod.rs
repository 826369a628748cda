//! GNames searcher
//!
//! Runs the structure locators in order (name pool first, name array as the
//! fallback) and hands every candidate to the structural validator. The first
//! candidate that validates wins; a rejected one only moves its locator on to
//! the next candidate.

mod name_array;
mod name_pool;

use tracing::{debug, info, warn};

use crate::config::{SearchConfig, SearchLimits};
use crate::error::Result;
use crate::memory::{AddressSpace, ModuleMemory, ReadMemory};
use crate::offset::signature::SignatureSet;
use crate::offset::validation::{ValidationResult, validate_candidate};
use crate::offset::{Candidate, SearchFailure, SearchResult, StrategyOutcome, StructureKind};

pub use name_array::NameArrayLocator;
pub use name_pool::NamePoolLocator;

/// Strategies in the order they are tried by default
pub const DEFAULT_STRATEGIES: [StructureKind; 2] =
    [StructureKind::NamePool, StructureKind::NameArray];

/// A source of candidates for one structure kind.
///
/// Iteration ends when the locator runs out of places to look; `failure`
/// then explains why nothing usable came out of it.
pub trait StructureLocator: Iterator<Item = Candidate> {
    fn kind(&self) -> StructureKind;

    /// Record that the last candidate was turned down by the caller.
    fn reject(&mut self, failure: SearchFailure);

    fn failure(&self) -> SearchFailure;
}

/// Occurrence accounting shared by the locators
#[derive(Debug, Clone)]
pub(crate) struct Attempts {
    ceiling: usize,
    occurrences: usize,
    exhausted: bool,
    last: Option<SearchFailure>,
}

impl Attempts {
    pub(crate) fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            occurrences: 0,
            exhausted: false,
            last: None,
        }
    }

    /// Count one more occurrence. False once the ceiling has been reached.
    pub(crate) fn admit(&mut self) -> bool {
        if self.occurrences >= self.ceiling {
            self.exhausted = true;
            return false;
        }
        self.occurrences += 1;
        true
    }

    pub(crate) fn reject(&mut self, failure: SearchFailure) {
        self.last = Some(failure);
    }

    pub(crate) fn occurrences(&self) -> usize {
        self.occurrences
    }

    pub(crate) fn failure(&self) -> SearchFailure {
        if self.exhausted {
            return SearchFailure::SearchExhausted;
        }
        self.last.unwrap_or(SearchFailure::PatternNotFound)
    }
}

pub struct GNamesSearcher<'a, R: ReadMemory + ?Sized> {
    reader: &'a R,
    space: AddressSpace,
    limits: SearchLimits,
    signatures: SignatureSet,
    strategies: Vec<StructureKind>,
}

impl<'a, R: ReadMemory + ?Sized> GNamesSearcher<'a, R> {
    pub fn new(reader: &'a R, space: AddressSpace, config: &SearchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            reader,
            space,
            limits: config.limits.clone(),
            signatures: SignatureSet::with_config(config)?,
            strategies: DEFAULT_STRATEGIES.to_vec(),
        })
    }

    /// Restrict the search to the given strategies, in the given order.
    pub fn with_strategies(mut self, strategies: &[StructureKind]) -> Self {
        self.strategies = strategies.to_vec();
        self
    }

    pub fn space(&self) -> AddressSpace {
        self.space
    }

    /// Locate the global name table.
    ///
    /// Never fails: when no strategy produces a valid candidate the result
    /// carries the reason reported by the last strategy tried.
    pub fn search(&self) -> SearchResult {
        info!(
            "Searching module at 0x{:X} (size 0x{:X})",
            self.space.base(),
            self.space.size()
        );
        let memory = ModuleMemory::new(self.reader, self.space);
        let mut outcomes = Vec::with_capacity(self.strategies.len());
        let mut reason = SearchFailure::PatternNotFound;

        for (i, &kind) in self.strategies.iter().enumerate() {
            if i > 0 {
                warn!("Falling back to {} search", kind);
            }
            let (found, outcome) = match kind {
                StructureKind::NamePool => {
                    self.run(NamePoolLocator::new(memory, &self.signatures, &self.limits))
                }
                StructureKind::NameArray => {
                    self.run(NameArrayLocator::new(memory, &self.signatures, &self.limits))
                }
            };
            if let Some(failure) = outcome.failure {
                reason = failure;
            }
            outcomes.push(outcome);

            if let Some(candidate) = found {
                let mut result = SearchResult::found(self.space, &candidate);
                result.strategies = outcomes;
                return result;
            }
        }

        let mut result = SearchResult::not_found(reason);
        result.strategies = outcomes;
        result
    }

    fn run<L: StructureLocator>(&self, mut locator: L) -> (Option<Candidate>, StrategyOutcome) {
        let kind = locator.kind();
        let mut candidates = 0;

        while let Some(candidate) = locator.next() {
            candidates += 1;
            if !self.space.contains(candidate.address) {
                locator.reject(SearchFailure::OutOfRange);
                continue;
            }

            match validate_candidate(self.reader, &candidate, &self.limits) {
                ValidationResult::Valid => {
                    info!(
                        "{} found at 0x{:X} (base + 0x{:X})",
                        kind,
                        candidate.address,
                        candidate.address - self.space.base()
                    );
                    let outcome = StrategyOutcome {
                        kind,
                        candidates,
                        failure: None,
                    };
                    return (Some(candidate), outcome);
                }
                rejected => {
                    debug!("  0x{:X} failed validation: {:?}", candidate.address, rejected);
                    locator.reject(SearchFailure::ValidationFailed);
                }
            }
        }

        let failure = locator.failure();
        info!("{} search found nothing: {}", kind, failure);
        let outcome = StrategyOutcome {
            kind,
            candidates,
            failure: Some(failure),
        };
        (None, outcome)
    }
}
