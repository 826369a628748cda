//! Fallback strategy: the global pointer to the name array.
//!
//! Anchors are the copies of `"ByteProperty"` in the module and the `lea`
//! instructions that reference them. The accessor that registers the name is
//! called shortly before the anchor; it loads the array global early in its
//! body. When no anchor leads anywhere, known accessor shapes are scanned for
//! directly.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, trace};

use crate::config::SearchLimits;
use crate::memory::{ModuleMemory, ReadMemory, is_plausible_pointer, is_readable};
use crate::offset::evidence::{find_references, literal_occurrences};
use crate::offset::signature::SignatureSet;
use crate::offset::{Candidate, Encoding, PatternCursor, SearchFailure, StructureKind};

use super::{Attempts, StructureLocator};

pub struct NameArrayLocator<'s, R: ReadMemory + ?Sized> {
    memory: ModuleMemory<'s, R>,
    signatures: &'s SignatureSet,
    limits: &'s SearchLimits,
    /// Resolved on the first call to `next`
    anchors: Option<VecDeque<u64>>,
    /// `call` sites before the current anchor, nearest first, with the anchor
    calls: VecDeque<(u64, u64)>,
    accessor: usize,
    cursor: Option<PatternCursor<'s, R>>,
    emitted: HashSet<u64>,
    attempts: Attempts,
    done: bool,
}

impl<'s, R: ReadMemory + ?Sized> NameArrayLocator<'s, R> {
    pub fn new(
        memory: ModuleMemory<'s, R>,
        signatures: &'s SignatureSet,
        limits: &'s SearchLimits,
    ) -> Self {
        Self {
            memory,
            signatures,
            limits,
            anchors: None,
            calls: VecDeque::new(),
            accessor: 0,
            cursor: None,
            emitted: HashSet::new(),
            attempts: Attempts::new(limits.max_occurrences),
            done: false,
        }
    }

    fn resolve_anchors(&self) -> VecDeque<u64> {
        let space = self.memory.space();
        let literals: Vec<u64> =
            literal_occurrences(self.memory, &self.signatures.literal, self.limits.max_occurrences)
                .into_iter()
                .map(|e| e.address)
                .collect();
        let references = find_references(
            self.memory,
            &self.signatures.literal_refs,
            &literals,
            space.base(),
            space.size(),
            self.limits.max_literal_references,
        );

        debug!(
            "  Literal anchors: {} copies, {} references",
            literals.len(),
            references.len()
        );
        literals.into_iter().chain(references).collect()
    }

    fn next_anchor(&mut self) -> Option<u64> {
        if self.anchors.is_none() {
            self.anchors = Some(self.resolve_anchors());
        }
        self.anchors.as_mut().and_then(VecDeque::pop_front)
    }

    /// `E8` bytes in the window before `anchor`, highest address first.
    fn call_sites(&mut self, anchor: u64) -> VecDeque<(u64, u64)> {
        let start = anchor
            .saturating_sub(self.limits.call_window)
            .max(self.memory.space().base());
        if start >= anchor {
            return VecDeque::new();
        }

        let window = match self.memory.read_window(start, (anchor - start) as usize) {
            Ok(window) => window,
            Err(failure) => {
                self.attempts.reject(failure);
                return VecDeque::new();
            }
        };
        self.signatures
            .direct_call
            .find_all(&window)
            .into_iter()
            .rev()
            .map(|pos| (start + pos as u64, anchor))
            .collect()
    }

    /// The global loaded by the function called at `site`.
    fn examine_call(&self, site: u64) -> Result<u64, SearchFailure> {
        let callee = self.memory.decode(site, Encoding::Call)?;
        if !self.memory.space().contains(callee) {
            return Err(SearchFailure::OutOfRange);
        }

        let code = self
            .memory
            .read_window(callee, self.limits.load_window as usize)?;
        let mut last = SearchFailure::PatternNotFound;
        for pos in self.signatures.global_load.find_all(&code) {
            match self.check_global(callee + pos as u64) {
                Ok(location) => return Ok(location),
                Err(failure) => last = failure,
            }
        }
        Err(last)
    }

    /// Decode the load at `site`; the global it reads must hold a readable
    /// pointer.
    fn check_global(&self, site: u64) -> Result<u64, SearchFailure> {
        let location = self.memory.decode(site, Encoding::Load)?;
        let value = self.memory.read_u64(location)?;
        if !is_plausible_pointer(value) || !is_readable(self.memory.reader(), value) {
            return Err(SearchFailure::Unreadable);
        }
        Ok(location)
    }

    fn emit(&mut self, location: u64, evidence: Option<u64>) -> Option<Candidate> {
        if !self.emitted.insert(location) {
            trace!("  0x{:X}: already offered", location);
            return None;
        }
        debug!("  Name array candidate 0x{:X}", location);
        Some(Candidate {
            address: location,
            kind: StructureKind::NameArray,
            evidence,
        })
    }

    fn next_from_anchors(&mut self) -> Option<Candidate> {
        loop {
            if let Some((site, anchor)) = self.calls.pop_front() {
                match self.examine_call(site) {
                    Ok(location) => {
                        if let Some(candidate) = self.emit(location, Some(anchor)) {
                            return Some(candidate);
                        }
                    }
                    Err(failure) => {
                        trace!("  call 0x{:X}: rejected ({})", site, failure);
                        self.attempts.reject(failure);
                    }
                }
                continue;
            }

            let anchor = self.next_anchor()?;
            if !self.attempts.admit() {
                self.done = true;
                return None;
            }
            self.calls = self.call_sites(anchor);
        }
    }

    fn next_from_accessors(&mut self) -> Option<Candidate> {
        let signatures = self.signatures;
        let base = self.memory.space().base();

        loop {
            if self.cursor.is_none() {
                let pattern = signatures.array_accessors.get(self.accessor)?;
                trace!("  Accessor pattern {}", pattern);
                self.accessor += 1;
                self.cursor = Some(PatternCursor::new(self.memory, pattern, base));
            }
            let Some(cursor) = self.cursor.as_mut() else {
                continue;
            };

            let Some(site) = cursor.next() else {
                if let Some(failure) = cursor.failure() {
                    self.attempts.reject(failure);
                }
                self.cursor = None;
                continue;
            };
            if !self.attempts.admit() {
                self.done = true;
                return None;
            }

            match self.check_global(site) {
                Ok(location) => {
                    if let Some(candidate) = self.emit(location, None) {
                        return Some(candidate);
                    }
                }
                Err(failure) => {
                    trace!("  accessor 0x{:X}: rejected ({})", site, failure);
                    self.attempts.reject(failure);
                }
            }
        }
    }
}

impl<R: ReadMemory + ?Sized> Iterator for NameArrayLocator<'_, R> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        if self.done {
            return None;
        }
        if let Some(candidate) = self.next_from_anchors() {
            return Some(candidate);
        }
        if self.done {
            return None;
        }
        let candidate = self.next_from_accessors();
        if candidate.is_none() {
            self.done = true;
        }
        candidate
    }
}

impl<R: ReadMemory + ?Sized> StructureLocator for NameArrayLocator<'_, R> {
    fn kind(&self) -> StructureKind {
        StructureKind::NameArray
    }

    fn reject(&mut self, failure: SearchFailure) {
        self.attempts.reject(failure);
    }

    fn failure(&self) -> SearchFailure {
        self.attempts.failure()
    }
}
