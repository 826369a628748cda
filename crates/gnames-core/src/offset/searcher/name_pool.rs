//! Primary strategy: the name pool instance passed to its constructor.
//!
//! ```text
//! lea  rcx, [rip + pool]        ; 48 8D 0D disp32
//! call FNamePool::FNamePool     ; E8 rel32
//!   ...
//!   call [rip + lock_init]      ; FF 15 disp32 within the first bytes
//!   ... "ByteProperty" nearby
//! ```

use tracing::{debug, trace};

use crate::config::SearchLimits;
use crate::memory::{ModuleMemory, ReadMemory};
use crate::offset::evidence::EvidenceFinder;
use crate::offset::signature::{NAME_POOL_CALL_OFFSET, SignatureSet};
use crate::offset::{Candidate, Encoding, PatternCursor, SearchFailure, StructureKind};

use super::{Attempts, StructureLocator};

pub struct NamePoolLocator<'s, R: ReadMemory + ?Sized> {
    memory: ModuleMemory<'s, R>,
    signatures: &'s SignatureSet,
    limits: &'s SearchLimits,
    sites: PatternCursor<'s, R>,
    evidence: EvidenceFinder<'s, R>,
    attempts: Attempts,
}

impl<'s, R: ReadMemory + ?Sized> NamePoolLocator<'s, R> {
    pub fn new(
        memory: ModuleMemory<'s, R>,
        signatures: &'s SignatureSet,
        limits: &'s SearchLimits,
    ) -> Self {
        let base = memory.space().base();
        Self {
            memory,
            signatures,
            limits,
            sites: PatternCursor::new(memory, &signatures.name_pool_ctor, base),
            evidence: EvidenceFinder::new(
                memory,
                &signatures.literal,
                &signatures.literal_refs,
                limits.max_occurrences,
            ),
            attempts: Attempts::new(limits.max_occurrences),
        }
    }

    fn examine(&self, site: u64) -> Result<Candidate, SearchFailure> {
        let space = self.memory.space();

        let ctor = self
            .memory
            .decode(site + NAME_POOL_CALL_OFFSET, Encoding::Call)?;
        if !space.contains(ctor) {
            return Err(SearchFailure::OutOfRange);
        }

        let lock_call = self.lock_call(ctor)?;
        trace!("  0x{:X}: ctor 0x{:X}, lock call at 0x{:X}", site, ctor, lock_call);

        let evidence = self
            .evidence
            .find(ctor, self.limits.evidence_window)
            .ok_or(SearchFailure::PatternNotFound)?;

        let instance = self.memory.decode(site, Encoding::Load)?;
        if !space.contains(instance) {
            return Err(SearchFailure::OutOfRange);
        }

        debug!(
            "  Name pool candidate 0x{:X} (ctor 0x{:X}, {} evidence at 0x{:X})",
            instance, ctor, evidence.kind, evidence.address
        );
        Ok(Candidate {
            address: instance,
            kind: StructureKind::NamePool,
            evidence: Some(evidence.address),
        })
    }

    /// First indirect call near the start of the constructor whose pointer
    /// slot lies in the module.
    fn lock_call(&self, ctor: u64) -> Result<u64, SearchFailure> {
        let space = self.memory.space();
        let mut last = SearchFailure::PatternNotFound;

        let calls = PatternCursor::bounded(
            self.memory,
            &self.signatures.lock_call,
            ctor,
            self.limits.lock_call_window,
        );
        for call in calls {
            match self.memory.decode(call, Encoding::IndirectCall) {
                Ok(slot) if space.contains(slot) => return Ok(call),
                Ok(_) => last = SearchFailure::OutOfRange,
                Err(failure) => last = failure,
            }
        }
        Err(last)
    }
}

impl<R: ReadMemory + ?Sized> Iterator for NamePoolLocator<'_, R> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            let Some(site) = self.sites.next() else {
                if let Some(failure) = self.sites.failure() {
                    self.attempts.reject(failure);
                }
                return None;
            };
            if !self.attempts.admit() {
                debug!("Name pool search stopped after {} occurrences", self.attempts.occurrences());
                return None;
            }

            match self.examine(site) {
                Ok(candidate) => return Some(candidate),
                Err(failure) => {
                    trace!("  0x{:X}: rejected ({})", site, failure);
                    self.attempts.reject(failure);
                }
            }
        }
    }
}

impl<R: ReadMemory + ?Sized> StructureLocator for NamePoolLocator<'_, R> {
    fn kind(&self) -> StructureKind {
        StructureKind::NamePool
    }

    fn reject(&mut self, failure: SearchFailure) {
        self.attempts.reject(failure);
    }

    fn failure(&self) -> SearchFailure {
        self.attempts.failure()
    }
}
