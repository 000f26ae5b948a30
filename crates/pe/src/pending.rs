use crate::snapshot::{DeltaMap, StateKeySet};
use crate::storage::WorldState;

/// The outcome of one speculative execution: what it read, what it wrote,
/// and the concrete values to apply on merge.
///
/// The write set is always a subset of the delta keys; a key may appear in
/// both the read and the write set (read-then-write).
#[derive(Debug, Default, Clone)]
pub struct PendingState {
    reads: StateKeySet,
    writes: StateKeySet,
    deltas: DeltaMap,
}

impl PendingState {
    pub(crate) fn new(reads: StateKeySet, writes: StateKeySet, deltas: DeltaMap) -> Self {
        debug_assert!(writes.iter().all(|key| deltas.contains_key(key)));
        Self {
            reads,
            writes,
            deltas,
        }
    }

    pub fn reads(&self) -> &StateKeySet {
        &self.reads
    }

    pub fn writes(&self) -> &StateKeySet {
        &self.writes
    }

    pub(crate) fn deltas(&self) -> &DeltaMap {
        &self.deltas
    }

    /// Apply the deltas to the authoritative state as keyed replacement.
    pub fn merge_into(&self, state: &mut WorldState) {
        state.apply(&self.deltas);
    }
}

/// Accumulated read/write footprint of the pending states already accepted
/// during a conflict-detection walk over one batch.
#[derive(Debug, Default)]
pub struct BatchContext {
    reads: StateKeySet,
    writes: StateKeySet,
}

impl BatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `pending` interferes with any accepted pending state:
    /// it read something the batch wrote, races a batch write, or writes
    /// something the batch read.
    pub fn is_conflict(&self, pending: &PendingState) -> bool {
        pending.reads.iter().any(|key| self.writes.contains(key))
            || pending
                .writes
                .iter()
                .any(|key| self.writes.contains(key) || self.reads.contains(key))
    }

    /// Accept `pending` into the batch footprint.
    pub fn absorb(&mut self, pending: &PendingState) {
        self.reads.extend(pending.reads.iter().copied());
        self.writes.extend(pending.writes.iter().copied());
    }
}
