use std::mem;
use std::sync::Arc;

use tycho_primitives::{Address, Bytes, FxHashMap, FxHashSet, U256};

use crate::pending::PendingState;
use crate::storage::{Account, ChainState};

/// A single trackable location of the world state.
///
/// Balance and nonce share one key: they live in the same account record and
/// are read and written together by every writing that touches either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// Balance and nonce of an account.
    Basic(Address),
    /// One storage slot of an account.
    Storage(Address, U256),
    /// Deployed code of an account.
    Code(Address),
}

/// The concrete value recorded for a written [`StateKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateValue {
    Basic { balance: U256, nonce: u64 },
    Storage(U256),
    Code(Bytes),
}

pub(crate) type StateKeySet = FxHashSet<StateKey>;
pub(crate) type DeltaMap = FxHashMap<StateKey, StateValue>;

/// An independently mutable view of the world state handed to exactly one
/// speculative execution.
///
/// Reads fall through the private overlay to the shared base map; writes land
/// in the overlay only. Every accessor records the touched [`StateKey`], so
/// after the writing returns the snapshot holds the complete read set, write
/// set and delta set of the transaction, ready to be drained into a
/// [`PendingState`].
#[derive(Debug)]
pub struct StateSnapshot {
    base: Arc<ChainState>,
    overlay: ChainState,
    reads: StateKeySet,
    writes: StateKeySet,
    deltas: DeltaMap,
}

impl StateSnapshot {
    pub(crate) fn new(base: Arc<ChainState>) -> Self {
        Self {
            base,
            overlay: ChainState::default(),
            reads: StateKeySet::default(),
            writes: StateKeySet::default(),
            deltas: DeltaMap::default(),
        }
    }

    /// A further copy carrying this snapshot's accumulated overlay but fresh
    /// tracking sets. The serial path forks the running state per
    /// transaction so an erroring writing cannot leak partial mutations.
    pub(crate) fn fork(&self) -> Self {
        Self {
            base: Arc::clone(&self.base),
            overlay: self.overlay.clone(),
            reads: StateKeySet::default(),
            writes: StateKeySet::default(),
            deltas: DeltaMap::default(),
        }
    }

    fn account(&self, address: &Address) -> Option<&Account> {
        self.overlay.get(address).or_else(|| self.base.get(address))
    }

    fn account_entry(&mut self, address: Address) -> &mut Account {
        let base = &self.base;
        self.overlay
            .entry(address)
            .or_insert_with(|| base.get(&address).cloned().unwrap_or_default())
    }

    pub fn balance(&mut self, address: Address) -> U256 {
        self.reads.insert(StateKey::Basic(address));
        self.account(&address)
            .map(|account| account.balance)
            .unwrap_or_default()
    }

    pub fn nonce(&mut self, address: Address) -> u64 {
        self.reads.insert(StateKey::Basic(address));
        self.account(&address)
            .map(|account| account.nonce)
            .unwrap_or_default()
    }

    pub fn storage(&mut self, address: Address, slot: U256) -> U256 {
        self.reads.insert(StateKey::Storage(address, slot));
        self.account(&address)
            .and_then(|account| account.storage.get(&slot))
            .copied()
            .unwrap_or_default()
    }

    pub fn code(&mut self, address: Address) -> Bytes {
        self.reads.insert(StateKey::Code(address));
        self.account(&address)
            .map(|account| account.code.clone())
            .unwrap_or_default()
    }

    pub fn set_balance(&mut self, address: Address, balance: U256) {
        let account = self.account_entry(address);
        account.balance = balance;
        let nonce = account.nonce;
        self.record_write(StateKey::Basic(address), StateValue::Basic { balance, nonce });
    }

    pub fn set_nonce(&mut self, address: Address, nonce: u64) {
        let account = self.account_entry(address);
        account.nonce = nonce;
        let balance = account.balance;
        self.record_write(StateKey::Basic(address), StateValue::Basic { balance, nonce });
    }

    pub fn set_storage(&mut self, address: Address, slot: U256, word: U256) {
        self.account_entry(address).storage.insert(slot, word);
        self.record_write(StateKey::Storage(address, slot), StateValue::Storage(word));
    }

    pub fn set_code(&mut self, address: Address, code: Bytes) {
        self.account_entry(address).code = code.clone();
        self.record_write(StateKey::Code(address), StateValue::Code(code));
    }

    fn record_write(&mut self, key: StateKey, value: StateValue) {
        self.writes.insert(key);
        self.deltas.insert(key, value);
    }

    /// Drain the tracked outcome of the execution that ran on this snapshot.
    /// The overlay stays behind and drops with the snapshot.
    pub fn take_pending(&mut self) -> PendingState {
        PendingState::new(
            mem::take(&mut self.reads),
            mem::take(&mut self.writes),
            mem::take(&mut self.deltas),
        )
    }

    /// Fold a committed transaction's deltas into this snapshot without
    /// touching the tracking sets. Used by the serial path to thread the
    /// post-state of transaction `i` into transaction `i + 1`.
    pub(crate) fn apply_pending(&mut self, pending: &PendingState) {
        for (key, value) in pending.deltas() {
            match (key, value) {
                (StateKey::Basic(address), StateValue::Basic { balance, nonce }) => {
                    let account = self.account_entry(*address);
                    account.balance = *balance;
                    account.nonce = *nonce;
                }
                (StateKey::Storage(address, slot), StateValue::Storage(word)) => {
                    self.account_entry(*address).storage.insert(*slot, *word);
                }
                (StateKey::Code(address), StateValue::Code(code)) => {
                    self.account_entry(*address).code = code.clone();
                }
                _ => debug_assert!(false, "mismatched delta key/value"),
            }
        }
    }
}
