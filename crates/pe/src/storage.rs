use std::sync::Arc;

use hashbrown::HashMap;
use tycho_primitives::{Address, Bytes, U256};

use crate::snapshot::{DeltaMap, StateKey, StateSnapshot, StateValue};

/// Per-account storage slots.
pub type AccountStorage = HashMap<U256, U256>;

/// One account of the world state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
    /// Deployed code; empty for externally owned accounts.
    pub code: Bytes,
    pub storage: AccountStorage,
}

impl Account {
    /// An externally owned account holding `balance`.
    pub fn with_balance(balance: U256) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }
}

/// The full account mapping backing a [`WorldState`].
pub type ChainState = HashMap<Address, Account>;

/// The authoritative world state: one instance per node, mutated only by
/// the commit step of the executor.
///
/// The account map lives behind an [`Arc`] so [`WorldState::snapshot`] is a
/// cheap copy-on-write handle rather than a deep copy. Snapshots taken for a
/// batch share the map; the commit step regains unique ownership once they
/// are dropped and mutates in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldState {
    accounts: Arc<ChainState>,
}

impl WorldState {
    pub fn new(accounts: ChainState) -> Self {
        Self {
            accounts: Arc::new(accounts),
        }
    }

    /// An independently mutable logical copy sharing the underlying map.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::new(Arc::clone(&self.accounts))
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn balance(&self, address: &Address) -> U256 {
        self.accounts
            .get(address)
            .map(|account| account.balance)
            .unwrap_or_default()
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        self.accounts
            .get(address)
            .map(|account| account.nonce)
            .unwrap_or_default()
    }

    pub fn storage(&self, address: &Address, slot: &U256) -> U256 {
        self.accounts
            .get(address)
            .and_then(|account| account.storage.get(slot))
            .copied()
            .unwrap_or_default()
    }

    /// Apply a delta set as keyed replacement. The final value of any key is
    /// the last writer's value, so re-applying the same deltas is a no-op.
    pub(crate) fn apply(&mut self, deltas: &DeltaMap) {
        let accounts = Arc::make_mut(&mut self.accounts);
        for (key, value) in deltas {
            match (key, value) {
                (StateKey::Basic(address), StateValue::Basic { balance, nonce }) => {
                    let account = accounts.entry(*address).or_default();
                    account.balance = *balance;
                    account.nonce = *nonce;
                }
                (StateKey::Storage(address, slot), StateValue::Storage(word)) => {
                    accounts
                        .entry(*address)
                        .or_default()
                        .storage
                        .insert(*slot, *word);
                }
                (StateKey::Code(address), StateValue::Code(code)) => {
                    accounts.entry(*address).or_default().code = code.clone();
                }
                // Delta maps are built key-by-key by the snapshot accessors,
                // which never pair a key with a foreign value kind.
                _ => debug_assert!(false, "mismatched delta key/value"),
            }
        }
    }
}
