use std::sync::PoisonError;

use crate::pending::PendingState;
use crate::types::Receipt;

/// Fatal engine errors. Per-transaction failures never surface here; they
/// become error receipts instead. When this is returned the world state is
/// unchanged for the failing batch (the commit step is the only mutation
/// point and runs after all fallible work).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A worker panicked while holding the world-state lock.
    #[error("world state lock poisoned")]
    WorldStateLock,
}

impl<T> From<PoisonError<T>> for EngineError {
    fn from(_: PoisonError<T>) -> Self {
        Self::WorldStateLock
    }
}

/// Per-transaction failures raised before execution. Reported as error
/// receipts; the transaction never enters the live set.
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error("cannot bind call request: {0}")]
    Bind(#[from] serde_json::Error),
    #[error("no writing registered for {component}::{method}")]
    UnknownWriting { component: String, method: String },
}

/// Per-transaction failures raised by a writing. Reported as error receipts;
/// they never abort the batch or the block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("execution reverted: {0}")]
    Revert(String),
    #[error("out of gas: limit {limit}, needed {needed}")]
    OutOfGas { limit: u64, needed: u64 },
    #[error("insufficient balance for transfer")]
    InsufficientBalance,
    #[error("nonce mismatch: tx {tx}, state {state}")]
    NonceMismatch { tx: u64, state: u64 },
    #[error("transaction has no recipient")]
    MissingRecipient,
    #[error("{0}")]
    Custom(String),
}

/// What one live transaction ended up as. Exactly one variant is assigned
/// per execution attempt; a serial fallback overwrites prior `Executed`
/// outcomes and keeps `Failed` ones.
#[derive(Debug)]
pub enum ExecOutcome {
    /// The writing succeeded; its pending state awaits commit.
    Executed {
        pending: PendingState,
        receipt: Receipt,
    },
    /// The writing failed; only the error receipt survives.
    Failed {
        error: ExecutionError,
        receipt: Receipt,
    },
}

impl ExecOutcome {
    pub fn receipt(&self) -> &Receipt {
        match self {
            Self::Executed { receipt, .. } | Self::Failed { receipt, .. } => receipt,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
