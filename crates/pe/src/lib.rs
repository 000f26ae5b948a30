//! Optimistic parallel transaction executor for Tycho blocks.
//!
//! An ordered block of signed transactions goes in; an updated world state
//! and one receipt per transaction come out. Transactions are split into
//! statically independent batches, each batch is speculated in parallel
//! against copy-on-write snapshots, and read/write conflicts discovered
//! after the fact send the whole batch through an in-order redo. The result
//! is always equivalent to serial execution.

mod config;
mod dispatcher;
mod executor;
mod metrics;
mod pending;
mod result;
mod snapshot;
mod storage;
mod types;

pub use config::ExecutorConfig;
pub use dispatcher::{Dispatcher, TRANSFER_GAS, WriteContext, WritingFn, native_transfer};
pub use executor::ParallelExecutor;
pub use pending::{BatchContext, PendingState};
pub use result::{EngineError, ExecOutcome, ExecutionError, PrepareError};
pub use snapshot::{StateKey, StateSnapshot, StateValue};
pub use storage::{Account, AccountStorage, ChainState, WorldState};
pub use types::{
    Block, BlockHeader, BlockReceipts, CallRequest, Event, Receipt, ReceiptStatus,
    SignedTransaction, WriteCall,
};
