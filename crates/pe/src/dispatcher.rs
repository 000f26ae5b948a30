use std::sync::Arc;

use hashbrown::HashMap;
use tycho_primitives::{B256, Bytes, keccak256};

use crate::result::ExecutionError;
use crate::snapshot::StateSnapshot;
use crate::types::{BlockHeader, CallRequest, Event, SignedTransaction};

/// Gas metered by the built-in native transfer.
pub const TRANSFER_GAS: u64 = 21_000;

/// The execution closure resolved for one transaction.
///
/// The state handle is passed in explicitly and must not be retained beyond
/// the call; the engine recovers the pending state from it afterwards.
pub type WritingFn =
    Arc<dyn Fn(&mut WriteContext<'_>, &mut StateSnapshot) -> Result<(), ExecutionError> + Send + Sync>;

/// Everything a writing may observe besides the state, plus its event sink
/// and gas meter.
#[derive(Debug)]
pub struct WriteContext<'a> {
    block: &'a BlockHeader,
    txn: &'a SignedTransaction,
    request: &'a CallRequest,
    events: Vec<Event>,
    gas_used: u64,
}

impl<'a> WriteContext<'a> {
    pub(crate) fn new(
        block: &'a BlockHeader,
        txn: &'a SignedTransaction,
        request: &'a CallRequest,
    ) -> Self {
        Self {
            block,
            txn,
            request,
            events: Vec::new(),
            gas_used: 0,
        }
    }

    pub fn block(&self) -> &BlockHeader {
        self.block
    }

    pub fn txn(&self) -> &SignedTransaction {
        self.txn
    }

    pub fn request(&self) -> &CallRequest {
        self.request
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Meter `amount` gas against the request's gas limit.
    pub fn use_gas(&mut self, amount: u64) -> Result<(), ExecutionError> {
        let needed = self.gas_used.saturating_add(amount);
        if needed > self.request.gas_limit {
            return Err(ExecutionError::OutOfGas {
                limit: self.request.gas_limit,
                needed,
            });
        }
        self.gas_used = needed;
        Ok(())
    }

    pub fn gas_used(&self) -> u64 {
        self.gas_used
    }

    pub(crate) fn finish(self) -> (Vec<Event>, u64) {
        (self.events, self.gas_used)
    }
}

/// Registry resolving `(component, method)` names to writings.
///
/// Components register their writings at node startup; the preparer looks
/// them up per transaction. An unknown pair is a preparation failure.
#[derive(Clone, Default)]
pub struct Dispatcher {
    writings: HashMap<(String, String), WritingFn>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_writing<F>(&mut self, component: &str, method: &str, writing: F)
    where
        F: Fn(&mut WriteContext<'_>, &mut StateSnapshot) -> Result<(), ExecutionError>
            + Send
            + Sync
            + 'static,
    {
        self.writings
            .insert((component.to_owned(), method.to_owned()), Arc::new(writing));
    }

    pub fn writing(&self, component: &str, method: &str) -> Option<WritingFn> {
        self.writings
            .get(&(component.to_owned(), method.to_owned()))
            .cloned()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("writings", &self.writings.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn transfer_topic() -> B256 {
    keccak256(b"Transfer(address,address,uint256)")
}

/// Built-in native value transfer: debits `origin`, bumps its nonce and
/// credits the target. Registered by hosts that support plain transfers.
pub fn native_transfer(
    ctx: &mut WriteContext<'_>,
    state: &mut StateSnapshot,
) -> Result<(), ExecutionError> {
    let request = ctx.request().clone();
    let to = request.address.ok_or(ExecutionError::MissingRecipient)?;
    ctx.use_gas(TRANSFER_GAS)?;

    let nonce = state.nonce(request.origin);
    if request.nonce != nonce {
        return Err(ExecutionError::NonceMismatch {
            tx: request.nonce,
            state: nonce,
        });
    }
    let balance = state.balance(request.origin);
    if balance < request.value {
        return Err(ExecutionError::InsufficientBalance);
    }

    state.set_balance(request.origin, balance - request.value);
    state.set_nonce(request.origin, nonce + 1);
    let to_balance = state.balance(to);
    state.set_balance(to, to_balance.saturating_add(request.value));

    ctx.emit(Event {
        address: to,
        topics: vec![transfer_topic()],
        data: Bytes::copy_from_slice(&request.value.to_be_bytes::<32>()),
    });
    Ok(())
}
