//! Shared fixtures: funded mock accounts, the test writings, and block
//! construction helpers.

pub mod runner;
pub use runner::{assert_parallel_matches_serial, build_executor, run_block};

use tycho_pe::{
    Account, CallRequest, ChainState, Dispatcher, ExecutionError, SignedTransaction,
    StateSnapshot, WriteCall, WriteContext, native_transfer,
};
use tycho_primitives::{Address, Bytes, U160, U256, address};

/// Gas metered by the counter writing.
pub const COUNTER_GAS: u64 = 5_000;

/// Contract account owning the shared counter slot. Deliberately unrelated
/// to any origin or target address the tests schedule on.
pub const COUNTER_ADDRESS: Address = address!("0x00000000000000000000000000000000c0c0c0c0");
pub const COUNTER_SLOT: U256 = U256::ZERO;

/// Mock an account address from an integer index. Useful for mock iterations.
pub fn account_address(index: u64) -> Address {
    Address::from(U160::from(index))
}

/// Mock a funded account from an integer index that is used as the address.
pub fn mock_account(index: u64) -> (Address, Account) {
    (
        account_address(index),
        // Plenty of balance so tests never hit the funds check by accident.
        Account::with_balance(U256::from(1u128 << 100)),
    )
}

/// Accounts `1..=count`, each funded.
pub fn funded_state(count: u64) -> ChainState {
    (1..=count).map(mock_account).collect()
}

pub fn register_handlers(dispatcher: &mut Dispatcher) {
    dispatcher.register_writing("bank", "transfer", native_transfer);
    dispatcher.register_writing("counter", "bump", bump_counter);
}

/// Increments a slot of one global contract account. Its request fields are
/// decoys: the touched state is invisible to address-level scheduling, which
/// is exactly what the dynamic-conflict tests need.
pub fn bump_counter(
    ctx: &mut WriteContext<'_>,
    state: &mut StateSnapshot,
) -> Result<(), ExecutionError> {
    ctx.use_gas(COUNTER_GAS)?;
    let value = state.storage(COUNTER_ADDRESS, COUNTER_SLOT);
    state.set_storage(COUNTER_ADDRESS, COUNTER_SLOT, value + U256::from(1));
    Ok(())
}

pub fn call_txn(component: &str, method: &str, request: &CallRequest) -> SignedTransaction {
    SignedTransaction::new(WriteCall::new(
        component,
        method,
        serde_json::to_vec(request).unwrap().into(),
    ))
}

pub fn transfer_request(from: u64, to: u64, value: u64, nonce: u64) -> CallRequest {
    CallRequest {
        origin: account_address(from),
        address: Some(account_address(to)),
        value: U256::from(value),
        input: Bytes::new(),
        nonce,
        gas_limit: 100_000,
    }
}

pub fn transfer_txn(from: u64, to: u64, value: u64, nonce: u64) -> SignedTransaction {
    call_txn("bank", "transfer", &transfer_request(from, to, value, nonce))
}

/// A counter bump whose `(origin, address)` pair is disjoint from every
/// other transaction in the tests, so the partitioner happily co-batches it.
pub fn bump_txn(origin: u64, decoy_target: u64) -> SignedTransaction {
    call_txn(
        "counter",
        "bump",
        &CallRequest {
            origin: account_address(origin),
            address: Some(account_address(decoy_target)),
            value: U256::ZERO,
            input: Bytes::new(),
            nonce: 0,
            gas_limit: 100_000,
        },
    )
}
