use tycho_pe::{
    Block, BlockHeader, BlockReceipts, ChainState, Dispatcher, ExecutorConfig, ParallelExecutor,
    Receipt, SignedTransaction, WorldState,
};
use tycho_primitives::TxHash;

pub fn build_executor(config: ExecutorConfig, accounts: ChainState) -> ParallelExecutor {
    let mut dispatcher = Dispatcher::new();
    super::register_handlers(&mut dispatcher);
    ParallelExecutor::new(config, dispatcher, WorldState::new(accounts))
}

/// Execute one block on a fresh executor and return the post-state and the
/// receipts.
pub fn run_block(
    config: ExecutorConfig,
    accounts: ChainState,
    txns: Vec<SignedTransaction>,
) -> (WorldState, BlockReceipts) {
    let executor = build_executor(config, accounts);
    let block = Block::new(
        BlockHeader {
            number: 1,
            timestamp: 1_700_000_000,
        },
        txns,
    );
    let receipts = executor.execute_block(&block).expect("engine error");
    (executor.current_state().expect("engine error"), receipts)
}

/// Execute the same block with parallel and serial configuration and assert
/// that the final world states and receipts match. The `redo` marker is
/// cleared before comparing: a conflicted parallel batch legitimately flags
/// its receipts while the serial run never does.
pub fn assert_parallel_matches_serial(
    accounts: ChainState,
    txns: Vec<SignedTransaction>,
) -> (WorldState, BlockReceipts) {
    let (parallel_state, parallel_receipts) =
        run_block(ExecutorConfig::default(), accounts.clone(), txns.clone());
    let (serial_state, serial_receipts) = run_block(ExecutorConfig::serial(), accounts, txns);

    assert_eq!(parallel_state, serial_state);
    assert_eq!(normalized(&parallel_receipts), normalized(&serial_receipts));
    (parallel_state, parallel_receipts)
}

fn normalized(receipts: &BlockReceipts) -> Vec<(TxHash, Receipt)> {
    let mut entries: Vec<_> = receipts
        .iter()
        .map(|(hash, receipt)| {
            let mut receipt = receipt.clone();
            receipt.redo = false;
            (*hash, receipt)
        })
        .collect();
    entries.sort_by_key(|(hash, _)| *hash);
    entries
}
