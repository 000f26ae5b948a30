//! Benchmark block execution with varying shares of statically dependent
//! transactions, parallel vs. serial.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tycho_pe::{
    Account, Block, BlockHeader, CallRequest, ChainState, Dispatcher, ExecutorConfig,
    ParallelExecutor, SignedTransaction, WorldState, WriteCall, native_transfer,
};
use tycho_primitives::{Address, Bytes, U160, U256};

const NUM_TXNS: u64 = 512;

fn account_address(index: u64) -> Address {
    Address::from(U160::from(index))
}

fn transfer_txn(from: u64, to: u64, nonce: u64) -> SignedTransaction {
    let request = CallRequest {
        origin: account_address(from),
        address: Some(account_address(to)),
        value: U256::from(1),
        input: Bytes::new(),
        nonce,
        gas_limit: 100_000,
    };
    SignedTransaction::new(WriteCall::new(
        "bank",
        "transfer",
        serde_json::to_vec(&request).unwrap().into(),
    ))
}

/// A block where `conflict_factor` of the transactions share one origin
/// (forcing singleton batches) and the rest are pairwise independent.
fn workload(conflict_factor: f64) -> (ChainState, Vec<SignedTransaction>) {
    let mut shared_nonce = 0u64;
    let txns: Vec<_> = (0..NUM_TXNS)
        .map(|i| {
            if (i as f64) < conflict_factor * NUM_TXNS as f64 {
                let txn = transfer_txn(1, 100_000 + i, shared_nonce);
                shared_nonce += 1;
                txn
            } else {
                transfer_txn(1_000 + i, 100_000 + i, 0)
            }
        })
        .collect();

    let mut accounts = ChainState::default();
    accounts.insert(account_address(1), Account::with_balance(U256::from(1u128 << 100)));
    for i in 0..NUM_TXNS {
        accounts.insert(
            account_address(1_000 + i),
            Account::with_balance(U256::from(1u128 << 100)),
        );
    }
    (accounts, txns)
}

fn build_executor(config: ExecutorConfig, accounts: ChainState) -> ParallelExecutor {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register_writing("bank", "transfer", native_transfer);
    ParallelExecutor::new(config, dispatcher, WorldState::new(accounts))
}

fn bench_conflict_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("pe/block_execute");

    for &conflict_factor in &[0.0, 0.5, 1.0] {
        let (accounts, txns) = workload(conflict_factor);
        let block = Block::new(BlockHeader { number: 1, timestamp: 0 }, txns);
        let configs = [
            ("parallel", ExecutorConfig::default()),
            ("serial", ExecutorConfig::serial()),
        ];
        for (label, config) in configs {
            group.throughput(Throughput::Elements(NUM_TXNS));
            group.bench_with_input(
                BenchmarkId::new(label, format!("conflict_{:.0}%", conflict_factor * 100.0)),
                &block,
                |b, block| {
                    b.iter(|| {
                        let executor = build_executor(config, accounts.clone());
                        executor.execute_block(black_box(block)).unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_conflict_levels);
criterion_main!(benches);
