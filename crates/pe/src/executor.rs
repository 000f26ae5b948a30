use std::mem;
use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::thread;
use std::time::Instant;

use tracing::debug;

use crate::config::ExecutorConfig;
use crate::dispatcher::{Dispatcher, WriteContext, WritingFn};
use crate::metrics::ExecutorMetrics;
use crate::pending::BatchContext;
use crate::result::{EngineError, ExecOutcome, PrepareError};
use crate::snapshot::StateSnapshot;
use crate::storage::WorldState;
use crate::types::{Block, BlockHeader, BlockReceipts, CallRequest, Event, Receipt, SignedTransaction};

/// Working record of one live transaction while its block executes.
pub(crate) struct TxnCtx<'a> {
    /// In-block index; stable across batching and redo.
    index: usize,
    txn: &'a SignedTransaction,
    request: CallRequest,
    writing: WritingFn,
    outcome: Option<ExecOutcome>,
}

/// The block executor.
///
/// A block runs as a pipeline: parallel prepare, greedy batch split on
/// statically detectable address dependence, speculative parallel execution
/// of each batch against per-transaction snapshots, a posteriori read/write
/// conflict detection, and an ordered merge into the world state. Batches
/// whose speculative outcomes interfere are redone in order, which is what
/// makes the result equivalent to serial execution.
pub struct ParallelExecutor {
    config: ExecutorConfig,
    dispatcher: Dispatcher,
    world: Mutex<WorldState>,
    metrics: ExecutorMetrics,
}

impl ParallelExecutor {
    pub fn new(config: ExecutorConfig, dispatcher: Dispatcher, genesis: WorldState) -> Self {
        Self {
            config,
            dispatcher,
            world: Mutex::new(genesis),
            metrics: ExecutorMetrics::new(),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// A cheap handle on the current authoritative state.
    pub fn current_state(&self) -> Result<WorldState, EngineError> {
        Ok(self.world.lock()?.clone())
    }

    /// Execute a whole block and return one receipt per input transaction,
    /// keyed by transaction hash.
    pub fn execute_block(&self, block: &Block) -> Result<BlockReceipts, EngineError> {
        let start = Instant::now();
        let (txn_ctx_list, mut receipts) = self.prepare_txn_list(block);
        let mut batches = self.split_txn_ctx_list(txn_ctx_list);

        let mut redone = 0usize;
        for batch in batches.iter_mut() {
            if self.execute_txn_ctx_list(&block.header, batch)? {
                redone += 1;
            }
        }

        for batch in &batches {
            for tctx in batch {
                match &tctx.outcome {
                    Some(outcome) => {
                        receipts.insert(tctx.txn.hash, outcome.receipt().clone());
                    }
                    None => debug_assert!(false, "live transaction without outcome"),
                }
            }
        }

        self.metrics.observe_block(block.txns.len(), start.elapsed());
        debug!(
            target: "tycho::pe",
            number = block.header.number,
            txns = block.txns.len(),
            batches = batches.len(),
            redone,
            "block executed"
        );
        Ok(receipts)
    }

    /// Decode every transaction of the block concurrently, then compact the
    /// successes in order and collect failure receipts for the rest.
    fn prepare_txn_list<'a>(&self, block: &'a Block) -> (Vec<TxnCtx<'a>>, BlockReceipts) {
        let start = Instant::now();
        let txns = &block.txns;
        let mut receipts = BlockReceipts::default();
        let mut live = Vec::with_capacity(txns.len());
        if txns.is_empty() {
            self.metrics.observe_prepare(start.elapsed());
            return (live, receipts);
        }

        let slots: Vec<Mutex<Option<Result<TxnCtx<'a>, Receipt>>>> =
            (0..txns.len()).map(|_| Mutex::new(None)).collect();
        let next = AtomicUsize::new(0);
        let workers = self.config.max_concurrency.clamp(1, txns.len());
        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        if index >= txns.len() {
                            break;
                        }
                        let prepared = self.prepare_one(index, &txns[index]);
                        // Slots are disjoint per index; the lock is only for Sync.
                        *slots[index].lock().unwrap() = Some(prepared);
                    }
                });
            }
        });

        for (txn, slot) in txns.iter().zip(slots) {
            match slot.into_inner().unwrap() {
                Some(Ok(tctx)) => live.push(tctx),
                Some(Err(receipt)) => {
                    receipts.insert(txn.hash, receipt);
                }
                // Unreachable: the worker pool covers every index.
                None => debug_assert!(false, "transaction skipped by prepare fan-out"),
            }
        }
        self.metrics.observe_prepare(start.elapsed());
        (live, receipts)
    }

    fn prepare_one<'a>(&self, index: usize, txn: &'a SignedTransaction) -> Result<TxnCtx<'a>, Receipt> {
        let request: CallRequest = match serde_json::from_slice(&txn.call.payload) {
            Ok(request) => request,
            Err(err) => return Err(self.handle_txn_error(&PrepareError::Bind(err), 0)),
        };
        let writing = match self.dispatcher.writing(&txn.call.component, &txn.call.method) {
            Some(writing) => writing,
            None => {
                let err = PrepareError::UnknownWriting {
                    component: txn.call.component.clone(),
                    method: txn.call.method.clone(),
                };
                return Err(self.handle_txn_error(&err, 0));
            }
        };
        Ok(TxnCtx {
            index,
            txn,
            request,
            writing,
            outcome: None,
        })
    }

    /// Greedy left-to-right split into batches of statically independent
    /// transactions, each at most `max_concurrency` long. Concatenating the
    /// batches reproduces the input order.
    fn split_txn_ctx_list<'a>(&self, list: Vec<TxnCtx<'a>>) -> Vec<Vec<TxnCtx<'a>>> {
        let start = Instant::now();
        let mut batches = Vec::new();
        let mut current: Vec<TxnCtx<'a>> = Vec::new();
        for tctx in list {
            if check_address_conflict(&tctx.request, &current) {
                batches.push(mem::take(&mut current));
            }
            current.push(tctx);
            if current.len() >= self.config.max_concurrency {
                batches.push(mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            batches.push(current);
        }
        self.metrics.observe_split(start.elapsed());
        batches
    }

    /// Returns whether the batch had to be redone serially.
    fn execute_txn_ctx_list(
        &self,
        header: &BlockHeader,
        list: &mut [TxnCtx<'_>],
    ) -> Result<bool, EngineError> {
        self.metrics.observe_batch_size(list.len());
        if self.config.is_parallel {
            self.execute_txn_ctx_list_in_concurrency(header, list)
        } else {
            self.execute_txn_ctx_list_in_order(header, list, false)?;
            Ok(false)
        }
    }

    /// Speculative path: snapshot fan-out under the world lock, one worker
    /// per transaction, then the ordered conflict walk. A conflicted batch
    /// is discarded wholesale and redone in order from the pre-batch state.
    fn execute_txn_ctx_list_in_concurrency(
        &self,
        header: &BlockHeader,
        list: &mut [TxnCtx<'_>],
    ) -> Result<bool, EngineError> {
        let copy_start = Instant::now();
        let mut snapshots: Vec<StateSnapshot> = {
            let world = self.world.lock()?;
            (0..list.len()).map(|_| world.snapshot()).collect()
        };
        self.metrics.observe_copy(list.len(), copy_start.elapsed());

        let start = Instant::now();
        thread::scope(|scope| {
            for (tctx, snapshot) in list.iter_mut().zip(snapshots.iter_mut()) {
                scope.spawn(move || {
                    let outcome = self.run_writing(header, tctx, snapshot, false);
                    tctx.outcome = Some(outcome);
                });
            }
        });

        let mut batch_ctx = BatchContext::new();
        let mut conflict = false;
        for tctx in list.iter() {
            match &tctx.outcome {
                Some(ExecOutcome::Executed { pending, .. }) => {
                    if batch_ctx.is_conflict(pending) {
                        debug!(target: "tycho::pe", index = tctx.index, "dynamic conflict, redoing batch");
                        conflict = true;
                        break;
                    }
                    batch_ctx.absorb(pending);
                }
                Some(ExecOutcome::Failed { .. }) => {}
                None => debug_assert!(false, "joined transaction without outcome"),
            }
        }
        self.metrics.observe_batch_execute(conflict, start.elapsed());

        // Release the speculative copies before committing or redoing so the
        // world map regains unique ownership and mutates in place.
        drop(snapshots);

        if conflict {
            self.metrics.batch_redone();
            self.execute_txn_ctx_list_in_order(header, list, true)?;
            return Ok(true);
        }
        self.metrics.batch_clean();
        self.commit(list)?;
        Ok(false)
    }

    /// Ordered path, used when parallelism is disabled and as the conflict
    /// fallback. Each transaction runs on a fork of the running state so an
    /// erroring writing cannot leak partial mutations; transaction `i + 1`
    /// observes the post-state of `i` only if `i` succeeded. On redo,
    /// transactions that already failed keep their receipts and are skipped.
    fn execute_txn_ctx_list_in_order(
        &self,
        header: &BlockHeader,
        list: &mut [TxnCtx<'_>],
        is_redo: bool,
    ) -> Result<(), EngineError> {
        let mut running = self.world.lock()?.snapshot();
        for tctx in list.iter_mut() {
            if matches!(&tctx.outcome, Some(outcome) if outcome.is_failed()) {
                continue;
            }
            let mut scratch = running.fork();
            let outcome = self.run_writing(header, tctx, &mut scratch, is_redo);
            drop(scratch);
            if let ExecOutcome::Executed { pending, .. } = &outcome {
                running.apply_pending(pending);
            }
            tctx.outcome = Some(outcome);
        }
        drop(running);
        self.commit(list)
    }

    fn run_writing(
        &self,
        header: &BlockHeader,
        tctx: &TxnCtx<'_>,
        snapshot: &mut StateSnapshot,
        is_redo: bool,
    ) -> ExecOutcome {
        let mut ctx = WriteContext::new(header, tctx.txn, &tctx.request);
        match (tctx.writing)(&mut ctx, snapshot) {
            Ok(()) => {
                let (events, gas_used) = ctx.finish();
                ExecOutcome::Executed {
                    pending: snapshot.take_pending(),
                    receipt: self.handle_txn_event(events, gas_used, is_redo),
                }
            }
            Err(error) => {
                let gas_used = ctx.gas_used();
                let receipt = self.handle_txn_error(&error, gas_used);
                ExecOutcome::Failed { error, receipt }
            }
        }
    }

    /// Merge every successful pending state into the world state in batch
    /// order under the exclusive lock. Errored transactions are skipped; a
    /// batch is merged fully or (on an engine error before this point) not
    /// at all.
    fn commit(&self, list: &[TxnCtx<'_>]) -> Result<(), EngineError> {
        let start = Instant::now();
        let mut world = self.world.lock()?;
        for tctx in list {
            if let Some(ExecOutcome::Executed { pending, .. }) = &tctx.outcome {
                pending.merge_into(&mut world);
            }
        }
        drop(world);
        self.metrics.observe_commit(start.elapsed());
        Ok(())
    }

    fn handle_txn_event(&self, events: Vec<Event>, gas_used: u64, is_redo: bool) -> Receipt {
        self.metrics.record_txn_success(is_redo);
        Receipt::success(gas_used, events, is_redo)
    }

    fn handle_txn_error(&self, err: &dyn std::fmt::Display, gas_used: u64) -> Receipt {
        self.metrics.record_txn_err();
        Receipt::failed(err.to_string(), gas_used)
    }
}

fn check_address_conflict(request: &CallRequest, batch: &[TxnCtx<'_>]) -> bool {
    batch
        .iter()
        .any(|other| requests_conflict(request, &other.request))
}

/// Conservative static dependence between two requests: a shared target,
/// either target equal to the other's origin, or a shared origin. Two
/// requests without targets only depend on each other through their origins.
fn requests_conflict(current: &CallRequest, other: &CallRequest) -> bool {
    if let (Some(current_target), Some(other_target)) = (current.address, other.address) {
        if current_target == other_target {
            return true;
        }
    }
    if let Some(other_target) = other.address {
        if other_target == current.origin {
            return true;
        }
    }
    if let Some(current_target) = current.address {
        if other.origin == current_target {
            return true;
        }
    }
    current.origin == other.origin
}
