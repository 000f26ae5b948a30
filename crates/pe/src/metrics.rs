use std::time::Duration;

use metrics::{Counter, Gauge, Histogram, counter, gauge, histogram};

/// Process-wide executor metrics. Handles are resolved once at engine
/// construction; label-variant series are resolved at the call site.
pub(crate) struct ExecutorMetrics {
    /// Number of transactions in the block being executed.
    block_txn_count: Gauge,
    /// Wall time of a whole block execution.
    block_execute_duration: Histogram,
    /// Wall time of the parallel prepare fan-out.
    txn_prepare_duration: Histogram,
    /// Wall time of the batch split.
    txn_split_duration: Histogram,
    /// Wall time of a batch commit.
    batch_commit_duration: Histogram,
    txn_success: Counter,
    txn_err: Counter,
    txn_redo: Counter,
    batch_success: Counter,
    batch_redo: Counter,
}

impl ExecutorMetrics {
    pub(crate) fn new() -> Self {
        Self {
            block_txn_count: gauge!("tycho_pe_block_txn_count"),
            block_execute_duration: histogram!("tycho_pe_block_execute_duration_seconds"),
            txn_prepare_duration: histogram!("tycho_pe_txn_prepare_duration_seconds"),
            txn_split_duration: histogram!("tycho_pe_txn_split_duration_seconds"),
            batch_commit_duration: histogram!("tycho_pe_batch_commit_duration_seconds"),
            txn_success: counter!("tycho_pe_txn_total", "status" => "success"),
            txn_err: counter!("tycho_pe_txn_total", "status" => "err"),
            txn_redo: counter!("tycho_pe_txn_total", "status" => "redo"),
            batch_success: counter!("tycho_pe_batch_total", "result" => "success"),
            batch_redo: counter!("tycho_pe_batch_total", "result" => "redo"),
        }
    }

    pub(crate) fn observe_block(&self, txn_count: usize, elapsed: Duration) {
        self.block_txn_count.set(txn_count as f64);
        self.block_execute_duration.record(elapsed.as_secs_f64());
    }

    pub(crate) fn observe_prepare(&self, elapsed: Duration) {
        self.txn_prepare_duration.record(elapsed.as_secs_f64());
    }

    pub(crate) fn observe_split(&self, elapsed: Duration) {
        self.txn_split_duration.record(elapsed.as_secs_f64());
    }

    pub(crate) fn observe_batch_size(&self, size: usize) {
        counter!("tycho_pe_batch_size_total", "size" => size.to_string()).increment(1);
    }

    pub(crate) fn observe_copy(&self, count: usize, elapsed: Duration) {
        histogram!("tycho_pe_statedb_copy_duration_seconds", "count" => count.to_string())
            .record(elapsed.as_secs_f64());
    }

    pub(crate) fn observe_batch_execute(&self, conflict: bool, elapsed: Duration) {
        histogram!(
            "tycho_pe_batch_execute_duration_seconds",
            "conflict" => if conflict { "true" } else { "false" }
        )
        .record(elapsed.as_secs_f64());
    }

    pub(crate) fn observe_commit(&self, elapsed: Duration) {
        self.batch_commit_duration.record(elapsed.as_secs_f64());
    }

    pub(crate) fn record_txn_success(&self, is_redo: bool) {
        self.txn_success.increment(1);
        if is_redo {
            self.txn_redo.increment(1);
        }
    }

    pub(crate) fn record_txn_err(&self) {
        self.txn_err.increment(1);
    }

    pub(crate) fn batch_clean(&self) {
        self.batch_success.increment(1);
    }

    pub(crate) fn batch_redone(&self) {
        self.batch_redo.increment(1);
    }
}
