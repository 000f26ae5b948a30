use serde::{Deserialize, Serialize};
use tycho_primitives::{Address, B256, Bytes, FxHashMap, TxHash, U256, keccak256};

/// Block metadata the engine needs while executing transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block height.
    pub number: u64,
    /// Block timestamp in seconds.
    pub timestamp: u64,
}

/// The unit of execution: an ordered transaction list plus metadata.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub txns: Vec<SignedTransaction>,
}

impl Block {
    pub fn new(header: BlockHeader, txns: Vec<SignedTransaction>) -> Self {
        Self { header, txns }
    }
}

/// A signed request to mutate world state. Signature verification happens
/// upstream; the engine only consumes the already-verified envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: TxHash,
    pub call: WriteCall,
}

impl SignedTransaction {
    /// Wrap a call into a transaction, deriving the hash from the call body.
    pub fn new(call: WriteCall) -> Self {
        Self {
            hash: call.digest(),
            call,
        }
    }
}

/// Names the writing to run and carries its serialized request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCall {
    pub component: String,
    pub method: String,
    pub payload: Bytes,
}

impl WriteCall {
    pub fn new(component: impl Into<String>, method: impl Into<String>, payload: Bytes) -> Self {
        Self {
            component: component.into(),
            method: method.into(),
            payload,
        }
    }

    fn digest(&self) -> B256 {
        let mut preimage =
            Vec::with_capacity(self.component.len() + self.method.len() + self.payload.len() + 2);
        preimage.extend_from_slice(self.component.as_bytes());
        preimage.push(0);
        preimage.extend_from_slice(self.method.as_bytes());
        preimage.push(0);
        preimage.extend_from_slice(&self.payload);
        keccak256(preimage)
    }
}

fn default_gas_limit() -> u64 {
    1_000_000
}

/// The bindable part of a transaction payload.
///
/// `origin` and `address` are the two fields the partitioner schedules on;
/// the rest is interpreted by the resolved writing only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Address initiating the transaction. Always present.
    pub origin: Address,
    /// Optional target/contract address.
    #[serde(default)]
    pub address: Option<Address>,
    /// Native value to move.
    #[serde(default)]
    pub value: U256,
    /// Opaque calldata for the writing.
    #[serde(default)]
    pub input: Bytes,
    /// Expected account nonce of `origin`.
    #[serde(default)]
    pub nonce: u64,
    /// Upper bound on gas the writing may meter.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
}

/// An event emitted by a writing, surfaced through the receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failed,
}

/// The observable outcome of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub status: ReceiptStatus,
    pub gas_used: u64,
    pub events: Vec<Event>,
    /// Present iff `status` is [`ReceiptStatus::Failed`].
    pub error: Option<String>,
    /// Set when the transaction was re-executed by the serial fallback.
    pub redo: bool,
}

impl Receipt {
    pub(crate) fn success(gas_used: u64, events: Vec<Event>, redo: bool) -> Self {
        Self {
            status: ReceiptStatus::Success,
            gas_used,
            events,
            error: None,
            redo,
        }
    }

    pub(crate) fn failed(error: String, gas_used: u64) -> Self {
        Self {
            status: ReceiptStatus::Failed,
            gas_used,
            events: Vec::new(),
            error: Some(error),
            redo: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// Receipts of a block keyed by transaction hash. Exactly one entry per
/// input transaction.
pub type BlockReceipts = FxHashMap<TxHash, Receipt>;
