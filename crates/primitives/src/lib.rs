pub use alloy_primitives::{
    Address, B256, Bytes, FixedBytes, U160, U256, address, b256, bytes, hex, keccak256,
};

pub use hashbrown;
pub use rustc_hash::FxBuildHasher;

/// A [`hashbrown::HashMap`] keyed with the deterministic [`FxBuildHasher`].
///
/// Fx hashing is noticeably faster than the default SipHash for the short
/// fixed-size keys (addresses, storage slots) that dominate hot paths.
pub type FxHashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;

/// A [`hashbrown::HashSet`] keyed with the deterministic [`FxBuildHasher`].
pub type FxHashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

/// Transaction hash alias used to key receipts.
pub type TxHash = B256;
