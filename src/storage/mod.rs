//! In-memory ledger state
//!
//! This module holds the mutable state behind the chain: the set of
//! unspent transaction outputs with its ownership index, and the pool
//! of broadcast transactions waiting to be mined.

pub mod memory_pool;
pub mod utxo_set;

pub use memory_pool::Mempool;
pub use utxo_set::{UtxoKey, UtxoSet};
