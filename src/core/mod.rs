//! Core ledger functionality
//!
//! This module contains the fundamental pieces of the chain: canonical
//! encoding, identities, transactions, blocks, difficulty strategies and
//! the ledger that ties them together.

pub mod block;
pub mod blockchain;
pub mod codec;
pub mod difficulty;
pub mod identity;
pub mod monetary;
pub mod transaction;

pub use block::Block;
pub use blockchain::Blockchain;
pub use codec::{Hash, Nonce, HASH_SIZE};
pub use difficulty::{
    Difficulty, DifficultyStrategy, FixedWindowDifficulty, MovingAverageDifficulty,
};
pub use identity::Identity;
pub use monetary::{format_amount, BASE_BLOCK_REWARD, SUBUNITS_PER_COIN};
pub use transaction::{Transaction, TransactionInput, TransactionOutput};
