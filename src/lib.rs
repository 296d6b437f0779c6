//! # Pocketcoin
//!
//! A compact in-memory cryptocurrency ledger: a UTXO transaction model
//! with RSA-signed transfers, proof-of-work block sealing and pluggable
//! difficulty retargeting, plus the user and miner roles that drive a
//! shared chain in the bundled simulation binary.
//!
//! ## Layout
//! - `core/`: canonical encoding, identities, transactions, blocks,
//!   difficulty strategies and the ledger itself
//! - `storage/`: the UTXO set and the pending-transaction pool
//! - `roles/`: user and miner actors sharing one chain behind a lock
//! - `config/`: environment-seeded runtime settings
//! - `utils/`: hashing, RSA signatures and timestamps
//! - `cli/`: argument parsing for the node binary
//!
//! The ledger is fail-closed: a candidate block is checked for linkage,
//! structure, signatures, value conservation, reward bounds, timestamp
//! order and proof-of-work before any state changes, so a rejected block
//! leaves no trace.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod roles;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, DifficultyStrategyArg, Opt};
pub use config::{Settings, GLOBAL_SETTINGS};
pub use core::{
    Block, Blockchain, Difficulty, DifficultyStrategy, FixedWindowDifficulty, Hash, Identity,
    MovingAverageDifficulty, Nonce, Transaction, TransactionInput, TransactionOutput, HASH_SIZE,
};
pub use error::{BlockchainError, Result};
pub use roles::{Miner, SharedChain, User};
pub use storage::{Mempool, UtxoKey, UtxoSet};
pub use utils::{
    current_timestamp_ms, new_key_pair, sha256_digest, short_hex, sign_message, verify_signature,
};
