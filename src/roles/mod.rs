//! Actors driving the ledger: users who draft and broadcast transfers,
//! and the miner who turns the pool into blocks.

pub mod miner;
pub mod user;

use std::sync::{Arc, RwLock};

use crate::core::Blockchain;

/// Shared handle to the single ledger instance. Roles take short read
/// locks for queries and a write lock to broadcast or append.
pub type SharedChain = Arc<RwLock<Blockchain>>;

pub use miner::Miner;
pub use user::User;
