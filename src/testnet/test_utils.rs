//! Shared fixtures for exercising the ledger in tests: canned identities,
//! difficulty stubs, and a chain opened at a fixed genesis timestamp.

use std::fmt;
use std::sync::{Arc, Mutex};

use rsa::RsaPrivateKey;

use crate::core::{Block, Blockchain, Difficulty, Hash, Identity, Transaction};
use crate::utils::crypto::new_key_pair;

/// Smallest RSA modulus that still fits a SHA-256 PKCS#1 v1.5 signature.
/// Tests generate many keys, so every bit saved matters.
pub const TEST_KEY_BITS: usize = 512;

/// Fixed genesis timestamp so block gaps in tests are exact.
pub const GENESIS_TIMESTAMP_MS: u64 = 1_700_000_000_000;

/// Difficulty that accepts every hash and ignores retargets.
pub struct NoDifficulty;

impl Difficulty for NoDifficulty {
    fn reach(&self, _hash: &Hash) -> bool {
        true
    }

    fn update(&mut self, _elapsed_ms: u64) {}
}

impl fmt::Display for NoDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "none")
    }
}

/// Difficulty that accepts every hash and records each retarget interval,
/// for asserting what the ledger feeds it.
pub struct RecordingDifficulty {
    updates: Arc<Mutex<Vec<u64>>>,
}

impl RecordingDifficulty {
    pub fn new() -> Self {
        RecordingDifficulty {
            updates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle onto the recorded intervals, valid after the stub has been
    /// boxed into a chain.
    pub fn updates(&self) -> Arc<Mutex<Vec<u64>>> {
        Arc::clone(&self.updates)
    }
}

impl Default for RecordingDifficulty {
    fn default() -> Self {
        Self::new()
    }
}

impl Difficulty for RecordingDifficulty {
    fn reach(&self, _hash: &Hash) -> bool {
        true
    }

    fn update(&mut self, elapsed_ms: u64) {
        self.updates.lock().unwrap().push(elapsed_ms);
    }
}

impl fmt::Display for RecordingDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recording")
    }
}

/// A deterministic identity that owns no usable key. Good enough wherever
/// a test never verifies signatures.
pub fn seed_identity(tag: u8) -> Identity {
    Identity::new(65537, vec![0xA0, 0xB1, 0xC2, 0xD3, tag])
}

/// Generate a signing key sized for tests.
pub fn test_key_pair() -> RsaPrivateKey {
    new_key_pair(TEST_KEY_BITS).expect("test key generation failed")
}

pub fn identity_of(key: &RsaPrivateKey) -> Identity {
    Identity::from_public_key(&key.to_public_key()).expect("test key has an oversized exponent")
}

/// Open a chain with no difficulty and a fixed genesis timestamp, paying
/// the genesis reward to `miner`.
pub fn test_chain(miner: &Identity) -> Blockchain {
    Blockchain::initialize_at(miner, Box::new(NoDifficulty), GENESIS_TIMESTAMP_MS)
}

/// Build and seal an empty block on the current head, one second after it.
pub fn seal_next_empty_block(chain: &Blockchain, miner: &Identity) -> Block {
    seal_next_block(chain, miner, Vec::new())
}

/// Build and seal a block carrying `transactions` on the current head,
/// one second after it.
pub fn seal_next_block(
    chain: &Blockchain,
    miner: &Identity,
    transactions: Vec<Transaction>,
) -> Block {
    let head = chain.latest_block();
    let timestamp = head.get_timestamp_ms() + 1_000;
    let mut block = Block::new_next_empty(head, timestamp, miner);
    block.add_transactions(transactions);
    block.finalize(0, timestamp);
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::monetary::BASE_BLOCK_REWARD;

    #[test]
    fn test_chain_opens_at_the_fixed_genesis() {
        let miner = seed_identity(1);
        let chain = test_chain(&miner);

        assert_eq!(chain.height(), 1);
        assert_eq!(
            chain.latest_block().get_timestamp_ms(),
            GENESIS_TIMESTAMP_MS
        );
        assert_eq!(chain.balance_of(&miner), BASE_BLOCK_REWARD);
    }

    #[test]
    fn test_sealed_blocks_chain_onto_the_head() {
        let miner = seed_identity(1);
        let mut chain = test_chain(&miner);

        let block = seal_next_empty_block(&chain, &miner);
        assert_eq!(block.get_prev_hash(), chain.latest_block().get_hash());
        assert!(block.verify_hash());
        chain.add_block(block).unwrap();
        assert_eq!(chain.height(), 2);
    }

    #[test]
    fn test_seed_identities_are_distinct_and_stable() {
        assert_eq!(seed_identity(3), seed_identity(3));
        assert_ne!(seed_identity(3), seed_identity(4));
    }

    #[test]
    fn test_generated_identities_round_trip_through_keys() {
        let key = test_key_pair();
        let identity = identity_of(&key);
        assert_eq!(identity.modulus().len(), TEST_KEY_BITS / 8);
        assert!(identity.to_public_key().is_ok());
    }
}
