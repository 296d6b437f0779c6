use std::fmt;

use crate::core::codec::{self, Hash, Nonce};
use crate::core::identity::Identity;
use crate::core::monetary::BASE_BLOCK_REWARD;
use crate::core::transaction::Transaction;
use crate::utils;

/// One block in the chain.
///
/// `transactions[0]` is always the reward transaction paying the miner; the
/// body follows it. The stored hash is zero until [`Block::finalize`] runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    hash: Hash,
    prev_hash: Hash,
    index: u64,
    timestamp_ms: u64,
    miner: Identity,
    nonce: Nonce,
    transactions: Vec<Transaction>,
}

impl Block {
    /// Genesis block: zero previous hash, height 0, reward transaction only.
    /// Unfinalized.
    pub fn new_first(timestamp_ms: u64, miner: &Identity) -> Block {
        Self::assemble([0u8; 32], 0, timestamp_ms, miner)
    }

    /// Empty successor of `prev`: links to its stored hash at height + 1,
    /// reward transaction only. Unfinalized.
    pub fn new_next_empty(prev: &Block, timestamp_ms: u64, miner: &Identity) -> Block {
        Self::assemble(prev.hash, prev.index + 1, timestamp_ms, miner)
    }

    /// Successor of `prev` carrying the given transactions after the reward,
    /// finalized at the given nonce and timestamp.
    pub fn new_next(
        prev: &Block,
        timestamp_ms: u64,
        miner: &Identity,
        nonce: u64,
        transactions: Vec<Transaction>,
    ) -> Block {
        let mut block = Self::assemble(prev.hash, prev.index + 1, timestamp_ms, miner);
        block.add_transactions(transactions);
        block.finalize(nonce, timestamp_ms);
        block
    }

    /// Shared assembly. The reward transaction is built first and pinned at
    /// position 0: one output of the base reward to the miner, and one input
    /// slot whose previous-hash field is stamped with the block height
    /// (u64 big-endian in the first 8 bytes). The stamp keeps reward
    /// transactions at different heights from hashing alike; it is never
    /// resolved as an output reference.
    fn assemble(prev_hash: Hash, index: u64, timestamp_ms: u64, miner: &Identity) -> Block {
        let mut reward = Transaction::new(1, 1);
        reward.inputs[0].prev_tx_hash[..8].copy_from_slice(&index.to_be_bytes());
        reward.outputs[0].value = BASE_BLOCK_REWARD;
        reward.outputs[0].owner = miner.clone();

        Block {
            hash: [0u8; 32],
            prev_hash,
            index,
            timestamp_ms,
            miner: miner.clone(),
            nonce: Nonce::default(),
            transactions: vec![reward],
        }
    }

    /// Appends a transaction after the reward. Only meaningful before
    /// finalization.
    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    pub fn add_transactions(&mut self, transactions: Vec<Transaction>) {
        self.transactions.extend(transactions);
    }

    /// Fixes the nonce and timestamp, then computes and stores the block
    /// hash. The mining loop calls this repeatedly with fresh nonces.
    pub fn finalize(&mut self, nonce: u64, timestamp_ms: u64) {
        self.nonce = Nonce::from(nonce);
        self.timestamp_ms = timestamp_ms;
        self.hash = utils::sha256_digest(&self.hash_payload());
    }

    /// Bytes behind the block hash: previous hash, timestamp, miner, nonce,
    /// then every transaction's hash payload in order. There is no Merkle
    /// tree, and the height enters only indirectly through the reward
    /// transaction's index stamp.
    pub fn hash_payload(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&self.prev_hash);
        codec::put_u64(&mut payload, self.timestamp_ms);
        codec::put_identity(&mut payload, &self.miner);
        codec::put_nonce(&mut payload, &self.nonce);
        for transaction in &self.transactions {
            payload.extend_from_slice(&transaction.hash_payload());
        }
        payload
    }

    /// Recomputes the payload hash and compares it with the stored hash.
    /// Block acceptance never re-derives the hash; this exists to detect
    /// tampering after finalization.
    pub fn verify_hash(&self) -> bool {
        self.hash == utils::sha256_digest(&self.hash_payload())
    }

    pub fn get_hash(&self) -> Hash {
        self.hash
    }

    pub fn get_prev_hash(&self) -> Hash {
        self.prev_hash
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn get_miner(&self) -> &Identity {
        &self.miner
    }

    pub fn get_nonce(&self) -> Nonce {
        self.nonce
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    /// Mutable access to the body, used to raise the reward output by the
    /// collected fees before finalizing. Mutating a finalized block breaks
    /// `verify_hash`.
    pub fn get_transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block #{} hash:{} ({} tx, nonce {})",
            self.index,
            utils::short_hex(&self.hash),
            self.transactions.len(),
            self.nonce.low_word()
        )
    }
}
