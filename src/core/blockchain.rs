//! The ledger: an append-only block list plus the indexes needed to
//! validate candidate blocks and answer wallet queries.
//!
//! All state lives in memory. A block either passes every check in
//! [`Blockchain::add_block`] and is applied atomically, or it is rejected
//! with the chain untouched.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::{debug, error, info, warn};

use crate::core::monetary::BASE_BLOCK_REWARD;
use crate::core::{Block, Difficulty, Hash, Identity, Transaction};
use crate::error::{BlockchainError, Result};
use crate::storage::{Mempool, UtxoKey, UtxoSet};
use crate::utils::crypto::{current_timestamp_ms, short_hex};

/// Chain state: the block list with its hash index, every confirmed
/// transaction by hash, the live output set, and the pool of broadcast
/// but unconfirmed transactions.
pub struct Blockchain {
    blocks: Vec<Block>,
    block_index: HashMap<Hash, usize>,
    tx_index: HashMap<Hash, Transaction>,
    utxo: UtxoSet,
    mempool: Mempool,
    difficulty: Box<dyn Difficulty>,
}

impl Blockchain {
    /// Create a chain whose genesis block pays `genesis_miner`, stamped
    /// with the current wall clock.
    pub fn initialize(genesis_miner: &Identity, difficulty: Box<dyn Difficulty>) -> Result<Blockchain> {
        let now = current_timestamp_ms()?;
        Ok(Self::initialize_at(genesis_miner, difficulty, now))
    }

    /// Create a chain with an explicit genesis timestamp. The genesis
    /// block is sealed at nonce zero and applied directly; it is the only
    /// block that never goes through validation.
    pub fn initialize_at(
        genesis_miner: &Identity,
        difficulty: Box<dyn Difficulty>,
        timestamp_ms: u64,
    ) -> Blockchain {
        let mut chain = Blockchain {
            blocks: Vec::new(),
            block_index: HashMap::new(),
            tx_index: HashMap::new(),
            utxo: UtxoSet::new(),
            mempool: Mempool::new(),
            difficulty,
        };

        chain.utxo.register_owner(genesis_miner.clone());

        let mut genesis = Block::new_first(timestamp_ms, genesis_miner);
        genesis.finalize(0, timestamp_ms);
        info!("minted genesis {genesis} for {genesis_miner}");
        chain.apply_reward_and_append(genesis);

        chain
    }

    /// Validate `block` against the current head and apply it.
    ///
    /// Checks run in a fixed order: linkage, block structure, every
    /// non-reward transaction, the reward bound, timestamp monotonicity,
    /// difficulty. Nothing is written until all of them pass.
    pub fn add_block(&mut self, block: Block) -> Result<()> {
        let head = self.latest_block();
        let head_hash = head.get_hash();
        let head_timestamp = head.get_timestamp_ms();

        if block.get_prev_hash() != head_hash {
            return Err(BlockchainError::InvalidBlock(format!(
                "Previous hash {} does not match the chain head {}",
                short_hex(&block.get_prev_hash()),
                short_hex(&head_hash)
            )));
        }
        if block.get_index() != self.blocks.len() as u64 {
            return Err(BlockchainError::InvalidBlock(format!(
                "Expected block index {}, got {}",
                self.blocks.len(),
                block.get_index()
            )));
        }
        if block.get_transactions().is_empty() {
            return Err(BlockchainError::InvalidBlock(
                "A block must carry the miner reward as its first transaction".to_string(),
            ));
        }
        if block.get_transactions()[0].outputs.len() != 1 {
            return Err(BlockchainError::InvalidBlock(
                "The reward transaction must pay exactly one output".to_string(),
            ));
        }

        // One scratch set for the whole block, so the same output cannot
        // be spent twice even across different transactions.
        let mut spent_in_block: HashSet<UtxoKey> = HashSet::new();
        let mut total_fee: u64 = 0;
        for transaction in &block.get_transactions()[1..] {
            debug!("confirming {transaction}");
            total_fee += self.verify_transaction(transaction, &mut spent_in_block)?;
        }

        let allowed = BASE_BLOCK_REWARD + total_fee;
        let claimed = block.get_transactions()[0].outputs[0].value;
        if claimed > allowed {
            return Err(BlockchainError::RewardTooHigh { claimed, allowed });
        }

        if block.get_timestamp_ms() < head_timestamp {
            return Err(BlockchainError::NonMonotonicTimestamp {
                candidate: block.get_timestamp_ms(),
                head: head_timestamp,
            });
        }

        if !self.difficulty.reach(&block.get_hash()) {
            return Err(BlockchainError::InsufficientWork);
        }

        let elapsed_ms = block.get_timestamp_ms() - head_timestamp;
        for transaction in &block.get_transactions()[1..] {
            self.apply_transaction(transaction);
        }
        info!("accepted {block} after {elapsed_ms} ms");
        self.apply_reward_and_append(block);
        self.difficulty.update(elapsed_ms);

        Ok(())
    }

    /// Check one non-reward transaction against the live output set and
    /// return its fee, the amount by which inputs exceed outputs.
    fn verify_transaction(
        &self,
        transaction: &Transaction,
        spent_in_block: &mut HashSet<UtxoKey>,
    ) -> Result<u64> {
        let mut total_input: u64 = 0;
        let mut owners: Vec<&Identity> = Vec::with_capacity(transaction.inputs.len());

        for input in &transaction.inputs {
            let key = UtxoKey::new(input.prev_tx_hash, input.output_index);

            if !spent_in_block.insert(key) {
                return Err(BlockchainError::DuplicateInput(key.to_string()));
            }
            if !self.utxo.contains(&key) {
                return Err(BlockchainError::UnknownUtxo(key.to_string()));
            }

            let prev = self.tx_index.get(&input.prev_tx_hash).ok_or_else(|| {
                BlockchainError::Corrupted(format!(
                    "Live output {key} has no source transaction on record"
                ))
            })?;
            let output = prev.outputs.get(input.output_index as usize).ok_or_else(|| {
                BlockchainError::Corrupted(format!(
                    "Live output {key} is out of range for its source transaction"
                ))
            })?;

            total_input += output.value;
            owners.push(&output.owner);
        }

        transaction.verify(&owners)?;

        let total_output = transaction.total_output_value();
        if total_output > total_input {
            return Err(BlockchainError::OutputsExceedInputs {
                inputs: total_input,
                outputs: total_output,
            });
        }

        Ok(total_input - total_output)
    }

    /// Apply one validated non-reward transaction: consume its inputs,
    /// create its outputs, and evict it from the mempool.
    fn apply_transaction(&mut self, transaction: &Transaction) {
        let tx_hash = transaction.hash();
        self.tx_index.insert(tx_hash, transaction.clone());

        for input in &transaction.inputs {
            let key = UtxoKey::new(input.prev_tx_hash, input.output_index);
            // Validation has already pinned every input to a live output.
            let owner = self
                .tx_index
                .get(&input.prev_tx_hash)
                .and_then(|prev| prev.outputs.get(input.output_index as usize))
                .map(|output| output.owner.clone());
            match owner {
                Some(owner) => self.utxo.remove(&key, &owner),
                None => warn!("spent output {key} has no source transaction on record"),
            }
        }

        for (position, output) in transaction.outputs.iter().enumerate() {
            self.utxo
                .insert(UtxoKey::new(tx_hash, position as u32), &output.owner);
        }

        debug!("evicting {} from the mempool", short_hex(&tx_hash));
        self.mempool.remove(&tx_hash);
    }

    /// Credit the reward transaction and append the block. The reward's
    /// stamped input slot references nothing and is never consumed.
    fn apply_reward_and_append(&mut self, block: Block) {
        let reward = &block.get_transactions()[0];
        let reward_hash = reward.hash();
        self.tx_index.insert(reward_hash, reward.clone());
        self.utxo
            .insert(UtxoKey::new(reward_hash, 0), block.get_miner());

        self.block_index.insert(block.get_hash(), self.blocks.len());
        self.blocks.push(block);
    }

    /// Whether a sealed block's hash meets the current difficulty. Miners
    /// probe with this between nonce attempts.
    pub fn reach(&self, block: &Block) -> bool {
        self.difficulty.reach(&block.get_hash())
    }

    pub fn difficulty(&self) -> &dyn Difficulty {
        self.difficulty.as_ref()
    }

    pub fn latest_block(&self) -> &Block {
        self.blocks
            .last()
            .expect("A chain always holds at least its genesis block")
    }

    /// The n-th block counting back from the head, where 1 is the head
    /// itself. Out-of-range `n` (including 0) yields `None`.
    pub fn nth_latest_block(&self, n: usize) -> Option<&Block> {
        if n == 0 || n > self.blocks.len() {
            return None;
        }
        Some(&self.blocks[self.blocks.len() - n])
    }

    pub fn block_by_hash(&self, hash: &Hash) -> Option<&Block> {
        self.block_index
            .get(hash)
            .map(|&position| &self.blocks[position])
    }

    /// Number of blocks in the chain, genesis included.
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// Sum the live outputs owned by `owner`. Unknown owners and index
    /// entries without a source transaction count as zero.
    pub fn balance_of(&self, owner: &Identity) -> u64 {
        let Some(keys) = self.utxo.owned_by(owner) else {
            error!("{owner} has no entry in the ownership index");
            return 0;
        };

        let mut balance: u64 = 0;
        for key in keys {
            match self
                .tx_index
                .get(&key.tx_hash)
                .and_then(|tx| tx.outputs.get(key.output_index as usize))
            {
                Some(output) => balance += output.value,
                None => warn!("live output {key} has no source transaction on record"),
            }
        }
        balance
    }

    /// Draft an unsigned transaction moving `amount` from `from` to `to`,
    /// leaving `fee` on the table for the miner.
    ///
    /// Inputs are picked greedily from the sender's live outputs until
    /// they cover amount plus fee; any excess comes back to the sender as
    /// a change output. The caller still has to sign every input.
    pub fn transfer(
        &self,
        from: &Identity,
        to: &Identity,
        amount: u64,
        fee: u64,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(BlockchainError::ZeroAmount);
        }

        let available = self.balance_of(from);
        if available < amount {
            return Err(BlockchainError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        let mut selected: Vec<UtxoKey> = Vec::new();
        let mut gathered: u64 = 0;
        if let Some(keys) = self.utxo.owned_by(from) {
            for key in keys {
                let Some(output) = self
                    .tx_index
                    .get(&key.tx_hash)
                    .and_then(|tx| tx.outputs.get(key.output_index as usize))
                else {
                    warn!("live output {key} has no source transaction on record");
                    continue;
                };

                selected.push(*key);
                gathered += output.value;
                if gathered >= amount && gathered - amount >= fee {
                    break;
                }
            }
        }

        let change = match gathered
            .checked_sub(amount)
            .and_then(|rest| rest.checked_sub(fee))
        {
            Some(change) => change,
            None => {
                return Err(BlockchainError::InsufficientFunds {
                    required: amount.saturating_add(fee),
                    available: gathered,
                })
            }
        };

        let output_count = if change == 0 { 1 } else { 2 };
        let mut transaction = Transaction::new(selected.len(), output_count);
        for (slot, key) in transaction.inputs.iter_mut().zip(&selected) {
            slot.prev_tx_hash = key.tx_hash;
            slot.output_index = key.output_index;
        }
        transaction.outputs[0].value = amount;
        transaction.outputs[0].owner = to.clone();
        if change > 0 {
            transaction.outputs[1].value = change;
            transaction.outputs[1].owner = from.clone();
        }
        transaction.sender = Some(from.clone());

        debug!("drafted {transaction} over {} inputs", selected.len());
        Ok(transaction)
    }

    /// Fee a pooled transaction would pay if confirmed now: live input
    /// value minus output value. Anything referencing an unknown or spent
    /// output reports zero, since it cannot be applied.
    pub fn claimable_fee(&self, transaction: &Transaction) -> u64 {
        let mut total_input: u64 = 0;
        for input in &transaction.inputs {
            let key = UtxoKey::new(input.prev_tx_hash, input.output_index);
            if !self.utxo.contains(&key) {
                return 0;
            }
            match self
                .tx_index
                .get(&input.prev_tx_hash)
                .and_then(|prev| prev.outputs.get(input.output_index as usize))
            {
                Some(output) => total_input += output.value,
                None => return 0,
            }
        }
        total_input.saturating_sub(transaction.total_output_value())
    }

    /// Queue a broadcast transaction for inclusion in a future block. A
    /// rebroadcast with the same hash replaces the pooled copy.
    pub fn accept_broadcast(&mut self, transaction: Transaction) {
        debug!("pooling {transaction}");
        self.mempool.add(transaction);
    }

    /// Drop a pooled transaction, returning it if it was present. Miners
    /// use this to shed transactions from a rejected candidate block.
    pub fn discard_broadcast(&mut self, tx_hash: &Hash) -> Option<Transaction> {
        self.mempool.remove(tx_hash)
    }

    /// Give an identity an empty entry in the ownership index so balance
    /// queries on it stop logging errors. Existing holdings survive.
    pub fn register_identity(&mut self, identity: Identity) {
        self.utxo.register_owner(identity);
    }

    pub fn mempool_snapshot(&self) -> Vec<Transaction> {
        self.mempool.get_all()
    }

    pub fn mempool_len(&self) -> usize {
        self.mempool.len()
    }

    /// Whether the pool holds a transaction drafted by `sender`. Wallets
    /// poll this to keep one transfer in flight at a time.
    pub fn mempool_contains_sender(&self, sender: &Identity) -> bool {
        self.mempool.contains_sender(sender)
    }
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chain of {} blocks ({} live outputs, {} pooled tx, difficulty {})",
            self.blocks.len(),
            self.utxo.len(),
            self.mempool.len(),
            self.difficulty
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::difficulty::FixedWindowDifficulty;
    use crate::core::monetary::BASE_BLOCK_REWARD;
    use crate::testnet::test_utils::{
        seal_next_empty_block, seed_identity, test_chain, RecordingDifficulty,
        GENESIS_TIMESTAMP_MS,
    };

    #[test]
    fn test_genesis_pays_the_base_reward() {
        let miner = seed_identity(1);
        let chain = test_chain(&miner);

        assert_eq!(chain.height(), 1);
        assert_eq!(chain.balance_of(&miner), BASE_BLOCK_REWARD);
        assert_eq!(chain.latest_block().get_index(), 0);
        assert!(chain.latest_block().verify_hash());
    }

    #[test]
    fn test_empty_blocks_accumulate_rewards() {
        let miner = seed_identity(1);
        let mut chain = test_chain(&miner);

        for _ in 0..3 {
            let block = seal_next_empty_block(&chain, &miner);
            chain.add_block(block).unwrap();
        }

        assert_eq!(chain.height(), 4);
        assert_eq!(chain.balance_of(&miner), BASE_BLOCK_REWARD * 4);
    }

    #[test]
    fn test_blocks_are_reachable_by_hash_and_depth() {
        let miner = seed_identity(1);
        let mut chain = test_chain(&miner);
        let genesis_hash = chain.latest_block().get_hash();

        let block = seal_next_empty_block(&chain, &miner);
        let head_hash = block.get_hash();
        chain.add_block(block).unwrap();

        assert_eq!(chain.nth_latest_block(1).unwrap().get_hash(), head_hash);
        assert_eq!(chain.nth_latest_block(2).unwrap().get_hash(), genesis_hash);
        assert!(chain.nth_latest_block(0).is_none());
        assert!(chain.nth_latest_block(3).is_none());
        assert_eq!(chain.block_by_hash(&genesis_hash).unwrap().get_index(), 0);
        assert!(chain.block_by_hash(&[0xAA; 32]).is_none());
    }

    #[test]
    fn test_rejects_block_with_wrong_linkage() {
        let miner = seed_identity(1);
        let mut chain = test_chain(&miner);

        let mut block = Block::new_first(GENESIS_TIMESTAMP_MS + 1_000, &miner);
        block.finalize(0, GENESIS_TIMESTAMP_MS + 1_000);

        let err = chain.add_block(block).unwrap_err();
        assert!(matches!(err, BlockchainError::InvalidBlock(_)));
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn test_rejects_reward_with_extra_outputs() {
        let miner = seed_identity(1);
        let mut chain = test_chain(&miner);

        let head_timestamp = chain.latest_block().get_timestamp_ms();
        let mut block =
            Block::new_next_empty(chain.latest_block(), head_timestamp + 1_000, &miner);
        let extra = crate::core::TransactionOutput {
            value: 1,
            owner: seed_identity(2),
        };
        block.get_transactions_mut()[0].outputs.push(extra);
        block.finalize(0, head_timestamp + 1_000);

        let err = chain.add_block(block).unwrap_err();
        assert!(matches!(err, BlockchainError::InvalidBlock(_)));
    }

    #[test]
    fn test_rejects_inflated_reward() {
        let miner = seed_identity(1);
        let mut chain = test_chain(&miner);

        let head_timestamp = chain.latest_block().get_timestamp_ms();
        let mut block =
            Block::new_next_empty(chain.latest_block(), head_timestamp + 1_000, &miner);
        block.get_transactions_mut()[0].outputs[0].value = BASE_BLOCK_REWARD + 1;
        block.finalize(0, head_timestamp + 1_000);

        let err = chain.add_block(block).unwrap_err();
        assert!(matches!(
            err,
            BlockchainError::RewardTooHigh {
                claimed,
                allowed
            } if claimed == BASE_BLOCK_REWARD + 1 && allowed == BASE_BLOCK_REWARD
        ));
    }

    #[test]
    fn test_rejects_block_older_than_head() {
        let miner = seed_identity(1);
        let mut chain = test_chain(&miner);

        let head_timestamp = chain.latest_block().get_timestamp_ms();
        let mut block =
            Block::new_next_empty(chain.latest_block(), head_timestamp - 1, &miner);
        block.finalize(0, head_timestamp - 1);

        let err = chain.add_block(block).unwrap_err();
        assert!(matches!(err, BlockchainError::NonMonotonicTimestamp { .. }));
    }

    #[test]
    fn test_accepts_block_sharing_the_head_timestamp() {
        let miner = seed_identity(1);
        let mut chain = test_chain(&miner);

        let head_timestamp = chain.latest_block().get_timestamp_ms();
        let mut block = Block::new_next_empty(chain.latest_block(), head_timestamp, &miner);
        block.finalize(0, head_timestamp);

        chain.add_block(block).unwrap();
        assert_eq!(chain.height(), 2);
    }

    #[test]
    fn test_rejects_block_missing_difficulty() {
        let miner = seed_identity(1);
        // Probability zero expands to an all-zero threshold that no real
        // hash can meet.
        let unreachable = Box::new(FixedWindowDifficulty::new(10_000, 0.0));
        let mut chain = Blockchain::initialize_at(&miner, unreachable, GENESIS_TIMESTAMP_MS);

        let block = seal_next_empty_block(&chain, &miner);
        let err = chain.add_block(block).unwrap_err();
        assert!(matches!(err, BlockchainError::InsufficientWork));
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn test_transfer_rejects_zero_amount() {
        let miner = seed_identity(1);
        let chain = test_chain(&miner);

        let err = chain.transfer(&miner, &seed_identity(2), 0, 0).unwrap_err();
        assert!(matches!(err, BlockchainError::ZeroAmount));
    }

    #[test]
    fn test_transfer_rejects_amounts_beyond_balance() {
        let miner = seed_identity(1);
        let chain = test_chain(&miner);

        let err = chain
            .transfer(&miner, &seed_identity(2), BASE_BLOCK_REWARD + 1, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            BlockchainError::InsufficientFunds { required, available }
                if required == BASE_BLOCK_REWARD + 1 && available == BASE_BLOCK_REWARD
        ));
    }

    #[test]
    fn test_transfer_rejects_fees_the_balance_cannot_cover() {
        let miner = seed_identity(1);
        let chain = test_chain(&miner);

        let err = chain
            .transfer(&miner, &seed_identity(2), BASE_BLOCK_REWARD, 1)
            .unwrap_err();
        assert!(matches!(err, BlockchainError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_exact_transfer_drafts_a_single_output() {
        let miner = seed_identity(1);
        let recipient = seed_identity(2);
        let chain = test_chain(&miner);

        let transaction = chain
            .transfer(&miner, &recipient, BASE_BLOCK_REWARD, 0)
            .unwrap();

        assert_eq!(transaction.inputs.len(), 1);
        assert_eq!(transaction.outputs.len(), 1);
        assert_eq!(transaction.outputs[0].value, BASE_BLOCK_REWARD);
        assert_eq!(transaction.outputs[0].owner, recipient);
        assert_eq!(transaction.sender.as_ref(), Some(&miner));
        assert!(transaction.inputs[0].signature.is_empty());
    }

    #[test]
    fn test_partial_transfer_returns_change_to_the_sender() {
        let miner = seed_identity(1);
        let recipient = seed_identity(2);
        let chain = test_chain(&miner);

        let transaction = chain.transfer(&miner, &recipient, 30_000, 500).unwrap();

        assert_eq!(transaction.outputs.len(), 2);
        assert_eq!(transaction.outputs[0].value, 30_000);
        assert_eq!(transaction.outputs[0].owner, recipient);
        assert_eq!(transaction.outputs[1].value, BASE_BLOCK_REWARD - 30_500);
        assert_eq!(transaction.outputs[1].owner, miner);
    }

    #[test]
    fn test_claimable_fee_matches_the_drafted_fee() {
        let miner = seed_identity(1);
        let chain = test_chain(&miner);

        let transaction = chain
            .transfer(&miner, &seed_identity(2), 30_000, 500)
            .unwrap();
        assert_eq!(chain.claimable_fee(&transaction), 500);

        let mut orphan = transaction.clone();
        orphan.inputs[0].prev_tx_hash = [0x5A; 32];
        assert_eq!(chain.claimable_fee(&orphan), 0);
    }

    #[test]
    fn test_balance_of_unknown_identity_is_zero() {
        let miner = seed_identity(1);
        let chain = test_chain(&miner);

        assert_eq!(chain.balance_of(&seed_identity(9)), 0);
    }

    #[test]
    fn test_registering_an_identity_keeps_existing_holdings() {
        let miner = seed_identity(1);
        let mut chain = test_chain(&miner);

        chain.register_identity(miner.clone());
        assert_eq!(chain.balance_of(&miner), BASE_BLOCK_REWARD);
    }

    #[test]
    fn test_difficulty_update_sees_the_block_gap() {
        let miner = seed_identity(1);
        let probe = RecordingDifficulty::new();
        let updates = probe.updates();
        let mut chain =
            Blockchain::initialize_at(&miner, Box::new(probe), GENESIS_TIMESTAMP_MS);

        // Genesis is applied without a retarget.
        assert_eq!(updates.lock().unwrap().len(), 0);

        let head_timestamp = chain.latest_block().get_timestamp_ms();
        let mut block =
            Block::new_next_empty(chain.latest_block(), head_timestamp + 5_000, &miner);
        block.finalize(0, head_timestamp + 5_000);
        chain.add_block(block).unwrap();

        assert_eq!(*updates.lock().unwrap(), vec![5_000]);
    }
}
