//! The mining role: assembles candidate blocks from the pool, searches
//! for a nonce that meets difficulty, and feeds confirmed blocks back to
//! the ledger.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info};
use rsa::RsaPrivateKey;

use crate::config::settings::GLOBAL_SETTINGS;
use crate::core::{Block, Hash, Identity};
use crate::error::Result;
use crate::roles::{SharedChain, User};
use crate::utils::crypto::current_timestamp_ms;

/// A miner is a user with a mining loop on top; its rewards land in its
/// own wallet and it can trade them like anyone else.
pub struct Miner {
    user: User,
}

impl Miner {
    pub fn create(chain: SharedChain) -> Result<Miner> {
        Ok(Miner {
            user: User::create(chain)?,
        })
    }

    pub fn attach(chain: SharedChain, key: RsaPrivateKey) -> Result<Miner> {
        Ok(Miner {
            user: User::attach(chain, key)?,
        })
    }

    pub fn identity(&self) -> &Identity {
        self.user.identity()
    }

    /// The wallet half of the miner.
    pub fn as_user(&self) -> &User {
        &self.user
    }

    /// Mine until `max_blocks` blocks have been confirmed, or forever
    /// with `None`.
    pub fn run(&self, max_blocks: Option<u64>) {
        info!("miner {} starts mining", self.identity());
        let mut confirmed: u64 = 0;
        while max_blocks.map_or(true, |limit| confirmed < limit) {
            match self.mine_next_block() {
                Ok(true) => confirmed += 1,
                Ok(false) => {}
                Err(err) => {
                    error!("miner {} stopped: {err}", self.identity());
                    return;
                }
            }
        }
        info!(
            "miner {} confirmed {confirmed} blocks, stopping",
            self.identity()
        );
    }

    /// Assemble a candidate from the pooled transactions and search for a
    /// nonce, pausing between attempts so the search does not spin.
    ///
    /// Returns true when the candidate is confirmed. A rejected candidate
    /// has its transactions evicted from the pool, so the next candidate
    /// starts clean, and yields false.
    pub fn mine_next_block(&self) -> Result<bool> {
        let pause = Duration::from_millis(GLOBAL_SETTINGS.get_mining_pause_ms());
        let (mut block, pooled_hashes) = self.assemble_candidate()?;

        let started = Instant::now();
        let mut nonce: u64 = 0;
        loop {
            block.finalize(nonce, current_timestamp_ms()?);

            let reached = {
                let chain = self
                    .user
                    .chain()
                    .read()
                    .expect("Failed to acquire read lock on chain - this should never happen");
                chain.reach(&block)
            };
            if reached {
                let mut chain = self
                    .user
                    .chain()
                    .write()
                    .expect("Failed to acquire write lock on chain - this should never happen");
                let index = block.get_index();
                return match chain.add_block(block) {
                    Ok(()) => {
                        info!(
                            "miner {} confirmed block #{index} (nonce {nonce}, {} ms)",
                            self.identity(),
                            started.elapsed().as_millis()
                        );
                        info!("new difficulty: {}", chain.difficulty());
                        Ok(true)
                    }
                    Err(err) => {
                        error!("candidate block #{index} rejected: {err}");
                        for hash in &pooled_hashes {
                            if chain.discard_broadcast(hash).is_some() {
                                debug!("evicted a transaction from the rejected candidate");
                            }
                        }
                        Ok(false)
                    }
                };
            }

            nonce += 1;
            thread::sleep(pause);
        }
    }

    /// Next empty block on the current head plus every pooled
    /// transaction, with the reward raised by the fees they would pay.
    fn assemble_candidate(&self) -> Result<(Block, Vec<Hash>)> {
        let timestamp = current_timestamp_ms()?;
        let chain = self
            .user
            .chain()
            .read()
            .expect("Failed to acquire read lock on chain - this should never happen");

        let mut block = Block::new_next_empty(chain.latest_block(), timestamp, self.identity());
        let pooled = chain.mempool_snapshot();
        let mut fees: u64 = 0;
        let mut hashes = Vec::with_capacity(pooled.len());
        for transaction in pooled {
            fees += chain.claimable_fee(&transaction);
            hashes.push(transaction.hash());
            debug!("candidate picks up {transaction}");
            block.add_transaction(transaction);
        }
        if fees > 0 {
            block.get_transactions_mut()[0].outputs[0].value += fees;
        }

        Ok((block, hashes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::monetary::BASE_BLOCK_REWARD;
    use crate::core::Transaction;
    use crate::testnet::test_utils::{identity_of, test_chain, test_key_pair};
    use std::sync::{Arc, RwLock};

    #[test]
    fn test_mines_empty_and_laden_blocks() {
        let boost_key = test_key_pair();
        let boost_identity = identity_of(&boost_key);
        let chain: SharedChain = Arc::new(RwLock::new(test_chain(&boost_identity)));

        let miner = Miner::attach(Arc::clone(&chain), test_key_pair()).unwrap();
        let boost = User::attach(Arc::clone(&chain), boost_key).unwrap();

        assert!(miner.mine_next_block().unwrap());
        assert_eq!(chain.read().unwrap().height(), 2);
        assert_eq!(miner.as_user().balance(), BASE_BLOCK_REWARD);

        boost.send_to(miner.identity(), 40_000, 250);
        assert!(boost.has_pending_transfer());

        assert!(miner.mine_next_block().unwrap());
        {
            let ledger = chain.read().unwrap();
            assert_eq!(ledger.height(), 3);
            assert_eq!(ledger.mempool_len(), 0);
        }
        assert_eq!(boost.balance(), BASE_BLOCK_REWARD - 40_250);
        assert_eq!(
            miner.as_user().balance(),
            BASE_BLOCK_REWARD * 2 + 40_000 + 250
        );
    }

    #[test]
    fn test_rejected_candidate_sheds_its_transactions() {
        let boost_key = test_key_pair();
        let boost_identity = identity_of(&boost_key);
        let chain: SharedChain = Arc::new(RwLock::new(test_chain(&boost_identity)));
        let miner = Miner::attach(Arc::clone(&chain), test_key_pair()).unwrap();

        let mut rogue = Transaction::new(1, 1);
        rogue.inputs[0].prev_tx_hash = [0x77; 32];
        rogue.outputs[0].value = 5;
        rogue.outputs[0].owner = boost_identity.clone();
        chain.write().unwrap().accept_broadcast(rogue);
        assert_eq!(chain.read().unwrap().mempool_len(), 1);

        assert!(!miner.mine_next_block().unwrap());
        let ledger = chain.read().unwrap();
        assert_eq!(ledger.height(), 1);
        assert_eq!(ledger.mempool_len(), 0);
    }
}
