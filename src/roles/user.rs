//! A wallet-holding participant: one RSA key, the identity derived from
//! it, and a handle to the shared ledger.

use log::{debug, error, info};
use rsa::RsaPrivateKey;

use crate::config::settings::GLOBAL_SETTINGS;
use crate::core::monetary::format_amount;
use crate::core::Identity;
use crate::error::Result;
use crate::roles::SharedChain;
use crate::utils::crypto::new_key_pair;

pub struct User {
    chain: SharedChain,
    key: RsaPrivateKey,
    identity: Identity,
}

impl User {
    /// Generate a fresh key pair sized per settings and register its
    /// identity with the ledger.
    pub fn create(chain: SharedChain) -> Result<User> {
        let key = new_key_pair(GLOBAL_SETTINGS.get_rsa_key_bits())?;
        Self::attach(chain, key)
    }

    /// Wrap an existing key, registering its identity with the ledger.
    /// The genesis holder goes through here, since its key has to exist
    /// before the chain does.
    pub fn attach(chain: SharedChain, key: RsaPrivateKey) -> Result<User> {
        let identity = Identity::from_public_key(&key.to_public_key())?;
        chain
            .write()
            .expect("Failed to acquire write lock on chain - this should never happen")
            .register_identity(identity.clone());
        debug!("created a user at {identity}");
        Ok(User {
            chain,
            key,
            identity,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn key(&self) -> &RsaPrivateKey {
        &self.key
    }

    pub fn chain(&self) -> &SharedChain {
        &self.chain
    }

    pub fn balance(&self) -> u64 {
        self.chain
            .read()
            .expect("Failed to acquire read lock on chain - this should never happen")
            .balance_of(&self.identity)
    }

    /// Whether this user already has a transfer waiting in the pool.
    pub fn has_pending_transfer(&self) -> bool {
        self.chain
            .read()
            .expect("Failed to acquire read lock on chain - this should never happen")
            .mempool_contains_sender(&self.identity)
    }

    /// Draft, sign, and broadcast a transfer of `amount` to `recipient`,
    /// leaving `fee` for the miner. Failures are logged and swallowed; a
    /// participant simply tries again later.
    pub fn send_to(&self, recipient: &Identity, amount: u64, fee: u64) {
        let drafted = {
            let chain = self
                .chain
                .read()
                .expect("Failed to acquire read lock on chain - this should never happen");
            chain.transfer(&self.identity, recipient, amount, fee)
        };
        let mut transaction = match drafted {
            Ok(transaction) => transaction,
            Err(err) => {
                error!("{} could not draft a transfer: {err}", self.identity);
                return;
            }
        };

        // Every selected input belongs to this user, so one key signs all
        // of them.
        let keys = vec![&self.key; transaction.inputs.len()];
        if let Err(err) = transaction.sign(&keys) {
            error!("{} could not sign a transfer: {err}", self.identity);
            return;
        }

        debug!("{transaction}");
        self.chain
            .write()
            .expect("Failed to acquire write lock on chain - this should never happen")
            .accept_broadcast(transaction);
        info!(
            "user {} sends {} to {}",
            self.identity,
            format_amount(amount),
            recipient
        );
    }
}
