use std::collections::HashMap;

use crate::core::{Hash, Identity, Transaction};

/// Pending broadcast transactions ( K -> transaction hash, V -> Transaction ).
///
/// A broadcast that collides on its hash replaces the stored one: last
/// writer wins. The pool is a plain map; the ledger that owns it is the
/// synchronization point for all access.
pub struct Mempool {
    inner: HashMap<Hash, Transaction>,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    pub fn new() -> Mempool {
        Mempool {
            inner: HashMap::new(),
        }
    }

    pub fn get(&self, tx_hash: &Hash) -> Option<&Transaction> {
        self.inner.get(tx_hash)
    }

    pub fn add(&mut self, transaction: Transaction) {
        self.inner.insert(transaction.hash(), transaction);
    }

    pub fn contains(&self, tx_hash: &Hash) -> bool {
        self.inner.contains_key(tx_hash)
    }

    pub fn remove(&mut self, tx_hash: &Hash) -> Option<Transaction> {
        self.inner.remove(tx_hash)
    }

    /// True while any pending transaction names this sender
    pub fn contains_sender(&self, sender: &Identity) -> bool {
        self.inner
            .values()
            .any(|tx| tx.sender.as_ref() == Some(sender))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get_all(&self) -> Vec<Transaction> {
        self.inner.values().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}
