use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::core::{Hash, Identity};
use crate::utils;

/// Compound key naming one unspent output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtxoKey {
    pub tx_hash: Hash,
    pub output_index: u32,
}

impl UtxoKey {
    pub fn new(tx_hash: Hash, output_index: u32) -> UtxoKey {
        UtxoKey {
            tx_hash,
            output_index,
        }
    }
}

impl fmt::Display for UtxoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "utxo:{}:{}",
            utils::short_hex(&self.tx_hash),
            self.output_index
        )
    }
}

/// The live output set together with its per-owner view.
///
/// The owner index is denormalized from the live set; every insert and
/// remove touches both in the same call so the two can never drift. Owner
/// entries survive emptying: a registered identity keeps its (possibly
/// empty) entry.
pub struct UtxoSet {
    live: HashSet<UtxoKey>,
    by_owner: HashMap<Identity, HashSet<UtxoKey>>,
}

impl Default for UtxoSet {
    fn default() -> Self {
        Self::new()
    }
}

impl UtxoSet {
    pub fn new() -> UtxoSet {
        UtxoSet {
            live: HashSet::new(),
            by_owner: HashMap::new(),
        }
    }

    pub fn contains(&self, key: &UtxoKey) -> bool {
        self.live.contains(key)
    }

    /// Marks an output live and credits it to its owner
    pub fn insert(&mut self, key: UtxoKey, owner: &Identity) {
        self.live.insert(key);
        self.by_owner.entry(owner.clone()).or_default().insert(key);
    }

    /// Consumes an output, removing it from both views
    pub fn remove(&mut self, key: &UtxoKey, owner: &Identity) {
        self.live.remove(key);
        if let Some(owned) = self.by_owner.get_mut(owner) {
            owned.remove(key);
        }
    }

    /// Ensures the owner has an (empty) entry; never clears an existing one
    pub fn register_owner(&mut self, owner: Identity) {
        self.by_owner.entry(owner).or_default();
    }

    pub fn owned_by(&self, owner: &Identity) -> Option<&HashSet<UtxoKey>> {
        self.by_owner.get(owner)
    }

    pub fn is_owner_known(&self, owner: &Identity) -> bool {
        self.by_owner.contains_key(owner)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
