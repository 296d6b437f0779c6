//! Transactions
//!
//! A transaction consumes previous outputs through its inputs and creates
//! new outputs owned by recipient identities. Two byte payloads matter: the
//! signing payload, which every input signs and which excludes signatures,
//! and the hash payload, which includes them and backs the transaction hash.
//! The hash is therefore stable only after signing.

use std::fmt;

use rsa::RsaPrivateKey;
use uuid::Uuid;

use crate::core::codec::{self, Hash};
use crate::core::identity::Identity;
use crate::error::{BlockchainError, Result};
use crate::utils;

/// One spend of a previous output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionInput {
    /// Hash of the transaction holding the spent output
    pub prev_tx_hash: Hash,
    /// Position of the spent output within that transaction
    pub output_index: u32,
    /// RSA PKCS#1 v1.5 signature over the signing payload; empty until signed
    pub signature: Vec<u8>,
}

/// One newly created output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOutput {
    pub value: u64,
    pub owner: Identity,
}

/// A transfer of value from spent outputs to new outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Local identifier for diagnostics; never part of any payload
    pub id: String,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    /// Filled by the transfer builder; mempool metadata, never hashed
    pub sender: Option<Identity>,
}

impl Transaction {
    /// Allocates a transaction with the given arity. Slots start
    /// default-initialized; the caller assigns references, values, and
    /// owners before signing.
    pub fn new(input_count: usize, output_count: usize) -> Self {
        Transaction {
            id: Uuid::new_v4().simple().to_string(),
            inputs: vec![TransactionInput::default(); input_count],
            outputs: vec![TransactionOutput::default(); output_count],
            sender: None,
        }
    }

    /// Payload covered by input signatures.
    ///
    /// Per input: output index then previous transaction hash. Per output:
    /// value then encoded owner. Signatures are excluded so signing and
    /// verifying see identical bytes.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        for input in &self.inputs {
            codec::put_u32(&mut payload, input.output_index);
            payload.extend_from_slice(&input.prev_tx_hash);
        }
        for output in &self.outputs {
            codec::put_u64(&mut payload, output.value);
            codec::put_identity(&mut payload, &output.owner);
        }
        payload
    }

    /// Payload behind the transaction hash: the signing payload with each
    /// input's signature appended right after its previous-transaction hash.
    pub fn hash_payload(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        for input in &self.inputs {
            codec::put_u32(&mut payload, input.output_index);
            payload.extend_from_slice(&input.prev_tx_hash);
            payload.extend_from_slice(&input.signature);
        }
        for output in &self.outputs {
            codec::put_u64(&mut payload, output.value);
            codec::put_identity(&mut payload, &output.owner);
        }
        payload
    }

    /// The transaction's identity in the ledger: SHA-256 of the hash payload
    pub fn hash(&self) -> Hash {
        utils::sha256_digest(&self.hash_payload())
    }

    /// Signs every input, one key per input in input order. All inputs sign
    /// the same payload; key i's signature lands in input i. Re-signing
    /// overwrites and, with this deterministic scheme, reproduces the same
    /// bytes.
    pub fn sign(&mut self, keys: &[&RsaPrivateKey]) -> Result<()> {
        if keys.len() != self.inputs.len() {
            return Err(BlockchainError::ArityMismatch {
                keys: keys.len(),
                inputs: self.inputs.len(),
            });
        }
        let payload = self.signing_payload();
        for (input, key) in self.inputs.iter_mut().zip(keys) {
            input.signature = utils::sign_message(key, &payload)?;
        }
        Ok(())
    }

    /// Checks every input's signature against the owner of the output it
    /// spends, one owner per input in input order. Stops at the first
    /// failure, naming the offending input.
    pub fn verify(&self, owners: &[&Identity]) -> Result<()> {
        if owners.len() != self.inputs.len() {
            return Err(BlockchainError::ArityMismatch {
                keys: owners.len(),
                inputs: self.inputs.len(),
            });
        }
        let payload = self.signing_payload();
        for (position, (input, owner)) in self.inputs.iter().zip(owners).enumerate() {
            if !utils::verify_signature(owner, &payload, &input.signature) {
                return Err(BlockchainError::BadSignature { input: position });
            }
        }
        Ok(())
    }

    /// Sum of all output values
    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|output| output.value).sum()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tx:{} ({} in, {} out, {})",
            utils::short_hex(&self.hash()),
            self.inputs.len(),
            self.outputs.len(),
            crate::core::monetary::format_amount(self.total_output_value())
        )
    }
}
