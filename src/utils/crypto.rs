use data_encoding::HEXLOWER;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};

use crate::core::{Hash, Identity};
use crate::error::{BlockchainError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn current_timestamp_ms() -> Result<u64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BlockchainError::Crypto(format!("System time error: {e}")))?
        .as_millis();

    // Ensure the timestamp fits in u64
    if duration > u64::MAX as u128 {
        return Err(BlockchainError::Crypto("Timestamp overflow".to_string()));
    }

    Ok(duration as u64)
}

pub fn sha256_digest(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Short hex tail of a digest for log lines
pub fn short_hex(bytes: &[u8]) -> String {
    let tail_start = bytes.len().saturating_sub(3);
    HEXLOWER.encode(&bytes[tail_start..])
}

pub fn new_key_pair(bits: usize) -> Result<RsaPrivateKey> {
    let mut rng = rand::thread_rng();
    RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to generate RSA key pair: {e}")))
}

/// Signs a message with RSA PKCS#1 v1.5 over its SHA-256 digest.
///
/// Hash-then-sign with a deterministic padding scheme, so signing the same
/// payload twice yields identical bytes.
pub fn sign_message(key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>> {
    let digest = sha256_digest(message);
    key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to sign message: {e}")))
}

/// Verifies an RSA PKCS#1 v1.5 signature over the SHA-256 digest of the
/// message. Returns false on any mismatch, including unusable key material.
pub fn verify_signature(identity: &Identity, message: &[u8], signature: &[u8]) -> bool {
    let Ok(public_key) = identity.to_public_key() else {
        return false;
    };
    let digest = sha256_digest(message);
    public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        .is_ok()
}
