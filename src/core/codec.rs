//! Canonical byte encoding
//!
//! Every hash and signing payload in the system is produced by these
//! helpers, so the byte layout is reproducible everywhere: fixed-width
//! big-endian integers, no framing, no varints. Decoding does not exist;
//! payloads are only ever built and digested.

use crate::core::identity::Identity;

/// Width of a SHA-256 digest in bytes
pub const HASH_SIZE: usize = 32;

/// A SHA-256 digest
pub type Hash = [u8; HASH_SIZE];

/// 256-bit mining nonce held as four 64-bit words.
///
/// Word 0 is the word a miner increments during the nonce search; the
/// remaining words stay zero in practice but are encoded and hashed anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Nonce([u64; 4]);

impl Nonce {
    pub fn words(&self) -> &[u64; 4] {
        &self.0
    }

    /// The word the miner increments
    pub fn low_word(&self) -> u64 {
        self.0[0]
    }
}

impl From<u64> for Nonce {
    fn from(word: u64) -> Self {
        Nonce([word, 0, 0, 0])
    }
}

/// Appends a u32 in big-endian byte order
pub fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Appends a u64 in big-endian byte order
pub fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Appends an identity: public exponent (u32), modulus length (u32), then
/// the big-endian modulus bytes
pub fn put_identity(out: &mut Vec<u8>, identity: &Identity) {
    put_u32(out, identity.exponent());
    put_u32(out, identity.modulus().len() as u32);
    out.extend_from_slice(identity.modulus());
}

/// Appends a 256-bit nonce as four u64 big-endian words in array order
pub fn put_nonce(out: &mut Vec<u8>, nonce: &Nonce) {
    for word in nonce.words() {
        put_u64(out, *word);
    }
}
