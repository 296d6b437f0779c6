//! Participant identities
//!
//! An identity is the raw RSA public key material of a participant. There is
//! no derived address form: outputs name their owner by the key itself, and
//! signature checks rebuild the verifying key from these bytes.

use std::fmt;

use data_encoding::HEXLOWER;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};

use crate::error::{BlockchainError, Result};

/// A participant identity: public exponent plus big-endian modulus.
///
/// Equality and hashing cover exactly this key material, which lets
/// identities key the address index. The modulus carries no leading zero
/// bytes, the same form the canonical codec emits. The default value is an
/// unassigned placeholder used for freshly allocated transaction slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identity {
    exponent: u32,
    modulus: Vec<u8>,
}

impl Identity {
    pub fn new(exponent: u32, modulus: Vec<u8>) -> Self {
        Identity { exponent, modulus }
    }

    /// Extracts the identity from an RSA public key.
    ///
    /// Fails if the public exponent is wider than 32 bits; standard
    /// exponents (65537) fit comfortably.
    pub fn from_public_key(key: &RsaPublicKey) -> Result<Self> {
        let exponent_bytes = key.e().to_bytes_be();
        if exponent_bytes.len() > 4 {
            return Err(BlockchainError::Crypto(format!(
                "public exponent is {} bytes, expected at most 4",
                exponent_bytes.len()
            )));
        }
        let exponent = exponent_bytes
            .iter()
            .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte));
        Ok(Identity {
            exponent,
            modulus: key.n().to_bytes_be(),
        })
    }

    /// Reassembles the RSA public key for signature verification
    pub fn to_public_key(&self) -> Result<RsaPublicKey> {
        let key = RsaPublicKey::new(
            BigUint::from_bytes_be(&self.modulus),
            BigUint::from(self.exponent),
        )?;
        Ok(key)
    }

    pub fn exponent(&self) -> u32 {
        self.exponent
    }

    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// Hex tail of the modulus, used wherever logs name a participant
    pub fn short_id(&self) -> String {
        let tail_start = self.modulus.len().saturating_sub(3);
        HEXLOWER.encode(&self.modulus[tail_start..])
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id:{}", self.short_id())
    }
}
