//! Utility functions and helpers
//!
//! This module contains the cryptographic primitives used throughout
//! the chain: hashing, RSA signatures and wall-clock timestamps.

pub mod crypto;

pub use crypto::{
    current_timestamp_ms, new_key_pair, sha256_digest, short_hex, sign_message, verify_signature,
};
