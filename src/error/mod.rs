//! Error handling for the ledger
//!
//! Every way a transaction, block, or transfer can be rejected gets its own
//! variant so callers can react to the exact failure instead of a catch-all.

use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Errors produced by ledger, transaction, and mining operations
#[derive(Debug, Clone, Error)]
pub enum BlockchainError {
    /// Key generation, signing, or verification plumbing failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),
    /// Signing keys or owner identities do not line up with inputs
    #[error("Arity mismatch: {keys} keys for {inputs} inputs")]
    ArityMismatch { keys: usize, inputs: usize },
    /// A signature did not verify against the owner of the spent output
    #[error("Bad signature on input {input}")]
    BadSignature { input: usize },
    /// Structural block problems: linkage, index, reward shape
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    /// The same output is spent twice within one block
    #[error("Duplicate input: {0} spent twice in one block")]
    DuplicateInput(String),
    /// An input references an output that is not in the live UTXO set
    #[error("Unknown UTXO: {0}")]
    UnknownUtxo(String),
    /// A transaction creates more value than it consumes
    #[error("Outputs exceed inputs: {outputs} out of {inputs}")]
    OutputsExceedInputs { inputs: u64, outputs: u64 },
    /// The reward output claims more than base reward plus fees
    #[error("Reward too high: claimed {claimed}, allowed {allowed}")]
    RewardTooHigh { claimed: u64, allowed: u64 },
    /// A candidate block is older than the chain head
    #[error("Non-monotonic timestamp: candidate {candidate} behind head {head}")]
    NonMonotonicTimestamp { candidate: u64, head: u64 },
    /// The block hash does not meet the difficulty threshold
    #[error("Insufficient work: block hash misses the difficulty threshold")]
    InsufficientWork,
    /// Internal indexes disagree. Not attacker-inducible; callers should
    /// treat the ledger as unusable.
    #[error("Ledger corrupted: {0}")]
    Corrupted(String),
    /// Transfers of zero are meaningless and rejected up front
    #[error("Transfer amount must be greater than zero")]
    ZeroAmount,
    /// Insufficient funds for a transfer
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },
}

impl From<rsa::Error> for BlockchainError {
    fn from(err: rsa::Error) -> Self {
        BlockchainError::Crypto(err.to_string())
    }
}
