//! Monetary units
//!
//! Values travel through the system as unsigned integers in indivisible
//! subunits; one coin is 1,000 subunits. The block reward is a fixed
//! constant, not a config knob: validation and block assembly must agree on
//! it, so it lives here where both read it.

/// Number of subunits in one coin
pub const SUBUNITS_PER_COIN: u64 = 1_000;

/// Base reward minted by every block's reward transaction (100 coins).
/// A miner may raise the reward output above this by the fees collected in
/// the block body, never more.
pub const BASE_BLOCK_REWARD: u64 = 100 * SUBUNITS_PER_COIN;

/// Format a subunit amount as a human-readable coin string
///
/// # Examples
/// ```
/// use pocketcoin::core::monetary::format_amount;
/// assert_eq!(format_amount(100_000), "100.000 coins");
/// assert_eq!(format_amount(1_500), "1.500 coins");
/// ```
pub fn format_amount(subunits: u64) -> String {
    format!(
        "{}.{:03} coins",
        subunits / SUBUNITS_PER_COIN,
        subunits % SUBUNITS_PER_COIN
    )
}
