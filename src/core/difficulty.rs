use std::collections::VecDeque;
use std::fmt;

use data_encoding::HEXLOWER;
use log::{debug, warn};
use num_bigint::BigUint;

use crate::core::codec::{Hash, HASH_SIZE};

/// Number of bits in a block hash
const HASH_BITS: usize = HASH_SIZE * 8;

/// Retargeting strategy behind block acceptance.
///
/// Difficulty is a 256-bit threshold: a hash meets it when, read as a
/// big-endian number, it is at most the threshold. Smaller threshold,
/// harder search. The ledger calls `update` once per accepted block with
/// the spacing to its predecessor; the strategy decides how to retarget.
pub trait Difficulty: fmt::Display + Send + Sync {
    /// Does this hash meet the current threshold?
    fn reach(&self, hash: &Hash) -> bool;

    /// Observe the spacing of the latest accepted block and retarget
    fn update(&mut self, elapsed_ms: u64);
}

/// Which retargeting strategy a node runs. Picked once at startup; the
/// ledger only ever sees the boxed trait object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifficultyStrategy {
    FixedWindow,
    MovingAverage,
}

impl fmt::Display for DifficultyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifficultyStrategy::FixedWindow => write!(f, "fixed-window"),
            DifficultyStrategy::MovingAverage => write!(f, "moving-average"),
        }
    }
}

/// Expands a per-attempt success probability in (0, 1) into a threshold:
/// the fraction of the maximum hash value, one base-256 digit at a time.
fn threshold_from_probability(mut probability: f64) -> BigUint {
    let mut digits = [0u8; HASH_SIZE];
    for digit in digits.iter_mut() {
        let whole = (probability * 256.0) as u8;
        *digit = whole;
        probability = probability * 256.0 - f64::from(whole);
    }
    BigUint::from_bytes_be(&digits)
}

fn hash_to_int(hash: &Hash) -> BigUint {
    BigUint::from_bytes_be(hash)
}

/// 2^256, the unit relating thresholds and expected work
fn work_unit() -> BigUint {
    BigUint::from(1u32) << HASH_BITS
}

/// Expected number of attempts to land a hash at or under the threshold.
/// True integer division both ways keeps the precision loss symmetric.
fn threshold_to_work(threshold: &BigUint) -> BigUint {
    work_unit() / clamp_nonzero(threshold.clone())
}

fn work_to_threshold(work: &BigUint) -> BigUint {
    work_unit() / clamp_nonzero(work.clone())
}

/// Division guard; zero only appears with degenerate configurations
fn clamp_nonzero(value: BigUint) -> BigUint {
    if value == BigUint::from(0u32) {
        BigUint::from(1u32)
    } else {
        value
    }
}

fn format_threshold(threshold: &BigUint) -> String {
    let bytes = threshold.to_bytes_be();
    if bytes.len() < HASH_SIZE {
        let mut padded = vec![0u8; HASH_SIZE - bytes.len()];
        padded.extend_from_slice(&bytes);
        HEXLOWER.encode(&padded)
    } else {
        HEXLOWER.encode(&bytes)
    }
}

/// Retargets after every block by scaling the threshold linearly with the
/// observed spacing: one fast block makes the next search harder in the
/// same proportion.
pub struct FixedWindowDifficulty {
    target_interval_ms: u64,
    threshold: BigUint,
}

impl FixedWindowDifficulty {
    pub fn new(target_interval_ms: u64, success_probability: f64) -> Self {
        FixedWindowDifficulty {
            // zero target would make every retarget divide by zero
            target_interval_ms: target_interval_ms.max(1),
            threshold: threshold_from_probability(success_probability),
        }
    }

    pub fn threshold(&self) -> &BigUint {
        &self.threshold
    }
}

impl Difficulty for FixedWindowDifficulty {
    fn reach(&self, hash: &Hash) -> bool {
        hash_to_int(hash) <= self.threshold
    }

    /// `threshold' = threshold * elapsed / target`, in big-integer
    /// arithmetic. A block landing exactly on target leaves the threshold
    /// alone; a same-timestamp block collapses it to zero.
    fn update(&mut self, elapsed_ms: u64) {
        self.threshold = (&self.threshold * elapsed_ms) / self.target_interval_ms;
        debug!(
            "fixed-window retarget after {elapsed_ms} ms: threshold {}",
            format_threshold(&self.threshold)
        );
    }
}

impl fmt::Display for FixedWindowDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fixed-window difficulty (target {} ms, threshold {})",
            self.target_interval_ms,
            format_threshold(&self.threshold)
        )
    }
}

struct WorkSample {
    elapsed_ms: u64,
    work: BigUint,
}

/// Smooths retargeting over a FIFO window of recent block spacings.
///
/// Each accepted block contributes a sample of its spacing and the work
/// implied by the threshold it was mined against. Nothing retargets until
/// the window holds `window` samples; from then on every block sets
/// `threshold = 2^256 / (Σwork * target / Σelapsed)`.
pub struct MovingAverageDifficulty {
    target_interval_ms: u64,
    window: usize,
    samples: VecDeque<WorkSample>,
    threshold: BigUint,
}

impl MovingAverageDifficulty {
    pub fn new(target_interval_ms: u64, success_probability: f64, window: usize) -> Self {
        let window = window.max(1);
        MovingAverageDifficulty {
            target_interval_ms: target_interval_ms.max(1),
            window,
            samples: VecDeque::with_capacity(window + 1),
            threshold: threshold_from_probability(success_probability),
        }
    }

    pub fn threshold(&self) -> &BigUint {
        &self.threshold
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl Difficulty for MovingAverageDifficulty {
    fn reach(&self, hash: &Hash) -> bool {
        hash_to_int(hash) <= self.threshold
    }

    fn update(&mut self, elapsed_ms: u64) {
        // the sample records the work the block was actually mined against
        self.samples.push_back(WorkSample {
            elapsed_ms,
            work: threshold_to_work(&self.threshold),
        });
        if self.samples.len() < self.window {
            return;
        }
        if self.samples.len() > self.window {
            self.samples.pop_front();
        }

        let total_elapsed: u64 = self.samples.iter().map(|s| s.elapsed_ms).sum();
        if total_elapsed == 0 {
            warn!("moving-average window spans zero time, keeping threshold");
            return;
        }
        let total_work = self
            .samples
            .iter()
            .fold(BigUint::from(0u32), |acc, s| acc + &s.work);

        let expected_work = (total_work * self.target_interval_ms) / total_elapsed;
        self.threshold = work_to_threshold(&expected_work);
        debug!(
            "moving-average retarget over {} samples ({total_elapsed} ms): threshold {}",
            self.samples.len(),
            format_threshold(&self.threshold)
        );
    }
}

impl fmt::Display for MovingAverageDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "moving-average difficulty (target {} ms, window {}, threshold {})",
            self.target_interval_ms,
            self.window,
            format_threshold(&self.threshold)
        )
    }
}
