use std::env;
use std::str::FromStr;
use std::sync::RwLock;

use log::warn;
use once_cell::sync::Lazy;

use crate::core::difficulty::{
    Difficulty, DifficultyStrategy, FixedWindowDifficulty, MovingAverageDifficulty,
};

pub static GLOBAL_SETTINGS: Lazy<Settings> = Lazy::new(Settings::new);

const TARGET_BLOCK_INTERVAL_MS_KEY: &str = "TARGET_BLOCK_INTERVAL_MS";
const DIFFICULTY_STRATEGY_KEY: &str = "DIFFICULTY_STRATEGY";
const DIFFICULTY_PROBABILITY_KEY: &str = "DIFFICULTY_PROBABILITY";
const RETARGET_WINDOW_KEY: &str = "RETARGET_WINDOW";
const RSA_KEY_BITS_KEY: &str = "RSA_KEY_BITS";
const MINING_PAUSE_MS_KEY: &str = "MINING_PAUSE_MS";
const SIM_USERS_KEY: &str = "SIM_USERS";
const TRADING_PAUSE_MS_KEY: &str = "TRADING_PAUSE_MS";

const DEFAULT_TARGET_BLOCK_INTERVAL_MS: u64 = 10_000;
const DEFAULT_DIFFICULTY_STRATEGY: DifficultyStrategy = DifficultyStrategy::MovingAverage;
/// Per-attempt success probability the initial threshold is derived from
const DEFAULT_DIFFICULTY_PROBABILITY: f64 = 0.2;
const DEFAULT_RETARGET_WINDOW: usize = 16;
const DEFAULT_RSA_KEY_BITS: usize = 1024;
const DEFAULT_MINING_PAUSE_MS: u64 = 1_000;
const DEFAULT_SIM_USERS: usize = 4;
const DEFAULT_TRADING_PAUSE_MS: u64 = 500;

struct SettingsState {
    target_block_interval_ms: u64,
    difficulty_strategy: DifficultyStrategy,
    difficulty_probability: f64,
    retarget_window: usize,
    rsa_key_bits: usize,
    mining_pause_ms: u64,
    sim_users: usize,
    trading_pause_ms: u64,
}

/// Node settings, seeded from the environment and adjustable afterwards
/// so command-line flags can override individual values.
pub struct Settings {
    inner: RwLock<SettingsState>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    pub fn new() -> Settings {
        let state = SettingsState {
            target_block_interval_ms: env_parsed(
                TARGET_BLOCK_INTERVAL_MS_KEY,
                DEFAULT_TARGET_BLOCK_INTERVAL_MS,
            ),
            difficulty_strategy: env_strategy(DEFAULT_DIFFICULTY_STRATEGY),
            difficulty_probability: env_parsed(
                DIFFICULTY_PROBABILITY_KEY,
                DEFAULT_DIFFICULTY_PROBABILITY,
            ),
            retarget_window: env_parsed(RETARGET_WINDOW_KEY, DEFAULT_RETARGET_WINDOW),
            rsa_key_bits: env_parsed(RSA_KEY_BITS_KEY, DEFAULT_RSA_KEY_BITS),
            mining_pause_ms: env_parsed(MINING_PAUSE_MS_KEY, DEFAULT_MINING_PAUSE_MS),
            sim_users: env_parsed(SIM_USERS_KEY, DEFAULT_SIM_USERS),
            trading_pause_ms: env_parsed(TRADING_PAUSE_MS_KEY, DEFAULT_TRADING_PAUSE_MS),
        };

        Settings {
            inner: RwLock::new(state),
        }
    }

    pub fn get_target_block_interval_ms(&self) -> u64 {
        self.read().target_block_interval_ms
    }

    pub fn set_target_block_interval_ms(&self, interval_ms: u64) {
        self.write().target_block_interval_ms = interval_ms;
    }

    pub fn get_difficulty_strategy(&self) -> DifficultyStrategy {
        self.read().difficulty_strategy
    }

    pub fn set_difficulty_strategy(&self, strategy: DifficultyStrategy) {
        self.write().difficulty_strategy = strategy;
    }

    pub fn get_difficulty_probability(&self) -> f64 {
        self.read().difficulty_probability
    }

    pub fn set_difficulty_probability(&self, probability: f64) {
        self.write().difficulty_probability = probability;
    }

    pub fn get_retarget_window(&self) -> usize {
        self.read().retarget_window
    }

    pub fn set_retarget_window(&self, window: usize) {
        self.write().retarget_window = window;
    }

    pub fn get_rsa_key_bits(&self) -> usize {
        self.read().rsa_key_bits
    }

    pub fn set_rsa_key_bits(&self, bits: usize) {
        self.write().rsa_key_bits = bits;
    }

    pub fn get_mining_pause_ms(&self) -> u64 {
        self.read().mining_pause_ms
    }

    pub fn set_mining_pause_ms(&self, pause_ms: u64) {
        self.write().mining_pause_ms = pause_ms;
    }

    pub fn get_sim_users(&self) -> usize {
        self.read().sim_users
    }

    pub fn set_sim_users(&self, users: usize) {
        self.write().sim_users = users;
    }

    pub fn get_trading_pause_ms(&self) -> u64 {
        self.read().trading_pause_ms
    }

    pub fn set_trading_pause_ms(&self, pause_ms: u64) {
        self.write().trading_pause_ms = pause_ms;
    }

    /// Build the difficulty engine the current settings describe.
    pub fn build_difficulty(&self) -> Box<dyn Difficulty> {
        let state = self.read();
        match state.difficulty_strategy {
            DifficultyStrategy::FixedWindow => Box::new(FixedWindowDifficulty::new(
                state.target_block_interval_ms,
                state.difficulty_probability,
            )),
            DifficultyStrategy::MovingAverage => Box::new(MovingAverageDifficulty::new(
                state.target_block_interval_ms,
                state.difficulty_probability,
                state.retarget_window,
            )),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SettingsState> {
        self.inner
            .read()
            .expect("Failed to acquire read lock on settings - this should never happen")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SettingsState> {
        self.inner
            .write()
            .expect("Failed to acquire write lock on settings - this should never happen")
    }
}

fn env_parsed<T: FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("ignoring unparseable {key}={raw}");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_strategy(default: DifficultyStrategy) -> DifficultyStrategy {
    match env::var(DIFFICULTY_STRATEGY_KEY) {
        Ok(raw) => match raw.to_lowercase().as_str() {
            "fixed-window" => DifficultyStrategy::FixedWindow,
            "moving-average" => DifficultyStrategy::MovingAverage,
            _ => {
                warn!("ignoring unknown {DIFFICULTY_STRATEGY_KEY}={raw}");
                default
            }
        },
        Err(_) => default,
    }
}
