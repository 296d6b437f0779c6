//! Command-line interface
//!
//! Argument parsing for the node binary and its simulation mode.

pub mod commands;

pub use commands::{Command, DifficultyStrategyArg, Opt};
