//! Configuration management
//!
//! This module handles the runtime settings of the node: difficulty
//! tuning, key sizes and simulation knobs, seeded from the environment
//! and adjustable from the command line.

pub mod settings;

pub use settings::{Settings, GLOBAL_SETTINGS};
