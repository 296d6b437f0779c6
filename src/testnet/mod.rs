//! Test support for ledger scenarios
//!
//! This module provides deterministic building blocks for tests:
//! permissive difficulty stand-ins, small throwaway key pairs and
//! helpers that seal blocks without mining.

pub mod test_utils;

pub use test_utils::*;
