use clap::{Parser, Subcommand};
use std::str::FromStr;

use crate::core::difficulty::DifficultyStrategy;

/// Difficulty strategy selection on the command line
#[derive(Debug, Clone, Copy)]
pub enum DifficultyStrategyArg {
    FixedWindow,
    MovingAverage,
}

impl FromStr for DifficultyStrategyArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed-window" | "fixed" => Ok(DifficultyStrategyArg::FixedWindow),
            "moving-average" | "moving" => Ok(DifficultyStrategyArg::MovingAverage),
            _ => Err(format!(
                "Invalid strategy: {s}. Valid options: fixed-window, moving-average"
            )),
        }
    }
}

impl std::fmt::Display for DifficultyStrategyArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DifficultyStrategyArg::FixedWindow => write!(f, "fixed-window"),
            DifficultyStrategyArg::MovingAverage => write!(f, "moving-average"),
        }
    }
}

impl From<DifficultyStrategyArg> for DifficultyStrategy {
    fn from(arg: DifficultyStrategyArg) -> Self {
        match arg {
            DifficultyStrategyArg::FixedWindow => DifficultyStrategy::FixedWindow,
            DifficultyStrategyArg::MovingAverage => DifficultyStrategy::MovingAverage,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "pocketcoin")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(
        name = "simulate",
        about = "Run a single-node mining and trading simulation"
    )]
    Simulate {
        #[arg(long = "users", help = "Number of trading users to spawn")]
        users: Option<usize>,
        #[arg(
            long = "blocks",
            help = "Stop after this many mined blocks (default: run forever)"
        )]
        blocks: Option<u64>,
        #[arg(
            long = "strategy",
            help = "Difficulty strategy (fixed-window, moving-average)"
        )]
        strategy: Option<DifficultyStrategyArg>,
        #[arg(
            long = "interval-ms",
            help = "Target spacing between blocks in milliseconds"
        )]
        interval_ms: Option<u64>,
        #[arg(
            long = "probability",
            help = "Initial per-attempt success probability, in (0, 1)"
        )]
        probability: Option<f64>,
        #[arg(
            long = "window",
            help = "Retarget window for the moving-average strategy"
        )]
        window: Option<usize>,
        #[arg(
            long = "pause-ms",
            help = "Pause between nonce attempts in milliseconds"
        )]
        pause_ms: Option<u64>,
    },
}
