//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use super::DocMode;

/// Documentation mode for `--print-config`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PrintMode {
    /// JSON-shaped overview with current values
    Brief,
    /// Overview plus one block per option with kind, default and validators
    Detailed,
}

impl From<PrintMode> for DocMode {
    fn from(mode: PrintMode) -> Self {
        match mode {
            PrintMode::Brief => DocMode::Brief,
            PrintMode::Detailed => DocMode::Detailed,
        }
    }
}

/// The packaged benchmark scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioName {
    /// Smaller table constant, bigger table grows
    BiggerGrows,
    /// Smaller table grows, row ratio constant (one table per ratio)
    SmallerGrows,
    /// Both tables grow equally
    EqualGrowth,
}

/// joinbench - benchmark harness for relational join algorithms
#[derive(Parser, Debug)]
#[command(name = "joinbench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON configuration file (the root must be an object)
    #[arg(long, value_name = "PATH")]
    pub config_json: Option<PathBuf>,

    /// Inline configuration shorthand, e.g. "ratioRows=10; overlapChance=42.0;"
    ///
    /// May be combined with --config-json; the shorthand wins on conflicts.
    #[arg(long, value_name = "SHORTHAND")]
    pub config_shorthand: Option<String>,

    /// Print the configuration documentation and exit
    #[arg(long, value_enum, value_name = "MODE", num_args = 0..=1, default_missing_value = "brief")]
    pub print_config: Option<PrintMode>,

    /// Where to write the results JSON (default: stdout)
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Run only the named scenario (default: all three)
    #[arg(long, value_enum)]
    pub scenario: Option<ScenarioName>,

    /// Print timing diagnostics to stderr
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
