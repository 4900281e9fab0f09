//! joinbench CLI entry point

use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;

use joinbench::bench::scenarios::{run_scenario, Scenario};
use joinbench::bench::settings::BenchSettings;
use joinbench::config::cli::{Cli, ScenarioName};
use joinbench::config::{merge_trees, shorthand, ConfigError};
use joinbench::output::json as json_output;
use joinbench::table::join::{hash_join, sorted_merge_join};

const EXIT_INVALID_CONFIG: u8 = 2;
const EXIT_VALIDATOR_FAILED: u8 = 3;
const EXIT_BUDGET_EXHAUSTED: u8 = 4;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn exit_code_for(error: &ConfigError) -> ExitCode {
    match error {
        ConfigError::ValidatorFailed { .. } => ExitCode::from(EXIT_VALIDATOR_FAILED),
        _ => ExitCode::from(EXIT_INVALID_CONFIG),
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut settings = BenchSettings::new()?;

    // Collect configuration from both front ends into one tree; the
    // shorthand is merged second and wins on conflicting leaves.
    let mut tree = serde_json::Value::Object(serde_json::Map::new());
    if let Some(path) = &cli.config_json {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read configuration file {}", path.display()))?;
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(parsed) => merge_trees(&mut tree, parsed),
            Err(error) => {
                eprintln!("error: {} is not valid JSON: {error}", path.display());
                return Ok(ExitCode::from(EXIT_INVALID_CONFIG));
            }
        }
    }
    if let Some(input) = &cli.config_shorthand {
        match shorthand::parse(input) {
            Ok(parsed) => merge_trees(&mut tree, parsed),
            Err(error) => {
                eprintln!("error: {error}");
                return Ok(exit_code_for(&error));
            }
        }
    }

    let apply_start = Instant::now();
    match settings.manager_mut().apply_tree(&tree) {
        Ok(warnings) => {
            for warning in warnings {
                eprintln!("warning: {warning}");
            }
        }
        Err(error) => {
            eprintln!("error: {error}");
            return Ok(exit_code_for(&error));
        }
    }
    if cli.debug {
        eprintln!(
            "DEBUG TIMING: configuration: {:.3}s",
            apply_start.elapsed().as_secs_f64()
        );
    }

    if let Some(mode) = cli.print_config {
        println!("{}", settings.manager().documentation(mode.into()));
        return Ok(ExitCode::SUCCESS);
    }

    let scenarios: Vec<Scenario> = match cli.scenario {
        Some(ScenarioName::BiggerGrows) => vec![Scenario::BiggerTableGrows],
        Some(ScenarioName::SmallerGrows) => vec![Scenario::SmallerTableGrows],
        Some(ScenarioName::EqualGrowth) => vec![Scenario::BothGrowEqually],
        None => Scenario::ALL.to_vec(),
    };

    let mut runs = Vec::new();
    let mut rows_measured = 0u64;
    let mut budget_stops = 0usize;
    for scenario in scenarios {
        let scenario_start = Instant::now();
        let report = run_scenario(scenario, &settings, &hash_join, &sorted_merge_join)?;
        if cli.debug {
            eprintln!(
                "DEBUG TIMING: {}: {:.3}s, {} rows",
                report.results.name(),
                scenario_start.elapsed().as_secs_f64(),
                report.rows_measured
            );
        }
        rows_measured += report.rows_measured;
        budget_stops += report.budget_stops;
        runs.push(report.results);
    }

    if rows_measured == 0 && budget_stops > 0 {
        eprintln!("error: the configured budgets were exhausted before any row was measured");
        return Ok(ExitCode::from(EXIT_BUDGET_EXHAUSTED));
    }

    match &cli.out {
        Some(path) => {
            json_output::write_to_path(path, &runs)?;
            println!("Results written to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            json_output::write_json(stdout.lock(), &runs)?;
            println!();
        }
    }
    Ok(ExitCode::SUCCESS)
}
