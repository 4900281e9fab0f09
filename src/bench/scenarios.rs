//! The packaged benchmark scenarios
//!
//! Three ways of growing the input tables, all driven by the same
//! [`GrowingBenchmarkDriver`]: the bigger table grows while the smaller
//! stays fixed, the smaller table grows under a set of fixed row ratios,
//! or both tables grow in lockstep. Each scenario produces one run record
//! with a table per sorted/unsorted combination of the two inputs.

use serde_json::Value;

use crate::results::{BenchmarkResults, Cell};
use crate::table::join::JoinFunction;
use crate::util::time::measurement_timestamp;
use crate::Result;

use super::driver::{column_names, DriverState, GrowingBenchmarkDriver, RowSpec, StopPolicy};
use super::settings::BenchSettings;

/// Row counts and ratios grow by powers of ten
pub const GROWTH_BASE: u64 = 10;

/// Smallest `n` with `base^n >= starting_point`
pub fn next_whole_exponent(base: u64, starting_point: u64) -> u32 {
    debug_assert!(base >= 2);
    let mut exponent = 0u32;
    let mut power = 1u64;
    while power < starting_point {
        power = power.saturating_mul(base);
        exponent += 1;
    }
    exponent
}

/// All powers `base^i` with `starting_point <= base^i <= stopping_point`
pub fn exponent_sequence(base: u64, starting_point: u64, stopping_point: u64) -> Vec<u64> {
    let mut out = Vec::new();
    let mut current = base.checked_pow(next_whole_exponent(base, starting_point));
    while let Some(value) = current {
        if value > stopping_point {
            break;
        }
        out.push(value);
        current = value.checked_mul(base);
    }
    out
}

/// Growth function `row -> base^(i + row)` with `base^i` the first power at
/// or above `starting_point`; `None` once the value overflows
pub fn exponential_growth(base: u64, starting_point: u64) -> impl Fn(usize) -> Option<u64> {
    let start_exponent = next_whole_exponent(base, starting_point);
    move |row| {
        let exponent = start_exponent.checked_add(u32::try_from(row).ok()?)?;
        base.checked_pow(exponent)
    }
}

/// The three packaged scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Both tables always have the same row count and it grows
    BothGrowEqually,
    /// The smaller table grows; one benchmark table per fixed row ratio
    SmallerTableGrows,
    /// The smaller table stays fixed while the row ratio grows
    BiggerTableGrows,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::BothGrowEqually,
        Scenario::SmallerTableGrows,
        Scenario::BiggerTableGrows,
    ];

    /// The run-record name
    pub fn name(self) -> &'static str {
        match self {
            Scenario::BothGrowEqually => {
                "Benchmark tables, where both tables are the same size and just get more rows."
            }
            Scenario::SmallerTableGrows => {
                "Benchmark tables, where the smaller table grows and the ratio between the \
                 tables stays the same."
            }
            Scenario::BiggerTableGrows => {
                "Benchmark tables, where the smaller table stays at the same amount of rows \
                 and the bigger table keeps getting bigger."
            }
        }
    }

    fn varying_parameter(self) -> &'static str {
        match self {
            Scenario::BothGrowEqually | Scenario::SmallerTableGrows => "smallerTableAmountRows",
            Scenario::BiggerTableGrows => "ratioRows",
        }
    }
}

/// What a scenario run produced, for exit-code decisions in the binary
#[derive(Debug)]
pub struct ScenarioReport {
    pub results: BenchmarkResults,
    /// Measurement rows across all tables of the scenario
    pub rows_measured: u64,
    /// How many tables ended in `StoppedBudget`
    pub budget_stops: usize,
}

/// Run one scenario against the configured settings.
///
/// The same seed drives every table of the scenario, so each of the four
/// sorted/unsorted combinations sees identical inputs.
pub fn run_scenario(
    scenario: Scenario,
    settings: &BenchSettings,
    hash_join: &JoinFunction,
    merge_join: &JoinFunction,
) -> Result<ScenarioReport> {
    let mut results = BenchmarkResults::new(scenario.name());
    write_run_metadata(&mut results, settings, scenario)?;

    let mut report = ScenarioReport {
        results,
        rows_measured: 0,
        budget_stops: 0,
    };

    let overlap = settings.overlap_chance();
    let smaller_columns = settings.smaller_table_columns();
    let bigger_columns = settings.bigger_table_columns();
    let smaller_sample_ratio = settings.smaller_sample_ratio();
    let bigger_sample_ratio = settings.bigger_sample_ratio();

    for smaller_sorted in [false, true] {
        for bigger_sorted in [false, true] {
            match scenario {
                Scenario::BiggerTableGrows => {
                    let smaller_rows = settings.smaller_table_rows();
                    let growth = exponential_growth(
                        GROWTH_BASE,
                        settings.min_bigger_table_rows() / smaller_rows.max(1),
                    );
                    run_one_table(
                        &mut report,
                        settings,
                        format!(
                            "Smaller table stays at {smaller_rows} rows, ratio to rows of \
                             bigger table grows."
                        ),
                        "Row ratio",
                        smaller_sorted,
                        bigger_sorted,
                        move |row| {
                            let ratio = growth(row)?;
                            Some(RowSpec {
                                varying: Cell::Count(ratio),
                                overlap,
                                ratio_rows: ratio,
                                smaller_rows,
                                smaller_columns,
                                bigger_columns,
                                smaller_sample_ratio,
                                bigger_sample_ratio,
                            })
                        },
                        hash_join,
                        merge_join,
                    )?;
                }
                Scenario::SmallerTableGrows => {
                    for ratio in exponent_sequence(
                        GROWTH_BASE,
                        settings.min_ratio_rows(),
                        settings.max_ratio_rows(),
                    ) {
                        let growth = exponential_growth(
                            GROWTH_BASE,
                            settings.min_bigger_table_rows() / ratio.max(1),
                        );
                        run_one_table(
                            &mut report,
                            settings,
                            format!(
                                "The amount of rows in the smaller table grows and the ratio, \
                                 to the amount of rows in the bigger table, stays at {ratio}."
                            ),
                            "Amount of rows in the smaller table",
                            smaller_sorted,
                            bigger_sorted,
                            move |row| {
                                let smaller_rows = growth(row)?;
                                Some(RowSpec {
                                    varying: Cell::Count(smaller_rows),
                                    overlap,
                                    ratio_rows: ratio,
                                    smaller_rows,
                                    smaller_columns,
                                    bigger_columns,
                                    smaller_sample_ratio,
                                    bigger_sample_ratio,
                                })
                            },
                            hash_join,
                            merge_join,
                        )?;
                    }
                }
                Scenario::BothGrowEqually => {
                    let growth =
                        exponential_growth(GROWTH_BASE, settings.min_bigger_table_rows());
                    run_one_table(
                        &mut report,
                        settings,
                        "Both tables always have the same amount of rows and that amount grows."
                            .to_string(),
                        "Amount of rows",
                        smaller_sorted,
                        bigger_sorted,
                        move |row| {
                            let rows = growth(row)?;
                            Some(RowSpec {
                                varying: Cell::Count(rows),
                                overlap,
                                ratio_rows: 1,
                                smaller_rows: rows,
                                smaller_columns,
                                bigger_columns,
                                smaller_sample_ratio,
                                bigger_sample_ratio,
                            })
                        },
                        hash_join,
                        merge_join,
                    )?;
                }
            }
        }
    }

    Ok(report)
}

#[allow(clippy::too_many_arguments)]
fn run_one_table(
    report: &mut ScenarioReport,
    settings: &BenchSettings,
    table_name: String,
    parameter_name: &str,
    smaller_sorted: bool,
    bigger_sorted: bool,
    params: impl FnMut(usize) -> Option<RowSpec>,
    hash_join: &JoinFunction,
    merge_join: &JoinFunction,
) -> Result<()> {
    let bigger_cap = settings.max_memory_bigger_table()?;
    let stop = StopPolicy {
        max_time: settings.max_time(),
        max_memory_smaller: Some(bigger_cap),
        max_memory_bigger: Some(bigger_cap),
        max_memory_join: settings.max_memory()?,
    };

    let table = report
        .results
        .add_table(table_name, vec![], column_names(parameter_name));
    table
        .metadata_mut()
        .insert("smallerTableSorted".to_string(), Value::from(smaller_sorted));
    table
        .metadata_mut()
        .insert("biggerTableSorted".to_string(), Value::from(bigger_sorted));

    let mut driver = GrowingBenchmarkDriver::new(
        settings.random_seed()?,
        smaller_sorted,
        bigger_sorted,
        stop,
        hash_join,
        merge_join,
    );
    let state = driver.run(table, params)?;

    report.rows_measured += table.num_rows() as u64;
    if state == DriverState::StoppedBudget {
        report.budget_stops += 1;
    }
    Ok(())
}

/// Run-level metadata: the varying parameter, the fixed inputs, and the
/// externally set budgets with `"infinite"` standing in for their `0`
/// encodings.
fn write_run_metadata(
    results: &mut BenchmarkResults,
    settings: &BenchSettings,
    scenario: Scenario,
) -> Result<()> {
    let seed = settings.random_seed()?.value();
    let max_time = settings.max_time();
    let max_memory = settings.max_memory()?;

    let meta = results.metadata_mut();
    meta.insert("date".to_string(), Value::from(measurement_timestamp()));
    meta.insert(
        "Value changing with every row".to_string(),
        Value::from(scenario.varying_parameter()),
    );
    meta.insert(
        "overlapChance".to_string(),
        Value::from(settings.overlap_chance()),
    );
    meta.insert("randomSeed".to_string(), Value::from(seed));
    meta.insert(
        "smallerTableAmountColumns".to_string(),
        Value::from(settings.smaller_table_columns() as u64),
    );
    meta.insert(
        "biggerTableAmountColumns".to_string(),
        Value::from(settings.bigger_table_columns() as u64),
    );
    match scenario {
        Scenario::BiggerTableGrows => {
            meta.insert(
                "smallerTableAmountRows".to_string(),
                Value::from(settings.smaller_table_rows()),
            );
        }
        Scenario::BothGrowEqually => {
            meta.insert("ratioRows".to_string(), Value::from(1u64));
        }
        Scenario::SmallerTableGrows => {}
    }
    meta.insert(
        "maxTimeSingleMeasurement".to_string(),
        max_time.map_or_else(|| Value::from("infinite"), Value::from),
    );
    meta.insert(
        "maxMemory".to_string(),
        max_memory.map_or_else(|| Value::from("infinite"), |m| Value::from(m.bytes())),
    );
    Ok(())
}
