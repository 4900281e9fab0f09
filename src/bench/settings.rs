//! Benchmark configuration options
//!
//! Registers every tunable of the join benchmark with a [`ConfigManager`]
//! and wires up the cross-option validators. The raw option values encode
//! `0` as "infinite" for the time and memory budgets; the getter methods
//! decode that into `Option`s so the rest of the code never sees the
//! convention.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::{ConfigError, ConfigManager, ValidatorResult};
use crate::util::memory::{MemoryError, MemorySize};
use crate::util::random::{RandomError, RandomSeed};

use super::driver::approximate_table_memory;

/// Smallest `minBiggerTableRows` that yields interesting measurements
pub const MIN_BIGGER_TABLE_ROWS_DEFAULT: u64 = 100_000;

/// The benchmark's options, bound to one shared registry
pub struct BenchSettings {
    manager: ConfigManager,
    smaller_table_rows: Rc<RefCell<u64>>,
    min_bigger_table_rows: Rc<RefCell<u64>>,
    max_bigger_table_rows: Rc<RefCell<u64>>,
    smaller_table_columns: Rc<RefCell<u64>>,
    bigger_table_columns: Rc<RefCell<u64>>,
    overlap_chance: Rc<RefCell<f64>>,
    smaller_sample_ratio: Rc<RefCell<f64>>,
    bigger_sample_ratio: Rc<RefCell<f64>>,
    random_seed: Rc<RefCell<u64>>,
    ratio_rows: Rc<RefCell<u64>>,
    min_ratio_rows: Rc<RefCell<u64>>,
    max_ratio_rows: Rc<RefCell<u64>>,
    max_memory: Rc<RefCell<String>>,
    max_time_single_measurement: Rc<RefCell<f64>>,
}

fn at_least_u64(minimum: u64, message: String) -> impl Fn(&u64) -> ValidatorResult {
    move |&value| {
        if value >= minimum {
            Ok(())
        } else {
            Err(message.clone())
        }
    }
}

fn less_equal_u64(message: String) -> impl Fn(&u64, &u64) -> ValidatorResult {
    move |&lower, &upper| {
        if lower <= upper {
            Ok(())
        } else {
            Err(message.clone())
        }
    }
}

/// Checks that `maxMemory` (unless 0, which means unlimited) is big enough
/// for at least one row of a table with the given column count.
fn max_memory_fits_one_row(
    max_memory: &str,
    table_name: &str,
    columns: u64,
) -> ValidatorResult {
    let max_memory = MemorySize::parse(max_memory).map_err(|error| error.to_string())?;
    if max_memory.is_zero() {
        return Ok(());
    }
    let needed =
        approximate_table_memory(1, columns as usize).map_err(|error| error.to_string())?;
    if needed <= max_memory {
        Ok(())
    } else {
        Err(format!(
            "'maxMemory' ({max_memory}) must be big enough for at least one row in the \
             {table_name}, which requires at least {needed}."
        ))
    }
}

impl BenchSettings {
    /// Build the option registry with the benchmark's defaults and
    /// validators. The `randomSeed` default is a fresh non-deterministic
    /// value on every construction.
    pub fn new() -> Result<Self, ConfigError> {
        let smaller_table_rows = Rc::new(RefCell::new(0u64));
        let min_bigger_table_rows = Rc::new(RefCell::new(0u64));
        let max_bigger_table_rows = Rc::new(RefCell::new(0u64));
        let smaller_table_columns = Rc::new(RefCell::new(0u64));
        let bigger_table_columns = Rc::new(RefCell::new(0u64));
        let overlap_chance = Rc::new(RefCell::new(0.0f64));
        let smaller_sample_ratio = Rc::new(RefCell::new(0.0f64));
        let bigger_sample_ratio = Rc::new(RefCell::new(0.0f64));
        let random_seed = Rc::new(RefCell::new(0u64));
        let ratio_rows = Rc::new(RefCell::new(0u64));
        let min_ratio_rows = Rc::new(RefCell::new(0u64));
        let max_ratio_rows = Rc::new(RefCell::new(0u64));
        let max_memory = Rc::new(RefCell::new(String::new()));
        let max_time_single_measurement = Rc::new(RefCell::new(0.0f64));

        let mut manager = ConfigManager::new();

        let smaller_rows = manager.add_option(
            "smallerTableAmountRows",
            "Amount of rows for the smaller table, when it keeps the same amount in every row.",
            &smaller_table_rows,
            Some(1000u64),
        )?;
        let min_bigger_rows = manager.add_option(
            "minBiggerTableRows",
            "Minimum amount of rows for the bigger table.",
            &min_bigger_table_rows,
            Some(MIN_BIGGER_TABLE_ROWS_DEFAULT),
        )?;
        let max_bigger_rows = manager.add_option(
            "maxBiggerTableRows",
            "Maximum amount of rows for the bigger table.",
            &max_bigger_table_rows,
            Some(10_000_000u64),
        )?;
        let smaller_columns = manager.add_option(
            "smallerTableAmountColumns",
            "Amount of columns in the smaller table.",
            &smaller_table_columns,
            Some(20u64),
        )?;
        let bigger_columns = manager.add_option(
            "biggerTableAmountColumns",
            "Amount of columns in the bigger table.",
            &bigger_table_columns,
            Some(20u64),
        )?;
        let overlap = manager.add_option(
            "overlapChance",
            "Chance in percent for a join-column entry of the smaller table to be overwritten \
             with a join-column entry of the bigger table. Must be in the range (0, 100].",
            &overlap_chance,
            Some(42.0f64),
        )?;
        let smaller_ratio = manager.add_option(
            "smallerTableJoinColumnSampleSizeRatio",
            "Scales the number of distinct values the smaller table's join column draws from: \
             sample size = amount of rows times this ratio. Affects the chance of duplicates.",
            &smaller_sample_ratio,
            Some(1.0f64),
        )?;
        let bigger_ratio = manager.add_option(
            "biggerTableJoinColumnSampleSizeRatio",
            "Scales the number of distinct values the bigger table's join column draws from: \
             sample size = amount of rows times this ratio. Affects the chance of duplicates.",
            &bigger_sample_ratio,
            Some(1.0f64),
        )?;
        let seed = manager.add_option(
            "randomSeed",
            "Seed for the random generators. The default is a non-deterministic value that \
             changes with every execution.",
            &random_seed,
            Some(u64::from(rand::random::<u32>())),
        )?;
        let ratio = manager.add_option(
            "ratioRows",
            "Row ratio between the tables: amount of rows in the bigger table divided by the \
             amount of rows in the smaller table.",
            &ratio_rows,
            Some(10u64),
        )?;
        let min_ratio = manager.add_option(
            "minRatioRows",
            "Minimum row ratio between the smaller and the bigger table.",
            &min_ratio_rows,
            Some(10u64),
        )?;
        let max_ratio = manager.add_option(
            "maxRatioRows",
            "Maximum row ratio between the smaller and the bigger table.",
            &max_ratio_rows,
            Some(1000u64),
        )?;
        let memory = manager.add_option(
            "maxMemory",
            "Maximum amount of memory a single table is allowed to take up. '0 B' for \
             unlimited memory. Examples: 4 KB, 8 MB, 24 B.",
            &max_memory,
            Some("0 B".to_string()),
        )?;
        let max_time = manager.add_option(
            "maxTimeSingleMeasurement",
            "Maximum time in seconds a single measurement is allowed to take. 0 for unlimited \
             time. Note: this can only be checked after a measurement was taken.",
            &max_time_single_measurement,
            Some(0.0f64),
        )?;

        // 'maxMemory' must leave room for at least one row everywhere.
        manager.add_validator2(
            "'maxMemory' must be big enough for at least one row in the smaller table.",
            memory,
            smaller_columns,
            |max_memory: &String, &columns| {
                max_memory_fits_one_row(max_memory, "smaller table", columns)
            },
        );
        manager.add_validator2(
            "'maxMemory' must be big enough for at least one row in the bigger table.",
            memory,
            bigger_columns,
            |max_memory: &String, &columns| {
                max_memory_fits_one_row(max_memory, "bigger table", columns)
            },
        );
        manager.add_validator3(
            "'maxMemory' must be big enough for at least one row in the result of joining the \
             smaller and bigger table.",
            memory,
            smaller_columns,
            bigger_columns,
            |max_memory: &String, &smaller, &bigger| {
                max_memory_fits_one_row(
                    max_memory,
                    "result of joining the smaller and bigger table",
                    (smaller + bigger).saturating_sub(1),
                )
            },
        );

        manager.add_validator1(
            "'smallerTableAmountRows' must be at least 1.",
            smaller_rows,
            at_least_u64(1, "'smallerTableAmountRows' must be at least 1.".to_string()),
        );
        manager.add_validator2(
            "'smallerTableAmountRows' must be smaller than, or equal to, 'minBiggerTableRows'.",
            smaller_rows,
            min_bigger_rows,
            less_equal_u64(
                "'smallerTableAmountRows' must be smaller than, or equal to, \
                 'minBiggerTableRows'."
                    .to_string(),
            ),
        );
        manager.add_validator1(
            format!(
                "'minBiggerTableRows' must be at least {MIN_BIGGER_TABLE_ROWS_DEFAULT}; \
                 interesting measurements only start to turn up at that point."
            ),
            min_bigger_rows,
            at_least_u64(
                MIN_BIGGER_TABLE_ROWS_DEFAULT,
                format!(
                    "'minBiggerTableRows' is too small. Interesting measurement values only \
                     start to turn up at {MIN_BIGGER_TABLE_ROWS_DEFAULT} rows, or more."
                ),
            ),
        );
        manager.add_validator2(
            "'minBiggerTableRows' must be smaller than, or equal to, 'maxBiggerTableRows'.",
            min_bigger_rows,
            max_bigger_rows,
            less_equal_u64(
                "'minBiggerTableRows' must be smaller than, or equal to, 'maxBiggerTableRows'."
                    .to_string(),
            ),
        );
        manager.add_validator1(
            "'smallerTableAmountColumns' must be at least 1.",
            smaller_columns,
            at_least_u64(1, "'smallerTableAmountColumns' must be at least 1.".to_string()),
        );
        manager.add_validator1(
            "'biggerTableAmountColumns' must be at least 1.",
            bigger_columns,
            at_least_u64(1, "'biggerTableAmountColumns' must be at least 1.".to_string()),
        );
        manager.add_validator1(
            "'overlapChance' must be in the range (0, 100].",
            overlap,
            |&chance: &f64| {
                if chance > 0.0 && chance <= 100.0 {
                    Ok(())
                } else {
                    Err("'overlapChance' must be in the range (0, 100].".to_string())
                }
            },
        );
        manager.add_validator1(
            "'smallerTableJoinColumnSampleSizeRatio' must be bigger than 0.",
            smaller_ratio,
            |&ratio: &f64| {
                if ratio > 0.0 {
                    Ok(())
                } else {
                    Err("'smallerTableJoinColumnSampleSizeRatio' must be bigger than 0."
                        .to_string())
                }
            },
        );
        manager.add_validator1(
            "'biggerTableJoinColumnSampleSizeRatio' must be bigger than 0.",
            bigger_ratio,
            |&ratio: &f64| {
                if ratio > 0.0 {
                    Ok(())
                } else {
                    Err("'biggerTableJoinColumnSampleSizeRatio' must be bigger than 0."
                        .to_string())
                }
            },
        );
        manager.add_validator1(
            format!(
                "'randomSeed' must be smaller than, or equal to, {}.",
                RandomSeed::MAX
            ),
            seed,
            |&seed: &u64| {
                RandomSeed::new(seed)
                    .map(|_| ())
                    .map_err(|error| error.to_string())
            },
        );
        manager.add_validator1(
            "'maxTimeSingleMeasurement' must be bigger than, or equal to, 0.",
            max_time,
            |&time: &f64| {
                if time >= 0.0 {
                    Ok(())
                } else {
                    Err("'maxTimeSingleMeasurement' must be bigger than, or equal to, 0."
                        .to_string())
                }
            },
        );
        manager.add_validator1(
            "'ratioRows' must be at least 10.",
            ratio,
            at_least_u64(10, "'ratioRows' must be at least 10.".to_string()),
        );
        manager.add_validator1(
            "'minRatioRows' must be at least 10.",
            min_ratio,
            at_least_u64(10, "'minRatioRows' must be at least 10.".to_string()),
        );
        manager.add_validator2(
            "'minRatioRows' must be smaller than, or equal to, 'maxRatioRows'.",
            min_ratio,
            max_ratio,
            less_equal_u64(
                "'minRatioRows' must be smaller than, or equal to, 'maxRatioRows'.".to_string(),
            ),
        );

        Ok(Self {
            manager,
            smaller_table_rows,
            min_bigger_table_rows,
            max_bigger_table_rows,
            smaller_table_columns,
            bigger_table_columns,
            overlap_chance,
            smaller_sample_ratio,
            bigger_sample_ratio,
            random_seed,
            ratio_rows,
            min_ratio_rows,
            max_ratio_rows,
            max_memory,
            max_time_single_measurement,
        })
    }

    pub fn manager(&self) -> &ConfigManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ConfigManager {
        &mut self.manager
    }

    pub fn smaller_table_rows(&self) -> u64 {
        *self.smaller_table_rows.borrow()
    }

    pub fn min_bigger_table_rows(&self) -> u64 {
        *self.min_bigger_table_rows.borrow()
    }

    pub fn max_bigger_table_rows(&self) -> u64 {
        *self.max_bigger_table_rows.borrow()
    }

    pub fn smaller_table_columns(&self) -> usize {
        *self.smaller_table_columns.borrow() as usize
    }

    pub fn bigger_table_columns(&self) -> usize {
        *self.bigger_table_columns.borrow() as usize
    }

    pub fn overlap_chance(&self) -> f64 {
        *self.overlap_chance.borrow()
    }

    pub fn smaller_sample_ratio(&self) -> f64 {
        *self.smaller_sample_ratio.borrow()
    }

    pub fn bigger_sample_ratio(&self) -> f64 {
        *self.bigger_sample_ratio.borrow()
    }

    pub fn ratio_rows(&self) -> u64 {
        *self.ratio_rows.borrow()
    }

    pub fn min_ratio_rows(&self) -> u64 {
        *self.min_ratio_rows.borrow()
    }

    pub fn max_ratio_rows(&self) -> u64 {
        *self.max_ratio_rows.borrow()
    }

    /// The validated random seed
    pub fn random_seed(&self) -> Result<RandomSeed, RandomError> {
        RandomSeed::new(*self.random_seed.borrow())
    }

    /// The per-measurement time cap; `None` when configured as 0
    pub fn max_time(&self) -> Option<f64> {
        let time = *self.max_time_single_measurement.borrow();
        (time != 0.0).then_some(time)
    }

    /// The memory cap for any single table; `None` when configured as "0 B"
    pub fn max_memory(&self) -> Result<Option<MemorySize>, MemoryError> {
        let parsed = MemorySize::parse(&self.max_memory.borrow())?;
        Ok((!parsed.is_zero()).then_some(parsed))
    }

    /// The memory cap applied to the smaller and bigger table: `maxMemory`
    /// when set, otherwise the approximate size of the largest allowed
    /// bigger table.
    pub fn max_memory_bigger_table(&self) -> Result<MemorySize, MemoryError> {
        match self.max_memory()? {
            Some(cap) => Ok(cap),
            None => approximate_table_memory(
                self.max_bigger_table_rows(),
                self.bigger_table_columns(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use serde_json::json;

    #[test]
    fn test_defaults_pass_an_empty_apply() {
        let mut settings = BenchSettings::new().unwrap();
        settings.manager_mut().apply_tree(&json!({})).unwrap();
        assert_eq!(settings.smaller_table_rows(), 1000);
        assert_eq!(settings.min_bigger_table_rows(), 100_000);
        assert_eq!(settings.max_bigger_table_rows(), 10_000_000);
        assert_eq!(settings.smaller_table_columns(), 20);
        assert_eq!(settings.bigger_table_columns(), 20);
        assert_eq!(settings.overlap_chance(), 42.0);
        assert_eq!(settings.ratio_rows(), 10);
        assert_eq!(settings.max_time(), None);
        assert_eq!(settings.max_memory().unwrap(), None);
    }

    #[test]
    fn test_shorthand_applies() {
        let mut settings = BenchSettings::new().unwrap();
        settings
            .manager_mut()
            .apply_shorthand(
                "smallerTableAmountRows=2000; overlapChance=75.5; randomSeed=42; \
                 maxMemory=\"8 MB\"; maxTimeSingleMeasurement=1.5;",
            )
            .unwrap();
        assert_eq!(settings.smaller_table_rows(), 2000);
        assert_eq!(settings.overlap_chance(), 75.5);
        assert_eq!(settings.random_seed().unwrap().value(), 42);
        assert_eq!(settings.max_time(), Some(1.5));
        assert_eq!(
            settings.max_memory().unwrap(),
            Some(MemorySize::megabytes(8).unwrap())
        );
    }

    #[test]
    fn test_max_memory_bigger_table_fallback() {
        let mut settings = BenchSettings::new().unwrap();
        settings.manager_mut().apply_tree(&json!({})).unwrap();
        // Unlimited maxMemory: fall back to the largest allowed bigger table.
        let fallback = settings.max_memory_bigger_table().unwrap();
        assert_eq!(fallback.bytes(), 10_000_000 * 20 * 8);

        settings
            .manager_mut()
            .apply_shorthand("maxMemory=\"4 MB\";")
            .unwrap();
        assert_eq!(
            settings.max_memory_bigger_table().unwrap(),
            MemorySize::megabytes(4).unwrap()
        );
    }

    #[test]
    fn test_validator_rejects_zero_rows() {
        let mut settings = BenchSettings::new().unwrap();
        let err = settings
            .manager_mut()
            .apply_shorthand("smallerTableAmountRows=0;")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidatorFailed { .. }));
        // Atomicity: the default survived.
        assert_eq!(settings.smaller_table_rows(), 1000);
    }

    #[test]
    fn test_validator_rejects_tiny_max_memory() {
        let mut settings = BenchSettings::new().unwrap();
        // 20 columns need 160 bytes per row; 100 B cannot hold one row.
        let err = settings
            .manager_mut()
            .apply_shorthand("maxMemory=\"100 B\";")
            .unwrap_err();
        match err {
            ConfigError::ValidatorFailed { message, .. } => {
                assert!(message.contains("maxMemory"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_validator_rejects_unparseable_max_memory() {
        let mut settings = BenchSettings::new().unwrap();
        assert!(settings
            .manager_mut()
            .apply_shorthand("maxMemory=\"lots\";")
            .is_err());
    }

    #[test]
    fn test_validator_rejects_ratio_inversion() {
        let mut settings = BenchSettings::new().unwrap();
        assert!(settings
            .manager_mut()
            .apply_shorthand("minRatioRows=100; maxRatioRows=20;")
            .is_err());
    }

    #[test]
    fn test_validator_rejects_overlap_out_of_range() {
        let mut settings = BenchSettings::new().unwrap();
        assert!(settings
            .manager_mut()
            .apply_shorthand("overlapChance=0.0;")
            .is_err());
        assert!(settings
            .manager_mut()
            .apply_shorthand("overlapChance=100.5;")
            .is_err());
    }

    #[test]
    fn test_validator_rejects_oversized_seed() {
        let mut settings = BenchSettings::new().unwrap();
        let err = settings
            .manager_mut()
            .apply_tree(&json!({"randomSeed": RandomSeed::MAX + 1}))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidatorFailed { .. }));
    }

    #[test]
    fn test_validator_rejects_small_min_bigger_rows() {
        let mut settings = BenchSettings::new().unwrap();
        assert!(settings
            .manager_mut()
            .apply_shorthand("minBiggerTableRows=50;")
            .is_err());
    }

    #[test]
    fn test_documentation_lists_all_options() {
        let settings = BenchSettings::new().unwrap();
        let doc = settings.manager().documentation(crate::config::DocMode::Detailed);
        for name in [
            "smallerTableAmountRows",
            "minBiggerTableRows",
            "maxBiggerTableRows",
            "smallerTableAmountColumns",
            "biggerTableAmountColumns",
            "overlapChance",
            "randomSeed",
            "ratioRows",
            "minRatioRows",
            "maxRatioRows",
            "maxMemory",
            "maxTimeSingleMeasurement",
        ] {
            assert!(doc.contains(name), "documentation misses {name}");
        }
    }
}
