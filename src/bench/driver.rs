//! The growing-table benchmark driver
//!
//! For every row of a benchmark table the driver synthesises two randomly
//! filled [`IdTable`]s, times a hash join against a sort + merge/galloping
//! join under identical conditions, and records the timings, the result
//! cardinality and the derived speed-up. Rows keep getting added until the
//! row-parameter source is exhausted, a measurement exceeds the time cap,
//! or the projected memory of the next row exceeds a memory cap.
//!
//! All randomness derives from a single seed through [`SeedFactory`]s, so a
//! run is reproducible: for a fixed seed the synthesised tables, overlap
//! injections and join invocations form one deterministic sequence.

use std::collections::HashSet;

use anyhow::ensure;

use crate::results::{ratio_or_zero, Cell, ResultTable};
use crate::table::join::JoinFunction;
use crate::table::IdTable;
use crate::util::memory::{MemoryError, MemorySize};
use crate::util::random::{
    shuffle, FastIntStream, RandomSeed, SeedFactory, UniformDoubleStream, UniformIntStream,
};
use crate::Result;

/// The join column is always the first column of both tables
pub const JOIN_COLUMN: usize = 0;

/// Approximation basis for table memory: one 64-bit id per cell
pub const BYTES_PER_CELL: u64 = 8;

// Benchmark table column layout.
pub const COL_PARAM: usize = 0;
pub const COL_SORT_TIME: usize = 1;
pub const COL_MERGE_JOIN_TIME: usize = 2;
pub const COL_SORT_PLUS_MERGE_TIME: usize = 3;
pub const COL_HASH_JOIN_TIME: usize = 4;
pub const COL_RESULT_ROWS: usize = 5;
pub const COL_SPEEDUP: usize = 6;

/// Column headers for a benchmark table; column 0 carries the varying
/// parameter and is named by the caller
pub fn column_names(parameter_name: &str) -> Vec<String> {
    vec![
        parameter_name.to_string(),
        "Time for sorting".to_string(),
        "Merge/galloping join".to_string(),
        "Sorting + merge/galloping join".to_string(),
        "Hash join".to_string(),
        "Rows in the join result".to_string(),
        "Speedup of the hash join".to_string(),
    ]
}

/// Approximate the memory an `IdTable` of the given shape takes up
pub fn approximate_table_memory(rows: u64, columns: usize) -> Result<MemorySize, MemoryError> {
    let cells = rows
        .checked_mul(columns as u64)
        .ok_or(MemoryError::Overflow)?;
    let bytes = cells.checked_mul(BYTES_PER_CELL).ok_or(MemoryError::Overflow)?;
    MemorySize::from_bytes(bytes)
}

/// The complete parameter set for one benchmark row
///
/// Exactly one of these parameters varies from row to row; the scenario's
/// row-parameter closure decides which, and `varying` carries the value
/// recorded in column 0.
#[derive(Debug, Clone)]
pub struct RowSpec {
    /// Recorded in the table's parameter column
    pub varying: Cell,
    /// Chance in percent for a smaller-table row to receive a join value
    /// copied from the bigger table; 0 disables overlap injection
    pub overlap: f64,
    /// Rows of the bigger table divided by rows of the smaller table
    pub ratio_rows: u64,
    pub smaller_rows: u64,
    pub smaller_columns: usize,
    pub bigger_columns: usize,
    /// Scales the join-column sample range of the smaller table
    pub smaller_sample_ratio: f64,
    /// Scales the join-column sample range of the bigger table
    pub bigger_sample_ratio: f64,
}

impl RowSpec {
    pub fn bigger_rows(&self) -> u64 {
        self.smaller_rows.saturating_mul(self.ratio_rows)
    }

    pub fn smaller_memory(&self) -> Result<MemorySize, MemoryError> {
        approximate_table_memory(self.smaller_rows, self.smaller_columns)
    }

    pub fn bigger_memory(&self) -> Result<MemorySize, MemoryError> {
        approximate_table_memory(self.bigger_rows(), self.bigger_columns)
    }

    /// Columns of the join result: both inputs minus the shared join column
    pub fn joined_columns(&self) -> usize {
        self.smaller_columns + self.bigger_columns - 1
    }
}

/// Budget caps evaluated by the stop predicate; `None` means unlimited
#[derive(Debug, Clone, Default)]
pub struct StopPolicy {
    /// Cap on any single measured duration, in seconds
    pub max_time: Option<f64>,
    pub max_memory_smaller: Option<MemorySize>,
    pub max_memory_bigger: Option<MemorySize>,
    /// Checked against the join result of the row just produced; the joined
    /// size cannot be known before running the join
    pub max_memory_join: Option<MemorySize>,
}

/// Driver state, per benchmark table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Ready,
    Running,
    /// The row-parameter source was exhausted
    StoppedOk,
    /// A time or memory budget was reached
    StoppedBudget,
    /// A join function failed; rows measured so far remain valid
    StoppedError,
}

/// Grows one benchmark table row by row until the stop policy triggers
pub struct GrowingBenchmarkDriver<'a> {
    smaller_sorted: bool,
    bigger_sorted: bool,
    seeds: SeedFactory,
    stop: StopPolicy,
    hash_join: &'a JoinFunction,
    merge_join: &'a JoinFunction,
    state: DriverState,
}

impl<'a> GrowingBenchmarkDriver<'a> {
    pub fn new(
        seed: RandomSeed,
        smaller_sorted: bool,
        bigger_sorted: bool,
        stop: StopPolicy,
        hash_join: &'a JoinFunction,
        merge_join: &'a JoinFunction,
    ) -> Self {
        Self {
            smaller_sorted,
            bigger_sorted,
            seeds: SeedFactory::new(seed),
            stop,
            hash_join,
            merge_join,
            state: DriverState::Ready,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Fill `table` with measurement rows.
    ///
    /// `params` yields the parameter set for each row index; `None` ends
    /// the table in `StoppedOk`. Memory caps for a row are checked before
    /// anything is allocated, so a first row that is already over budget
    /// leaves the table empty. A join error is returned as-is, with the
    /// rows measured before it preserved in the table.
    pub fn run(
        &mut self,
        table: &mut ResultTable,
        mut params: impl FnMut(usize) -> Option<RowSpec>,
    ) -> Result<DriverState> {
        self.state = DriverState::Ready;
        loop {
            let row = table.num_rows();
            let Some(spec) = params(row) else {
                self.state = DriverState::StoppedOk;
                break;
            };

            // Memory caps are enforced at row start, before allocation.
            if memory_exceeds(spec.smaller_memory(), self.stop.max_memory_smaller)
                || memory_exceeds(spec.bigger_memory(), self.stop.max_memory_bigger)
            {
                self.state = DriverState::StoppedBudget;
                break;
            }

            self.state = DriverState::Running;
            table.add_row();
            table.set_cell(row, COL_PARAM, spec.varying.clone())?;
            let result_rows = match self.measure_row(table, row, &spec) {
                Ok(rows) => rows,
                Err(error) => {
                    self.state = DriverState::StoppedError;
                    return Err(error);
                }
            };

            // Derived columns for this row.
            let sort_time = table.get_float(row, COL_SORT_TIME)?;
            let merge_time = table.get_float(row, COL_MERGE_JOIN_TIME)?;
            let hash_time = table.get_float(row, COL_HASH_JOIN_TIME)?;
            let sort_plus_merge = sort_time + merge_time;
            table.set_cell(row, COL_SORT_PLUS_MERGE_TIME, Cell::Float(sort_plus_merge))?;
            table.set_cell(
                row,
                COL_SPEEDUP,
                Cell::Float(ratio_or_zero(sort_plus_merge, hash_time)),
            )?;

            // Stop predicate: measured times of this row, then the join
            // result's memory. The joined size is only knowable after the
            // join ran, so its cap is checked against this row instead of a
            // projection for the next one.
            if let Some(max_time) = self.stop.max_time {
                if [sort_time, merge_time, hash_time].iter().any(|&t| t > max_time) {
                    self.state = DriverState::StoppedBudget;
                    break;
                }
            }
            if memory_exceeds(
                approximate_table_memory(result_rows, spec.joined_columns()),
                self.stop.max_memory_join,
            ) {
                self.state = DriverState::StoppedBudget;
                break;
            }
        }
        Ok(self.state)
    }

    /// Steps 1-6 of the per-row algorithm: synthesise, inject overlap,
    /// pre-sort, and time the three measurements in hash / sort / merge
    /// order. Returns the join result cardinality.
    fn measure_row(&mut self, table: &mut ResultTable, row: usize, spec: &RowSpec) -> Result<u64> {
        // One child seed per concern, so the streams are decorrelated and
        // each row is independently reproducible.
        let mut fan = SeedFactory::new(self.seeds.next_seed());
        let [smaller_join_seed, smaller_fill_seed, bigger_join_seed, bigger_fill_seed, overlap_seed] =
            fan.seeds::<5>();

        // Join-column value ranges: the smaller table draws from the start
        // of the number line, the bigger table from the adjacent range, so
        // the tables only share join values when overlap injection runs.
        let smaller_hi = (spec.smaller_rows as f64 * spec.smaller_sample_ratio).floor() as i64 - 1;
        ensure!(smaller_hi >= 0, "the smaller table's join-column sample range is empty");
        let bigger_lo = smaller_hi + 1;
        let bigger_span =
            (spec.smaller_rows as f64 * spec.ratio_rows as f64 * spec.bigger_sample_ratio).floor() as i64;
        ensure!(bigger_span >= 1, "the bigger table's join-column sample range is empty");
        let bigger_hi = bigger_lo + bigger_span - 1;

        let mut smaller = synthesize_table(
            spec.smaller_rows,
            spec.smaller_columns,
            0,
            smaller_hi,
            smaller_join_seed,
            smaller_fill_seed,
        )?;
        let mut bigger = synthesize_table(
            spec.bigger_rows(),
            spec.bigger_columns,
            bigger_lo,
            bigger_hi,
            bigger_join_seed,
            bigger_fill_seed,
        )?;

        if spec.overlap > 0.0 {
            inject_overlap(&mut smaller, &bigger, spec.overlap, overlap_seed)?;
        }

        if self.smaller_sorted {
            smaller.sort_by_column(JOIN_COLUMN);
        }
        if self.bigger_sorted {
            bigger.sort_by_column(JOIN_COLUMN);
        }

        // Hash join first: the sort for the merge join would mutate the
        // inputs it has to see unsorted.
        let hash_join = self.hash_join;
        let joined =
            table.add_measurement(row, COL_HASH_JOIN_TIME, || {
                hash_join(&smaller, JOIN_COLUMN, &bigger, JOIN_COLUMN)
            })??;
        drop(joined);

        let (smaller_presorted, bigger_presorted) = (self.smaller_sorted, self.bigger_sorted);
        table.add_measurement(row, COL_SORT_TIME, || {
            if !smaller_presorted {
                smaller.sort_by_column(JOIN_COLUMN);
            }
            if !bigger_presorted {
                bigger.sort_by_column(JOIN_COLUMN);
            }
        })?;

        let merge_join = self.merge_join;
        let joined =
            table.add_measurement(row, COL_MERGE_JOIN_TIME, || {
                merge_join(&smaller, JOIN_COLUMN, &bigger, JOIN_COLUMN)
            })??;
        let result_rows = joined.num_rows() as u64;
        table.set_cell(row, COL_RESULT_ROWS, Cell::Count(result_rows))?;
        Ok(result_rows)
    }
}

fn memory_exceeds(size: Result<MemorySize, MemoryError>, cap: Option<MemorySize>) -> bool {
    match cap {
        None => false,
        // A size too large to even represent exceeds every finite cap.
        Some(cap) => size.map_or(true, |size| size > cap),
    }
}

/// Values for a join column: `rows` draws from the inclusive `[lo, hi]`.
///
/// Values are distinct whenever the range is large enough; when it is not,
/// the range is cycled so every value appears with minimal multiplicity.
/// This keeps join cardinalities exact: with a sample ratio of 1 each join
/// value of a table occurs exactly once.
fn join_column_values(rows: u64, lo: i64, hi: i64, seed: RandomSeed) -> Result<Vec<i64>> {
    ensure!(lo <= hi, "join-column value range [{lo}, {hi}] is empty");
    let rows_usize = usize::try_from(rows)?;
    let range_size = (hi as i128 - lo as i128 + 1) as u128;

    if range_size <= u128::from(rows) {
        let mut values = Vec::with_capacity(rows_usize);
        let mut next = lo;
        for _ in 0..rows {
            values.push(next);
            next = if next == hi { lo } else { next + 1 };
        }
        shuffle(&mut values, seed);
        return Ok(values);
    }

    if range_size <= u128::from(rows) * 2 {
        // Small surplus: shuffling the whole range is cheaper than
        // rejection sampling near full occupancy.
        let mut values: Vec<i64> = (lo..=hi).collect();
        shuffle(&mut values, seed);
        values.truncate(rows_usize);
        return Ok(values);
    }

    // The range is at least twice the row count, so rejection sampling
    // finds distinct values in expected linear time.
    let mut stream = UniformIntStream::new(lo, hi, seed)?;
    let mut seen = HashSet::with_capacity(rows_usize);
    let mut values = Vec::with_capacity(rows_usize);
    while values.len() < rows_usize {
        let value = stream.next_int();
        if seen.insert(value) {
            values.push(value);
        }
    }
    Ok(values)
}

/// Build a randomly filled table: the join column (column 0) draws from
/// `[lo, hi]`, all other columns from the full `i64` range.
pub fn synthesize_table(
    rows: u64,
    columns: usize,
    lo: i64,
    hi: i64,
    join_seed: RandomSeed,
    fill_seed: RandomSeed,
) -> Result<IdTable> {
    ensure!(columns >= 1, "a table needs at least one column");
    let join_values = join_column_values(rows, lo, hi, join_seed)?;
    let mut fill = FastIntStream::new(fill_seed);
    let mut out = IdTable::with_capacity(usize::try_from(rows)?, columns);
    let mut buf = vec![0i64; columns];
    for value in join_values {
        buf[JOIN_COLUMN] = value;
        for slot in buf.iter_mut().skip(1) {
            *slot = fill.next_int();
        }
        out.push_row(&buf);
    }
    Ok(out)
}

/// Overlap injection: every smaller-table row passes a Bernoulli draw with
/// probability `overlap/100`; on success its join value is overwritten with
/// the join value of a uniformly chosen bigger-table row.
fn inject_overlap(
    smaller: &mut IdTable,
    bigger: &IdTable,
    overlap: f64,
    seed: RandomSeed,
) -> Result<()> {
    ensure!(
        overlap > 0.0 && overlap <= 100.0,
        "overlap chance must be in (0, 100], got {overlap}"
    );
    ensure!(
        smaller.num_rows() <= bigger.num_rows(),
        "the smaller table must not have more rows than the bigger one"
    );
    if bigger.is_empty() {
        return Ok(());
    }

    let mut fan = SeedFactory::new(seed);
    let [row_seed, chance_seed] = fan.seeds::<2>();
    let mut random_row = UniformIntStream::new(0, bigger.num_rows() as i64 - 1, row_seed)?;
    let mut chance = UniformDoubleStream::new(0.0, 100.0, chance_seed);

    for row in 0..smaller.num_rows() {
        if chance.next_double() <= overlap {
            let source = random_row.next_int() as usize;
            smaller.set(row, JOIN_COLUMN, bigger.get(source, JOIN_COLUMN));
        }
    }
    Ok(())
}
