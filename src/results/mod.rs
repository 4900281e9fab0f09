//! Benchmark measurement tables
//!
//! A [`ResultTable`] is a rectangular grid of measurements: every cell is a
//! wall-clock duration in seconds, a non-negative count, or a textual
//! label. Column headers are fixed at construction, rows are appended one
//! at a time, and a free-form metadata map travels with each table. The
//! [`BenchmarkResults`] container owns the tables of one benchmark run; it
//! is not mutated after the run completes.

use std::time::Instant;

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from table cell and column operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    /// A cell coordinate outside the table
    #[error("cell ({row}, {column}) is out of bounds for a table with {rows} rows and {columns} columns")]
    OutOfBounds {
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    },

    /// A typed read of a cell holding a different kind
    #[error("cell ({row}, {column}) holds {actual}, but {expected} was requested")]
    WrongType {
        row: usize,
        column: usize,
        expected: &'static str,
        actual: &'static str,
    },

    /// A column-level operation hit a row without the required operands
    #[error("column operation needs a duration in every row, but row {row} holds {actual} in column {column}")]
    ShapeMismatch {
        row: usize,
        column: usize,
        actual: &'static str,
    },
}

/// One measurement cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    /// Never written
    #[default]
    Empty,
    /// A wall-clock duration in seconds or a derived ratio
    Float(f64),
    /// A non-negative count
    Count(u64),
    /// A textual label
    Label(String),
}

impl Cell {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Cell::Empty => "an empty cell",
            Cell::Float(_) => "a duration",
            Cell::Count(_) => "a count",
            Cell::Label(_) => "a label",
        }
    }

    /// The persisted JSON form: number, integer, string or null
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Empty => Value::Null,
            Cell::Float(s) => Value::from(*s),
            Cell::Count(n) => Value::from(*n),
            Cell::Label(text) => Value::from(text.clone()),
        }
    }
}

/// Ratio with the table policy for degenerate denominators: non-positive
/// denominators yield 0.0 instead of infinities or NaN.
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// A named grid of measurements with fixed column headers
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    name: String,
    row_names: Vec<String>,
    column_names: Vec<String>,
    rows: Vec<Vec<Cell>>,
    metadata: Map<String, Value>,
}

impl ResultTable {
    /// Create an empty table. Row names are optional and may be empty even
    /// when rows are later appended.
    pub fn new(
        name: impl Into<String>,
        row_names: Vec<String>,
        column_names: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            row_names,
            column_names,
            rows: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.column_names.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn row_names(&self) -> &[String] {
        &self.row_names
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }

    /// Append an empty row; returns its index
    pub fn add_row(&mut self) -> usize {
        self.rows.push(vec![Cell::Empty; self.column_names.len()]);
        self.rows.len() - 1
    }

    fn check_bounds(&self, row: usize, column: usize) -> Result<(), TableError> {
        if row >= self.rows.len() || column >= self.column_names.len() {
            return Err(TableError::OutOfBounds {
                row,
                column,
                rows: self.rows.len(),
                columns: self.column_names.len(),
            });
        }
        Ok(())
    }

    /// Write a cell; rewriting a cell is allowed and idempotent
    pub fn set_cell(&mut self, row: usize, column: usize, cell: Cell) -> Result<(), TableError> {
        self.check_bounds(row, column)?;
        self.rows[row][column] = cell;
        Ok(())
    }

    pub fn cell(&self, row: usize, column: usize) -> Result<&Cell, TableError> {
        self.check_bounds(row, column)?;
        Ok(&self.rows[row][column])
    }

    /// Read a duration cell
    pub fn get_float(&self, row: usize, column: usize) -> Result<f64, TableError> {
        match self.cell(row, column)? {
            Cell::Float(s) => Ok(*s),
            other => Err(TableError::WrongType {
                row,
                column,
                expected: "a duration",
                actual: other.kind_name(),
            }),
        }
    }

    /// Read a count cell
    pub fn get_count(&self, row: usize, column: usize) -> Result<u64, TableError> {
        match self.cell(row, column)? {
            Cell::Count(n) => Ok(*n),
            other => Err(TableError::WrongType {
                row,
                column,
                expected: "a count",
                actual: other.kind_name(),
            }),
        }
    }

    /// Read a label cell
    pub fn get_label(&self, row: usize, column: usize) -> Result<&str, TableError> {
        match self.cell(row, column)? {
            Cell::Label(text) => Ok(text),
            other => Err(TableError::WrongType {
                row,
                column,
                expected: "a label",
                actual: other.kind_name(),
            }),
        }
    }

    /// Invoke `f` and store the elapsed wall-clock seconds in the cell.
    ///
    /// The elapsed time is recorded even when `f`'s own result is an error,
    /// so a caller that aborts afterwards leaves a consistent partial row.
    pub fn add_measurement<T>(
        &mut self,
        row: usize,
        column: usize,
        f: impl FnOnce() -> T,
    ) -> Result<T, TableError> {
        self.check_bounds(row, column)?;
        let start = Instant::now();
        let outcome = f();
        let elapsed = start.elapsed().as_secs_f64();
        self.rows[row][column] = Cell::Float(elapsed);
        Ok(outcome)
    }

    /// Cell-wise `dst = a + b` over duration columns
    pub fn sum_columns(&mut self, dst: usize, a: usize, b: usize) -> Result<(), TableError> {
        for row in 0..self.rows.len() {
            let lhs = self.require_seconds_for_column_op(row, a)?;
            let rhs = self.require_seconds_for_column_op(row, b)?;
            self.set_cell(row, dst, Cell::Float(lhs + rhs))?;
        }
        Ok(())
    }

    /// Cell-wise `dst = num / den` over duration columns, with 0.0 for
    /// non-positive denominators (see [`ratio_or_zero`])
    pub fn ratio_column(&mut self, dst: usize, num: usize, den: usize) -> Result<(), TableError> {
        for row in 0..self.rows.len() {
            let numerator = self.require_seconds_for_column_op(row, num)?;
            let denominator = self.require_seconds_for_column_op(row, den)?;
            self.set_cell(row, dst, Cell::Float(ratio_or_zero(numerator, denominator)))?;
        }
        Ok(())
    }

    fn require_seconds_for_column_op(&self, row: usize, column: usize) -> Result<f64, TableError> {
        match self.cell(row, column)? {
            Cell::Float(s) => Ok(*s),
            other => Err(TableError::ShapeMismatch {
                row,
                column,
                actual: other.kind_name(),
            }),
        }
    }
}

/// The tables and metadata of one benchmark run
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResults {
    name: String,
    metadata: Map<String, Value>,
    tables: Vec<ResultTable>,
}

impl BenchmarkResults {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: Map::new(),
            tables: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }

    /// Create a table owned by this run and return it for filling
    pub fn add_table(
        &mut self,
        name: impl Into<String>,
        row_names: Vec<String>,
        column_names: Vec<String>,
    ) -> &mut ResultTable {
        let index = self.tables.len();
        self.tables.push(ResultTable::new(name, row_names, column_names));
        &mut self.tables[index]
    }

    pub fn tables(&self) -> &[ResultTable] {
        &self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn table() -> ResultTable {
        ResultTable::new(
            "test",
            vec![],
            vec!["a".into(), "b".into(), "c".into()],
        )
    }

    #[test]
    fn test_add_row_and_cells() {
        let mut t = table();
        assert_eq!(t.num_rows(), 0);
        let row = t.add_row();
        assert_eq!(row, 0);
        assert_eq!(t.cell(0, 0).unwrap(), &Cell::Empty);

        t.set_cell(0, 0, Cell::Count(7)).unwrap();
        t.set_cell(0, 1, Cell::Float(1.5)).unwrap();
        t.set_cell(0, 2, Cell::Label("sorted".into())).unwrap();
        assert_eq!(t.get_count(0, 0).unwrap(), 7);
        assert_eq!(t.get_float(0, 1).unwrap(), 1.5);
        assert_eq!(t.get_label(0, 2).unwrap(), "sorted");

        // Rewriting a cell is allowed.
        t.set_cell(0, 0, Cell::Count(8)).unwrap();
        assert_eq!(t.get_count(0, 0).unwrap(), 8);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut t = table();
        assert!(matches!(
            t.set_cell(0, 0, Cell::Count(1)),
            Err(TableError::OutOfBounds { .. })
        ));
        t.add_row();
        assert!(matches!(
            t.cell(0, 3),
            Err(TableError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_typed_read_mismatch() {
        let mut t = table();
        t.add_row();
        t.set_cell(0, 0, Cell::Count(1)).unwrap();
        assert!(matches!(
            t.get_float(0, 0),
            Err(TableError::WrongType { .. })
        ));
        assert!(matches!(
            t.get_label(0, 0),
            Err(TableError::WrongType { .. })
        ));
    }

    #[test]
    fn test_add_measurement_records_elapsed() {
        let mut t = table();
        t.add_row();
        let value = t
            .add_measurement(0, 1, || {
                thread::sleep(Duration::from_millis(5));
                42
            })
            .unwrap();
        assert_eq!(value, 42);
        let elapsed = t.get_float(0, 1).unwrap();
        assert!(elapsed >= 0.004, "elapsed {elapsed} too small");
        assert!(elapsed < 1.0);
    }

    #[test]
    fn test_sum_columns() {
        let mut t = table();
        for i in 0..3 {
            t.add_row();
            t.set_cell(i, 0, Cell::Float(i as f64)).unwrap();
            t.set_cell(i, 1, Cell::Float(10.0)).unwrap();
        }
        t.sum_columns(2, 0, 1).unwrap();
        assert_eq!(t.get_float(2, 2).unwrap(), 12.0);
    }

    #[test]
    fn test_sum_columns_shape_mismatch() {
        let mut t = table();
        t.add_row();
        t.set_cell(0, 0, Cell::Float(1.0)).unwrap();
        // Column 1 stays empty.
        assert!(matches!(
            t.sum_columns(2, 0, 1),
            Err(TableError::ShapeMismatch { row: 0, column: 1, .. })
        ));
    }

    #[test]
    fn test_ratio_column_policy() {
        let mut t = table();
        t.add_row();
        t.set_cell(0, 0, Cell::Float(3.0)).unwrap();
        t.set_cell(0, 1, Cell::Float(2.0)).unwrap();
        t.ratio_column(2, 0, 1).unwrap();
        assert_eq!(t.get_float(0, 2).unwrap(), 1.5);

        // Non-positive denominators floor to zero.
        t.set_cell(0, 1, Cell::Float(0.0)).unwrap();
        t.ratio_column(2, 0, 1).unwrap();
        assert_eq!(t.get_float(0, 2).unwrap(), 0.0);
    }

    #[test]
    fn test_ratio_or_zero() {
        assert_eq!(ratio_or_zero(6.0, 3.0), 2.0);
        assert_eq!(ratio_or_zero(6.0, 0.0), 0.0);
        assert_eq!(ratio_or_zero(6.0, -1.0), 0.0);
    }

    #[test]
    fn test_metadata() {
        let mut t = table();
        t.metadata_mut()
            .insert("smallerTableSorted".into(), Value::from(true));
        assert_eq!(t.metadata()["smallerTableSorted"], Value::from(true));
    }

    #[test]
    fn test_cell_to_json() {
        assert_eq!(Cell::Empty.to_json(), Value::Null);
        assert_eq!(Cell::Float(1.5).to_json(), Value::from(1.5));
        assert_eq!(Cell::Count(3).to_json(), Value::from(3u64));
        assert_eq!(Cell::Label("x".into()).to_json(), Value::from("x"));
    }

    #[test]
    fn test_benchmark_results_owns_tables() {
        let mut results = BenchmarkResults::new("run");
        results
            .metadata_mut()
            .insert("randomSeed".into(), Value::from(42u64));
        {
            let t = results.add_table("t1", vec![], vec!["p".into()]);
            t.add_row();
            t.set_cell(0, 0, Cell::Count(1)).unwrap();
        }
        results.add_table("t2", vec![], vec!["p".into()]);
        assert_eq!(results.tables().len(), 2);
        assert_eq!(results.tables()[0].num_rows(), 1);
        assert_eq!(results.name(), "run");
    }
}
