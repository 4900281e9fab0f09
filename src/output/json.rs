//! JSON output of benchmark results
//!
//! The persisted form is an array of run records, one per benchmark run:
//!
//! ```json
//! [{
//!   "name": "...",
//!   "metadata": { "randomSeed": 42, ... },
//!   "tables": [{
//!     "name": "...",
//!     "columnNames": ["Amount of rows", "Time for sorting", ...],
//!     "metadata": { "smallerTableSorted": true, ... },
//!     "cells": [[100000, 0.013, ...], ...]
//!   }]
//! }]
//! ```
//!
//! Cells are heterogeneous: numbers for durations and ratios, integers for
//! counts, strings for labels, and `null` for cells that were never
//! written.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::results::{BenchmarkResults, ResultTable};
use crate::Result;

/// One benchmark run in its persisted shape
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub name: String,
    pub metadata: Map<String, Value>,
    pub tables: Vec<TableRecord>,
}

/// One measurement table in its persisted shape
#[derive(Debug, Clone, Serialize)]
pub struct TableRecord {
    pub name: String,
    #[serde(rename = "columnNames")]
    pub column_names: Vec<String>,
    #[serde(rename = "rowNames", skip_serializing_if = "Option::is_none")]
    pub row_names: Option<Vec<String>>,
    pub metadata: Map<String, Value>,
    pub cells: Vec<Vec<Value>>,
}

impl TableRecord {
    fn from_table(table: &ResultTable) -> Self {
        let cells = (0..table.num_rows())
            .map(|row| {
                (0..table.num_columns())
                    .map(|column| {
                        table
                            .cell(row, column)
                            .map(|cell| cell.to_json())
                            .unwrap_or(Value::Null)
                    })
                    .collect()
            })
            .collect();
        Self {
            name: table.name().to_string(),
            column_names: table.column_names().to_vec(),
            row_names: (!table.row_names().is_empty()).then(|| table.row_names().to_vec()),
            metadata: table.metadata().clone(),
            cells,
        }
    }
}

/// Convert finished runs into their persisted shape
pub fn to_records(runs: &[BenchmarkResults]) -> Vec<RunRecord> {
    runs.iter()
        .map(|run| RunRecord {
            name: run.name().to_string(),
            metadata: run.metadata().clone(),
            tables: run.tables().iter().map(TableRecord::from_table).collect(),
        })
        .collect()
}

/// Serialize runs as pretty-printed JSON into `writer`
pub fn write_json<W: Write>(writer: W, runs: &[BenchmarkResults]) -> Result<()> {
    serde_json::to_writer_pretty(writer, &to_records(runs))?;
    Ok(())
}

/// Serialize runs into the file at `path`, creating or truncating it
pub fn write_to_path(path: &Path, runs: &[BenchmarkResults]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("cannot create results file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_json(&mut writer, runs)?;
    writer.flush()?;
    Ok(())
}
