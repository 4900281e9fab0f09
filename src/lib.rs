//! joinbench - configurable microbenchmark harness for join algorithms
//!
//! joinbench drives controlled performance experiments on relational
//! equi-join algorithms: it synthesises randomised input tables of growing
//! size, times a hash join against a sort + merge/galloping join under
//! identical conditions, and records the measurements in structured result
//! tables.
//!
//! # Architecture
//!
//! - **Typed configuration**: a hierarchical option registry with
//!   write-through variable bindings, cross-option validators, a JSON tree
//!   front end and a compact assignment shorthand
//! - **Growing-table driver**: per-row table synthesis, overlap injection,
//!   reproducible seeding, and time/memory stop budgets
//! - **Typed primitives**: `MemorySize` byte quantities, seeded random
//!   streams, and measurement tables with derived columns
//! - **Structured results**: runs serialize to a JSON record format for
//!   downstream analysis

pub mod bench;
pub mod config;
pub mod output;
pub mod results;
pub mod table;
pub mod util;

// Re-export commonly used types
pub use config::ConfigManager;
pub use table::IdTable;

/// Result type used throughout joinbench; defaults to `anyhow::Error`
pub type Result<T, E = anyhow::Error> = anyhow::Result<T, E>;
