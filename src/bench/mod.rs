//! The growing-table join benchmark
//!
//! [`driver`] grows one measurement table row by row, [`settings`] holds
//! the configurable inputs and their validators, and [`scenarios`] wires
//! both into the three packaged experiment shapes.

pub mod driver;
pub mod scenarios;
pub mod settings;
