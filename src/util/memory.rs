//! Typed memory quantities
//!
//! `MemorySize` is a byte count with unit-aware construction, parsing and
//! formatting. All units are powers of 1024. Budget-style consumers treat
//! `MemorySize::ZERO` as "no limit"; everywhere else it is plain zero bytes.
//!
//! # Example
//!
//! ```
//! use joinbench::util::memory::MemorySize;
//!
//! let m = MemorySize::parse("4 KB").unwrap();
//! assert_eq!(m.bytes(), 4096);
//! assert_eq!(m.to_string(), "4.00 KB");
//! ```

use std::fmt;
use thiserror::Error;

/// The largest representable byte count.
///
/// Byte counts are stored as `u64`, but the representable range is capped at
/// `i64::MAX` so that sizes stay losslessly convertible to signed arithmetic.
pub const MAX_BYTES: u64 = i64::MAX as u64;

/// Errors from constructing or parsing a `MemorySize`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The input is not a valid memory literal
    #[error("invalid memory size literal: {0:?}")]
    BadFormat(String),
    /// The quantity exceeds `MAX_BYTES`
    #[error("memory size exceeds {MAX_BYTES} bytes")]
    Overflow,
}

/// Memory units, all powers of 1024
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    B,
    KB,
    MB,
    GB,
    TB,
    PB,
}

impl Unit {
    /// Number of bytes in one of this unit
    pub const fn bytes_per(self) -> u64 {
        match self {
            Unit::B => 1,
            Unit::KB => 1 << 10,
            Unit::MB => 1 << 20,
            Unit::GB => 1 << 30,
            Unit::TB => 1 << 40,
            Unit::PB => 1 << 50,
        }
    }

    /// Canonical suffix used by `MemorySize::to_string`
    pub const fn suffix(self) -> &'static str {
        match self {
            Unit::B => "B",
            Unit::KB => "KB",
            Unit::MB => "MB",
            Unit::GB => "GB",
            Unit::TB => "TB",
            Unit::PB => "PB",
        }
    }

    fn from_suffix(s: &str) -> Option<Unit> {
        // Suffix matching is case-insensitive, so "kB", "KB" and "kb" all
        // denote kilobytes.
        match s.to_ascii_uppercase().as_str() {
            "B" => Some(Unit::B),
            "KB" => Some(Unit::KB),
            "MB" => Some(Unit::MB),
            "GB" => Some(Unit::GB),
            "TB" => Some(Unit::TB),
            "PB" => Some(Unit::PB),
            _ => None,
        }
    }
}

/// A non-negative amount of memory, stored as a byte count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemorySize {
    bytes: u64,
}

impl MemorySize {
    /// Zero bytes; stands for "no limit" in budget contexts
    pub const ZERO: MemorySize = MemorySize { bytes: 0 };

    /// Create a size from a raw byte count
    pub fn from_bytes(bytes: u64) -> Result<Self, MemoryError> {
        if bytes > MAX_BYTES {
            return Err(MemoryError::Overflow);
        }
        Ok(Self { bytes })
    }

    /// Create a size from a whole number of the given unit
    pub fn from_units(amount: u64, unit: Unit) -> Result<Self, MemoryError> {
        let bytes = amount
            .checked_mul(unit.bytes_per())
            .ok_or(MemoryError::Overflow)?;
        Self::from_bytes(bytes)
    }

    /// Create a size from a fractional number of the given unit
    ///
    /// The resulting byte count is rounded up, so "0.5 KB" is 512 bytes and
    /// "1.5 KB" is 1536 bytes.
    pub fn from_units_f64(amount: f64, unit: Unit) -> Result<Self, MemoryError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(MemoryError::BadFormat(amount.to_string()));
        }
        let bytes = (amount * unit.bytes_per() as f64).ceil();
        if bytes > MAX_BYTES as f64 {
            return Err(MemoryError::Overflow);
        }
        Ok(Self { bytes: bytes as u64 })
    }

    /// Shorthand for `from_units(n, Unit::KB)`
    pub fn kilobytes(amount: u64) -> Result<Self, MemoryError> {
        Self::from_units(amount, Unit::KB)
    }

    /// Shorthand for `from_units(n, Unit::MB)`
    pub fn megabytes(amount: u64) -> Result<Self, MemoryError> {
        Self::from_units(amount, Unit::MB)
    }

    /// Shorthand for `from_units(n, Unit::GB)`
    pub fn gigabytes(amount: u64) -> Result<Self, MemoryError> {
        Self::from_units(amount, Unit::GB)
    }

    /// Shorthand for `from_units(n, Unit::TB)`
    pub fn terabytes(amount: u64) -> Result<Self, MemoryError> {
        Self::from_units(amount, Unit::TB)
    }

    /// Shorthand for `from_units(n, Unit::PB)`
    pub fn petabytes(amount: u64) -> Result<Self, MemoryError> {
        Self::from_units(amount, Unit::PB)
    }

    /// The raw byte count
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// `true` iff this is zero bytes
    pub fn is_zero(&self) -> bool {
        self.bytes == 0
    }

    /// The quantity expressed in the given unit
    pub fn as_unit(&self, unit: Unit) -> f64 {
        self.bytes as f64 / unit.bytes_per() as f64
    }

    /// Parse a memory literal: a non-negative decimal number, optional
    /// whitespace, and a unit suffix (`B`, `kB`/`KB`, `MB`, `GB`, `TB`, `PB`).
    pub fn parse(input: &str) -> Result<Self, MemoryError> {
        let bad = || MemoryError::BadFormat(input.to_string());
        let trimmed = input.trim();

        let number_len = trimmed
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(trimmed.len());
        let (number_str, rest) = trimmed.split_at(number_len);
        let unit = Unit::from_suffix(rest.trim_start()).ok_or_else(bad)?;

        if number_str.is_empty() {
            return Err(bad());
        }
        if let Ok(whole) = number_str.parse::<u64>() {
            return Self::from_units(whole, unit);
        }
        // Not a plain integer. A digits-only literal that failed to parse can
        // only have overflowed u64.
        if number_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(MemoryError::Overflow);
        }
        // One fraction at most; "1.2.3" is malformed.
        if number_str.matches('.').count() != 1 || number_str.starts_with('.') || number_str.ends_with('.') {
            return Err(bad());
        }
        let amount: f64 = number_str.parse().map_err(|_| bad())?;
        Self::from_units_f64(amount, unit)
    }

    /// Add two sizes, saturating at `MAX_BYTES`
    pub fn saturating_add(self, rhs: MemorySize) -> MemorySize {
        MemorySize {
            bytes: self.bytes.saturating_add(rhs.bytes).min(MAX_BYTES),
        }
    }

    /// Multiply by a scalar, failing with `Overflow` past `MAX_BYTES`
    pub fn checked_mul(self, factor: u64) -> Result<MemorySize, MemoryError> {
        let bytes = self
            .bytes
            .checked_mul(factor)
            .ok_or(MemoryError::Overflow)?;
        Self::from_bytes(bytes)
    }
}

impl fmt::Display for MemorySize {
    /// Formats with the largest unit in which the quantity is at least 1,
    /// with two decimals; plain bytes print without decimals.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const DESCENDING: [Unit; 5] = [Unit::PB, Unit::TB, Unit::GB, Unit::MB, Unit::KB];
        for unit in DESCENDING {
            if self.bytes >= unit.bytes_per() {
                return write!(f, "{:.2} {}", self.as_unit(unit), unit.suffix());
            }
        }
        write!(f, "{} B", self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_units() {
        assert_eq!(MemorySize::parse("4 KB").unwrap().bytes(), 4096);
        assert_eq!(MemorySize::parse("4KB").unwrap().bytes(), 4096);
        assert_eq!(MemorySize::parse("4 kB").unwrap().bytes(), 4096);
        assert_eq!(MemorySize::parse("512 B").unwrap().bytes(), 512);
        assert_eq!(MemorySize::parse("8 MB").unwrap().bytes(), 8 * 1024 * 1024);
        assert_eq!(
            MemorySize::parse("2 GB").unwrap().bytes(),
            2 * 1024 * 1024 * 1024
        );
        assert_eq!(MemorySize::parse("1 TB").unwrap().bytes(), 1 << 40);
        assert_eq!(MemorySize::parse("1 PB").unwrap().bytes(), 1 << 50);
        assert_eq!(MemorySize::parse("0 B").unwrap(), MemorySize::ZERO);
    }

    #[test]
    fn test_parse_fractional() {
        assert_eq!(MemorySize::parse("0.5 KB").unwrap().bytes(), 512);
        assert_eq!(MemorySize::parse("1.50 KB").unwrap().bytes(), 1536);
        // Fractional byte counts round up.
        assert_eq!(MemorySize::parse("0.1 KB").unwrap().bytes(), 103);
    }

    #[test]
    fn test_parse_bad_format() {
        for input in ["", "KB", "4", "4 XB", "-4 KB", "1.2.3 KB", ". KB", "4. KB"] {
            assert!(
                matches!(MemorySize::parse(input), Err(MemoryError::BadFormat(_))),
                "expected BadFormat for {input:?}"
            );
        }
    }

    #[test]
    fn test_parse_overflow() {
        assert_eq!(
            MemorySize::parse("99999999999999999999 B"),
            Err(MemoryError::Overflow)
        );
        assert_eq!(MemorySize::parse("9000 PB"), Err(MemoryError::Overflow));
    }

    #[test]
    fn test_format() {
        assert_eq!(MemorySize::from_bytes(0).unwrap().to_string(), "0 B");
        assert_eq!(MemorySize::from_bytes(512).unwrap().to_string(), "512 B");
        assert_eq!(MemorySize::from_bytes(1023).unwrap().to_string(), "1023 B");
        assert_eq!(MemorySize::from_bytes(1024).unwrap().to_string(), "1.00 KB");
        assert_eq!(MemorySize::from_bytes(1536).unwrap().to_string(), "1.50 KB");
        assert_eq!(
            MemorySize::from_bytes(1048576).unwrap().to_string(),
            "1.00 MB"
        );
        assert_eq!(MemorySize::gigabytes(3).unwrap().to_string(), "3.00 GB");
    }

    #[test]
    fn test_round_trip_parse_then_format() {
        for input in ["4.00 KB", "1.00 MB", "1.50 KB", "512 B", "3.00 GB"] {
            let parsed = MemorySize::parse(input).unwrap();
            assert_eq!(parsed.to_string(), input);
        }
        // Suffix case is normalised.
        assert_eq!(MemorySize::parse("4.00 kB").unwrap().to_string(), "4.00 KB");
    }

    #[test]
    fn test_round_trip_format_then_parse() {
        // Quantities integral in hundredths of their display unit survive the
        // two-decimal formatting.
        for bytes in [0u64, 1, 100, 1023, 1024, 1536, 4096, 1 << 20, 3 << 30] {
            let size = MemorySize::from_bytes(bytes).unwrap();
            assert_eq!(MemorySize::parse(&size.to_string()).unwrap(), size);
        }
    }

    #[test]
    fn test_as_unit() {
        let m = MemorySize::from_bytes(1536).unwrap();
        assert_eq!(m.as_unit(Unit::KB), 1.5);
        assert_eq!(m.as_unit(Unit::B), 1536.0);
        assert_eq!(MemorySize::megabytes(2).unwrap().as_unit(Unit::KB), 2048.0);
    }

    #[test]
    fn test_ordering() {
        let a = MemorySize::kilobytes(1).unwrap();
        let b = MemorySize::kilobytes(2).unwrap();
        assert!(a < b);
        assert_eq!(a, MemorySize::from_bytes(1024).unwrap());
    }

    #[test]
    fn test_saturating_add() {
        let a = MemorySize::from_bytes(MAX_BYTES - 10).unwrap();
        let b = MemorySize::from_bytes(100).unwrap();
        assert_eq!(a.saturating_add(b).bytes(), MAX_BYTES);
        let small = MemorySize::from_bytes(10).unwrap();
        assert_eq!(small.saturating_add(b).bytes(), 110);
    }

    #[test]
    fn test_checked_mul() {
        let row = MemorySize::from_bytes(160).unwrap();
        assert_eq!(row.checked_mul(1000).unwrap().bytes(), 160_000);
        assert_eq!(
            MemorySize::petabytes(8).unwrap().checked_mul(u64::MAX),
            Err(MemoryError::Overflow)
        );
    }

    #[test]
    fn test_factory_overflow() {
        assert_eq!(MemorySize::petabytes(10_000), Err(MemoryError::Overflow));
        assert!(MemorySize::from_bytes(MAX_BYTES + 1).is_err());
    }
}
