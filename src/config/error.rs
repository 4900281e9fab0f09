//! Configuration error and warning kinds
//!
//! One variant per failure mode, so callers can map outcomes to exit codes
//! without string matching. Messages carry the offending identifier or path
//! and, where applicable, rendered current values.

use thiserror::Error;

/// Errors raised by the configuration system
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Shorthand grammar violation, with the 1-based position of the first
    /// unexpected character
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// Two assignments to the same name in one shorthand scope
    #[error("duplicate key {name:?} at line {line}, column {column}")]
    DuplicateKey {
        name: String,
        line: usize,
        column: usize,
    },

    /// The configuration root is not an object
    #[error("the configuration root must be an object")]
    NotObject,

    /// A tree leaf path with no registered option
    #[error("no option registered under {path:?}; known options are: {known}")]
    UnknownOption { path: String, known: String },

    /// An option without a default value was never set
    #[error("option {path:?} has no default value and must be specified")]
    MissingRequired { path: String },

    /// A value of the wrong kind was supplied or requested
    #[error("option {identifier:?} holds a {expected}, but {actual} was supplied or requested")]
    WrongType {
        identifier: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A read of an option that was never set and has no default
    #[error("option {identifier:?} was never set and has no default value")]
    Unset { identifier: String },

    /// An identifier that is not a valid shorthand NAME
    #[error("{identifier:?} is not a valid option identifier")]
    InvalidIdentifier { identifier: String },

    /// A registration path that is empty, starts or ends with an array
    /// index, or collides with an already registered option
    #[error("invalid option path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A cross-option invariant was violated. The message is prefixed with
    /// the involved option identifiers and their rendered current values.
    #[error("validator failed [{options}]: {message}")]
    ValidatorFailed { options: String, message: String },
}

/// Non-fatal findings collected while applying a configuration
///
/// Callers may elevate warnings to errors if they choose; the manager
/// itself only reports them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigWarning {
    /// A numeric coercion lost information
    #[error("option {identifier:?}: integer literal {original} was coerced to the float {stored}, losing precision")]
    Lossy {
        identifier: String,
        original: String,
        stored: f64,
    },
}
