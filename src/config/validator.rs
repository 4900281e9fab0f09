//! Cross-option invariants
//!
//! A validator couples a human-readable description (shown in the detailed
//! documentation) with a check over the values of one or more registered
//! options. The manager runs validators in registration order after all
//! values of an `apply_*` call have been staged, so every check sees one
//! consistent configuration snapshot.

use super::value::ConfigValue;

/// The outcome of a validator check: `Ok` or an error message
pub type ValidatorResult = Result<(), String>;

type CheckFn = Box<dyn Fn(&[&ConfigValue]) -> ValidatorResult>;

/// A registered cross-option invariant
pub struct Validator {
    description: String,
    option_indices: Vec<usize>,
    check: CheckFn,
}

impl Validator {
    pub(crate) fn new(
        description: impl Into<String>,
        option_indices: Vec<usize>,
        check: CheckFn,
    ) -> Self {
        Self {
            description: description.into(),
            option_indices,
            check,
        }
    }

    /// The description used in documentation output
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Indices of the options this validator reads, in argument order
    pub(crate) fn option_indices(&self) -> &[usize] {
        &self.option_indices
    }

    /// Run the check against projected values, one per referenced option
    pub(crate) fn run(&self, values: &[&ConfigValue]) -> ValidatorResult {
        (self.check)(values)
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("description", &self.description)
            .field("option_indices", &self.option_indices)
            .finish_non_exhaustive()
    }
}
