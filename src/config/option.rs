//! A single named, typed configuration option
//!
//! An option owns its identifier, description, kind tag, optional default
//! and current value, plus a write-through binding to a caller-owned
//! variable. The binding is a typed `store` closure captured over an
//! `Rc<RefCell<T>>` at registration; every successful set writes through it,
//! so the caller observes configuration changes without asking the manager.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use serde_json::Value as TreeNode;

use super::error::{ConfigError, ConfigWarning};
use super::shorthand::is_valid_identifier;
use super::value::{ConfigValue, ConfigValueType, ValueKind};

/// Typed handle to a registered option
///
/// Returned by `ConfigManager::add_option`; validators and default reads go
/// through handles so the kind is checked at compile time.
pub struct OptionHandle<T: ConfigValueType> {
    index: usize,
    _kind: PhantomData<fn() -> T>,
}

impl<T: ConfigValueType> OptionHandle<T> {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            _kind: PhantomData,
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }
}

impl<T: ConfigValueType> Clone for OptionHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ConfigValueType> Copy for OptionHandle<T> {}

impl<T: ConfigValueType> fmt::Debug for OptionHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionHandle")
            .field("index", &self.index)
            .field("kind", &T::KIND)
            .finish()
    }
}

/// A named configuration option with a fixed value kind
pub struct ConfigOption {
    identifier: String,
    description: String,
    kind: ValueKind,
    value: Option<ConfigValue>,
    default: Option<ConfigValue>,
    set_at_runtime: bool,
    store: Box<dyn Fn(&ConfigValue)>,
}

impl fmt::Debug for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOption")
            .field("identifier", &self.identifier)
            .field("kind", &self.kind)
            .field("value", &self.value)
            .field("default", &self.default)
            .field("set_at_runtime", &self.set_at_runtime)
            .finish_non_exhaustive()
    }
}

impl ConfigOption {
    /// Create an option bound to `target`.
    ///
    /// If a default is given the option starts in the defaulted state and
    /// `target` is overwritten with the default right away.
    pub fn new<T: ConfigValueType>(
        identifier: impl Into<String>,
        description: impl Into<String>,
        target: &Rc<RefCell<T>>,
        default: Option<T>,
    ) -> Result<Self, ConfigError> {
        let identifier = identifier.into();
        if !is_valid_identifier(&identifier) {
            return Err(ConfigError::InvalidIdentifier { identifier });
        }

        let cell = Rc::clone(target);
        let store: Box<dyn Fn(&ConfigValue)> = Box::new(move |value| {
            if let Some(typed) = T::from_value(value) {
                *cell.borrow_mut() = typed;
            }
        });

        let default = default.map(ConfigValueType::into_value);
        let option = Self {
            identifier,
            description: description.into(),
            kind: T::KIND,
            value: default.clone(),
            default,
            set_at_runtime: false,
            store,
        };
        if let Some(value) = &option.value {
            (option.store)(value);
        }
        Ok(option)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// `true` iff a default or a runtime value exists
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// `true` iff the option was explicitly set after registration
    pub fn was_set_at_runtime(&self) -> bool {
        self.set_at_runtime
    }

    /// The current value, if any
    pub fn current(&self) -> Option<&ConfigValue> {
        self.value.as_ref()
    }

    /// The current value rendered for messages; `[unset]` when absent
    pub fn render_current(&self) -> String {
        match &self.value {
            Some(value) => value.render(),
            None => "[unset]".to_string(),
        }
    }

    /// Typed read of the current value
    pub fn value<T: ConfigValueType>(&self) -> Result<T, ConfigError> {
        match &self.value {
            None => Err(ConfigError::Unset {
                identifier: self.identifier.clone(),
            }),
            Some(value) => value.get().ok_or(ConfigError::WrongType {
                identifier: self.identifier.clone(),
                expected: self.kind.name(),
                actual: T::KIND.name(),
            }),
        }
    }

    /// Typed read of the default value
    pub fn default_value<T: ConfigValueType>(&self) -> Result<T, ConfigError> {
        match &self.default {
            None => Err(ConfigError::Unset {
                identifier: self.identifier.clone(),
            }),
            Some(value) => value.get().ok_or(ConfigError::WrongType {
                identifier: self.identifier.clone(),
                expected: self.kind.name(),
                actual: T::KIND.name(),
            }),
        }
    }

    /// The default rendered for documentation, if present
    pub fn render_default(&self) -> Option<String> {
        self.default.as_ref().map(ConfigValue::render)
    }

    /// Set directly from a typed value
    pub fn set<T: ConfigValueType>(&mut self, value: T) -> Result<(), ConfigError> {
        if T::KIND != self.kind {
            return Err(ConfigError::WrongType {
                identifier: self.identifier.clone(),
                expected: self.kind.name(),
                actual: T::KIND.name(),
            });
        }
        self.commit(value.into_value());
        Ok(())
    }

    /// Set from a configuration tree node, coercing per the kind rules
    pub fn set_from_tree(&mut self, node: &TreeNode) -> Result<Vec<ConfigWarning>, ConfigError> {
        let mut warnings = Vec::new();
        let value = ConfigValue::from_tree(node, self.kind, &self.identifier, &mut warnings)?;
        self.commit(value);
        Ok(warnings)
    }

    /// Store an already-coerced value and write it through the binding.
    ///
    /// The value's kind must match; the manager guarantees this for staged
    /// values.
    pub(crate) fn commit(&mut self, value: ConfigValue) {
        debug_assert_eq!(value.kind(), self.kind);
        (self.store)(&value);
        self.value = Some(value);
        self.set_at_runtime = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cell<T>(value: T) -> Rc<RefCell<T>> {
        Rc::new(RefCell::new(value))
    }

    #[test]
    fn test_default_populates_binding() {
        let target = cell(0u64);
        let option =
            ConfigOption::new("rows", "Row count.", &target, Some(1000u64)).unwrap();
        assert_eq!(*target.borrow(), 1000);
        assert!(option.has_value());
        assert!(option.has_default());
        assert!(!option.was_set_at_runtime());
        assert_eq!(option.value::<u64>().unwrap(), 1000);
    }

    #[test]
    fn test_no_default_is_unset() {
        let target = cell(0i64);
        let option = ConfigOption::new("n", "A number.", &target, None::<i64>).unwrap();
        assert!(!option.has_value());
        assert!(matches!(
            option.value::<i64>(),
            Err(ConfigError::Unset { .. })
        ));
        assert_eq!(option.render_current(), "[unset]");
    }

    #[test]
    fn test_set_writes_through() {
        let target = cell(false);
        let mut option = ConfigOption::new("flag", "A flag.", &target, Some(false)).unwrap();
        option.set(true).unwrap();
        assert!(*target.borrow());
        assert!(option.was_set_at_runtime());
    }

    #[test]
    fn test_set_wrong_type() {
        let target = cell(0u64);
        let mut option = ConfigOption::new("rows", "Rows.", &target, Some(5u64)).unwrap();
        let err = option.set(-1i64).unwrap_err();
        assert!(matches!(err, ConfigError::WrongType { .. }));
        // The stored value and binding are untouched.
        assert_eq!(option.value::<u64>().unwrap(), 5);
        assert_eq!(*target.borrow(), 5);
    }

    #[test]
    fn test_set_from_tree() {
        let target = cell(0.0f64);
        let mut option = ConfigOption::new("chance", "A chance.", &target, None::<f64>).unwrap();
        let warnings = option.set_from_tree(&json!(42.5)).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(*target.borrow(), 42.5);

        let err = option.set_from_tree(&json!("nope")).unwrap_err();
        match err {
            ConfigError::WrongType {
                identifier,
                expected,
                actual,
            } => {
                assert_eq!(identifier, "chance");
                assert_eq!(expected, "float");
                assert_eq!(actual, "string");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_typed_read_wrong_kind() {
        let target = cell(3u64);
        let option = ConfigOption::new("rows", "Rows.", &target, Some(3u64)).unwrap();
        assert!(matches!(
            option.value::<bool>(),
            Err(ConfigError::WrongType { .. })
        ));
    }

    #[test]
    fn test_invalid_identifier() {
        let target = cell(0u64);
        for bad in ["", "1abc", "a b", "-x", "a.b"] {
            assert!(matches!(
                ConfigOption::new(bad, "Bad.", &target, None::<u64>),
                Err(ConfigError::InvalidIdentifier { .. })
            ));
        }
    }

    #[test]
    fn test_binding_outlives_reads() {
        let target = cell(String::new());
        let mut option =
            ConfigOption::new("name", "A name.", &target, None::<String>).unwrap();
        option.set("benchmark".to_string()).unwrap();
        assert_eq!(&*target.borrow(), "benchmark");
        assert_eq!(option.render_current(), "\"benchmark\"");
    }
}
