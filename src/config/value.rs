//! Typed configuration values
//!
//! The value universe of the configuration system is deliberately closed:
//! five scalar kinds and a homogeneous list of each. Keeping the set closed
//! means the shorthand language, the JSON tree form, rendering and the
//! validators all enumerate exactly the same kinds.

use serde_json::Value as TreeNode;

use super::error::{ConfigError, ConfigWarning};

/// The declared kind of a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    String,
    Int,
    UInt,
    Float,
    BoolList,
    StringList,
    IntList,
    UIntList,
    FloatList,
}

impl ValueKind {
    /// Human-readable name used in error messages and documentation
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "boolean",
            ValueKind::String => "string",
            ValueKind::Int => "signed integer",
            ValueKind::UInt => "unsigned integer",
            ValueKind::Float => "float",
            ValueKind::BoolList => "list of booleans",
            ValueKind::StringList => "list of strings",
            ValueKind::IntList => "list of signed integers",
            ValueKind::UIntList => "list of unsigned integers",
            ValueKind::FloatList => "list of floats",
        }
    }

    /// `true` for the four list kinds
    pub fn is_list(self) -> bool {
        matches!(
            self,
            ValueKind::BoolList | ValueKind::StringList | ValueKind::IntList | ValueKind::UIntList | ValueKind::FloatList
        )
    }

    /// The element kind of a list kind
    fn element_kind(self) -> Option<ValueKind> {
        match self {
            ValueKind::BoolList => Some(ValueKind::Bool),
            ValueKind::StringList => Some(ValueKind::String),
            ValueKind::IntList => Some(ValueKind::Int),
            ValueKind::UIntList => Some(ValueKind::UInt),
            ValueKind::FloatList => Some(ValueKind::Float),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A configuration value of one of the closed set of kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    String(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    BoolList(Vec<bool>),
    StringList(Vec<String>),
    IntList(Vec<i64>),
    UIntList(Vec<u64>),
    FloatList(Vec<f64>),
}

/// Structural description of a tree node, for error messages
pub(crate) fn describe_node(node: &TreeNode) -> &'static str {
    match node {
        TreeNode::Null => "null",
        TreeNode::Bool(_) => "boolean",
        TreeNode::String(_) => "string",
        TreeNode::Array(_) => "array",
        TreeNode::Object(_) => "object",
        TreeNode::Number(n) => {
            if n.is_f64() {
                "float"
            } else if n.as_i64().map_or(false, |v| v < 0) {
                "negative integer"
            } else {
                "integer"
            }
        }
    }
}

fn render_float(value: f64) -> String {
    format!("{value:.6}")
}

impl ConfigValue {
    /// The kind tag of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::Bool(_) => ValueKind::Bool,
            ConfigValue::String(_) => ValueKind::String,
            ConfigValue::Int(_) => ValueKind::Int,
            ConfigValue::UInt(_) => ValueKind::UInt,
            ConfigValue::Float(_) => ValueKind::Float,
            ConfigValue::BoolList(_) => ValueKind::BoolList,
            ConfigValue::StringList(_) => ValueKind::StringList,
            ConfigValue::IntList(_) => ValueKind::IntList,
            ConfigValue::UIntList(_) => ValueKind::UIntList,
            ConfigValue::FloatList(_) => ValueKind::FloatList,
        }
    }

    /// Typed read; `None` if `T` does not match the kind tag
    pub fn get<T: ConfigValueType>(&self) -> Option<T> {
        T::from_value(self)
    }

    /// Render for error messages and documentation
    ///
    /// Strings are quoted, floats carry six fractional digits, lists render
    /// as `[a, b, c]`.
    pub fn render(&self) -> String {
        fn list<T>(items: &[T], render_one: impl Fn(&T) -> String) -> String {
            let rendered: Vec<String> = items.iter().map(render_one).collect();
            format!("[{}]", rendered.join(", "))
        }

        match self {
            ConfigValue::Bool(b) => b.to_string(),
            ConfigValue::String(s) => format!("{s:?}"),
            ConfigValue::Int(i) => i.to_string(),
            ConfigValue::UInt(u) => u.to_string(),
            ConfigValue::Float(x) => render_float(*x),
            ConfigValue::BoolList(items) => list(items, |b| b.to_string()),
            ConfigValue::StringList(items) => list(items, |s| format!("{s:?}")),
            ConfigValue::IntList(items) => list(items, |i| i.to_string()),
            ConfigValue::UIntList(items) => list(items, |u| u.to_string()),
            ConfigValue::FloatList(items) => list(items, |x| render_float(*x)),
        }
    }

    /// Convert back into a JSON tree node
    pub fn to_tree(&self) -> TreeNode {
        match self {
            ConfigValue::Bool(b) => TreeNode::from(*b),
            ConfigValue::String(s) => TreeNode::from(s.clone()),
            ConfigValue::Int(i) => TreeNode::from(*i),
            ConfigValue::UInt(u) => TreeNode::from(*u),
            ConfigValue::Float(x) => TreeNode::from(*x),
            ConfigValue::BoolList(items) => TreeNode::from(items.clone()),
            ConfigValue::StringList(items) => TreeNode::from(items.clone()),
            ConfigValue::IntList(items) => TreeNode::from(items.clone()),
            ConfigValue::UIntList(items) => TreeNode::from(items.clone()),
            ConfigValue::FloatList(items) => TreeNode::from(items.clone()),
        }
    }

    /// Coerce a tree node into a value of the given kind.
    ///
    /// A node matches iff its structural kind matches the declared kind.
    /// Integer literals additionally coerce to unsigned (when non-negative)
    /// and to float (with a `Lossy` warning when the conversion is inexact).
    /// Strings never coerce to or from anything.
    pub fn from_tree(
        node: &TreeNode,
        kind: ValueKind,
        identifier: &str,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Result<ConfigValue, ConfigError> {
        let wrong_type = || ConfigError::WrongType {
            identifier: identifier.to_string(),
            expected: kind.name(),
            actual: describe_node(node),
        };

        if let Some(element_kind) = kind.element_kind() {
            let items = node.as_array().ok_or_else(wrong_type)?;
            let scalars: Vec<ConfigValue> = items
                .iter()
                .map(|item| Self::from_tree(item, element_kind, identifier, warnings))
                .collect::<Result<_, _>>()?;
            return Ok(Self::collect_list(kind, scalars));
        }

        match kind {
            ValueKind::Bool => node.as_bool().map(ConfigValue::Bool).ok_or_else(wrong_type),
            ValueKind::String => node
                .as_str()
                .map(|s| ConfigValue::String(s.to_string()))
                .ok_or_else(wrong_type),
            ValueKind::Int => {
                if node.is_f64() {
                    return Err(wrong_type());
                }
                node.as_i64().map(ConfigValue::Int).ok_or_else(wrong_type)
            }
            ValueKind::UInt => {
                if node.is_f64() {
                    return Err(wrong_type());
                }
                node.as_u64().map(ConfigValue::UInt).ok_or_else(wrong_type)
            }
            ValueKind::Float => {
                let TreeNode::Number(number) = node else {
                    return Err(wrong_type());
                };
                if let Some(exact) = number.as_f64().filter(|_| number.is_f64()) {
                    return Ok(ConfigValue::Float(exact));
                }
                // An integer literal; coercion is allowed but may round.
                let coerced = number.as_f64().ok_or_else(wrong_type)?;
                let round_trips = match (number.as_i64(), number.as_u64()) {
                    (Some(i), _) => coerced as i64 == i && coerced.fract() == 0.0,
                    (_, Some(u)) => coerced as u64 == u && coerced.fract() == 0.0,
                    _ => false,
                };
                if !round_trips {
                    warnings.push(ConfigWarning::Lossy {
                        identifier: identifier.to_string(),
                        original: number.to_string(),
                        stored: coerced,
                    });
                }
                Ok(ConfigValue::Float(coerced))
            }
            _ => unreachable!("list kinds handled above"),
        }
    }

    fn collect_list(kind: ValueKind, scalars: Vec<ConfigValue>) -> ConfigValue {
        match kind {
            ValueKind::BoolList => ConfigValue::BoolList(
                scalars
                    .into_iter()
                    .filter_map(|v| v.get::<bool>())
                    .collect(),
            ),
            ValueKind::StringList => ConfigValue::StringList(
                scalars
                    .into_iter()
                    .filter_map(|v| v.get::<String>())
                    .collect(),
            ),
            ValueKind::IntList => {
                ConfigValue::IntList(scalars.into_iter().filter_map(|v| v.get::<i64>()).collect())
            }
            ValueKind::UIntList => {
                ConfigValue::UIntList(scalars.into_iter().filter_map(|v| v.get::<u64>()).collect())
            }
            ValueKind::FloatList => ConfigValue::FloatList(
                scalars
                    .into_iter()
                    .filter_map(|v| v.get::<f64>())
                    .collect(),
            ),
            _ => unreachable!("not a list kind"),
        }
    }
}

/// Rust types that can live inside a `ConfigValue`
///
/// Implemented exactly for the closed kind set; this is what makes option
/// handles and validator projections typed.
pub trait ConfigValueType: Clone + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> ConfigValue;
    fn from_value(value: &ConfigValue) -> Option<Self>;
}

macro_rules! impl_config_value_type {
    ($type:ty, $kind:expr, $variant:ident) => {
        impl ConfigValueType for $type {
            const KIND: ValueKind = $kind;

            fn into_value(self) -> ConfigValue {
                ConfigValue::$variant(self)
            }

            fn from_value(value: &ConfigValue) -> Option<Self> {
                match value {
                    ConfigValue::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_config_value_type!(bool, ValueKind::Bool, Bool);
impl_config_value_type!(String, ValueKind::String, String);
impl_config_value_type!(i64, ValueKind::Int, Int);
impl_config_value_type!(u64, ValueKind::UInt, UInt);
impl_config_value_type!(f64, ValueKind::Float, Float);
impl_config_value_type!(Vec<bool>, ValueKind::BoolList, BoolList);
impl_config_value_type!(Vec<String>, ValueKind::StringList, StringList);
impl_config_value_type!(Vec<i64>, ValueKind::IntList, IntList);
impl_config_value_type!(Vec<u64>, ValueKind::UIntList, UIntList);
impl_config_value_type!(Vec<f64>, ValueKind::FloatList, FloatList);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coerce(node: TreeNode, kind: ValueKind) -> Result<(ConfigValue, usize), ConfigError> {
        let mut warnings = Vec::new();
        let value = ConfigValue::from_tree(&node, kind, "opt", &mut warnings)?;
        Ok((value, warnings.len()))
    }

    #[test]
    fn test_scalar_matches() {
        assert_eq!(
            coerce(json!(true), ValueKind::Bool).unwrap(),
            (ConfigValue::Bool(true), 0)
        );
        assert_eq!(
            coerce(json!("abc"), ValueKind::String).unwrap(),
            (ConfigValue::String("abc".into()), 0)
        );
        assert_eq!(
            coerce(json!(-3), ValueKind::Int).unwrap(),
            (ConfigValue::Int(-3), 0)
        );
        assert_eq!(
            coerce(json!(7), ValueKind::UInt).unwrap(),
            (ConfigValue::UInt(7), 0)
        );
        assert_eq!(
            coerce(json!(2.5), ValueKind::Float).unwrap(),
            (ConfigValue::Float(2.5), 0)
        );
    }

    #[test]
    fn test_negative_to_unsigned_rejected() {
        let err = coerce(json!(-1), ValueKind::UInt).unwrap_err();
        match err {
            ConfigError::WrongType {
                identifier, actual, ..
            } => {
                assert_eq!(identifier, "opt");
                assert_eq!(actual, "negative integer");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_int_to_float_coercion() {
        // Exactly representable: no warning.
        let (value, warnings) = coerce(json!(42), ValueKind::Float).unwrap();
        assert_eq!(value, ConfigValue::Float(42.0));
        assert_eq!(warnings, 0);

        // 2^53 + 1 is not representable as f64.
        let (value, warnings) = coerce(json!(9007199254740993u64), ValueKind::Float).unwrap();
        assert_eq!(value.kind(), ValueKind::Float);
        assert_eq!(warnings, 1);
    }

    #[test]
    fn test_float_to_int_rejected() {
        assert!(coerce(json!(1.5), ValueKind::Int).is_err());
        assert!(coerce(json!(1.0), ValueKind::UInt).is_err());
    }

    #[test]
    fn test_string_never_coerced() {
        assert!(coerce(json!("42"), ValueKind::Int).is_err());
        assert!(coerce(json!(42), ValueKind::String).is_err());
        assert!(coerce(json!("true"), ValueKind::Bool).is_err());
    }

    #[test]
    fn test_lists() {
        let (value, warnings) = coerce(json!([4, 5, 6, 7]), ValueKind::UIntList).unwrap();
        assert_eq!(value, ConfigValue::UIntList(vec![4, 5, 6, 7]));
        assert_eq!(warnings, 0);

        assert_eq!(
            coerce(json!([]), ValueKind::IntList).unwrap().0,
            ConfigValue::IntList(vec![])
        );

        // Mixed element kinds are rejected.
        assert!(coerce(json!([1, "two"]), ValueKind::IntList).is_err());
        // A scalar is not a list.
        assert!(coerce(json!(1), ValueKind::IntList).is_err());
    }

    #[test]
    fn test_render() {
        assert_eq!(ConfigValue::Bool(true).render(), "true");
        assert_eq!(ConfigValue::String("x".into()).render(), "\"x\"");
        assert_eq!(ConfigValue::Int(-5).render(), "-5");
        assert_eq!(ConfigValue::Float(42.0).render(), "42.000000");
        assert_eq!(
            ConfigValue::UIntList(vec![4, 5, 6]).render(),
            "[4, 5, 6]"
        );
        assert_eq!(
            ConfigValue::FloatList(vec![1.0, 2.5]).render(),
            "[1.000000, 2.500000]"
        );
    }

    #[test]
    fn test_tree_round_trip() {
        let values = [
            ConfigValue::Bool(false),
            ConfigValue::String("s".into()),
            ConfigValue::Int(-9),
            ConfigValue::UInt(9),
            ConfigValue::Float(0.25),
            ConfigValue::UIntList(vec![1, 2, 3]),
        ];
        for value in values {
            let mut warnings = Vec::new();
            let back =
                ConfigValue::from_tree(&value.to_tree(), value.kind(), "opt", &mut warnings)
                    .unwrap();
            assert_eq!(back, value);
            assert!(warnings.is_empty());
        }
    }

    #[test]
    fn test_typed_get() {
        let value = ConfigValue::UInt(10);
        assert_eq!(value.get::<u64>(), Some(10));
        assert_eq!(value.get::<i64>(), None);
    }
}
