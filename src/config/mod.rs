//! Typed, hierarchical configuration
//!
//! A [`ConfigManager`] is a registry of [`ConfigOption`]s addressed by
//! tree paths. Callers register options (each bound to a caller-owned
//! variable) and cross-option validators, then feed the manager either a
//! JSON-shaped tree or the compact assignment shorthand. Application is
//! atomic: values are staged, validators run against the staged snapshot,
//! and only when everything passed are the options and their external
//! bindings updated.

pub mod cli;
pub mod error;
pub mod option;
pub mod shorthand;
pub mod validator;
pub mod value;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{Map, Value as TreeNode};

pub use error::{ConfigError, ConfigWarning};
pub use option::{ConfigOption, OptionHandle};
pub use validator::{Validator, ValidatorResult};
pub use value::{ConfigValue, ConfigValueType, ValueKind};

/// One step of an option path: an object key or an array index
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathKey {
    Key(String),
    Index(usize),
}

impl From<&str> for PathKey {
    fn from(key: &str) -> Self {
        PathKey::Key(key.to_string())
    }
}

impl From<String> for PathKey {
    fn from(key: String) -> Self {
        PathKey::Key(key)
    }
}

impl From<usize> for PathKey {
    fn from(index: usize) -> Self {
        PathKey::Index(index)
    }
}

impl std::fmt::Display for PathKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathKey::Key(key) => f.write_str(key),
            PathKey::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Render a path in JSON-pointer style, e.g. `/outer/0/rows`
pub fn path_to_string(path: &[PathKey]) -> String {
    let mut out = String::new();
    for key in path {
        out.push('/');
        out.push_str(&key.to_string());
    }
    out
}

/// Anything that names an option position: a bare identifier or a full path
pub trait IntoOptionPath {
    fn into_path(self) -> Vec<PathKey>;
}

impl IntoOptionPath for &str {
    fn into_path(self) -> Vec<PathKey> {
        vec![PathKey::from(self)]
    }
}

impl IntoOptionPath for String {
    fn into_path(self) -> Vec<PathKey> {
        vec![PathKey::from(self)]
    }
}

impl IntoOptionPath for Vec<PathKey> {
    fn into_path(self) -> Vec<PathKey> {
        self
    }
}

/// Documentation rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocMode {
    /// A JSON-shaped object with current values, or a `[must be specified]`
    /// sentinel for options that still need one
    Brief,
    /// The brief form plus one block per option with kind, value, default,
    /// description and validator descriptions
    Detailed,
}

/// Registry of configuration options and validators
#[derive(Debug, Default)]
pub struct ConfigManager {
    options: Vec<ConfigOption>,
    option_paths: Vec<Vec<PathKey>>,
    path_index: BTreeMap<Vec<PathKey>, usize>,
    validators: Vec<Validator>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an option under `path` and bind it to `target`.
    ///
    /// The last path element is the option's identifier. Both the first and
    /// the last element must be string keys, every string key must satisfy
    /// the identifier rule, and no two options may share a path (or have
    /// one path be a prefix of another).
    pub fn add_option<T: ConfigValueType>(
        &mut self,
        path: impl IntoOptionPath,
        description: impl Into<String>,
        target: &Rc<RefCell<T>>,
        default: Option<T>,
    ) -> Result<OptionHandle<T>, ConfigError> {
        let path = path.into_path();
        self.verify_path(&path)?;

        let Some(PathKey::Key(identifier)) = path.last() else {
            unreachable!("verify_path checked the last element");
        };
        let option = ConfigOption::new(identifier.clone(), description, target, default)?;

        let index = self.options.len();
        self.options.push(option);
        self.option_paths.push(path.clone());
        self.path_index.insert(path, index);
        Ok(OptionHandle::new(index))
    }

    /// A view of this manager with every path prefixed by `path`.
    ///
    /// Sub-managers share the root registry, so validators may reference
    /// options across sub-manager boundaries.
    pub fn sub_manager(&mut self, path: impl IntoOptionPath) -> Result<ScopedManager<'_>, ConfigError> {
        let prefix = path.into_path();
        if prefix.is_empty() {
            return Err(ConfigError::InvalidPath {
                path: String::new(),
                reason: "a sub-manager path must not be empty".to_string(),
            });
        }
        if !matches!(prefix.first(), Some(PathKey::Key(_))) {
            return Err(ConfigError::InvalidPath {
                path: path_to_string(&prefix),
                reason: "a path must begin with a string key".to_string(),
            });
        }
        self.verify_key_names(&prefix)?;
        Ok(ScopedManager {
            manager: self,
            prefix,
        })
    }

    /// Register a validator over one option
    pub fn add_validator1<A, F>(
        &mut self,
        description: impl Into<String>,
        a: OptionHandle<A>,
        check: F,
    ) where
        A: ConfigValueType,
        F: Fn(&A) -> ValidatorResult + 'static,
    {
        self.validators.push(Validator::new(
            description,
            vec![a.index()],
            Box::new(move |values| {
                let a = project::<A>(values, 0)?;
                check(&a)
            }),
        ));
    }

    /// Register a validator over two options
    pub fn add_validator2<A, B, F>(
        &mut self,
        description: impl Into<String>,
        a: OptionHandle<A>,
        b: OptionHandle<B>,
        check: F,
    ) where
        A: ConfigValueType,
        B: ConfigValueType,
        F: Fn(&A, &B) -> ValidatorResult + 'static,
    {
        self.validators.push(Validator::new(
            description,
            vec![a.index(), b.index()],
            Box::new(move |values| {
                let a = project::<A>(values, 0)?;
                let b = project::<B>(values, 1)?;
                check(&a, &b)
            }),
        ));
    }

    /// Register a validator over three options
    pub fn add_validator3<A, B, C, F>(
        &mut self,
        description: impl Into<String>,
        a: OptionHandle<A>,
        b: OptionHandle<B>,
        c: OptionHandle<C>,
        check: F,
    ) where
        A: ConfigValueType,
        B: ConfigValueType,
        C: ConfigValueType,
        F: Fn(&A, &B, &C) -> ValidatorResult + 'static,
    {
        self.validators.push(Validator::new(
            description,
            vec![a.index(), b.index(), c.index()],
            Box::new(move |values| {
                let a = project::<A>(values, 0)?;
                let b = project::<B>(values, 1)?;
                let c = project::<C>(values, 2)?;
                check(&a, &b, &c)
            }),
        ));
    }

    /// Apply a configuration tree.
    ///
    /// The root must be an object; every leaf must name a registered
    /// option; every option without a default must end up with a value;
    /// every validator must pass. On any failure nothing is applied: the
    /// options and their bound external variables keep their prior state.
    /// On success the collected `Lossy` warnings are returned.
    pub fn apply_tree(&mut self, tree: &TreeNode) -> Result<Vec<ConfigWarning>, ConfigError> {
        if !tree.is_object() {
            return Err(ConfigError::NotObject);
        }

        // Flatten the tree into (option, node) pairs.
        let mut leaves: Vec<(usize, &TreeNode)> = Vec::new();
        let mut path: Vec<PathKey> = Vec::new();
        self.collect_leaves(&mut path, tree, &mut leaves)?;

        // Stage the coerced values; nothing is visible yet.
        let mut staged: BTreeMap<usize, ConfigValue> = BTreeMap::new();
        let mut warnings: Vec<ConfigWarning> = Vec::new();
        for (index, node) in leaves {
            let option = &self.options[index];
            let value = ConfigValue::from_tree(node, option.kind(), option.identifier(), &mut warnings)?;
            staged.insert(index, value);
        }

        // Every option without a default must now have a value.
        for (index, option) in self.options.iter().enumerate() {
            if !option.has_value() && !staged.contains_key(&index) {
                return Err(ConfigError::MissingRequired {
                    path: path_to_string(&self.option_paths[index]),
                });
            }
        }

        // Validators see the staged snapshot, in registration order.
        for validator in &self.validators {
            let values = validator
                .option_indices()
                .iter()
                .map(|&index| {
                    staged
                        .get(&index)
                        .or_else(|| self.options[index].current())
                        .ok_or_else(|| ConfigError::Unset {
                            identifier: self.options[index].identifier().to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if let Err(message) = validator.run(&values) {
                let options = validator
                    .option_indices()
                    .iter()
                    .zip(&values)
                    .map(|(&index, value)| {
                        format!("{} = {}", self.options[index].identifier(), value.render())
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ConfigError::ValidatorFailed { options, message });
            }
        }

        // Everything passed; commit and write through the bindings.
        for (index, value) in staged {
            self.options[index].commit(value);
        }
        Ok(warnings)
    }

    /// Parse a shorthand string and apply it; equivalent to
    /// `apply_tree(&shorthand::parse(input)?)`.
    pub fn apply_shorthand(&mut self, input: &str) -> Result<Vec<ConfigWarning>, ConfigError> {
        let tree = shorthand::parse(input)?;
        self.apply_tree(&tree)
    }

    /// Look up the option registered at `path`
    pub fn option_at(&self, path: impl IntoOptionPath) -> Result<&ConfigOption, ConfigError> {
        let path = path.into_path();
        self.path_index
            .get(&path)
            .map(|&index| &self.options[index])
            .ok_or_else(|| ConfigError::UnknownOption {
                path: path_to_string(&path),
                known: self.known_paths(),
            })
    }

    /// All registered options in registration order
    pub fn options(&self) -> impl Iterator<Item = &ConfigOption> {
        self.options.iter()
    }

    /// Render self-documenting output in the requested mode.
    ///
    /// Options at the same tree level appear in registration order and
    /// sub-trees follow their parent level's own options.
    pub fn documentation(&self, mode: DocMode) -> String {
        let all: Vec<usize> = (0..self.options.len()).collect();
        let tree = self.doc_subtree(0, &all);
        let brief = serde_json::to_string_pretty(&tree).unwrap_or_else(|_| "{}".to_string());
        if mode == DocMode::Brief {
            return brief;
        }

        let mut out = brief;
        out.push_str("\n\nOptions:\n");
        for (index, option) in self.options.iter().enumerate() {
            out.push_str(&format!(
                "\n{} ({})\n",
                path_to_string(&self.option_paths[index]),
                option.kind()
            ));
            out.push_str(&format!("    {}\n", option.description()));
            let value = match option.current() {
                Some(value) => value.render(),
                None => MUST_BE_SPECIFIED.to_string(),
            };
            out.push_str(&format!("    value: {value}\n"));
            if let Some(default) = option.render_default() {
                if default != value {
                    out.push_str(&format!("    default: {default}\n"));
                }
            }
            let descriptions: Vec<&str> = self
                .validators
                .iter()
                .filter(|v| v.option_indices().contains(&index))
                .map(Validator::description)
                .collect();
            if !descriptions.is_empty() {
                out.push_str("    validators:\n");
                for description in descriptions {
                    out.push_str(&format!("        - {description}\n"));
                }
            }
        }
        out
    }

    fn verify_key_names(&self, path: &[PathKey]) -> Result<(), ConfigError> {
        for key in path {
            if let PathKey::Key(name) = key {
                if !shorthand::is_valid_identifier(name) {
                    return Err(ConfigError::InvalidIdentifier {
                        identifier: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn verify_path(&self, path: &[PathKey]) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPath {
            path: path_to_string(path),
            reason: reason.to_string(),
        };
        if path.is_empty() {
            return Err(invalid("an option path must not be empty"));
        }
        if !matches!(path.first(), Some(PathKey::Key(_))) {
            return Err(invalid("a path must begin with a string key"));
        }
        if !matches!(path.last(), Some(PathKey::Key(_))) {
            return Err(invalid("a path must end with the option's identifier"));
        }
        self.verify_key_names(path)?;
        for registered in self.path_index.keys() {
            if registered.as_slice() == path {
                return Err(invalid("an option is already registered at this path"));
            }
            let shorter = registered.len().min(path.len());
            if registered[..shorter] == path[..shorter] {
                return Err(invalid("the path nests inside another option's path"));
            }
        }
        Ok(())
    }

    fn known_paths(&self) -> String {
        let paths: Vec<String> = self.path_index.keys().map(|p| path_to_string(p)).collect();
        paths.join(", ")
    }

    fn is_known_prefix(&self, path: &[PathKey]) -> bool {
        self.path_index
            .keys()
            .any(|registered| registered.len() > path.len() && registered[..path.len()] == *path)
    }

    fn collect_leaves<'t>(
        &self,
        path: &mut Vec<PathKey>,
        node: &'t TreeNode,
        out: &mut Vec<(usize, &'t TreeNode)>,
    ) -> Result<(), ConfigError> {
        if !path.is_empty() {
            // An exact hit is a leaf, even for an array node: list-kind
            // options consume the whole array.
            if let Some(&index) = self.path_index.get(path.as_slice()) {
                out.push((index, node));
                return Ok(());
            }
            if !self.is_known_prefix(path) {
                return Err(ConfigError::UnknownOption {
                    path: path_to_string(path),
                    known: self.known_paths(),
                });
            }
        }
        match node {
            TreeNode::Object(entries) => {
                for (key, child) in entries {
                    path.push(PathKey::Key(key.clone()));
                    self.collect_leaves(path, child, out)?;
                    path.pop();
                }
                Ok(())
            }
            TreeNode::Array(items) => {
                for (offset, child) in items.iter().enumerate() {
                    path.push(PathKey::Index(offset));
                    self.collect_leaves(path, child, out)?;
                    path.pop();
                }
                Ok(())
            }
            _ => Err(ConfigError::UnknownOption {
                path: path_to_string(path),
                known: self.known_paths(),
            }),
        }
    }

    fn doc_subtree(&self, depth: usize, members: &[usize]) -> TreeNode {
        let mut leaves: Vec<usize> = Vec::new();
        let mut groups: Vec<(PathKey, Vec<usize>)> = Vec::new();
        for &index in members {
            let path = &self.option_paths[index];
            if path.len() == depth + 1 {
                leaves.push(index);
            } else {
                let key = path[depth].clone();
                match groups.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, group)) => group.push(index),
                    None => groups.push((key, vec![index])),
                }
            }
        }

        let only_indices = leaves.is_empty()
            && !groups.is_empty()
            && groups.iter().all(|(k, _)| matches!(k, PathKey::Index(_)));
        if only_indices {
            let len = groups
                .iter()
                .filter_map(|(k, _)| match k {
                    PathKey::Index(i) => Some(i + 1),
                    PathKey::Key(_) => None,
                })
                .max()
                .unwrap_or(0);
            let mut items = vec![TreeNode::Null; len];
            for (key, group) in groups {
                if let PathKey::Index(i) = key {
                    items[i] = self.doc_subtree(depth + 1, &group);
                }
            }
            return TreeNode::Array(items);
        }

        let mut object = Map::new();
        for index in leaves {
            let leaf = match self.options[index].current() {
                Some(value) => value.to_tree(),
                None => TreeNode::from(MUST_BE_SPECIFIED),
            };
            object.insert(self.options[index].identifier().to_string(), leaf);
        }
        for (key, group) in groups {
            object.insert(key.to_string(), self.doc_subtree(depth + 1, &group));
        }
        TreeNode::Object(object)
    }
}

/// Sentinel shown in documentation for options that still need a value
pub const MUST_BE_SPECIFIED: &str = "[must be specified]";

fn project<T: ConfigValueType>(values: &[&ConfigValue], position: usize) -> Result<T, String> {
    values
        .get(position)
        .and_then(|value| value.get::<T>())
        .ok_or_else(|| format!("internal: validator argument {position} has the wrong kind"))
}

/// A prefix-scoped view of a [`ConfigManager`]
///
/// Options added through the view land in the root registry with the
/// scope's path prepended, so handles and validators remain global.
#[derive(Debug)]
pub struct ScopedManager<'m> {
    manager: &'m mut ConfigManager,
    prefix: Vec<PathKey>,
}

impl ScopedManager<'_> {
    pub fn add_option<T: ConfigValueType>(
        &mut self,
        path: impl IntoOptionPath,
        description: impl Into<String>,
        target: &Rc<RefCell<T>>,
        default: Option<T>,
    ) -> Result<OptionHandle<T>, ConfigError> {
        let mut full = self.prefix.clone();
        full.extend(path.into_path());
        self.manager.add_option(full, description, target, default)
    }

    /// A deeper scope below this one
    pub fn sub_manager(&mut self, path: impl IntoOptionPath) -> Result<ScopedManager<'_>, ConfigError> {
        let mut full = self.prefix.clone();
        full.extend(path.into_path());
        self.manager.sub_manager(full)
    }
}

/// Deep-merge `overlay` into `base`; non-object overlay leaves win.
///
/// Used by the CLI to combine `--config-json` and `--config-shorthand`,
/// with the shorthand as the overlay.
pub fn merge_trees(base: &mut TreeNode, overlay: TreeNode) {
    match (base, overlay) {
        (TreeNode::Object(base_map), TreeNode::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_trees(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, overlay) => *base_slot = overlay,
    }
}
