//! Named parameter types: pattern fragments, validators, alias resolution.
//!
//! A [`TypeRegistry`] maps type names (the text after `:` in `<name:type>`)
//! to [`ParameterType`] entries. An entry carries either a literal pattern
//! fragment or an alias to another entry, plus an optional validator /
//! converter closure. Alias chains are resolved with a visited-set so a
//! cyclic declaration fails compilation instead of looping.
//!
//! Pattern fragments may embed two contextual placeholders that the pattern
//! builder resolves at use-site: `%T` marks the trailing boundary (whatever
//! literal follows the parameter in its spec, or the whitespace/end
//! boundary) and `%D` marks a boundary-respecting digit class.

mod builtin;

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::error::CompileError;
use crate::value::Value;

/// Trailing-boundary placeholder in a pattern fragment.
pub const BOUNDARY_PLACEHOLDER: &str = "%T";
/// Digit-class placeholder in a pattern fragment.
pub const DIGIT_PLACEHOLDER: &str = "%D";

/// Registry name of the type used when a parameter declares none.
pub const DEFAULT_TYPE: &str = "";

/// A validator / converter step.
///
/// Called with the parameter name and the value produced so far. Returning
/// `Ok(Some(v))` replaces the value (conversion), `Ok(None)` keeps it, and
/// `Err(message)` rejects the match with a parameter-name-carrying message.
pub type Validator = Arc<dyn Fn(&str, &Value) -> Result<Option<Value>, String> + Send + Sync>;

/// How a type produces its pattern.
#[derive(Clone)]
pub enum TypeKind {
    /// A literal pattern fragment (may embed `%T` / `%D`).
    Pattern(String),
    /// The name of another registered type to resolve through.
    Alias(SmolStr),
}

/// A registered parameter type.
#[derive(Clone)]
pub struct ParameterType {
    pub name: SmolStr,
    pub kind: TypeKind,
    pub validator: Option<Validator>,
}

impl std::fmt::Debug for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind: &dyn std::fmt::Debug = match &self.kind {
            TypeKind::Pattern(p) => p,
            TypeKind::Alias(a) => a,
        };
        f.debug_struct("ParameterType")
            .field("name", &self.name)
            .field("kind", kind)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Named parameter types, in registration order.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<SmolStr, ParameterType>,
}

impl TypeRegistry {
    /// An empty registry, no builtins.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the builtin types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    /// Register a type. When `is_alias` is set, `pattern_or_alias` names
    /// another type (which may be registered later); otherwise it is a
    /// literal pattern fragment. Re-registering a name replaces it.
    pub fn add_type(
        &mut self,
        name: &str,
        pattern_or_alias: &str,
        validator: Option<Validator>,
        is_alias: bool,
    ) {
        let kind = if is_alias {
            TypeKind::Alias(SmolStr::new(pattern_or_alias))
        } else {
            TypeKind::Pattern(pattern_or_alias.to_string())
        };
        self.types.insert(
            SmolStr::new(name),
            ParameterType {
                name: SmolStr::new(name),
                kind,
                validator,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ParameterType> {
        self.types.get(name)
    }

    /// Walk the alias chain to a terminal pattern fragment.
    pub fn resolve_pattern(&self, name: &str) -> Result<&str, CompileError> {
        let mut visited = FxHashSet::default();
        let mut current = name;
        loop {
            if !visited.insert(current) {
                return Err(CompileError::CyclicType(name.to_string()));
            }
            let entry = self
                .types
                .get(current)
                .ok_or_else(|| CompileError::UnknownType(current.to_string()))?;
            match &entry.kind {
                TypeKind::Pattern(pattern) => return Ok(pattern),
                TypeKind::Alias(target) => current = target.as_str(),
            }
        }
    }

    /// Walk the alias chain collecting each layer's validator, outermost
    /// (most derived) first. Callers run the chain base-first so a derived
    /// constraint observes its base's converted value.
    pub fn resolve_validators(&self, name: &str) -> Result<Vec<Validator>, CompileError> {
        let mut visited = FxHashSet::default();
        let mut validators = Vec::new();
        let mut current = name;
        loop {
            if !visited.insert(current) {
                return Err(CompileError::CyclicType(name.to_string()));
            }
            let entry = self
                .types
                .get(current)
                .ok_or_else(|| CompileError::UnknownType(current.to_string()))?;
            if let Some(v) = &entry.validator {
                validators.push(Arc::clone(v));
            }
            match &entry.kind {
                TypeKind::Pattern(_) => return Ok(validators),
                TypeKind::Alias(target) => current = target.as_str(),
            }
        }
    }
}
