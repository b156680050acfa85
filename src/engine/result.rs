//! The outcome of matching an argument stream against a grammar.

use std::ops::Index;

use indexmap::IndexMap;
use smol_str::SmolStr;
use thiserror::Error;

use crate::value::Value;

/// One problem found while matching.
#[derive(Debug, Clone, Error)]
pub enum MatchError {
    /// A parameter matched textually but a validator rejected it.
    #[error("{0}")]
    Validation(String),
    #[error("required argument `{0}` was not given")]
    MissingRequired(SmolStr),
    #[error("`{flag}` requires: {expr}")]
    UnsatisfiedRequires { flag: SmolStr, expr: String },
    #[error("`{flag}` may not be used with `{blocked_by}`")]
    MutexConflict { flag: SmolStr, blocked_by: SmolStr },
    #[error("unrecognized argument `{0}`")]
    UnrecognizedArgument(String),
    #[error("action for `{flag}` failed: {message}")]
    ActionFailed { flag: SmolStr, message: String },
}

/// Everything a match run produced: the value cache, leftover tokens,
/// and every error encountered.
///
/// Matching never short-circuits on errors (help and version requests
/// aside), so `errors` reflects the whole argument stream.
#[derive(Debug, Default)]
pub struct MatchResult {
    pub(crate) cache: IndexMap<SmolStr, Value>,
    pub(crate) unused: Vec<String>,
    pub(crate) errors: Vec<MatchError>,
    pub(crate) help_requested: bool,
    pub(crate) version_requested: bool,
}

impl MatchResult {
    /// Look up the value recorded for a flag (or, for a positional
    /// spec, a parameter name).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.cache.get(key)
    }

    /// Whether the flag appeared in the argument stream.
    pub fn found(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Tokens no spec matched, in stream order.
    pub fn unused(&self) -> &[String] {
        &self.unused
    }

    pub fn errors(&self) -> &[MatchError] {
        &self.errors
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn help_requested(&self) -> bool {
        self.help_requested
    }

    pub fn version_requested(&self) -> bool {
        self.version_requested
    }

    /// Iterate every recorded `(key, value)` pair, in match order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cache.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Panics when the key was never matched; use [`MatchResult::get`] for
/// a fallible lookup.
impl Index<&str> for MatchResult {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        match self.cache.get(key) {
            Some(value) => value,
            None => panic!("no value recorded for `{key}`"),
        }
    }
}
