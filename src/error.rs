//! Error types for grammar compilation.

use thiserror::Error;

/// Errors raised while compiling a grammar specification.
///
/// All of these are fatal: compilation aborts at the first one. Runtime
/// matching never produces a `CompileError`; its failures are accumulated
/// on the [`MatchResult`](crate::engine::MatchResult) instead.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A parameter referenced a type name with no registered terminal pattern.
    #[error("unknown parameter type `{0}`")]
    UnknownType(String),

    /// Alias resolution revisited a type name.
    #[error("cyclic type alias involving `{0}`")]
    CyclicType(String),

    /// A `<name:type>` parameter could not be parsed.
    #[error("malformed parameter `{text}` on line {line}")]
    MalformedParameter { text: String, line: usize },

    /// An action block appeared before any argument specification.
    #[error("action block on line {0} is not attached to any argument")]
    UnattachedAction(usize),

    /// A bracketed or codeblock construct never closed.
    #[error("unterminated {what} on line {line}: {detail}")]
    Unterminated {
        what: &'static str,
        line: usize,
        detail: String,
    },

    /// `[cluster: ...]` named a mode other than none/single/flags/any.
    #[error("unknown clustering mode `{0}`")]
    UnknownClusterMode(String),

    /// A `[requires: ...]` expression failed to parse.
    #[error("malformed requires expression `{expr}` on line {line}")]
    MalformedRequires { expr: String, line: usize },

    /// `[` / `]` optional-group markers did not balance within one spec.
    #[error("unbalanced optional-group brackets in `{spec}` on line {line}")]
    UnbalancedOptionalGroup { spec: String, line: usize },

    /// An action or validator snippet had no registered callback.
    #[error("no callback registered for snippet `{0}`")]
    UnresolvedCallback(String),

    /// A type's pattern fragment did not compile as a regex.
    #[error("pattern for type `{name}` is invalid: {detail}")]
    InvalidTypePattern { name: String, detail: String },

    /// A type directive was syntactically invalid.
    #[error("malformed type directive on line {line}: {detail}")]
    MalformedTypeDirective { line: usize, detail: String },
}

impl CompileError {
    /// Create an unterminated-construct error.
    pub fn unterminated(what: &'static str, line: usize, detail: impl Into<String>) -> Self {
        Self::Unterminated {
            what,
            line,
            detail: detail.into(),
        }
    }

    /// Create a malformed-parameter error.
    pub fn malformed_parameter(text: impl Into<String>, line: usize) -> Self {
        Self::MalformedParameter {
            text: text.into(),
            line,
        }
    }

    /// Create a malformed-type-directive error.
    pub fn malformed_type_directive(line: usize, detail: impl Into<String>) -> Self {
        Self::MalformedTypeDirective {
            line,
            detail: detail.into(),
        }
    }
}
