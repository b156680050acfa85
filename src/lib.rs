//! # declarg
//!
//! Declarative command-line grammars: a plain-text specification is
//! compiled into a [`Grammar`], and argument streams are matched
//! against it.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! engine    → Stateful matching of argv against a compiled grammar
//!   ↓
//! pattern   → Per-spec anchored matchers, boundary and flag guards
//!   ↓
//! grammar   → Spec-text compiler, argument specs, directives
//!   ↓
//! types     → Parameter-type registry, builtins, validator chains
//!   ↓
//! scan      → Cursor scanner: nested delimiters, quotelikes, code blocks
//!   ↓
//! value     → The dynamic value model matches produce
//! ```
//!
//! ## Example
//!
//! ```
//! use declarg::{compile, match_args};
//!
//! let grammar = compile(concat!(
//!     "-count <n:i>\tRepetitions\n",
//!     "-v\tVerbose [repeatable]\n",
//! ))?;
//! let result = match_args(&grammar, ["-count", "3", "-v", "-v"]);
//! assert_eq!(result["-count"].as_int(), Some(3));
//! assert_eq!(result["-v"], 2i64);
//! # Ok::<(), declarg::CompileError>(())
//! ```

// ============================================================================
// MODULES (dependency order: value → scan → types → grammar → pattern → engine)
// ============================================================================

/// Dynamic values recorded by a match
pub mod value;

/// Cursor scanner: nested delimiters, quotelikes, heredocs, code blocks
pub mod scan;

/// Parameter types: registry, builtins, alias chains, validators
pub mod types;

/// Grammar compilation: argument specs, directives, the compiler
pub mod grammar;

/// Per-spec anchored matchers
pub mod pattern;

/// The match engine
pub mod engine;

/// Compilation errors
pub mod error;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use engine::{MatchError, MatchResult, match_args};
pub use error::CompileError;
pub use grammar::{
    ActionContext, ActionKind, ArgumentSpec, ClusterMode, Compiler, Grammar, compile,
};
pub use scan::{Scanned, Scanner};
pub use types::{TypeRegistry, Validator};
pub use value::Value;
