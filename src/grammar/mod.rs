//! Compiled grammar model: argument specs, directives, the grammar itself.
//!
//! A [`Grammar`] is produced once by [`compiler::Compiler::compile`] and is
//! immutable afterwards (apart from the `[debug]` toggle), so it can be
//! shared and reused across any number of match invocations.

pub mod compiler;
mod requires;

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::pattern::SpecMatcher;
use crate::types::TypeRegistry;
use crate::value::Value;

pub use compiler::{Compiler, compile};
pub use requires::RequiresExpr;

/// A parameter declared as `<name:type>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: SmolStr,
    /// Registered type name; empty for an untyped parameter.
    pub type_name: SmolStr,
    /// The parameter abuts the preceding component with no whitespace.
    pub no_leading_ws: bool,
}

/// One element of an argument spec's component sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    /// An exact literal that must appear in the argument stream.
    Punctuator { text: SmolStr },
    /// A single typed value.
    ScalarParam(ParamSpec),
    /// One or more whitespace-separated typed values (`<name:type>...`).
    ArrayParam(ParamSpec),
    OptionalGroupStart,
    OptionalGroupEnd,
}

impl Component {
    pub fn param(&self) -> Option<&ParamSpec> {
        match self {
            Component::ScalarParam(p) | Component::ArrayParam(p) => Some(p),
            _ => None,
        }
    }
}

/// Whether an action runs as soon as its spec matches or is queued until
/// the whole parse has finished without errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Immediate,
    Deferred,
}

/// Data available to an action callback.
#[derive(Debug)]
pub struct ActionContext<'a> {
    /// Flag literal of the spec that matched (empty for positional specs).
    pub flag: &'a str,
    /// The value recorded for this match, if any parameter captured one.
    pub value: Option<&'a Value>,
}

/// Host-supplied behavior for an action snippet.
pub type ActionFn = Arc<dyn Fn(&ActionContext<'_>) -> Result<(), String> + Send + Sync>;

/// An action snippet resolved to its host callback.
#[derive(Clone)]
pub struct ActionCallback {
    /// The snippet body the callback was registered under.
    pub key: String,
    pub kind: ActionKind,
    pub run: ActionFn,
}

impl std::fmt::Debug for ActionCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionCallback")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish()
    }
}

/// One compiled argument specification.
#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    /// Creation-order id; the final sort tie-break.
    pub id: u32,
    /// Flag literal, empty for a purely positional spec.
    pub flag: SmolStr,
    pub components: Vec<Component>,
    pub required: bool,
    pub repeatable: bool,
    pub nocase: bool,
    /// Flags declared mutually exclusive via `[mutex: ...]`.
    pub mutex: FxHashSet<SmolStr>,
    /// Flags this spec excludes via `[excludes: ...]`.
    pub excludes: FxHashSet<SmolStr>,
    pub requires: Option<RequiresExpr>,
    pub actions: Vec<ActionCallback>,
    pub description: String,
    /// Id of the spec this one is ditto-linked to.
    pub ditto_of: Option<u32>,
}

impl ArgumentSpec {
    /// Number of parameter components, the secondary sort key.
    pub fn param_count(&self) -> usize {
        self.components.iter().filter(|c| c.param().is_some()).count()
    }
}

/// Flag-clustering behavior for short prefixed flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterMode {
    /// Never cluster.
    None,
    /// Only single-character prefixed flags cluster.
    SingleCharOnly,
    /// Any prefixed flag clusters; grafts must still look like a flag.
    PrefixedFlags,
    /// Any prefixed flag clusters and grafts are kept unconditionally.
    #[default]
    Any,
}

impl ClusterMode {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "single" => Some(Self::SingleCharOnly),
            "flags" => Some(Self::PrefixedFlags),
            "any" => Some(Self::Any),
            _ => None,
        }
    }
}

/// Reserved help flags, pruned of any literal the grammar declares itself.
pub(crate) const HELP_POOL: &[&str] = &["-help", "--help", "-h", "-?"];
/// Reserved version flags, pruned the same way.
pub(crate) const VERSION_POOL: &[&str] = &["-version", "--version", "-v", "-V"];

/// An immutable compiled grammar.
#[derive(Debug, Clone)]
pub struct Grammar {
    /// Priority-sorted argument specs.
    pub(crate) specs: Vec<ArgumentSpec>,
    /// Per-spec matchers, parallel to `specs`.
    pub(crate) matchers: Vec<SpecMatcher>,
    pub(crate) registry: TypeRegistry,
    /// Symmetric mutual-exclusion table, flag to blocked flags.
    pub(crate) mutex_table: FxHashMap<SmolStr, FxHashSet<SmolStr>>,
    pub(crate) strict: bool,
    pub(crate) cluster: ClusterMode,
    /// Grammar-wide default case-insensitivity.
    pub(crate) nocase: bool,
    pub(crate) help_flags: Vec<SmolStr>,
    pub(crate) version_flags: Vec<SmolStr>,
    /// Raw usage text: decoration lines and directive-stripped spec lines.
    pub(crate) usage: Vec<String>,
    debug: bool,
}

impl Grammar {
    pub fn specs(&self) -> &[ArgumentSpec] {
        &self.specs
    }

    /// Find a spec by its flag literal.
    pub fn spec(&self, flag: &str) -> Option<&ArgumentSpec> {
        self.specs.iter().find(|s| s.flag == flag)
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn cluster(&self) -> ClusterMode {
        self.cluster
    }

    /// Raw usage text for the external CLI layer to render.
    pub fn usage_lines(&self) -> &[String] {
        &self.usage
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// The one post-compilation toggle: enable or disable match tracing.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub(crate) fn blocked_by(&self, flag: &str) -> Option<&FxHashSet<SmolStr>> {
        self.mutex_table.get(flag)
    }
}
