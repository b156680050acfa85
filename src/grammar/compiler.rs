//! The grammar compiler: declaration text in, immutable [`Grammar`] out.
//!
//! A declaration is processed line-oriented. Lines divide into:
//!
//! * comment lines (first non-blank char `#`),
//! * `[pvtype: ...]` type directives,
//! * `{ ... }` action blocks, attached to the preceding argument spec,
//! * argument lines (spec text, separator, description),
//! * indented continuation lines extending the current description,
//! * everything else: decoration text, kept verbatim for usage output.
//!
//! Directives in square brackets may appear in descriptions and in
//! decoration text; they are applied and stripped before the text is
//! recorded.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::error::CompileError;
use crate::pattern::SpecMatcher;
use crate::scan::{BRACE_PAIR, CODE_PAIRS, Scanner};
use crate::types::{DEFAULT_TYPE, TypeRegistry, Validator};

use super::{
    ActionCallback, ActionFn, ActionKind, ArgumentSpec, ClusterMode, Component, Grammar,
    HELP_POOL, ParamSpec, RequiresExpr, VERSION_POOL,
};

// ============================================================
// Line classification
// ============================================================

/// Spec text and description are separated by a tab run or three or
/// more spaces.
static DEFAULT_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\t+|[ ]{3,}").unwrap_or_else(|e| panic!("separator pattern: {e}"))
});

static SIMPLE_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\s*(required|repeatable|nocase|ditto|strict|tight|debug)\s*\]")
        .unwrap_or_else(|e| panic!("directive pattern: {e}"))
});

static VALUED_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\s*(mutex|excludes|requires|cluster)\s*:([^\]]*)\]")
        .unwrap_or_else(|e| panic!("directive pattern: {e}"))
});

/// A GNU-style `-x, --long ...` pair at the start of a spec.
static GNU_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-[^\s,<\[\]]+)\s*,\s*(--?[^\s,<\[\]]+)(.*)$")
        .unwrap_or_else(|e| panic!("pair pattern: {e}"))
});

#[derive(Debug, Clone)]
enum Directive {
    Required,
    Repeatable,
    Nocase,
    Ditto,
    Strict,
    Tight,
    Debug,
    Mutex(Vec<SmolStr>),
    Excludes(Vec<SmolStr>),
    Requires(String),
    Cluster(String),
}

/// Strip every directive from `text`, returning the cleaned text and
/// the directives in source order.
fn extract_directives(text: &str) -> (String, Vec<Directive>) {
    let mut found: Vec<(std::ops::Range<usize>, Directive)> = Vec::new();
    for caps in SIMPLE_DIRECTIVE.captures_iter(text) {
        let range = caps.get(0).map(|m| m.range()).unwrap_or_default();
        let directive = match &caps[1] {
            "required" => Directive::Required,
            "repeatable" => Directive::Repeatable,
            "nocase" => Directive::Nocase,
            "ditto" => Directive::Ditto,
            "strict" => Directive::Strict,
            "tight" => Directive::Tight,
            _ => Directive::Debug,
        };
        found.push((range, directive));
    }
    for caps in VALUED_DIRECTIVE.captures_iter(text) {
        let range = caps.get(0).map(|m| m.range()).unwrap_or_default();
        let body = caps[2].trim().to_string();
        let directive = match &caps[1] {
            "mutex" => Directive::Mutex(body.split_whitespace().map(SmolStr::new).collect()),
            "excludes" => Directive::Excludes(body.split_whitespace().map(SmolStr::new).collect()),
            "requires" => Directive::Requires(body),
            _ => Directive::Cluster(body),
        };
        found.push((range, directive));
    }
    found.sort_by_key(|(range, _)| range.start);

    let mut cleaned = String::with_capacity(text.len());
    let mut last = 0;
    for (range, _) in &found {
        cleaned.push_str(&text[last..range.start]);
        last = range.end;
    }
    cleaned.push_str(&text[last..]);
    (cleaned, found.into_iter().map(|(_, d)| d).collect())
}

// ============================================================
// Compiler
// ============================================================

/// Builder for compiling declaration text into a [`Grammar`].
///
/// Action and validator snippets carry no behavior of their own: the
/// host registers a callback for each snippet body it expects, and
/// compilation fails with [`CompileError::UnresolvedCallback`] when a
/// declaration names a snippet nobody registered.
pub struct Compiler {
    registry: TypeRegistry,
    validators: FxHashMap<String, Validator>,
    actions: FxHashMap<String, (ActionKind, ActionFn)>,
    separator: Regex,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            registry: TypeRegistry::with_builtins(),
            validators: FxHashMap::default(),
            actions: FxHashMap::default(),
            separator: DEFAULT_SEPARATOR.clone(),
        }
    }

    /// Pre-register a parameter type, exactly as a `[pvtype: ...]`
    /// directive would.
    pub fn register_type(
        &mut self,
        name: &str,
        pattern_or_alias: &str,
        validator: Option<Validator>,
        is_alias: bool,
    ) -> &mut Self {
        self.registry.add_type(name, pattern_or_alias, validator, is_alias);
        self
    }

    /// Supply the behavior for a `[pvtype: ... { snippet }]` validator.
    /// Snippets are keyed by their trimmed body text.
    pub fn register_validator(&mut self, snippet: &str, validator: Validator) -> &mut Self {
        self.validators.insert(snippet.trim().to_string(), validator);
        self
    }

    /// Supply the behavior for a `{ snippet }` action block.
    pub fn register_action(
        &mut self,
        snippet: &str,
        kind: ActionKind,
        action: ActionFn,
    ) -> &mut Self {
        self.actions.insert(snippet.trim().to_string(), (kind, action));
        self
    }

    /// Override the spec/description separator pattern.
    pub fn separator(&mut self, separator: Regex) -> &mut Self {
        self.separator = separator;
        self
    }

    /// Compile declaration text into a grammar.
    pub fn compile(&self, text: &str) -> Result<Grammar, CompileError> {
        let mut st = CompileState {
            specs: Vec::new(),
            registry: self.registry.clone(),
            mutex_table: FxHashMap::default(),
            usage: Vec::new(),
            strict: false,
            cluster: None,
            nocase: false,
            debug: false,
            next_id: 0,
            last_primary: None,
            last_line_specs: Vec::new(),
        };

        let mut pos = 0;
        let mut line_no = 1;
        while pos < text.len() {
            let rest = &text[pos..];
            let line_len = rest.find('\n').unwrap_or(rest.len());
            let line = &rest[..line_len];
            let trimmed = line.trim_start();

            if trimmed.starts_with("[pvtype:") {
                let consumed = self.parse_type_directive(rest, line_no, &mut st)?;
                line_no += rest[..consumed].matches('\n').count();
                pos += consumed;
                (pos, line_no) = eat_blank_tail(text, pos, line_no);
                continue;
            }
            if trimmed.starts_with('{') {
                let consumed = self.parse_action_block(rest, line_no, &mut st)?;
                line_no += rest[..consumed].matches('\n').count();
                pos += consumed;
                (pos, line_no) = eat_blank_tail(text, pos, line_no);
                continue;
            }

            if trimmed.is_empty() {
                st.usage.push(String::new());
            } else if trimmed.starts_with('#') {
                // Comment line.
            } else if let Some(sep) = self
                .separator
                .find(line)
                .filter(|m| m.start() > 0 && !line.starts_with(char::is_whitespace))
            {
                let spec_text = &line[..sep.start()];
                let description = &line[sep.end()..];
                self.parse_argument_line(spec_text, description, line_no, &mut st)?;
            } else if line.starts_with(char::is_whitespace) && !st.last_line_specs.is_empty() {
                self.parse_continuation_line(line, line_no, &mut st)?;
            } else {
                let (cleaned, directives) = extract_directives(line);
                st.usage.push(cleaned.trim_end().to_string());
                let empty: Vec<usize> = Vec::new();
                for directive in directives {
                    apply_directive(directive, &mut st, &empty, None, line_no, false)?;
                }
            }

            pos += line_len;
            if pos < text.len() {
                pos += 1;
            }
            line_no += 1;
        }

        self.finish(st)
    }

    // --------------------------------------------------------
    // Line parsers
    // --------------------------------------------------------

    /// Parse `[pvtype: name pattern {action}]` starting at `rest` and
    /// return the number of bytes consumed.
    fn parse_type_directive(
        &self,
        rest: &str,
        line_no: usize,
        st: &mut CompileState,
    ) -> Result<usize, CompileError> {
        let mut scanner = Scanner::new(rest);
        scanner.skip_prefix(None);
        if !scanner.eat_str("[pvtype:") {
            return Err(CompileError::malformed_type_directive(
                line_no,
                "expected `[pvtype:`",
            ));
        }
        skip_inline_ws(&mut scanner);

        let name = match scanner.peek() {
            Some('\'') | Some('"') => {
                let quoted = scanner.scan_quotelike(None, false).ok_or_else(|| {
                    CompileError::malformed_type_directive(line_no, "unterminated type name")
                })?;
                quoted.body.to_string()
            }
            _ => bare_word(&mut scanner, &[']', '{']),
        };
        if name.is_empty() {
            return Err(CompileError::malformed_type_directive(
                line_no,
                "missing type name",
            ));
        }
        skip_inline_ws(&mut scanner);

        // Pattern: a quotelike (including a raw `/.../`), or a bare word.
        // A body beginning with `:` names another type instead.
        let mut pattern = String::new();
        let mut has_pattern = false;
        match scanner.peek() {
            Some(']') | Some('{') | None => {}
            Some(_) => {
                if let Some(quoted) = scanner.scan_quotelike(None, true) {
                    pattern = quoted.body.to_string();
                } else {
                    pattern = bare_word(&mut scanner, &[']', '{']);
                }
                has_pattern = true;
            }
        }
        let is_alias = has_pattern && pattern.starts_with(':');
        if is_alias {
            pattern = pattern[1..].trim_start().to_string();
        }
        skip_inline_ws(&mut scanner);

        let mut validator = None;
        if scanner.peek() == Some('{') {
            let block = scanner.scan_codeblock(CODE_PAIRS, None, BRACE_PAIR).ok_or_else(|| {
                let detail = scanner.last_error().unwrap_or("unterminated block").to_string();
                CompileError::unterminated("type action", line_no, detail)
            })?;
            let key = block.matched[1..block.matched.len() - 1].trim().to_string();
            validator = Some(self.resolve_validator(&key)?);
        }

        scanner.skip_prefix(None);
        if !scanner.eat_str("]") {
            return Err(CompileError::malformed_type_directive(
                line_no,
                "missing closing `]`",
            ));
        }

        trace!(name = %name, alias = is_alias, "registered parameter type");
        let (body, alias) = if has_pattern {
            (pattern, is_alias)
        } else {
            // No pattern at all: behave like the default string type.
            (DEFAULT_TYPE.to_string(), true)
        };
        st.registry.add_type(&name, &body, validator, alias);
        Ok(scanner.pos())
    }

    /// Parse a `{ ... }` action block at `rest`; attach it to the most
    /// recent argument spec.
    fn parse_action_block(
        &self,
        rest: &str,
        line_no: usize,
        st: &mut CompileState,
    ) -> Result<usize, CompileError> {
        let mut scanner = Scanner::new(rest);
        let block = scanner
            .scan_codeblock(CODE_PAIRS, None, BRACE_PAIR)
            .ok_or_else(|| {
                let detail = scanner.last_error().unwrap_or("unterminated block").to_string();
                CompileError::unterminated("action block", line_no, detail)
            })?;
        let key = block.matched[1..block.matched.len() - 1].trim().to_string();
        let idx = st.last_primary.ok_or(CompileError::UnattachedAction(line_no))?;
        let callback = self.resolve_action(&key)?;
        st.specs[idx].actions.push(callback);
        Ok(scanner.pos())
    }

    /// Parse one argument line: spec text to the left of the separator,
    /// description (with embedded directives) to the right.
    fn parse_argument_line(
        &self,
        spec_text: &str,
        description: &str,
        line_no: usize,
        st: &mut CompileState,
    ) -> Result<(), CompileError> {
        let (cleaned, directives) = extract_directives(description);
        let description = cleaned.trim().to_string();
        let spec_text = spec_text.trim();
        let prev_primary = st.last_primary;

        let mut line_specs = Vec::new();
        if let Some(caps) = GNU_PAIR.captures(spec_text) {
            // `-x, --long rest`: two specs, the alias ditto-linked to
            // the primary.
            let primary_text = format!("{}{}", &caps[1], &caps[3]);
            let alias_text = format!("{}{}", &caps[2], &caps[3]);
            let primary = st.push_spec(&primary_text, &description, None, line_no)?;
            let primary_id = st.specs[primary].id;
            let alias = st.push_spec(&alias_text, &description, Some(primary_id), line_no)?;
            line_specs.push(primary);
            line_specs.push(alias);
        } else {
            line_specs.push(st.push_spec(spec_text, &description, None, line_no)?);
        }

        st.usage.push(if description.is_empty() {
            spec_text.to_string()
        } else {
            format!("{spec_text}\t{description}")
        });

        st.last_primary = line_specs.first().copied();
        for directive in directives {
            apply_directive(directive, st, &line_specs, prev_primary, line_no, true)?;
        }
        st.last_line_specs = line_specs;
        Ok(())
    }

    /// An indented line after an argument line extends the current
    /// description; its directives apply to the same spec(s).
    fn parse_continuation_line(
        &self,
        line: &str,
        line_no: usize,
        st: &mut CompileState,
    ) -> Result<(), CompileError> {
        let (cleaned, directives) = extract_directives(line);
        let extra = cleaned.trim();
        if !extra.is_empty() {
            for idx in &st.last_line_specs {
                let desc = &mut st.specs[*idx].description;
                if !desc.is_empty() {
                    desc.push('\n');
                }
                desc.push_str(extra);
            }
            st.usage.push(cleaned.trim_end().to_string());
        }
        let line_specs = st.last_line_specs.clone();
        let prev_primary = st.last_primary;
        for directive in directives {
            apply_directive(directive, st, &line_specs, prev_primary, line_no, true)?;
        }
        Ok(())
    }

    // --------------------------------------------------------
    // Callback resolution
    // --------------------------------------------------------

    fn resolve_validator(&self, key: &str) -> Result<Validator, CompileError> {
        self.validators
            .get(key)
            .cloned()
            .ok_or_else(|| CompileError::UnresolvedCallback(key.to_string()))
    }

    fn resolve_action(&self, key: &str) -> Result<ActionCallback, CompileError> {
        let (kind, run) = self
            .actions
            .get(key)
            .ok_or_else(|| CompileError::UnresolvedCallback(key.to_string()))?;
        Ok(ActionCallback {
            key: key.to_string(),
            kind: *kind,
            run: Arc::clone(run),
        })
    }

    // --------------------------------------------------------
    // Finalization
    // --------------------------------------------------------

    fn finish(&self, mut st: CompileState) -> Result<Grammar, CompileError> {
        // Ditto-linked specs with no actions of their own inherit the
        // primary's, now that every block has been attached.
        for i in 0..st.specs.len() {
            if !st.specs[i].actions.is_empty() {
                continue;
            }
            let Some(source_id) = st.specs[i].ditto_of else { continue };
            if let Some(source) = st.specs.iter().position(|s| s.id == source_id) {
                st.specs[i].actions = st.specs[source].actions.clone();
            }
        }

        // Every parameter type must resolve to a pattern before matchers
        // are built; this is where unknown and cyclic types surface.
        for spec in &st.specs {
            for param in spec.components.iter().filter_map(Component::param) {
                st.registry.resolve_pattern(&param.type_name)?;
            }
        }

        // Priority order: longer flags first, then more parameters,
        // then declaration order.
        st.specs.sort_by(|a, b| {
            b.flag
                .len()
                .cmp(&a.flag.len())
                .then_with(|| b.param_count().cmp(&a.param_count()))
                .then_with(|| a.id.cmp(&b.id))
        });

        let declared: FxHashSet<&str> = st
            .specs
            .iter()
            .filter(|s| !s.flag.is_empty())
            .map(|s| s.flag.as_str())
            .collect();
        let help_flags = HELP_POOL
            .iter()
            .filter(|f| !declared.contains(**f))
            .map(|f| SmolStr::new(*f))
            .collect();
        let version_flags = VERSION_POOL
            .iter()
            .filter(|f| !declared.contains(**f))
            .map(|f| SmolStr::new(*f))
            .collect();

        let all_flags: Vec<SmolStr> = st
            .specs
            .iter()
            .filter(|s| !s.flag.is_empty())
            .map(|s| s.flag.clone())
            .collect();
        let mut matchers = Vec::with_capacity(st.specs.len());
        for spec in &st.specs {
            let others: Vec<SmolStr> = all_flags
                .iter()
                .filter(|f| **f != spec.flag)
                .cloned()
                .collect();
            matchers.push(SpecMatcher::build(spec, &others, &st.registry, st.nocase)?);
        }

        debug!(
            specs = st.specs.len(),
            strict = st.strict,
            "compiled command-line grammar"
        );
        Ok(Grammar {
            specs: st.specs,
            matchers,
            registry: st.registry,
            mutex_table: st.mutex_table,
            strict: st.strict,
            cluster: st.cluster.unwrap_or_default(),
            nocase: st.nocase,
            help_flags,
            version_flags,
            usage: st.usage,
            debug: st.debug,
        })
    }
}

/// Compile declaration text with no host callbacks registered.
pub fn compile(text: &str) -> Result<Grammar, CompileError> {
    Compiler::new().compile(text)
}

// ============================================================
// Compile state
// ============================================================

struct CompileState {
    specs: Vec<ArgumentSpec>,
    registry: TypeRegistry,
    mutex_table: FxHashMap<SmolStr, FxHashSet<SmolStr>>,
    usage: Vec<String>,
    strict: bool,
    cluster: Option<ClusterMode>,
    nocase: bool,
    debug: bool,
    next_id: u32,
    /// Index of the spec subsequent action blocks attach to.
    last_primary: Option<usize>,
    /// Indexes of the specs declared on the most recent argument line.
    last_line_specs: Vec<usize>,
}

impl CompileState {
    fn push_spec(
        &mut self,
        spec_text: &str,
        description: &str,
        ditto_of: Option<u32>,
        line_no: usize,
    ) -> Result<usize, CompileError> {
        let (flag, components) = parse_components(spec_text, line_no)?;
        let id = self.next_id;
        self.next_id += 1;
        self.specs.push(ArgumentSpec {
            id,
            flag,
            components,
            required: false,
            repeatable: false,
            nocase: false,
            mutex: FxHashSet::default(),
            excludes: FxHashSet::default(),
            requires: None,
            actions: Vec::new(),
            description: description.to_string(),
            ditto_of,
        });
        Ok(self.specs.len() - 1)
    }
}

// ============================================================
// Directive application
// ============================================================

/// Apply one directive. `line_specs` names the spec(s) of the current
/// argument line (empty on decoration lines); `spec_context` is false
/// for decoration lines, where per-spec directives are inert and
/// `[nocase]` goes grammar-wide.
fn apply_directive(
    directive: Directive,
    st: &mut CompileState,
    line_specs: &[usize],
    prev_primary: Option<usize>,
    line_no: usize,
    spec_context: bool,
) -> Result<(), CompileError> {
    match directive {
        Directive::Strict => st.strict = true,
        Directive::Debug => st.debug = true,
        Directive::Cluster(name) => {
            let mode = ClusterMode::from_name(name.trim())
                .ok_or_else(|| CompileError::UnknownClusterMode(name.trim().to_string()))?;
            st.cluster = Some(mode);
        }
        Directive::Nocase if !spec_context => st.nocase = true,
        _ if !spec_context => {}

        Directive::Required => {
            for idx in line_specs {
                st.specs[*idx].required = true;
            }
        }
        Directive::Repeatable => {
            for idx in line_specs {
                st.specs[*idx].repeatable = true;
            }
        }
        Directive::Nocase => {
            for idx in line_specs {
                st.specs[*idx].nocase = true;
            }
        }
        Directive::Tight => {
            for idx in line_specs {
                for component in &mut st.specs[*idx].components {
                    match component {
                        Component::ScalarParam(p) | Component::ArrayParam(p) => {
                            p.no_leading_ws = true;
                        }
                        _ => {}
                    }
                }
            }
        }
        Directive::Ditto => {
            let Some(source) = prev_primary else {
                return Ok(());
            };
            let source_id = st.specs[source].id;
            let description = st.specs[source].description.clone();
            for idx in line_specs {
                st.specs[*idx].description = description.clone();
                st.specs[*idx].ditto_of = Some(source_id);
            }
        }
        Directive::Mutex(flags) => {
            for idx in line_specs {
                let own = st.specs[*idx].flag.clone();
                for flag in &flags {
                    if *flag != own {
                        st.specs[*idx].mutex.insert(flag.clone());
                    }
                }
            }
            for a in &flags {
                for b in &flags {
                    if a != b {
                        st.mutex_table.entry(a.clone()).or_default().insert(b.clone());
                    }
                }
            }
        }
        Directive::Excludes(flags) => {
            for idx in line_specs {
                let own = st.specs[*idx].flag.clone();
                for flag in &flags {
                    st.specs[*idx].excludes.insert(flag.clone());
                    if !own.is_empty() && *flag != own {
                        st.mutex_table.entry(own.clone()).or_default().insert(flag.clone());
                        st.mutex_table.entry(flag.clone()).or_default().insert(own.clone());
                    }
                }
            }
        }
        Directive::Requires(expr) => {
            let parsed = RequiresExpr::parse(&expr).map_err(|_| CompileError::MalformedRequires {
                expr: expr.clone(),
                line: line_no,
            })?;
            for idx in line_specs {
                st.specs[*idx].requires = Some(parsed.clone());
            }
        }
    }
    Ok(())
}

/// After a construct that may end mid-line, consume the rest of the
/// line when nothing but whitespace remains on it.
fn eat_blank_tail(text: &str, pos: usize, line_no: usize) -> (usize, usize) {
    let tail = &text[pos..];
    let end = tail.find('\n').map(|i| i + 1).unwrap_or(tail.len());
    if tail[..end].trim().is_empty() && end > 0 {
        (pos + end, line_no + 1)
    } else {
        (pos, line_no)
    }
}

// ============================================================
// Spec-token parsing
// ============================================================

/// Split spec text into a flag literal and its component sequence.
///
/// The first bare token outside any optional group is the flag; later
/// bare tokens are punctuators. `<name:type>` declares a scalar
/// parameter, with a `...` suffix an array one. A parameter written
/// flush against the previous component keeps `no_leading_ws`.
fn parse_components(
    spec_text: &str,
    line_no: usize,
) -> Result<(SmolStr, Vec<Component>), CompileError> {
    let mut flag = SmolStr::default();
    let mut components = Vec::new();
    let mut depth = 0i32;
    let mut first = true;
    let mut after_gap = true;
    let mut i = 0;

    while i < spec_text.len() {
        let c = match spec_text[i..].chars().next() {
            Some(c) => c,
            None => break,
        };
        if c.is_whitespace() {
            after_gap = true;
            i += c.len_utf8();
            continue;
        }
        match c {
            '[' => {
                depth += 1;
                components.push(Component::OptionalGroupStart);
                i += 1;
                after_gap = true;
            }
            ']' => {
                depth -= 1;
                if depth < 0 {
                    return Err(CompileError::UnbalancedOptionalGroup {
                        spec: spec_text.to_string(),
                        line: line_no,
                    });
                }
                components.push(Component::OptionalGroupEnd);
                i += 1;
                after_gap = false;
            }
            '<' => {
                let close = spec_text[i..]
                    .find('>')
                    .ok_or_else(|| CompileError::malformed_parameter(&spec_text[i..], line_no))?;
                let text = &spec_text[i..=i + close];
                let inner = &spec_text[i + 1..i + close];
                let (name, type_name) = match inner.split_once(':') {
                    Some((name, type_name)) => (name, type_name),
                    None => (inner, DEFAULT_TYPE),
                };
                if name.is_empty()
                    || name.contains(char::is_whitespace)
                    || type_name.contains(char::is_whitespace)
                {
                    return Err(CompileError::malformed_parameter(text, line_no));
                }
                i += close + 1;
                let array = spec_text[i..].starts_with("...");
                if array {
                    i += 3;
                }
                let param = ParamSpec {
                    name: SmolStr::new(name),
                    type_name: SmolStr::new(type_name),
                    no_leading_ws: !after_gap,
                };
                components.push(if array {
                    Component::ArrayParam(param)
                } else {
                    Component::ScalarParam(param)
                });
                after_gap = false;
            }
            _ => {
                let start = i;
                while i < spec_text.len() {
                    let c = match spec_text[i..].chars().next() {
                        Some(c) => c,
                        None => break,
                    };
                    if c.is_whitespace() || matches!(c, '[' | ']' | '<') {
                        break;
                    }
                    i += c.len_utf8();
                }
                let run = &spec_text[start..i];
                if first && depth == 0 {
                    flag = SmolStr::new(run);
                } else {
                    components.push(Component::Punctuator {
                        text: SmolStr::new(run),
                    });
                }
                after_gap = false;
            }
        }
        first = false;
    }
    if depth != 0 {
        return Err(CompileError::UnbalancedOptionalGroup {
            spec: spec_text.to_string(),
            line: line_no,
        });
    }
    Ok((flag, components))
}

// ============================================================
// Small scanner helpers
// ============================================================

fn skip_inline_ws(scanner: &mut Scanner<'_>) {
    while matches!(scanner.peek(), Some(' ') | Some('\t')) {
        scanner.bump();
    }
}

fn bare_word(scanner: &mut Scanner<'_>, stops: &[char]) -> String {
    let mut word = String::new();
    while let Some(c) = scanner.peek() {
        if c.is_whitespace() || stops.contains(&c) {
            break;
        }
        word.push(c);
        scanner.bump();
    }
    word
}

// ============================================================
// Tests
// ============================================================
