//! Per-spec matcher compilation.
//!
//! Turns an [`ArgumentSpec`](crate::grammar::ArgumentSpec)'s component
//! sequence into an anchored [`SpecMatcher`]: optional-group markers become
//! an optional wrapper around their sub-sequence, punctuators become exact
//! literal matches, and parameters become their type's resolved pattern with
//! the trailing-boundary placeholder bound to whatever literal follows.
//!
//! The original design expressed two things as regex lookaheads that the
//! `regex` crate cannot: the trailing boundary and the negative flag guard
//! (which stops a free-form parameter from swallowing a token that looks
//! like a different declared flag, and is what lets flags be bare words).
//! Both are explicit checks here: the boundary is verified after each
//! capture (with a bounded re-match when a literal follows tightly), and the
//! guard is a prefix test against every other declared flag literal before
//! any parameter capture.

use regex::{Regex, RegexBuilder};
use smol_str::SmolStr;

use crate::error::CompileError;
use crate::grammar::{ArgumentSpec, Component};
use crate::types::{BOUNDARY_PLACEHOLDER, DIGIT_PLACEHOLDER, TypeRegistry, Validator};

/// What must follow a parameter capture.
#[derive(Debug, Clone)]
pub(crate) enum Boundary {
    /// Whitespace or end of input.
    Whitespace,
    /// The next component's literal text (whitespace also acceptable, since
    /// a following punctuator may be space-separated).
    Literal(SmolStr),
}

/// A compiled parameter component.
pub(crate) struct ParamMatcher {
    pub name: SmolStr,
    pub regex: Regex,
    pub boundary: Boundary,
    pub no_leading_ws: bool,
    /// Validator chain, outermost (most derived) first.
    pub validators: Vec<Validator>,
}

impl std::fmt::Debug for ParamMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamMatcher")
            .field("name", &self.name)
            .field("regex", &self.regex.as_str())
            .field("boundary", &self.boundary)
            .finish()
    }
}

#[derive(Debug)]
pub(crate) enum MatchNode {
    Literal(SmolStr),
    Scalar(ParamMatcher),
    Array(ParamMatcher),
    Optional(Vec<MatchNode>),
}

/// An anchored matcher for one argument spec.
#[derive(Debug)]
pub struct SpecMatcher {
    pub(crate) flag: Option<SmolStr>,
    pub(crate) nodes: Vec<MatchNode>,
    /// Every *other* declared flag literal; the negative flag guard.
    pub(crate) guard: Vec<SmolStr>,
    pub(crate) nocase: bool,
}

// Matchers are rebuilt, not cloned, but Grammar derives Clone.
impl Clone for SpecMatcher {
    fn clone(&self) -> Self {
        Self {
            flag: self.flag.clone(),
            nodes: clone_nodes(&self.nodes),
            guard: self.guard.clone(),
            nocase: self.nocase,
        }
    }
}

fn clone_nodes(nodes: &[MatchNode]) -> Vec<MatchNode> {
    nodes
        .iter()
        .map(|n| match n {
            MatchNode::Literal(t) => MatchNode::Literal(t.clone()),
            MatchNode::Scalar(p) => MatchNode::Scalar(clone_param(p)),
            MatchNode::Array(p) => MatchNode::Array(clone_param(p)),
            MatchNode::Optional(sub) => MatchNode::Optional(clone_nodes(sub)),
        })
        .collect()
}

fn clone_param(p: &ParamMatcher) -> ParamMatcher {
    ParamMatcher {
        name: p.name.clone(),
        regex: p.regex.clone(),
        boundary: p.boundary.clone(),
        no_leading_ws: p.no_leading_ws,
        validators: p.validators.clone(),
    }
}

/// One captured parameter: the raw texts (one entry per repetition for an
/// array parameter) plus the matcher that captured them.
pub(crate) struct ParamCapture<'m> {
    pub matcher: &'m ParamMatcher,
    pub raw: Vec<String>,
    pub array: bool,
}

/// A successful anchored match.
pub(crate) struct MatchOutcome<'m> {
    /// Cursor position just past the match.
    pub end: usize,
    pub captures: Vec<ParamCapture<'m>>,
}

impl SpecMatcher {
    /// Compile a spec's component sequence against the registry.
    ///
    /// `other_flags` holds every declared flag literal except this spec's
    /// own; `default_nocase` is the grammar-wide `[nocase]` setting.
    pub(crate) fn build(
        spec: &ArgumentSpec,
        other_flags: &[SmolStr],
        registry: &TypeRegistry,
        default_nocase: bool,
    ) -> Result<Self, CompileError> {
        let nocase = spec.nocase || default_nocase;
        let nodes = build_nodes(&spec.components, registry, nocase)?;
        Ok(Self {
            flag: (!spec.flag.is_empty()).then(|| spec.flag.clone()),
            nodes,
            guard: other_flags.to_vec(),
            nocase,
        })
    }

    /// Attempt an anchored match at byte offset `pos` in `text`.
    ///
    /// Advances nothing; on success the returned outcome carries the end
    /// position for the caller's cursor.
    pub(crate) fn try_match<'m>(&'m self, text: &str, pos: usize) -> Option<MatchOutcome<'m>> {
        let mut cursor = pos;
        if let Some(flag) = &self.flag {
            if !literal_at(text, cursor, flag, self.nocase) {
                return None;
            }
            cursor += flag.len();
        }
        let mut captures = Vec::new();
        let end = self.match_sequence(&self.nodes, text, cursor, &mut captures)?;
        Some(MatchOutcome { end, captures })
    }

    fn match_sequence<'m>(
        &'m self,
        nodes: &'m [MatchNode],
        text: &str,
        mut cursor: usize,
        captures: &mut Vec<ParamCapture<'m>>,
    ) -> Option<usize> {
        for node in nodes {
            match node {
                MatchNode::Literal(lit) => {
                    let at = skip_spaces(text, cursor);
                    if !literal_at(text, at, lit, self.nocase) {
                        return None;
                    }
                    cursor = at + lit.len();
                }
                MatchNode::Scalar(param) => {
                    let (raw, end) = self.capture_param(param, text, cursor)?;
                    captures.push(ParamCapture {
                        matcher: param,
                        raw: vec![raw],
                        array: false,
                    });
                    cursor = end;
                }
                MatchNode::Array(param) => {
                    let (first, end) = self.capture_param(param, text, cursor)?;
                    let mut raws = vec![first];
                    cursor = end;
                    // Further repetitions are whitespace-separated.
                    loop {
                        let at = skip_spaces(text, cursor);
                        if at == cursor {
                            break;
                        }
                        match self.capture_at(param, text, at) {
                            Some((raw, end)) => {
                                raws.push(raw);
                                cursor = end;
                            }
                            None => break,
                        }
                    }
                    captures.push(ParamCapture {
                        matcher: param,
                        raw: raws,
                        array: true,
                    });
                }
                MatchNode::Optional(sub) => {
                    let mut sub_captures = Vec::new();
                    if let Some(end) = self.match_sequence(sub, text, cursor, &mut sub_captures) {
                        captures.append(&mut sub_captures);
                        cursor = end;
                    }
                }
            }
        }
        Some(cursor)
    }

    /// Position the cursor for a parameter and capture one value.
    fn capture_param(
        &self,
        param: &ParamMatcher,
        text: &str,
        cursor: usize,
    ) -> Option<(String, usize)> {
        let at = if param.no_leading_ws {
            if text[cursor..].starts_with(|c: char| c.is_whitespace()) {
                return None;
            }
            cursor
        } else {
            skip_spaces(text, cursor)
        };
        self.capture_at(param, text, at)
    }

    /// Capture one parameter value anchored exactly at `at`.
    fn capture_at(&self, param: &ParamMatcher, text: &str, at: usize) -> Option<(String, usize)> {
        let rest = &text[at..];
        if rest.is_empty() {
            return None;
        }
        // Negative flag guard: the value may not begin like another flag.
        for flag in &self.guard {
            if literal_at(text, at, flag, self.nocase) {
                return None;
            }
        }
        // A following literal acts like a character-class exclusion in the
        // original patterns: prefer stopping right where it first occurs.
        if let Boundary::Literal(lit) = &param.boundary {
            if let Some(idx) = rest.find(lit.as_str()).filter(|&i| i > 0) {
                if let Some(m) = param.regex.find(&rest[..idx]) {
                    if m.end() == idx {
                        return Some((rest[..idx].to_string(), at + idx));
                    }
                }
            }
        }
        let m = param.regex.find(rest)?;
        debug_assert_eq!(m.start(), 0);
        let end = m.end();
        if !boundary_ok(rest, end, &param.boundary) {
            return None;
        }
        Some((rest[..end].to_string(), at + end))
    }
}

fn build_nodes(
    components: &[Component],
    registry: &TypeRegistry,
    nocase: bool,
) -> Result<Vec<MatchNode>, CompileError> {
    // The list under construction plus suspended outer lists; optional
    // groups suspend and resume. Balance is checked at parse time.
    let mut current: Vec<MatchNode> = Vec::new();
    let mut saved: Vec<Vec<MatchNode>> = Vec::new();
    for (idx, component) in components.iter().enumerate() {
        match component {
            Component::OptionalGroupStart => saved.push(std::mem::take(&mut current)),
            Component::OptionalGroupEnd => {
                if let Some(mut outer) = saved.pop() {
                    outer.push(MatchNode::Optional(std::mem::take(&mut current)));
                    current = outer;
                }
            }
            Component::Punctuator { text } => {
                current.push(MatchNode::Literal(text.clone()));
            }
            Component::ScalarParam(p) | Component::ArrayParam(p) => {
                let boundary = boundary_after(components, idx);
                let matcher = build_param(p, boundary, registry, nocase)?;
                let node = if matches!(component, Component::ArrayParam(_)) {
                    MatchNode::Array(matcher)
                } else {
                    MatchNode::Scalar(matcher)
                };
                current.push(node);
            }
        }
    }
    debug_assert!(saved.is_empty());
    Ok(current)
}

/// The boundary bound to a parameter: the next literal component, or the
/// plain whitespace/end boundary if no literal follows.
fn boundary_after(components: &[Component], idx: usize) -> Boundary {
    for component in &components[idx + 1..] {
        match component {
            Component::Punctuator { text } => return Boundary::Literal(text.clone()),
            Component::OptionalGroupStart | Component::OptionalGroupEnd => continue,
            _ => break,
        }
    }
    Boundary::Whitespace
}

fn build_param(
    p: &crate::grammar::ParamSpec,
    boundary: Boundary,
    registry: &TypeRegistry,
    nocase: bool,
) -> Result<ParamMatcher, CompileError> {
    let fragment = registry.resolve_pattern(&p.type_name)?;
    let resolved = fragment
        .replace(DIGIT_PLACEHOLDER, "[0-9]")
        .replace(BOUNDARY_PLACEHOLDER, "");
    let regex = RegexBuilder::new(&format!("^(?:{resolved})"))
        .case_insensitive(nocase)
        .build()
        .map_err(|e| CompileError::InvalidTypePattern {
            name: p.type_name.to_string(),
            detail: e.to_string(),
        })?;
    let validators = registry.resolve_validators(&p.type_name)?;
    Ok(ParamMatcher {
        name: p.name.clone(),
        regex,
        boundary,
        no_leading_ws: p.no_leading_ws,
        validators,
    })
}

fn boundary_ok(rest: &str, end: usize, boundary: &Boundary) -> bool {
    let after = &rest[end..];
    if after.is_empty() || after.starts_with(|c: char| c.is_whitespace()) {
        return true;
    }
    match boundary {
        Boundary::Whitespace => false,
        Boundary::Literal(lit) => after.starts_with(lit.as_str()),
    }
}

fn skip_spaces(text: &str, mut pos: usize) -> usize {
    while text[pos..].starts_with(|c: char| c.is_whitespace()) {
        pos += text[pos..].chars().next().map(|c| c.len_utf8()).unwrap_or(1);
    }
    pos
}

fn literal_at(text: &str, pos: usize, lit: &str, nocase: bool) -> bool {
    let rest = &text[pos..];
    if nocase {
        rest.len() >= lit.len()
            && rest.is_char_boundary(lit.len())
            && rest[..lit.len()].eq_ignore_ascii_case(lit)
    } else {
        rest.starts_with(lit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{ArgumentSpec, Component, ParamSpec};
    use rustc_hash::FxHashSet;

    fn spec(flag: &str, components: Vec<Component>) -> ArgumentSpec {
        ArgumentSpec {
            id: 0,
            flag: SmolStr::new(flag),
            components,
            required: false,
            repeatable: false,
            nocase: false,
            mutex: FxHashSet::default(),
            excludes: FxHashSet::default(),
            requires: None,
            actions: Vec::new(),
            description: String::new(),
            ditto_of: None,
        }
    }

    fn scalar(name: &str, ty: &str) -> Component {
        Component::ScalarParam(ParamSpec {
            name: SmolStr::new(name),
            type_name: SmolStr::new(ty),
            no_leading_ws: false,
        })
    }

    fn build(spec: &ArgumentSpec, others: &[&str]) -> SpecMatcher {
        let registry = TypeRegistry::with_builtins();
        let others: Vec<SmolStr> = others.iter().map(|s| SmolStr::new(s)).collect();
        SpecMatcher::build(spec, &others, &registry, false).unwrap()
    }

    #[test]
    fn flag_with_integer_parameter() {
        let s = spec("-n", vec![scalar("count", "i")]);
        let m = build(&s, &[]);
        let out = m.try_match("-n 42 rest", 0).unwrap();
        assert_eq!(out.captures[0].raw, vec!["42"]);
        assert_eq!(&"-n 42 rest"[out.end..], " rest");
    }

    #[test]
    fn integer_stops_at_non_digit_boundary() {
        let s = spec("-n", vec![scalar("count", "i")]);
        let m = build(&s, &[]);
        assert!(m.try_match("-n 42x", 0).is_none());
    }

    #[test]
    fn flag_guard_blocks_flag_shaped_values() {
        let s = spec("-a", vec![scalar("value", "s")]);
        let m = build(&s, &["-b"]);
        assert!(m.try_match("-a -b", 0).is_none());
        assert!(m.try_match("-a plain", 0).is_some());
    }

    #[test]
    fn quoted_value_is_one_capture() {
        let s = spec("-a", vec![scalar("time", "s")]);
        let m = build(&s, &[]);
        let out = m.try_match("-a \"5 minutes ago\"", 0).unwrap();
        assert_eq!(out.captures[0].raw, vec!["\"5 minutes ago\""]);
    }

    #[test]
    fn array_parameter_collects_repetitions() {
        let s = spec(
            "-x",
            vec![Component::ArrayParam(ParamSpec {
                name: SmolStr::new("items"),
                type_name: SmolStr::new("i"),
                no_leading_ws: false,
            })],
        );
        let m = build(&s, &[]);
        let out = m.try_match("-x 1 2 3 stop", 0).unwrap();
        assert_eq!(out.captures[0].raw, vec!["1", "2", "3"]);
    }

    #[test]
    fn array_repetitions_stop_at_other_flags() {
        let s = spec(
            "-x",
            vec![Component::ArrayParam(ParamSpec {
                name: SmolStr::new("items"),
                type_name: SmolStr::new("i"),
                no_leading_ws: false,
            })],
        );
        let m = build(&s, &["-y"]);
        let out = m.try_match("-x 1 2 -y", 0).unwrap();
        assert_eq!(out.captures[0].raw, vec!["1", "2"]);
    }

    #[test]
    fn optional_group_is_skippable() {
        let s = spec(
            "-p",
            vec![
                Component::OptionalGroupStart,
                scalar("level", "i"),
                Component::OptionalGroupEnd,
            ],
        );
        let m = build(&s, &[]);
        let with = m.try_match("-p 3", 0).unwrap();
        assert_eq!(with.captures.len(), 1);
        let without = m.try_match("-p", 0).unwrap();
        assert!(without.captures.is_empty());
    }

    #[test]
    fn tight_punctuator_truncates_the_value() {
        let s = spec(
            "-r",
            vec![
                scalar("from", "i"),
                Component::Punctuator {
                    text: SmolStr::new(".."),
                },
                scalar("to", "i"),
            ],
        );
        let m = build(&s, &[]);
        let out = m.try_match("-r 1..9", 0).unwrap();
        let raws: Vec<_> = out.captures.iter().map(|c| c.raw[0].clone()).collect();
        assert_eq!(raws, vec!["1", "9"]);
    }

    #[test]
    fn no_leading_whitespace_is_enforced() {
        let s = spec(
            "-j",
            vec![Component::ScalarParam(ParamSpec {
                name: SmolStr::new("n"),
                type_name: SmolStr::new("i"),
                no_leading_ws: true,
            })],
        );
        let m = build(&s, &[]);
        assert!(m.try_match("-j4", 0).is_some());
        assert!(m.try_match("-j 4", 0).is_none());
    }

    #[test]
    fn case_insensitive_literals() {
        let mut s = spec("--verbose", vec![]);
        s.nocase = true;
        let registry = TypeRegistry::with_builtins();
        let m = SpecMatcher::build(&s, &[], &registry, false).unwrap();
        assert!(m.try_match("--VERBOSE", 0).is_some());
    }
}
