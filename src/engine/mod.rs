//! The match engine: one pass of an argument stream over a compiled
//! [`Grammar`].
//!
//! The stream is the argv elements joined into a single text with
//! whitespace-bearing elements quoted, and matching walks that text
//! with a cursor. Each cycle tries every spec in priority order at the
//! cursor; the first full match wins, records its value, runs or queues
//! its actions, and advances the cursor. A token no spec matches is set
//! aside as unused.
//!
//! Errors never abort the pass (help and version requests do, so a user
//! asking for usage is not scolded about missing arguments). Required,
//! requires and strict checks run once the stream is exhausted, and
//! deferred actions run only when the pass produced no errors at all.

mod result;

pub use result::{MatchError, MatchResult};

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::grammar::{
    ActionCallback, ActionContext, ActionKind, ArgumentSpec, ClusterMode, Component, Grammar,
};
use crate::pattern::ParamCapture;
use crate::value::Value;

/// Match argv against a compiled grammar.
pub fn match_args<I, S>(grammar: &Grammar, argv: I) -> MatchResult
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let text = join_argv(argv);
    trace!(stream = %text, "matching argument stream");
    let mut state = MatchState {
        grammar,
        text,
        cursor: 0,
        found: FxHashSet::default(),
        found_flags: FxHashSet::default(),
        invalid: FxHashMap::default(),
        pending_prefix: None,
        deferred: Vec::new(),
        result: MatchResult::default(),
    };
    state.run()
}

struct DeferredAction {
    flag: SmolStr,
    callback: ActionCallback,
    value: Option<Value>,
}

struct MatchState<'g> {
    grammar: &'g Grammar,
    text: String,
    cursor: usize,
    /// Ids of specs that have matched at least once.
    found: FxHashSet<u32>,
    found_flags: FxHashSet<SmolStr>,
    /// Flags ruled out by a mutual exclusion, mapped to the flag that
    /// ruled them out.
    invalid: FxHashMap<SmolStr, SmolStr>,
    /// Dash run to graft onto the next token when clustering.
    pending_prefix: Option<String>,
    deferred: Vec<DeferredAction>,
    result: MatchResult,
}

impl<'g> MatchState<'g> {
    fn run(mut self) -> MatchResult {
        loop {
            self.cursor = skip_spaces(&self.text, self.cursor);
            if self.cursor >= self.text.len() {
                break;
            }
            let (token, _) = next_token(&self.text, self.cursor);

            if self.grammar.help_flags.iter().any(|f| f == token) {
                self.result.help_requested = true;
                return self.result;
            }
            if self.grammar.version_flags.iter().any(|f| f == token) {
                self.result.version_requested = true;
                return self.result;
            }

            let token = token.to_string();
            self.graft_pending(&token);

            if !self.try_specs() {
                // Re-read: grafting may have rewritten the text.
                let (token, token_end) = next_token(&self.text, self.cursor);
                trace!(token, "no spec matched, token set aside");
                let unquoted = unquote_token(token);
                self.result.unused.push(unquoted);
                self.cursor = token_end;
            }
        }

        self.check_required();
        self.check_requires();
        if self.grammar.strict() {
            for token in &self.result.unused {
                self.result
                    .errors
                    .push(MatchError::UnrecognizedArgument(token.clone()));
            }
        }
        if self.result.errors.is_empty() {
            self.run_deferred();
        }
        self.result
    }

    /// Insert the pending cluster prefix before the token at the
    /// cursor, unless the mode calls the graft off.
    fn graft_pending(&mut self, token: &str) {
        let Some(prefix) = self.pending_prefix.take() else {
            return;
        };
        let keep = match self.grammar.cluster() {
            ClusterMode::None => false,
            ClusterMode::Any => true,
            ClusterMode::SingleCharOnly | ClusterMode::PrefixedFlags => {
                let candidate = format!("{prefix}{token}");
                self.grammar
                    .specs()
                    .iter()
                    .any(|s| !s.flag.is_empty() && candidate.starts_with(s.flag.as_str()))
            }
        };
        if keep {
            self.text.insert_str(self.cursor, &prefix);
        }
    }

    /// Try every spec at the cursor, in priority order. Returns true
    /// when the cursor advanced (a match, or a consumed conflict).
    fn try_specs(&mut self) -> bool {
        let grammar = self.grammar;
        for i in 0..grammar.specs().len() {
            let spec = &grammar.specs()[i];
            let matcher = &grammar.matchers[i];

            if self.found.contains(&spec.id) && !spec.repeatable {
                continue;
            }
            if !spec.flag.is_empty() {
                if let Some(blocker) = self.invalid.get(spec.flag.as_str()) {
                    let (token, token_end) = next_token(&self.text, self.cursor);
                    let hit = if matcher.nocase {
                        token.eq_ignore_ascii_case(&spec.flag)
                    } else {
                        token == spec.flag
                    };
                    if hit {
                        self.result.errors.push(MatchError::MutexConflict {
                            flag: spec.flag.clone(),
                            blocked_by: blocker.clone(),
                        });
                        self.cursor = token_end;
                        return true;
                    }
                    continue;
                }
            }

            let Some(outcome) = matcher.try_match(&self.text, self.cursor) else {
                continue;
            };
            // A spec whose components are all optional can succeed while
            // consuming nothing; recording that would stall the cursor.
            if outcome.end == self.cursor {
                continue;
            }
            let values = match evaluate_captures(&outcome.captures) {
                Ok(values) => values,
                Err(message) => {
                    self.result.errors.push(MatchError::Validation(message));
                    continue;
                }
            };
            if self.grammar.debug() {
                debug!(
                    flag = %spec.flag,
                    from = self.cursor,
                    to = outcome.end,
                    "argument spec matched"
                );
            }
            self.cursor = outcome.end;
            self.record_match(i, values);
            return true;
        }
        false
    }

    /// Record found-state, cache entries, actions and exclusions for a
    /// successful match of spec `index`.
    fn record_match(&mut self, index: usize, values: Vec<(SmolStr, Value)>) {
        let grammar = self.grammar;
        let spec = &grammar.specs()[index];
        self.found.insert(spec.id);
        if !spec.flag.is_empty() {
            self.found_flags.insert(spec.flag.clone());
        }
        let partner = self.ditto_partner(spec);
        if let Some(partner) = partner {
            self.found.insert(partner.id);
            if !partner.flag.is_empty() {
                self.found_flags.insert(partner.flag.clone());
            }
        }

        let spec_value = if spec.flag.is_empty() {
            // Positional parameters live in the cache under their own
            // names.
            for (name, value) in &values {
                self.result.cache.insert(name.clone(), value.clone());
            }
            values.into_iter().next_back().map(|(_, v)| v)
        } else {
            let value = match values.len() {
                // A bare flag counts its occurrences.
                0 => {
                    let seen = self
                        .result
                        .cache
                        .get(spec.flag.as_str())
                        .and_then(Value::as_int)
                        .unwrap_or(0);
                    Value::Int(seen + 1)
                }
                1 => values.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Int(0)),
                _ => Value::Map(values.into_iter().collect::<IndexMap<_, _>>()),
            };
            self.result.cache.insert(spec.flag.clone(), value.clone());
            if let Some(partner) = partner {
                self.result.cache.insert(partner.flag.clone(), value.clone());
            }
            Some(value)
        };

        for action in &spec.actions {
            match action.kind {
                ActionKind::Immediate => {
                    let context = ActionContext {
                        flag: spec.flag.as_str(),
                        value: spec_value.as_ref(),
                    };
                    if let Err(message) = (action.run)(&context) {
                        self.result.errors.push(MatchError::ActionFailed {
                            flag: spec.flag.clone(),
                            message,
                        });
                    }
                }
                ActionKind::Deferred => self.deferred.push(DeferredAction {
                    flag: spec.flag.clone(),
                    callback: action.clone(),
                    value: spec_value.clone(),
                }),
            }
        }

        if let Some(blocked) = grammar.blocked_by(&spec.flag) {
            for flag in blocked {
                self.invalid
                    .entry(flag.clone())
                    .or_insert_with(|| spec.flag.clone());
            }
        }

        self.set_cluster_prefix(spec);
    }

    fn ditto_partner(&self, spec: &ArgumentSpec) -> Option<&'g ArgumentSpec> {
        let specs = self.grammar.specs();
        match spec.ditto_of {
            Some(source) => specs.iter().find(|s| s.id == source),
            None => specs.iter().find(|s| s.ditto_of == Some(spec.id)),
        }
    }

    /// After a prefixed flag matched flush against following text,
    /// remember its dash run so the remainder can be retried as a flag.
    fn set_cluster_prefix(&mut self, spec: &ArgumentSpec) {
        if self.cursor >= self.text.len()
            || self.text[self.cursor..].starts_with(|c: char| c.is_whitespace())
        {
            return;
        }
        let eligible = match self.grammar.cluster() {
            ClusterMode::None => false,
            ClusterMode::SingleCharOnly => spec.flag.starts_with('-') && spec.flag.len() == 2,
            ClusterMode::PrefixedFlags | ClusterMode::Any => spec.flag.starts_with('-'),
        };
        if !eligible {
            return;
        }
        let dashes: String = spec.flag.chars().take_while(|c| *c == '-').collect();
        if !dashes.is_empty() {
            self.pending_prefix = Some(dashes);
        }
    }

    fn check_required(&mut self) {
        for spec in self.grammar.specs() {
            if !spec.required || self.found.contains(&spec.id) {
                continue;
            }
            // The primary of a ditto pair reports for both.
            if spec.ditto_of.is_some() {
                continue;
            }
            // A found mutex alternate satisfies the requirement.
            if spec.mutex.iter().any(|f| self.found_flags.contains(f)) {
                continue;
            }
            let name = if spec.flag.is_empty() {
                spec.components
                    .iter()
                    .filter_map(Component::param)
                    .next()
                    .map(|p| p.name.clone())
                    .unwrap_or_default()
            } else {
                spec.flag.clone()
            };
            self.result.errors.push(MatchError::MissingRequired(name));
        }
    }

    fn check_requires(&mut self) {
        for spec in self.grammar.specs() {
            if !self.found.contains(&spec.id) || spec.ditto_of.is_some() {
                continue;
            }
            let Some(expr) = &spec.requires else {
                continue;
            };
            if !expr.eval(&|f| self.found_flags.contains(f)) {
                self.result.errors.push(MatchError::UnsatisfiedRequires {
                    flag: spec.flag.clone(),
                    expr: expr.to_string(),
                });
            }
        }
    }

    fn run_deferred(&mut self) {
        let deferred = std::mem::take(&mut self.deferred);
        for action in deferred {
            let context = ActionContext {
                flag: action.flag.as_str(),
                value: action.value.as_ref(),
            };
            if let Err(message) = (action.callback.run)(&context) {
                self.result.errors.push(MatchError::ActionFailed {
                    flag: action.flag,
                    message,
                });
            }
        }
    }
}

// ============================================================
// Capture evaluation
// ============================================================

/// Run each capture's validator chain, innermost (base) type first, and
/// produce the final `(name, value)` pairs. An array capture collapses
/// its repetitions into one list value.
fn evaluate_captures(captures: &[ParamCapture<'_>]) -> Result<Vec<(SmolStr, Value)>, String> {
    let mut out = Vec::with_capacity(captures.len());
    for capture in captures {
        let mut items = Vec::with_capacity(capture.raw.len());
        for raw in &capture.raw {
            let mut value = Value::from(raw.as_str());
            for validator in capture.matcher.validators.iter().rev() {
                if let Some(converted) = validator(capture.matcher.name.as_str(), &value)? {
                    value = converted;
                }
            }
            items.push(value);
        }
        let value = if capture.array {
            Value::List(items)
        } else {
            match items.into_iter().next() {
                Some(value) => value,
                None => continue,
            }
        };
        out.push((capture.matcher.name.clone(), value));
    }
    Ok(out)
}

// ============================================================
// Stream assembly and tokens
// ============================================================

/// Join argv into one text, double-quoting any element that carries
/// whitespace (or is empty) so it survives as a single value.
fn join_argv<I, S>(argv: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = String::new();
    for arg in argv {
        let arg = arg.as_ref();
        if !text.is_empty() {
            text.push(' ');
        }
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            text.push('"');
            for c in arg.chars() {
                if c == '"' || c == '\\' {
                    text.push('\\');
                }
                text.push(c);
            }
            text.push('"');
        } else {
            text.push_str(arg);
        }
    }
    text
}

fn skip_spaces(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    pos + (rest.len() - rest.trim_start().len())
}

/// The token at `pos`: a quoted run, or text up to the next whitespace.
fn next_token(text: &str, pos: usize) -> (&str, usize) {
    let rest = &text[pos..];
    if rest.starts_with('"') {
        let mut escaped = false;
        for (i, c) in rest.char_indices().skip(1) {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '"' => return (&rest[..i + 1], pos + i + 1),
                _ => {}
            }
        }
        (rest, text.len())
    } else {
        let end = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len());
        (&rest[..end], pos + end)
    }
}

/// Undo [`join_argv`] quoting for a token headed to the unused list.
fn unquote_token(token: &str) -> String {
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        let mut out = String::with_capacity(token.len() - 2);
        let mut escaped = false;
        for c in token[1..token.len() - 1].chars() {
            if escaped {
                out.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else {
                out.push(c);
            }
        }
        out
    } else {
        token.to_string()
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::compile;

    #[test]
    fn argv_joining_quotes_spaced_elements() {
        let text = join_argv(["-a", "5 minutes ago", "-b"]);
        assert_eq!(text, r#"-a "5 minutes ago" -b"#);
    }

    #[test]
    fn argv_joining_escapes_quotes_and_backslashes() {
        let text = join_argv([r#"say "hi"\now"#]);
        assert_eq!(text, r#""say \"hi\"\\now""#);
        assert_eq!(unquote_token(&text), r#"say "hi"\now"#);
    }

    #[test]
    fn bare_flag_counts_occurrences() {
        let grammar = compile("-v\tVerbose [repeatable]\n").unwrap();
        let result = match_args(&grammar, ["-v", "-v", "-v"]);
        assert!(result.is_success());
        assert_eq!(result["-v"], 3i64);
    }

    #[test]
    fn single_parameter_records_converted_value() {
        let grammar = compile("-count <n:i>\tHow many\n").unwrap();
        let result = match_args(&grammar, ["-count", "42"]);
        assert!(result.is_success());
        assert_eq!(result["-count"].as_int(), Some(42));
    }

    #[test]
    fn multi_parameter_records_a_map() {
        let grammar = compile("-range <from:i> <to:i>\tSpan\n").unwrap();
        let result = match_args(&grammar, ["-range", "2", "9"]);
        let value = &result["-range"];
        assert_eq!(value.get("from").and_then(Value::as_int), Some(2));
        assert_eq!(value.get("to").and_then(Value::as_int), Some(9));
    }

    #[test]
    fn array_parameter_records_a_list() {
        let grammar = compile("-pts <p:i>...\tPoints\n").unwrap();
        let result = match_args(&grammar, ["-pts", "1", "2", "3"]);
        let list = result["-pts"].as_list().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[2].as_int(), Some(3));
    }

    #[test]
    fn positional_spec_records_under_parameter_name() {
        let grammar = compile("<infile:s>\tInput file [required]\n").unwrap();
        let result = match_args(&grammar, ["data.txt"]);
        assert!(result.is_success());
        assert_eq!(result["infile"], "data.txt");
    }

    #[test]
    fn unmatched_token_lands_in_unused() {
        let grammar = compile("-x\tA flag\n").unwrap();
        let result = match_args(&grammar, ["-x", "stray"]);
        assert!(result.is_success());
        assert_eq!(result.unused(), ["stray"]);
    }

    #[test]
    fn second_match_of_non_repeatable_spec_is_unused() {
        let grammar = compile("-x <v:i>\tOnce only\n").unwrap();
        let result = match_args(&grammar, ["-x", "1", "-x", "2"]);
        assert_eq!(result["-x"].as_int(), Some(1));
        assert_eq!(result.unused(), ["-x", "2"]);
    }

    #[test]
    fn help_request_short_circuits_required_checks() {
        let grammar = compile("-i <id:i>\tIdentity [required]\n").unwrap();
        let result = match_args(&grammar, ["--help"]);
        assert!(result.help_requested());
        assert!(result.is_success());
    }

    #[test]
    fn version_pool_respects_declared_flags() {
        let grammar = compile("-v\tVerbose\n").unwrap();
        let result = match_args(&grammar, ["-v"]);
        assert!(!result.version_requested());
        let result = match_args(&grammar, ["--version"]);
        assert!(result.version_requested());
    }

    #[test]
    fn clustered_single_char_flags_unfold() {
        let grammar = compile("-a\tA\n-b\tB\n-c\tC\n").unwrap();
        let result = match_args(&grammar, ["-abc"]);
        assert!(result.is_success(), "errors: {:?}", result.errors());
        assert!(result.found("-a"));
        assert!(result.found("-b"));
        assert!(result.found("-c"));
    }

    #[test]
    fn fully_optional_spec_does_not_stall_on_unmatched_tokens() {
        let grammar = compile("[-flagged]\tOptional marker [repeatable]\n").unwrap();
        let result = match_args(&grammar, ["unrelated", "tokens"]);
        assert!(result.is_success());
        assert_eq!(result.unused(), ["unrelated", "tokens"]);
    }

    #[test]
    fn fully_optional_spec_still_matches_its_written_form() {
        let grammar = compile("[-flagged]\tOptional marker\n").unwrap();
        let result = match_args(&grammar, ["stray"]);
        assert_eq!(result.unused(), ["stray"]);
        let result = match_args(&grammar, ["-flagged"]);
        assert!(result.unused().is_empty());
    }

    #[test]
    fn cluster_none_never_grafts_the_prefix() {
        let grammar = compile("[cluster: none]\n-a\tA\n-b\tB\n").unwrap();
        let result = match_args(&grammar, ["-ab"]);
        assert!(result.found("-a"));
        assert!(!result.found("-b"));
        assert_eq!(result.unused(), ["b"]);
    }

    #[test]
    fn cluster_flags_mode_abandons_non_flag_graft() {
        let grammar = compile("[cluster: flags]\n-a\tA\n-b\tB\n").unwrap();
        let result = match_args(&grammar, ["-ab"]);
        assert!(result.found("-a"));
        assert!(result.found("-b"));
        let result = match_args(&grammar, ["-ax"]);
        assert!(result.found("-a"));
        assert_eq!(result.unused(), ["x"]);
    }

    #[test]
    fn mutex_conflict_reports_and_consumes() {
        let grammar = compile("-a\tA [mutex: -a -b]\n-b\tB\n").unwrap();
        let result = match_args(&grammar, ["-a", "-b"]);
        assert!(result.found("-a"));
        assert!(!result.found("-b"));
        assert_eq!(result.error_count(), 1);
        assert!(matches!(
            &result.errors()[0],
            MatchError::MutexConflict { flag, blocked_by }
                if flag == "-b" && blocked_by == "-a"
        ));
    }

    #[test]
    fn requires_checked_only_for_found_flags() {
        let grammar = compile("-z\tZ [requires: -a]\n-a\tA\n").unwrap();
        let result = match_args(&grammar, ["-a"]);
        assert!(result.is_success());
        let result = match_args(&grammar, ["-z"]);
        assert_eq!(result.error_count(), 1);
        assert!(matches!(
            &result.errors()[0],
            MatchError::UnsatisfiedRequires { flag, .. } if flag == "-z"
        ));
        let result = match_args(&grammar, ["-z", "-a"]);
        assert!(result.is_success());
    }

    #[test]
    fn required_mutex_alternate_satisfies() {
        let grammar = compile("-a\tA [required] [mutex: -a -b]\n-b\tB\n").unwrap();
        let result = match_args(&grammar, ["-b"]);
        assert!(result.is_success(), "errors: {:?}", result.errors());
    }

    #[test]
    fn strict_mode_rejects_leftovers() {
        let grammar = compile("[strict]\n-x\tA flag\n").unwrap();
        let result = match_args(&grammar, ["-x", "--unknown"]);
        assert_eq!(result.unused(), ["--unknown"]);
        assert_eq!(result.error_count(), 1);
        assert!(matches!(
            &result.errors()[0],
            MatchError::UnrecognizedArgument(t) if t == "--unknown"
        ));
    }

    #[test]
    fn quoted_value_reaches_string_parameter_unquoted() {
        let grammar = compile("-a <time:s>\tSchedule\n").unwrap();
        let result = match_args(&grammar, ["-a", "5 minutes ago"]);
        assert!(result.is_success(), "errors: {:?}", result.errors());
        assert_eq!(result["-a"], "5 minutes ago");
    }

    #[test]
    fn nocase_spec_matches_any_case() {
        let grammar = compile("-copy\tCopy [nocase]\n").unwrap();
        let result = match_args(&grammar, ["-COPY"]);
        assert!(result.found("-copy"));
    }
}
