//! Balanced codeblock scanning.
//!
//! A codeblock is an opaque span of code between one of the outer delimiter
//! pairs. The body is never parsed semantically; the scan only has to know
//! enough structure (comments, quotes, quotelike operators, identifier
//! chains, operator runs) to find the matching outer closer without being
//! fooled by delimiter characters inside those constructs.

use regex::Regex;

use super::{Scanned, Scanner, is_ident_continue, is_ident_start};

/// Characters treated as part of an operator run.
const OPERATOR_CHARS: &str = "+-*/%^&|!=<>.?:~,;";

impl<'a> Scanner<'a> {
    /// Scan a balanced codeblock.
    ///
    /// Skips the prefix, requires an opening delimiter from `outer`, then
    /// scans the body: comments (`#` to end of line), quoted and quotelike
    /// spans, identifier chains, and operator runs are skipped as opaque
    /// units; an opening delimiter from `inner` recurses. The scan succeeds
    /// at the matching outer closer at nesting depth zero. An outer opener
    /// met again before its closer is a fatal improper-nesting failure, and
    /// a stray closer with no corresponding opener is fatal too.
    pub fn scan_codeblock(
        &mut self,
        inner: &[(char, char)],
        prefix: Option<&Regex>,
        outer: &[(char, char)],
    ) -> Option<Scanned<'a>> {
        let start = self.skip_prefix(prefix);
        let body_start = self.pos();

        let (open, close) = match self.peek().and_then(|c| pair_for(outer, c)) {
            Some(pair) => pair,
            None => return self.fail(start, "did not find opening code delimiter"),
        };
        self.bump();

        match self.scan_code_body(inner, outer, open, close) {
            Ok(()) => Some(self.scanned(start, body_start)),
            Err(message) => self.fail(start, message),
        }
    }

    /// Scan a code body up to (and including) `close`. The cursor sits just
    /// past the opening delimiter on entry.
    fn scan_code_body(
        &mut self,
        inner: &[(char, char)],
        outer: &[(char, char)],
        open: char,
        close: char,
    ) -> Result<(), String> {
        // Tracks whether the previous token could end an operand, which
        // decides whether `/` starts a regex or is a division operator.
        let mut after_operand = false;

        while let Some(c) = self.peek() {
            if c == close {
                self.bump();
                return Ok(());
            }
            if c.is_whitespace() {
                self.bump();
                continue;
            }
            if c == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
                continue;
            }
            if c == '\\' {
                self.bump();
                self.bump();
                continue;
            }
            if matches!(c, '\'' | '"' | '`') {
                if self.scan_quotelike(None, false).is_none() {
                    return Err(format!("unterminated quote `{c}` in codeblock"));
                }
                after_operand = true;
                continue;
            }
            if let Some((inner_open, inner_close)) = pair_for(inner, c) {
                let sub = [(inner_open, inner_close)];
                if self.scan_codeblock(inner, None, &sub).is_none() {
                    return Err(format!("unterminated inner `{inner_open}` block"));
                }
                after_operand = true;
                continue;
            }
            if pair_for(outer, c).is_some() {
                return Err(format!(
                    "improperly nested `{c}` before closing `{close}` for `{open}`"
                ));
            }
            if is_any_closer(inner, c) || is_any_closer(outer, c) {
                return Err(format!("stray closing delimiter `{c}` in codeblock"));
            }
            if !after_operand && (c == '/' || self.starts_with("<<") || self.at_quote_operator()) {
                if self.scan_quotelike(None, true).is_some() {
                    after_operand = true;
                    continue;
                }
                if c == '/' {
                    return Err("unterminated /regex/ in codeblock".to_string());
                }
                // Marker without a usable delimiter; treat it as an identifier.
            }
            if is_ident_start(c) || c == '$' || c == '@' {
                if self.scan_identifier_chain(None).is_none() {
                    // A bare sigil; consume it and move on.
                    self.bump();
                }
                after_operand = true;
                continue;
            }
            if c.is_ascii_digit() {
                while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
                    self.bump();
                }
                after_operand = true;
                continue;
            }
            if OPERATOR_CHARS.contains(c) {
                while self.peek().is_some_and(|c| OPERATOR_CHARS.contains(c)) {
                    self.bump();
                }
                after_operand = false;
                continue;
            }
            self.bump();
            after_operand = false;
        }

        Err(format!("unterminated codeblock (no closing `{close}`)"))
    }

    /// A quote operator sits at the cursor only when a marker is immediately
    /// followed by its delimiter. Requiring adjacency keeps expressions like
    /// `m - 1` from being read as `m-...-`.
    fn at_quote_operator(&self) -> bool {
        let rest = self.remainder();
        for marker in ["qq", "qw", "qr", "tr", "q", "m", "s", "y"] {
            if let Some(after) = rest.strip_prefix(marker) {
                if after
                    .chars()
                    .next()
                    .is_some_and(|c| !c.is_whitespace() && !is_ident_continue(c) && c != '#')
                {
                    return true;
                }
                // Marker was the head of a longer identifier or stands alone.
                if after.chars().next().is_none_or(is_ident_continue) {
                    continue;
                }
                return false;
            }
        }
        false
    }
}

fn pair_for(pairs: &[(char, char)], c: char) -> Option<(char, char)> {
    pairs.iter().copied().find(|&(open, _)| open == c)
}

fn is_any_closer(pairs: &[(char, char)], c: char) -> bool {
    pairs.iter().any(|&(_, close)| close == c)
}

/// The default delimiter pairs a codeblock body recurses into.
pub const CODE_PAIRS: &[(char, char)] = &[('{', '}'), ('(', ')'), ('[', ']')];

/// The default outer delimiter pair for action blocks.
pub const BRACE_PAIR: &[(char, char)] = &[('{', '}')];

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(input: &str) -> Option<(String, String)> {
        let mut scanner = Scanner::new(input);
        scanner
            .scan_codeblock(CODE_PAIRS, None, BRACE_PAIR)
            .map(|s| (s.matched.to_string(), s.rest.to_string()))
    }

    #[test]
    fn plain_block() {
        let (matched, rest) = scan("{ reject value } after").unwrap();
        assert_eq!(matched, "{ reject value }");
        assert_eq!(rest, " after");
    }

    #[test]
    fn nested_braces_recurse() {
        let (matched, _) = scan("{ if x { deeper { most } } done }").unwrap();
        assert_eq!(matched, "{ if x { deeper { most } } done }");
    }

    #[test]
    fn braces_inside_strings_are_opaque() {
        let (matched, _) = scan(r#"{ print "}" }"#).unwrap();
        assert_eq!(matched, r#"{ print "}" }"#);
    }

    #[test]
    fn comments_hide_delimiters() {
        let (matched, _) = scan("{ x # a } in a comment\n }").unwrap();
        assert!(matched.ends_with("\n }"));
    }

    #[test]
    fn regex_after_operator_is_opaque() {
        let (matched, _) = scan("{ x = /}/ }").unwrap();
        assert_eq!(matched, "{ x = /}/ }");
    }

    #[test]
    fn slash_after_operand_is_division() {
        let (matched, _) = scan("{ total / count }").unwrap();
        assert_eq!(matched, "{ total / count }");
    }

    #[test]
    fn parens_and_subscripts_nest() {
        let (matched, _) = scan("{ f(a[i], g(b)) }").unwrap();
        assert_eq!(matched, "{ f(a[i], g(b)) }");
    }

    #[test]
    fn stray_closer_is_fatal() {
        let mut scanner = Scanner::new("{ a ) b }");
        assert!(scanner.scan_codeblock(CODE_PAIRS, None, BRACE_PAIR).is_none());
        assert_eq!(scanner.pos(), 0);
        assert!(scanner.last_error().unwrap().contains("stray"));
    }

    #[test]
    fn unterminated_block_is_fatal() {
        let mut scanner = Scanner::new("{ never closed");
        assert!(scanner.scan_codeblock(CODE_PAIRS, None, BRACE_PAIR).is_none());
        assert!(scanner.last_error().unwrap().contains("unterminated"));
    }

    #[test]
    fn improper_nesting_of_exclusive_outer_pair() {
        // `<` is an outer-only pair here, so a second `<` before `>` cannot
        // be a fresh block.
        let mut scanner = Scanner::new("< a < b >");
        let outer = [('<', '>')];
        assert!(scanner.scan_codeblock(CODE_PAIRS, None, &outer).is_none());
        assert!(scanner.last_error().unwrap().contains("improperly nested"));
    }
}
