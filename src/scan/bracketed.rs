//! Balanced-bracket scanning with an explicit delimiter stack.

use regex::Regex;

use super::{Scanned, Scanner, closer_for, is_close_bracket, is_open_bracket};

/// Which skipping behaviors a delimiter string enables.
struct DelimiterSet {
    openers: Vec<char>,
    quotes: Vec<char>,
    quotelike: bool,
}

impl DelimiterSet {
    fn parse(delims: &str) -> Self {
        let mut openers = Vec::new();
        let mut quotes = Vec::new();
        let mut quotelike = false;
        for c in delims.chars() {
            if is_open_bracket(c) {
                if !openers.contains(&c) {
                    openers.push(c);
                }
            } else if is_close_bracket(c) {
                // A closer names the same pair as its opener.
                let open = match c {
                    ')' => '(',
                    ']' => '[',
                    '}' => '{',
                    _ => '<',
                };
                if !openers.contains(&open) {
                    openers.push(open);
                }
            } else if matches!(c, '\'' | '"' | '`') {
                if !quotes.contains(&c) {
                    quotes.push(c);
                }
            } else if c == 'q' {
                quotelike = true;
            }
        }
        Self {
            openers,
            quotes,
            quotelike,
        }
    }
}

impl<'a> Scanner<'a> {
    /// Scan a balanced bracketed span.
    ///
    /// `delims` selects the bracket pairs to balance (any of `()[]{}<>`),
    /// quote characters whose spans are skipped opaquely (`'`, `"`, `` ` ``),
    /// and, with `q`, full quotelike constructs to skip. The scan skips the
    /// prefix, requires an opening bracket, then maintains a stack of open
    /// delimiters: backslashed characters are skipped verbatim, quoted and
    /// quotelike spans are skipped as units, and each closer must pair with
    /// the top of the stack (a mismatched closer is a hard failure). The scan
    /// succeeds when the stack empties.
    pub fn scan_bracketed(&mut self, delims: &str, prefix: Option<&Regex>) -> Option<Scanned<'a>> {
        let set = DelimiterSet::parse(delims);
        let start = self.skip_prefix(prefix);
        let body_start = self.pos();

        let first = match self.peek() {
            Some(c) if set.openers.contains(&c) => c,
            _ => return self.fail(start, "did not find opening bracket after prefix"),
        };
        self.bump();
        let mut stack = vec![first];

        while let Some(c) = self.peek() {
            if c == '\\' {
                self.bump();
                self.bump();
                continue;
            }
            if set.quotes.contains(&c) {
                self.bump();
                if !self.skip_to_unescaped(c) {
                    return self.fail(start, format!("unterminated quote `{c}` inside brackets"));
                }
                continue;
            }
            if set.quotelike && self.check_quotelike(None, false).is_some() {
                self.scan_quotelike(None, false);
                continue;
            }
            if set.openers.contains(&c) {
                self.bump();
                stack.push(c);
                continue;
            }
            if is_close_bracket(c) {
                let open = *stack.last().unwrap_or(&' ');
                if closer_for(open) == Some(c) {
                    self.bump();
                    stack.pop();
                    if stack.is_empty() {
                        return Some(self.scanned(start, body_start));
                    }
                    continue;
                }
                if set.openers.iter().any(|&o| closer_for(o) == Some(c)) {
                    return self.fail(
                        start,
                        format!("mismatched closing bracket `{c}` (expected closer for `{open}`)"),
                    );
                }
                // A closer outside the configured pairs is ordinary text.
            }
            self.bump();
        }

        self.fail(start, "unterminated bracketed construct")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(input: &str, delims: &str) -> Option<(String, String)> {
        let mut scanner = Scanner::new(input);
        scanner
            .scan_bracketed(delims, None)
            .map(|s| (s.matched.to_string(), s.rest.to_string()))
    }

    #[test]
    fn balances_nested_pairs() {
        let (matched, rest) = scan("{a {b {c}} d} e", "{}").unwrap();
        assert_eq!(matched, "{a {b {c}} d}");
        assert_eq!(rest, " e");
    }

    #[test]
    fn mixed_pairs_balance_independently() {
        let (matched, _) = scan("([{x}])", "()[]{}").unwrap();
        assert_eq!(matched, "([{x}])");
    }

    #[test]
    fn mismatched_closer_is_a_hard_failure() {
        let mut scanner = Scanner::new("(a]b)");
        assert!(scanner.scan_bracketed("()[]", None).is_none());
        assert_eq!(scanner.pos(), 0);
        assert!(scanner.last_error().unwrap().contains("mismatched"));
    }

    #[test]
    fn backslash_protects_delimiters() {
        let (matched, _) = scan(r"{a \} b}", "{}").unwrap();
        assert_eq!(matched, r"{a \} b}");
    }

    #[test]
    fn quoted_spans_are_opaque() {
        let (matched, _) = scan(r#"{say "}" done}"#, "{}\"").unwrap();
        assert_eq!(matched, r#"{say "}" done}"#);
    }

    #[test]
    fn unconfigured_closers_are_plain_text() {
        let (matched, _) = scan("{a ) b}", "{}").unwrap();
        assert_eq!(matched, "{a ) b}");
    }

    #[test]
    fn unterminated_input_fails() {
        let mut scanner = Scanner::new("{never closed");
        assert!(scanner.scan_bracketed("{}", None).is_none());
        assert_eq!(scanner.pos(), 0);
    }

    #[test]
    fn round_trip_reassembles_original() {
        let input = "   <a <b> c> suffix";
        let mut scanner = Scanner::new(input);
        let got = scanner.scan_bracketed("<>", None).unwrap();
        assert_eq!(format!("{}{}{}", got.prefix, got.matched, got.rest), input);
        assert!(got.matched.starts_with('<') && got.matched.ends_with('>'));
    }
}
