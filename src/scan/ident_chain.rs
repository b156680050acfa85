//! Identifier-chain scanning: reference-like tokens with trailers.

use regex::Regex;

use super::{Scanned, Scanner, is_ident_continue, is_ident_start};

impl<'a> Scanner<'a> {
    /// Scan a reference-like token at the cursor.
    ///
    /// The head is a sigil-prefixed name (`$x`, `@items`), a bare
    /// identifier, or a `::`-scoped identifier (`dates::parse`). It may be
    /// followed by any run of trailers: `.member`, `::member`, call-like
    /// `(...)` blocks, and subscript-like `[...]` or `{...}` blocks.
    pub fn scan_identifier_chain(&mut self, prefix: Option<&Regex>) -> Option<Scanned<'a>> {
        let start = self.skip_prefix(prefix);
        let body_start = self.pos();

        if matches!(self.peek(), Some('$') | Some('@')) {
            self.bump();
        }
        if !self.peek().is_some_and(is_ident_start) {
            return self.fail(start, "no identifier at cursor");
        }
        self.eat_ident();

        loop {
            if self.starts_with("::") && self.peek_at(self.pos() + 2).is_some_and(is_ident_start) {
                self.advance(2);
                self.eat_ident();
                continue;
            }
            if self.peek() == Some('.') && self.peek_at(self.pos() + 1).is_some_and(is_ident_start)
            {
                self.advance(1);
                self.eat_ident();
                continue;
            }
            match self.peek() {
                Some('(') => {
                    if self.scan_bracketed("()\"'q", None).is_none() {
                        return self.fail(start, "unterminated call arguments");
                    }
                }
                Some('[') => {
                    if self.scan_bracketed("[]\"'q", None).is_none() {
                        return self.fail(start, "unterminated subscript");
                    }
                }
                Some('{') => {
                    if self.scan_bracketed("{}\"'q", None).is_none() {
                        return self.fail(start, "unterminated brace subscript");
                    }
                }
                _ => break,
            }
        }

        Some(self.scanned(start, body_start))
    }

    fn eat_ident(&mut self) {
        while self.peek().is_some_and(is_ident_continue) {
            self.bump();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(input: &str) -> Option<String> {
        let mut scanner = Scanner::new(input);
        scanner
            .scan_identifier_chain(None)
            .map(|s| s.matched.to_string())
    }

    #[test]
    fn bare_identifier() {
        assert_eq!(chain("name rest").as_deref(), Some("name"));
    }

    #[test]
    fn sigil_reference() {
        assert_eq!(chain("$value + 1").as_deref(), Some("$value"));
    }

    #[test]
    fn scoped_identifier() {
        assert_eq!(chain("dates::parse(x)").as_deref(), Some("dates::parse(x)"));
    }

    #[test]
    fn member_and_call_trailers() {
        assert_eq!(
            chain("ctx.flags.get(\"-v\") more").as_deref(),
            Some("ctx.flags.get(\"-v\")")
        );
    }

    #[test]
    fn subscript_trailers() {
        assert_eq!(chain("$args[3]{key} x").as_deref(), Some("$args[3]{key}"));
    }

    #[test]
    fn dot_not_followed_by_ident_ends_the_chain() {
        assert_eq!(chain("x.3").as_deref(), Some("x"));
    }

    #[test]
    fn no_identifier_fails_without_moving() {
        let mut scanner = Scanner::new("123abc");
        assert!(scanner.scan_identifier_chain(None).is_none());
        assert_eq!(scanner.pos(), 0);
    }
}
