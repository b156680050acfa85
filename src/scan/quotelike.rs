//! Quotelike constructs: simple quotes, fancy quote operators, heredocs.

use regex::Regex;

use super::{Scanned, Scanner, closer_for, is_ident_continue, is_ident_start};

/// Fancy-quote markers, longest first so `qq` wins over `q`.
const MARKERS: &[&str] = &["qq", "qw", "qr", "tr", "q", "m", "s", "y"];

/// Markers whose construct carries a second delimited block (`s/.../.../`).
const TWO_BLOCK_MARKERS: &[&str] = &["s", "tr", "y"];

/// A scanned quotelike construct.
///
/// `scanned` covers the whole construct; `body` is the text between the
/// delimiters of the first (or only) block, `second_body` the text of the
/// replacement block for two-block operators, and `modifiers` any trailing
/// modifier letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quotelike<'a> {
    pub scanned: Scanned<'a>,
    pub body: &'a str,
    pub second_body: Option<&'a str>,
    pub modifiers: &'a str,
}

impl<'a> Scanner<'a> {
    /// Scan a quotelike construct at the cursor.
    ///
    /// Recognizes, in order:
    /// 1. heredoc blocks: `<<LABEL` (label bare or quoted) with content up to
    ///    a line exactly matching the label;
    /// 2. simple quotes `'...'`, `"..."`, `` `...` `` with backslash escapes;
    /// 3. raw `/regex/` spans when `allow_raw_regex` is set;
    /// 4. fancy quote operators: a marker (`q`, `qq`, `qw`, `qr`, `m`, `s`,
    ///    `tr`, `y`) followed by any non-word delimiter. Bracket delimiters
    ///    delegate to [`Scanner::scan_bracketed`]; other delimiters scan to
    ///    the next unescaped identical character. Two-block operators take a
    ///    second span, and trailing modifier letters are consumed.
    pub fn scan_quotelike(
        &mut self,
        prefix: Option<&Regex>,
        allow_raw_regex: bool,
    ) -> Option<Quotelike<'a>> {
        let start = self.skip_prefix(prefix);
        let body_start = self.pos();

        // `<<` only opens a heredoc when a label follows; otherwise it is
        // an ordinary operator and the other branches get their turn. Once
        // a label is seen, a heredoc failure is final.
        if self.starts_with("<<") && self.heredoc_label_follows() {
            return self.scan_heredoc(start, body_start);
        }

        let first = match self.peek() {
            Some(c) => c,
            None => return self.fail(start, "end of input where quotelike expected"),
        };

        if matches!(first, '\'' | '"' | '`') {
            self.bump();
            let content_start = self.pos();
            if !self.skip_to_unescaped(first) {
                return self.fail(start, format!("unterminated quote `{first}`"));
            }
            let body = self.slice(content_start, self.pos() - first.len_utf8());
            return Some(Quotelike {
                scanned: self.scanned(start, body_start),
                body,
                second_body: None,
                modifiers: "",
            });
        }

        if allow_raw_regex && first == '/' {
            self.bump();
            let content_start = self.pos();
            if !self.skip_to_unescaped('/') {
                return self.fail(start, "unterminated /regex/");
            }
            let body = self.slice(content_start, self.pos() - 1);
            let modifiers = self.eat_modifier_letters();
            return Some(Quotelike {
                scanned: self.scanned(start, body_start),
                body,
                second_body: None,
                modifiers,
            });
        }

        let marker = match self.eat_marker() {
            Some(m) => m,
            None => return self.fail(start, "no quotelike construct at cursor"),
        };

        while self.peek() == Some(' ') || self.peek() == Some('\t') {
            self.bump();
        }
        let delim = match self.peek() {
            Some(c) if !c.is_whitespace() && !is_ident_continue(c) => c,
            _ => return self.fail(start, format!("missing delimiter after `{marker}`")),
        };

        let (body, second_body) = if let Some(close) = closer_for(delim) {
            let pair: String = [delim, close].iter().collect();
            let block = match self.scan_bracketed(&pair, None) {
                Some(b) => b,
                None => return self.fail(start, format!("unterminated `{marker}{delim}` block")),
            };
            let body = trim_delims(block.matched);
            let second = if TWO_BLOCK_MARKERS.contains(&marker) {
                match self.scan_bracketed(&pair, None) {
                    Some(b) => Some(trim_delims(b.matched)),
                    None => {
                        return self.fail(
                            start,
                            format!("missing second block for `{marker}` operator"),
                        );
                    }
                }
            } else {
                None
            };
            (body, second)
        } else {
            self.bump();
            let content_start = self.pos();
            if !self.skip_to_unescaped(delim) {
                return self.fail(start, format!("unterminated `{marker}{delim}` construct"));
            }
            let body = self.slice(content_start, self.pos() - delim.len_utf8());
            let second = if TWO_BLOCK_MARKERS.contains(&marker) {
                let second_start = self.pos();
                if !self.skip_to_unescaped(delim) {
                    return self.fail(
                        start,
                        format!("missing second block for `{marker}` operator"),
                    );
                }
                Some(self.slice(second_start, self.pos() - delim.len_utf8()))
            } else {
                None
            };
            (body, second)
        };

        let modifiers = self.eat_modifier_letters();
        Some(Quotelike {
            scanned: self.scanned(start, body_start),
            body,
            second_body,
            modifiers,
        })
    }

    /// Heredoc: `<<LABEL`, `<<"LABEL"` or `<<'LABEL'`, then content up to a
    /// line exactly matching the label. The match runs through the
    /// terminator line.
    fn heredoc_label_follows(&self) -> bool {
        self.peek_at(self.pos() + 2)
            .is_some_and(|c| c == '\'' || c == '"' || is_ident_start(c))
    }

    fn scan_heredoc(&mut self, start: usize, body_start: usize) -> Option<Quotelike<'a>> {
        debug_assert!(self.starts_with("<<"));
        self.eat_str("<<");

        let label = if let Some(q) = self.peek().filter(|&c| c == '\'' || c == '"') {
            self.bump();
            let label_start = self.pos();
            if !self.skip_to_unescaped(q) {
                return self.fail(start, "unterminated heredoc label quote");
            }
            self.slice(label_start, self.pos() - q.len_utf8())
        } else {
            let label_start = self.pos();
            while self.peek().is_some_and(is_ident_continue) {
                self.bump();
            }
            self.slice(label_start, self.pos())
        };

        // Content starts on the next line.
        let newline = match self.remainder().find('\n') {
            Some(i) => i,
            None => return self.fail(start, format!("heredoc `{label}` has no content lines")),
        };
        self.advance(newline + 1);
        let content_start = self.pos();

        loop {
            let line_end = self
                .remainder()
                .find('\n')
                .map(|i| self.pos() + i)
                .unwrap_or(self.text_len());
            let line = self.slice(self.pos(), line_end);
            if line == label {
                let body = self.slice(content_start, self.pos());
                // Consume the terminator line (and its newline when present).
                self.restore(line_end);
                if self.peek() == Some('\n') {
                    self.bump();
                }
                return Some(Quotelike {
                    scanned: self.scanned(start, body_start),
                    body,
                    second_body: None,
                    modifiers: "",
                });
            }
            if line_end >= self.text_len() {
                return self.fail(start, format!("heredoc terminator `{label}` not found"));
            }
            self.restore(line_end + 1);
        }
    }

    fn eat_marker(&mut self) -> Option<&'static str> {
        for marker in MARKERS {
            if self.starts_with(marker) {
                // The marker must not be the head of a longer identifier.
                let after = self.peek_at(self.pos() + marker.len());
                if after.is_some_and(is_ident_continue) {
                    continue;
                }
                self.advance(marker.len());
                return Some(marker);
            }
        }
        None
    }

    fn eat_modifier_letters(&mut self) -> &'a str {
        let start = self.pos();
        while self.peek().is_some_and(|c| c.is_ascii_lowercase()) {
            self.bump();
        }
        self.slice(start, self.pos())
    }
}

/// Strip the single delimiter character from each end of a bracketed match.
fn trim_delims(matched: &str) -> &str {
    let mut chars = matched.chars();
    let open = chars.next().map(|c| c.len_utf8()).unwrap_or(0);
    let close = chars.next_back().map(|c| c.len_utf8()).unwrap_or(0);
    &matched[open..matched.len() - close]
}
