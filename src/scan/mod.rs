//! Generic cursor-based text scanner.
//!
//! A [`Scanner`] owns a read-only string and a single movable byte cursor.
//! Every scan operation either advances the cursor past a complete construct
//! and returns a [`Scanned`] (consumed prefix, matched text, remaining
//! suffix), or fails, restoring the cursor to where it was and recording a
//! last-error message for diagnostics. The `check_*` variants probe without
//! moving the cursor at all.
//!
//! The operations:
//! - [`Scanner::scan_bracketed`] - balanced bracket spans with embedded
//!   quote/quotelike skipping
//! - [`Scanner::scan_quotelike`] - simple quotes, fancy quote operators,
//!   heredoc blocks
//! - [`Scanner::scan_codeblock`] - balanced code bodies, comments and
//!   quoted spans skipped opaquely
//! - [`Scanner::scan_identifier_chain`] - reference-like tokens with
//!   member/call/subscript trailers
//!
//! This module knows nothing about the argument-grammar domain; the compiler
//! uses it to lift opaque snippets (type patterns, action bodies) out of a
//! specification without parsing their internals.

mod bracketed;
mod codeblock;
mod ident_chain;
mod quotelike;

pub use codeblock::{BRACE_PAIR, CODE_PAIRS};
pub use quotelike::Quotelike;

use once_cell::sync::Lazy;
use regex::Regex;

/// Default prefix skipped before a construct: any run of whitespace.
pub static WHITESPACE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*").unwrap());

/// A successful scan: the three slices partition the scanner's input from
/// the cursor position where the scan began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scanned<'a> {
    /// Text consumed by the prefix pattern before the construct.
    pub prefix: &'a str,
    /// The construct itself, delimiters included.
    pub matched: &'a str,
    /// Everything after the construct.
    pub rest: &'a str,
}

/// Cursor-based scanner over a borrowed string.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    text: &'a str,
    pos: usize,
    last_error: Option<String>,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            last_error: None,
        }
    }

    /// Current byte offset of the cursor.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The unscanned remainder of the input.
    pub fn remainder(&self) -> &'a str {
        &self.text[self.pos..]
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// Message recorded by the most recent failed scan, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // =========================================================================
    // Cursor primitives
    // =========================================================================

    pub(crate) fn peek(&self) -> Option<char> {
        self.remainder().chars().next()
    }

    pub(crate) fn peek_at(&self, pos: usize) -> Option<char> {
        self.text[pos..].chars().next()
    }

    /// Advance past one char, returning it.
    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub(crate) fn starts_with(&self, s: &str) -> bool {
        self.remainder().starts_with(s)
    }

    pub(crate) fn slice(&self, from: usize, to: usize) -> &'a str {
        &self.text[from..to]
    }

    pub(crate) fn text_len(&self) -> usize {
        self.text.len()
    }

    /// Move the cursor to an absolute byte offset.
    pub(crate) fn restore(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Move the cursor forward by `by` bytes.
    pub(crate) fn advance(&mut self, by: usize) {
        self.pos += by;
    }

    pub(crate) fn eat_str(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Skip the prefix pattern (default: whitespace) anchored at the cursor.
    ///
    /// Returns the cursor position the prefix started at. The prefix regex is
    /// matched against the remainder and honored only when it matches at
    /// offset zero; a non-matching prefix simply skips nothing.
    pub(crate) fn skip_prefix(&mut self, prefix: Option<&Regex>) -> usize {
        let start = self.pos;
        let re = prefix.unwrap_or(&WHITESPACE_PREFIX);
        if let Some(m) = re.find(self.remainder()) {
            if m.start() == 0 {
                self.pos += m.end();
            }
        }
        start
    }

    /// Record a failure message and restore the cursor.
    pub(crate) fn fail<T>(&mut self, start: usize, message: impl Into<String>) -> Option<T> {
        self.pos = start;
        self.last_error = Some(message.into());
        None
    }

    /// Assemble the result slices for a scan that began at `start` with the
    /// construct proper starting at `body_start` and the cursor now past it.
    pub(crate) fn scanned(&self, start: usize, body_start: usize) -> Scanned<'a> {
        Scanned {
            prefix: &self.text[start..body_start],
            matched: &self.text[body_start..self.pos],
            rest: &self.text[self.pos..],
        }
    }

    /// Consume up to and including the next unescaped `delim`.
    ///
    /// Backslash escapes protect the following character. Returns false (cursor
    /// left wherever it stopped; callers restore) when the input ends first.
    pub(crate) fn skip_to_unescaped(&mut self, delim: char) -> bool {
        while let Some(c) = self.bump() {
            if c == '\\' {
                self.bump();
            } else if c == delim {
                return true;
            }
        }
        false
    }

    // =========================================================================
    // Non-consuming probes
    // =========================================================================

    /// Probe for a bracketed span without moving the cursor.
    pub fn check_bracketed(&mut self, delims: &str, prefix: Option<&Regex>) -> Option<Scanned<'a>> {
        let save = self.pos;
        let out = self.scan_bracketed(delims, prefix);
        self.pos = save;
        out
    }

    /// Probe for a quotelike construct without moving the cursor.
    pub fn check_quotelike(
        &mut self,
        prefix: Option<&Regex>,
        allow_raw_regex: bool,
    ) -> Option<Quotelike<'a>> {
        let save = self.pos;
        let out = self.scan_quotelike(prefix, allow_raw_regex);
        self.pos = save;
        out
    }

    /// Probe for a codeblock without moving the cursor.
    pub fn check_codeblock(
        &mut self,
        inner: &[(char, char)],
        prefix: Option<&Regex>,
        outer: &[(char, char)],
    ) -> Option<Scanned<'a>> {
        let save = self.pos;
        let out = self.scan_codeblock(inner, prefix, outer);
        self.pos = save;
        out
    }

    /// Probe for an identifier chain without moving the cursor.
    pub fn check_identifier_chain(&mut self, prefix: Option<&Regex>) -> Option<Scanned<'a>> {
        let save = self.pos;
        let out = self.scan_identifier_chain(prefix);
        self.pos = save;
        out
    }
}

/// The closing delimiter paired with an opening bracket character.
pub(crate) fn closer_for(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        '<' => Some('>'),
        _ => None,
    }
}

pub(crate) fn is_open_bracket(c: char) -> bool {
    matches!(c, '(' | '[' | '{' | '<')
}

pub(crate) fn is_close_bracket(c: char) -> bool {
    matches!(c, ')' | ']' | '}' | '>')
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

pub(crate) fn is_ident_continue(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_continue(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_variants_never_move_the_cursor() {
        let mut scanner = Scanner::new("  {a {b} c} tail");
        let before = scanner.pos();
        let probed = scanner.check_bracketed("{}", None);
        assert!(probed.is_some());
        assert_eq!(scanner.pos(), before);

        let consumed = scanner.scan_bracketed("{}", None);
        assert_eq!(consumed, probed);
        assert!(scanner.pos() > before);
    }

    #[test]
    fn failed_scan_restores_cursor_and_records_error() {
        let mut scanner = Scanner::new("no brackets here");
        assert!(scanner.scan_bracketed("{}", None).is_none());
        assert_eq!(scanner.pos(), 0);
        assert!(scanner.last_error().is_some());
    }

    #[test]
    fn scanned_slices_partition_the_input() {
        let input = "  (nested (pair)) trailing";
        let mut scanner = Scanner::new(input);
        let got = scanner.scan_bracketed("()", None).unwrap();
        assert_eq!(
            format!("{}{}{}", got.prefix, got.matched, got.rest),
            input
        );
        assert_eq!(got.matched, "(nested (pair))");
        assert_eq!(got.rest, " trailing");
    }
}
