//! Boolean `[requires: ...]` expressions over flag found-state.

use smol_str::SmolStr;

/// A parsed requires expression.
///
/// Grammar (loosest binding first): `or := and ('||' and)*`,
/// `and := not ('&&' not)*`, `not := '!' not | '(' or ')' | flag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiresExpr {
    Flag(SmolStr),
    Not(Box<RequiresExpr>),
    And(Box<RequiresExpr>, Box<RequiresExpr>),
    Or(Box<RequiresExpr>, Box<RequiresExpr>),
}

impl RequiresExpr {
    /// Parse an expression; `Err` carries no detail, the compiler wraps it.
    pub fn parse(input: &str) -> Result<Self, ()> {
        let mut p = ExprParser {
            input,
            pos: 0,
        };
        let expr = p.or()?;
        p.skip_ws();
        if p.pos == input.len() { Ok(expr) } else { Err(()) }
    }

    /// Evaluate against a found-state predicate.
    pub fn eval(&self, found: &dyn Fn(&str) -> bool) -> bool {
        match self {
            RequiresExpr::Flag(flag) => found(flag),
            RequiresExpr::Not(inner) => !inner.eval(found),
            RequiresExpr::And(a, b) => a.eval(found) && b.eval(found),
            RequiresExpr::Or(a, b) => a.eval(found) || b.eval(found),
        }
    }

    /// Every flag literal the expression mentions.
    pub fn flags(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_flags(&mut out);
        out
    }

    fn collect_flags<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            RequiresExpr::Flag(flag) => out.push(flag),
            RequiresExpr::Not(inner) => inner.collect_flags(out),
            RequiresExpr::And(a, b) | RequiresExpr::Or(a, b) => {
                a.collect_flags(out);
                b.collect_flags(out);
            }
        }
    }
}

impl std::fmt::Display for RequiresExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Parenthesize only where precedence demands it.
        fn tight(e: &RequiresExpr, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match e {
                RequiresExpr::Or(..) | RequiresExpr::And(..) => write!(f, "({e})"),
                _ => write!(f, "{e}"),
            }
        }
        fn and_side(e: &RequiresExpr, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match e {
                RequiresExpr::Or(..) => write!(f, "({e})"),
                _ => write!(f, "{e}"),
            }
        }
        match self {
            RequiresExpr::Flag(flag) => write!(f, "{flag}"),
            RequiresExpr::Not(inner) => {
                write!(f, "!")?;
                tight(inner, f)
            }
            RequiresExpr::And(a, b) => {
                and_side(a, f)?;
                write!(f, " && ")?;
                and_side(b, f)
            }
            RequiresExpr::Or(a, b) => write!(f, "{a} || {b}"),
        }
    }
}

struct ExprParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn skip_ws(&mut self) {
        while self.rest().starts_with(|c: char| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<RequiresExpr, ()> {
        let mut left = self.and()?;
        while self.eat("||") {
            let right = self.and()?;
            left = RequiresExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<RequiresExpr, ()> {
        let mut left = self.not()?;
        while self.eat("&&") {
            let right = self.not()?;
            left = RequiresExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<RequiresExpr, ()> {
        if self.eat("!") {
            return Ok(RequiresExpr::Not(Box::new(self.not()?)));
        }
        if self.eat("(") {
            let inner = self.or()?;
            if !self.eat(")") {
                return Err(());
            }
            return Ok(inner);
        }
        self.flag()
    }

    fn flag(&mut self) -> Result<RequiresExpr, ()> {
        self.skip_ws();
        let start = self.pos;
        for c in self.rest().chars() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '!' | '&' | '|') {
                break;
            }
            self.pos += c.len_utf8();
        }
        if self.pos == start {
            return Err(());
        }
        Ok(RequiresExpr::Flag(SmolStr::new(&self.input[start..self.pos])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str, found: &[&str]) -> bool {
        RequiresExpr::parse(expr)
            .unwrap()
            .eval(&|f| found.contains(&f))
    }

    #[test]
    fn single_flag() {
        assert!(eval("-a", &["-a"]));
        assert!(!eval("-a", &[]));
    }

    #[test]
    fn conjunction_and_disjunction() {
        assert!(eval("-a && -b", &["-a", "-b"]));
        assert!(!eval("-a && -b", &["-a"]));
        assert!(eval("-a || -b", &["-b"]));
    }

    #[test]
    fn negation_and_grouping() {
        assert!(eval("!-q", &[]));
        assert!(eval("-a && (-b || -c)", &["-a", "-c"]));
        assert!(!eval("!(-a || -b)", &["-b"]));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // -a || (-b && -c)
        assert!(eval("-a || -b && -c", &["-a"]));
        assert!(!eval("-a || -b && -c", &["-b"]));
    }

    #[test]
    fn malformed_expressions_fail() {
        assert!(RequiresExpr::parse("").is_err());
        assert!(RequiresExpr::parse("(-a").is_err());
        assert!(RequiresExpr::parse("-a &&").is_err());
        assert!(RequiresExpr::parse("&& -a").is_err());
    }

    #[test]
    fn mentioned_flags_are_collected() {
        let expr = RequiresExpr::parse("-a && (!-b || -c)").unwrap();
        assert_eq!(expr.flags(), vec!["-a", "-b", "-c"]);
    }
}
