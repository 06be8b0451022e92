//! Condition flags and the small boolean language used by `[if:...]`.

use std::collections::BTreeSet;
use std::fmt;

use crate::lexer::{is_name_char, is_valid_name};

/// Set of active condition flags. Names are case-insensitive and stored
/// uppercased, and iteration is sorted, so the set doubles as a cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlagSet {
    flags: BTreeSet<String>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, flag: impl AsRef<str>) {
        self.flags.insert(flag.as_ref().to_uppercase());
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.flags.contains(&flag.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for FlagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = FlagSet::new();
        set.extend(iter);
        set
    }
}

impl<S: AsRef<str>> Extend<S> for FlagSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for flag in iter {
            self.insert(flag);
        }
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for flag in &self.flags {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(flag)?;
            first = false;
        }
        Ok(())
    }
}

/// Parenthesis and `!` nesting allowed inside one condition.
const MAX_NESTING: usize = 64;

/// `&&` and `||` chains are n-ary, so only parentheses and `!` add depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Flag(String),
    Not(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn parse(input: &str) -> Result<Self, String> {
        let tokens = tokenize(input)?;
        let mut parser = CondParser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let cond = parser.parse_or()?;
        match parser.peek() {
            None => Ok(cond),
            Some(t) => Err(format!("unexpected {} in `{}`", t, input)),
        }
    }

    pub fn eval(&self, flags: &FlagSet) -> bool {
        match self {
            Condition::Flag(name) => flags.contains(name),
            Condition::Not(inner) => !inner.eval(flags),
            Condition::And(terms) => terms.iter().all(|t| t.eval(flags)),
            Condition::Or(terms) => terms.iter().any(|t| t.eval(flags)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CondToken {
    Flag(String),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

impl fmt::Display for CondToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CondToken::Flag(name) => write!(f, "flag `{}`", name),
            CondToken::Not => f.write_str("`!`"),
            CondToken::And => f.write_str("`&&`"),
            CondToken::Or => f.write_str("`||`"),
            CondToken::LParen => f.write_str("`(`"),
            CondToken::RParen => f.write_str("`)`"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<CondToken>, String> {
    let mut tokens = Vec::new();
    let mut rest = input.trim_start();
    while let Some(c) = rest.chars().next() {
        let (token, len) = match c {
            '!' => (CondToken::Not, 1),
            '(' => (CondToken::LParen, 1),
            ')' => (CondToken::RParen, 1),
            '&' if rest.starts_with("&&") => (CondToken::And, 2),
            '|' if rest.starts_with("||") => (CondToken::Or, 2),
            c if is_name_char(c) => {
                let len = rest.find(|c: char| !is_name_char(c)).unwrap_or(rest.len());
                let name = &rest[..len];
                if !is_valid_name(name) {
                    return Err(format!("invalid flag name `{}`", name));
                }
                (CondToken::Flag(name.to_string()), len)
            }
            other => return Err(format!("unexpected character `{}`", other)),
        };
        tokens.push(token);
        rest = rest[len..].trim_start();
    }
    Ok(tokens)
}

struct CondParser {
    tokens: Vec<CondToken>,
    pos: usize,
    depth: usize,
}

impl CondParser {
    fn peek(&self) -> Option<&CondToken> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<CondToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Condition, String> {
        let mut terms = vec![self.parse_and()?];
        while let Some(CondToken::Or) = self.peek() {
            self.consume();
            terms.push(self.parse_and()?);
        }
        Ok(match terms.len() {
            1 => terms.remove(0),
            _ => Condition::Or(terms),
        })
    }

    fn parse_and(&mut self) -> Result<Condition, String> {
        let mut terms = vec![self.parse_unary()?];
        while let Some(CondToken::And) = self.peek() {
            self.consume();
            terms.push(self.parse_unary()?);
        }
        Ok(match terms.len() {
            1 => terms.remove(0),
            _ => Condition::And(terms),
        })
    }

    fn parse_unary(&mut self) -> Result<Condition, String> {
        if self.depth > MAX_NESTING {
            return Err(format!("condition nested deeper than {}", MAX_NESTING));
        }
        self.depth += 1;
        let result = self.parse_primary();
        self.depth -= 1;
        result
    }

    fn parse_primary(&mut self) -> Result<Condition, String> {
        match self.consume() {
            Some(CondToken::Not) => Ok(Condition::Not(Box::new(self.parse_unary()?))),
            Some(CondToken::Flag(name)) => Ok(Condition::Flag(name)),
            Some(CondToken::LParen) => {
                let inner = self.parse_or()?;
                match self.consume() {
                    Some(CondToken::RParen) => Ok(inner),
                    Some(t) => Err(format!("expected `)`, got {}", t)),
                    None => Err("expected `)`, got end of condition".to_string()),
                }
            }
            Some(t) => Err(format!("expected flag, got {}", t)),
            None => Err("expected flag, got end of condition".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(names: &[&str]) -> FlagSet {
        names.iter().collect()
    }

    #[test]
    fn flag_set_is_case_insensitive_and_sorted() {
        let set = flags(&["zeta", "Alpha", "ALPHA"]);
        assert_eq!(set.len(), 2);
        assert!(set.contains("alpha"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["ALPHA", "ZETA"]);
        assert_eq!(set.to_string(), "ALPHA|ZETA");
    }

    #[test]
    fn single_flag() {
        let cond = Condition::parse("Print").unwrap();
        assert!(cond.eval(&flags(&["PRINT"])));
        assert!(!cond.eval(&flags(&[])));
    }

    #[test]
    fn precedence_not_and_or() {
        // !a && b || c  ==  ((!a) && b) || c
        let cond = Condition::parse("!a && b || c").unwrap();
        assert!(cond.eval(&flags(&["b"])));
        assert!(cond.eval(&flags(&["a", "c"])));
        assert!(!cond.eval(&flags(&["a", "b"])));
    }

    #[test]
    fn parentheses_group() {
        let cond = Condition::parse("!(a || b)").unwrap();
        assert!(cond.eval(&flags(&[])));
        assert!(!cond.eval(&flags(&["b"])));
    }

    #[test]
    fn malformed_conditions_are_rejected() {
        assert!(Condition::parse("a &&").is_err());
        assert!(Condition::parse("a b").is_err());
        assert!(Condition::parse("(a").is_err());
        assert!(Condition::parse("a & b").is_err());
        assert!(Condition::parse("").is_err());
    }

    #[test]
    fn chains_are_flat() {
        let cond = Condition::parse("a && b && c || d").unwrap();
        assert_eq!(
            cond,
            Condition::Or(vec![
                Condition::And(vec![
                    Condition::Flag("a".into()),
                    Condition::Flag("b".into()),
                    Condition::Flag("c".into()),
                ]),
                Condition::Flag("d".into()),
            ])
        );
        let long = vec!["f"; 10_000].join(" || ");
        assert!(Condition::parse(&long).unwrap().eval(&flags(&["F"])));
    }

    #[test]
    fn excessive_nesting_is_rejected() {
        let nested = format!("{}a{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        assert!(Condition::parse(&nested).is_err());
        assert!(Condition::parse(&"!".repeat(10_000)).is_err());
        let ok = format!("{}a{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(Condition::parse(&ok).is_ok());
    }
}
