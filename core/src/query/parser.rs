//! Boolean/phrase query parsing with an operator-precedence (shunting-yard)
//! pass.
//!
//! Grammar: leaves are double-quoted (`"cat"` is a term, `"the cat"` a phrase),
//! `AND`/`OR`/`NOT` are case-insensitive keywords and parentheses group.
//! Binding strength, tightest first: phrase, `NOT`, `AND`, `OR`.

use crate::error::{IndexError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(
        concat!(
            r#"(?P<lparen>\()|(?P<rparen>\))|"(?P<quoted>[^"]*)"|(?P<open>"[^"]*$)"#,
            r#"|(?P<keyword>(?i:\bAND\b|\bOR\b|\bNOT\b))|(?P<bare>[^\s()"]+)"#,
        )
    )
    .expect("valid regex");
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Term(String),
    Phrase(Vec<String>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn term(t: impl Into<String>) -> Self {
        Expr::Term(t.into())
    }

    pub fn phrase<I, T>(words: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Expr::Phrase(words.into_iter().map(Into::into).collect())
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Expr) -> Self {
        Expr::Not(Box::new(operand))
    }

    /// Rewrite every leaf word with `f`, keeping the structure.
    pub fn map_terms<F: Fn(&str) -> String>(&self, f: &F) -> Expr {
        match self {
            Expr::Term(t) => Expr::Term(f(t.as_str())),
            Expr::Phrase(words) => Expr::Phrase(words.iter().map(|w| f(w.as_str())).collect()),
            Expr::And(l, r) => Expr::and(l.map_terms(f), r.map_terms(f)),
            Expr::Or(l, r) => Expr::or(l.map_terms(f), r.map_terms(f)),
            Expr::Not(e) => Expr::not(e.map_terms(f)),
        }
    }

    /// Distinct leaf words outside any `NOT`, in first-seen order.
    pub fn positive_terms(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_positive(&mut out);
        out
    }

    fn collect_positive<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Term(t) => push_unique(out, t),
            Expr::Phrase(words) => words.iter().for_each(|w| push_unique(out, w)),
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_positive(out);
                r.collect_positive(out);
            }
            Expr::Not(_) => {}
        }
    }
}

fn push_unique<'a>(out: &mut Vec<&'a str>, word: &'a str) {
    if !out.contains(&word) {
        out.push(word);
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Term(t) => write!(f, "\"{t}\""),
            Expr::Phrase(words) => write!(f, "\"{}\"", words.join(" ")),
            Expr::And(l, r) => write!(f, "({l} AND {r})"),
            Expr::Or(l, r) => write!(f, "({l} OR {r})"),
            Expr::Not(e) => write!(f, "NOT {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Leaf(Expr),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    And,
    Or,
    Not,
    LParen,
}

impl Op {
    fn precedence(self) -> u8 {
        match self {
            Op::LParen => 0,
            Op::Or => 1,
            Op::And => 2,
            Op::Not => 3,
        }
    }
}

fn tokenize(query: &str) -> Result<Vec<(usize, Token)>> {
    let mut tokens = Vec::new();
    for caps in TOKEN_RE.captures_iter(query) {
        let Some(m) = caps.get(0) else { continue };
        let pos = m.start();
        let token = if caps.name("lparen").is_some() {
            Token::LParen
        } else if caps.name("rparen").is_some() {
            Token::RParen
        } else if let Some(quoted) = caps.name("quoted") {
            let words: Vec<&str> = quoted.as_str().split_whitespace().collect();
            match words.len() {
                0 => return Err(IndexError::syntax(pos, "empty quoted term")),
                1 => Token::Leaf(Expr::term(words[0])),
                _ => Token::Leaf(Expr::phrase(words)),
            }
        } else if caps.name("open").is_some() {
            return Err(IndexError::syntax(pos, "unterminated quote"));
        } else if let Some(kw) = caps.name("keyword") {
            match kw.as_str().to_ascii_uppercase().as_str() {
                "AND" => Token::And,
                "OR" => Token::Or,
                _ => Token::Not,
            }
        } else {
            return Err(IndexError::syntax(pos, format!("unquoted term '{}'; terms must be double-quoted", m.as_str())));
        };
        tokens.push((pos, token));
    }
    Ok(tokens)
}

fn apply(output: &mut Vec<Expr>, op: Op, pos: usize) -> Result<()> {
    let missing = || IndexError::syntax(pos, "operator is missing an operand");
    let node = match op {
        Op::Not => Expr::not(output.pop().ok_or_else(missing)?),
        Op::And | Op::Or => {
            let right = output.pop().ok_or_else(missing)?;
            let left = output.pop().ok_or_else(missing)?;
            if op == Op::And {
                Expr::and(left, right)
            } else {
                Expr::or(left, right)
            }
        }
        Op::LParen => return Err(IndexError::syntax(pos, "unbalanced '('")),
    };
    output.push(node);
    Ok(())
}

/// Parse a query string into an expression tree.
pub fn parse_query(query: &str) -> Result<Expr> {
    let tokens = tokenize(query)?;
    if tokens.is_empty() {
        return Err(IndexError::syntax(0, "empty query"));
    }

    let mut output: Vec<Expr> = Vec::new();
    let mut ops: Vec<(Op, usize)> = Vec::new();
    // True where the grammar needs a leaf, `NOT` or `(` next.
    let mut expect_operand = true;

    for (pos, token) in tokens {
        match token {
            Token::Leaf(expr) => {
                if !expect_operand {
                    return Err(IndexError::syntax(pos, "missing operator between terms"));
                }
                output.push(expr);
                expect_operand = false;
            }
            Token::LParen => {
                if !expect_operand {
                    return Err(IndexError::syntax(pos, "missing operator before '('"));
                }
                ops.push((Op::LParen, pos));
            }
            Token::Not => {
                if !expect_operand {
                    return Err(IndexError::syntax(pos, "NOT cannot follow an operand; use AND NOT"));
                }
                // Prefix and right-associative: nothing on the stack binds
                // tighter, so it is pushed without unwinding.
                ops.push((Op::Not, pos));
            }
            Token::And | Token::Or => {
                let op = if token == Token::And { Op::And } else { Op::Or };
                if expect_operand {
                    return Err(IndexError::syntax(pos, "operator is missing its left operand"));
                }
                while let Some(&(top, top_pos)) = ops.last() {
                    if top == Op::LParen || top.precedence() < op.precedence() {
                        break;
                    }
                    ops.pop();
                    apply(&mut output, top, top_pos)?;
                }
                ops.push((op, pos));
                expect_operand = true;
            }
            Token::RParen => {
                if expect_operand {
                    return Err(IndexError::syntax(pos, "expected a term before ')'"));
                }
                loop {
                    match ops.pop() {
                        Some((Op::LParen, _)) => break,
                        Some((op, op_pos)) => apply(&mut output, op, op_pos)?,
                        None => return Err(IndexError::syntax(pos, "unbalanced ')'")),
                    }
                }
            }
        }
    }

    if expect_operand {
        return Err(IndexError::syntax(query.len(), "query ends with a dangling operator"));
    }
    while let Some((op, pos)) = ops.pop() {
        apply(&mut output, op, pos)?;
    }
    match (output.pop(), output.is_empty()) {
        (Some(expr), true) => Ok(expr),
        _ => Err(IndexError::syntax(0, "query does not reduce to a single expression")),
    }
}
