//! Rule expressions
//!
//! ```text
//! expression  := alternative ( (";" | "else") alternative )*
//! alternative := term ( whitespace term )*
//! term        := "\"" literal "\"" | "{" reference "}" | reference
//! ```
//!
//! The first alternative yielding a value wins. Terms of one alternative are
//! concatenated with a single space. What a reference means (`245$a`,
//! `NAD+BY[1]`, a column name) is up to the reader evaluating it.

use crate::error::{MappingError, MappingResult};

/// One term of an alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Literal(String),
    Reference(String),
}

/// A parsed rule expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleExpression {
    alternatives: Vec<Vec<Term>>,
}

impl RuleExpression {
    pub fn parse(expression: &str) -> MappingResult<Self> {
        let invalid = |message: &str| MappingError::InvalidExpression {
            expression: expression.to_string(),
            message: message.to_string(),
        };

        let mut alternatives = Vec::new();
        let mut current: Vec<Term> = Vec::new();
        let mut word = String::new();
        let mut chars = expression.chars();

        while let Some(c) = chars.next() {
            match c {
                '"' => {
                    flush_word(&mut word, &mut current, &mut alternatives);
                    let mut literal = String::new();
                    loop {
                        match chars.next() {
                            Some('"') => break,
                            Some(ch) => literal.push(ch),
                            None => return Err(invalid("unterminated literal")),
                        }
                    }
                    current.push(Term::Literal(literal));
                }
                '{' => {
                    flush_word(&mut word, &mut current, &mut alternatives);
                    let mut reference = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => reference.push(ch),
                            None => return Err(invalid("unterminated reference")),
                        }
                    }
                    let reference = reference.trim();
                    if reference.is_empty() {
                        return Err(invalid("empty reference"));
                    }
                    current.push(Term::Reference(reference.to_string()));
                }
                ';' => {
                    flush_word(&mut word, &mut current, &mut alternatives);
                    close_alternative(&mut current, &mut alternatives);
                }
                c if c.is_whitespace() => {
                    flush_word(&mut word, &mut current, &mut alternatives);
                }
                c => word.push(c),
            }
        }
        flush_word(&mut word, &mut current, &mut alternatives);
        close_alternative(&mut current, &mut alternatives);

        Ok(Self { alternatives })
    }

    pub fn alternatives(&self) -> &[Vec<Term>] {
        &self.alternatives
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// Every reference term, in expression order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.alternatives.iter().flatten().filter_map(|t| match t {
            Term::Reference(r) => Some(r.as_str()),
            Term::Literal(_) => None,
        })
    }
}

fn flush_word(word: &mut String, current: &mut Vec<Term>, alternatives: &mut Vec<Vec<Term>>) {
    if word.is_empty() {
        return;
    }
    let text = std::mem::take(word);
    if text.eq_ignore_ascii_case("else") {
        close_alternative(current, alternatives);
    } else {
        current.push(Term::Reference(text));
    }
}

fn close_alternative(current: &mut Vec<Term>, alternatives: &mut Vec<Vec<Term>>) {
    if !current.is_empty() {
        alternatives.push(std::mem::take(current));
    }
}
