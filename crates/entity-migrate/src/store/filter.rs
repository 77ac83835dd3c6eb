//! Filter expressions for snapshot queries.
//!
//! Grammar: `clause (and clause)*` where a clause is `<field> eq|ne <literal>`
//! and a literal is a single-quoted string (`''` escapes a quote), a number,
//! `true`, `false` or `null`.

use logos::Logos;
use serde_json::Value;

use crate::core::Record;
use crate::error::{MigrateError, Result};

/// Filter tokens. Keywords match regardless of case.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[token("eq", ignore(ascii_case))]
    Eq,
    #[token("ne", ignore(ascii_case))]
    Ne,
    #[token("and", ignore(ascii_case))]
    And,

    #[token("null", ignore(ascii_case))]
    Null,
    #[token("true", ignore(ascii_case))]
    True,
    #[token("false", ignore(ascii_case))]
    False,

    #[regex(r"-?[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    // Single-quoted, '' stands for one quote
    #[regex(r"'([^']|'')*'", |lex| unquote(lex.slice()))]
    Text(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

fn unquote(slice: &str) -> String {
    slice[1..slice.len() - 1].replace("''", "'")
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
struct Clause {
    field: String,
    op: Comparison,
    value: Literal,
}

/// A parsed filter; all clauses must hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn parse(expr: &str) -> Result<Self> {
        let tokens = tokenize(expr)?;
        let mut clauses = Vec::new();
        let mut iter = tokens.into_iter();

        loop {
            let field = match iter.next() {
                Some(Token::Ident(name)) => name,
                _ => return Err(invalid(expr, "expected a field name")),
            };
            let op = match iter.next() {
                Some(Token::Eq) => Comparison::Eq,
                Some(Token::Ne) => Comparison::Ne,
                _ => return Err(invalid(expr, "expected 'eq' or 'ne'")),
            };
            let value = match iter.next() {
                Some(Token::Null) => Literal::Null,
                Some(Token::True) => Literal::Bool(true),
                Some(Token::False) => Literal::Bool(false),
                Some(Token::Number(n)) => Literal::Number(n),
                Some(Token::Text(s)) => Literal::Text(s),
                Some(_) => return Err(invalid(expr, "bad literal")),
                None => return Err(invalid(expr, "expected a value")),
            };
            clauses.push(Clause { field, op, value });

            match iter.next() {
                None => break,
                Some(Token::And) => continue,
                _ => return Err(invalid(expr, "expected 'and'")),
            }
        }

        Ok(Self { clauses })
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.clauses.iter().all(|clause| {
            let equal = literal_eq(&clause.value, record.get(&clause.field));
            match clause.op {
                Comparison::Eq => equal,
                Comparison::Ne => !equal,
            }
        })
    }
}

fn invalid(expr: &str, reason: &str) -> MigrateError {
    MigrateError::RecordAccess(format!("invalid filter '{}': {}", expr, reason))
}

fn literal_eq(literal: &Literal, value: Option<&Value>) -> bool {
    match (literal, value) {
        (Literal::Null, None | Some(Value::Null)) => true,
        (Literal::Bool(b), Some(Value::Bool(v))) => b == v,
        (Literal::Number(n), Some(Value::Number(v))) => v.as_f64() == Some(*n),
        (Literal::Text(s), Some(Value::String(v))) => s == v,
        _ => false,
    }
}

fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let mut lexer = Token::lexer(expr);
    let mut tokens = Vec::new();

    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(invalid(
                    expr,
                    &format!("unexpected input at {}: {}", lexer.span().start, lexer.slice()),
                ))
            }
        }
    }

    if tokens.is_empty() {
        return Err(invalid(expr, "empty expression"));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_single_clause() {
        let filter = Filter::parse("statecode eq 0").unwrap();
        assert!(filter.matches(&record(json!({"statecode": 0}))));
        assert!(!filter.matches(&record(json!({"statecode": 1}))));
        assert!(!filter.matches(&record(json!({}))));
    }

    #[test]
    fn test_conjunction_and_quotes() {
        let filter = Filter::parse("name eq 'O''Brien Ltd' AND parentaccountid ne null").unwrap();
        assert!(filter.matches(&record(json!({"name": "O'Brien Ltd", "parentaccountid": "p"}))));
        assert!(!filter.matches(&record(json!({"name": "O'Brien Ltd"}))));
    }

    #[test]
    fn test_booleans_and_null() {
        let filter = Filter::parse("isdisabled eq false and email eq null").unwrap();
        assert!(filter.matches(&record(json!({"isdisabled": false}))));
        assert!(!filter.matches(&record(json!({"isdisabled": false, "email": "a@b"}))));
    }

    #[test]
    fn test_negative_and_decimal_numbers() {
        let filter = Filter::parse("balance eq -12.5 and name ne 'x'").unwrap();
        assert!(filter.matches(&record(json!({"balance": -12.5, "name": "y"}))));
        assert!(!filter.matches(&record(json!({"balance": 12.5, "name": "y"}))));
    }

    #[test]
    fn test_keyword_prefixed_field_names() {
        let filter = Filter::parse("equity eq 1 AND andover NE null").unwrap();
        assert!(filter.matches(&record(json!({"equity": 1, "andover": "x"}))));
    }

    #[test]
    fn test_invalid_expressions() {
        for expr in ["", "name", "name gt 1", "name eq 'open", "a eq 1 or b eq 2", "a eq bogus", "a eq 1 and", "a eq #"] {
            assert!(Filter::parse(expr).is_err(), "{} should not parse", expr);
        }
    }
}
