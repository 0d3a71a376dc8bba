//! Boolean query expressions.
//!
//! A request's `query` field is either a single query object or an array of
//! tokens combining query objects with `AND`, `OR` and `NOT`:
//!
//! ```text
//! [ {"exists": {...}}, "AND", "NOT", [ {"prefix": {...}}, "OR", {"range": {...}} ] ]
//! ```
//!
//! Compilation runs in two passes:
//!
//! 1. [`grammar`] walks the JSON, checks every token against its
//!    predecessor and resolves query objects through the query registry.
//!    All problems are collected before anything is parsed.
//! 2. [`parser`] turns the validated tokens into a [`Query`] tree by
//!    precedence climbing, with `NOT` > `AND` > `OR` and left associativity.

mod ast;
pub(crate) mod grammar;
pub(crate) mod parser;

pub use ast::{
    BinaryExpression, BinaryOp, LeafQuery, Query, QueryError, QueryLeaf, UnaryExpression, UnaryOp,
};
pub use grammar::{Operator, Token, TokenKind};
pub use parser::{parse_tokens, ParseError};

use serde_json::Value;

use crate::json::{IssueKind, JsonPath, ValidationError, ValidationIssue};
use crate::registry::Registry;

/// Compiles a standalone query expression.
///
/// `null` compiles to `None`. Validation issues are reported relative to
/// `expression` itself.
pub fn compile(
    expression: &Value,
    queries: &Registry<dyn QueryLeaf>,
) -> Result<Option<Query>, ValidationError> {
    let mut issues = Vec::new();
    let query = compile_at(expression, JsonPath::root(), queries, &mut issues);
    if issues.is_empty() {
        Ok(query)
    } else {
        Err(ValidationError::new(expression, issues))
    }
}

/// Compiles the expression found at `path`, appending issues to `issues`.
///
/// Returns `None` for `null` or when any issue was raised.
pub(crate) fn compile_at(
    expression: &Value,
    mut path: JsonPath,
    queries: &Registry<dyn QueryLeaf>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Query> {
    if expression.is_null() {
        return None;
    }

    let before = issues.len();
    let token = grammar::ExpressionValidator::new(queries, issues).token(expression, &mut path);
    if issues.len() > before {
        return None;
    }

    let result = match token? {
        Token::Query(query) => Ok(query),
        Token::Group(tokens) => parse_tokens(tokens),
        Token::Operator(op) => Err(ParseError::UnexpectedOperator(op)),
    };

    match result {
        Ok(query) => Some(query),
        Err(e) => {
            issues.push(ValidationIssue::new(path, IssueKind::UnexpectedToken, e.to_string()));
            None
        }
    }
}
