//! First compilation pass: token classification and adjacency checks.
//!
//! ```text
//!            +-------------------------------+
//!            v                               |
//! start --> Query / Expression --> BinaryOp --+
//!   |           ^
//!   +-> UnaryOp-+        (BinaryOp may also be followed by UnaryOp)
//! ```
//!
//! An expression may end only after a Query or a nested Expression.
//! Unrecognised tokens are reported once and then treated as valid in every
//! position, so a single bad token does not cascade into adjacency errors.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use super::ast::{BinaryOp, Query, QueryLeaf, UnaryOp};
use crate::json::{IssueKind, JsonPath, ValidationIssue};
use crate::registry::{split_type_entry, Registry, RegistryError};

/// Grammar class of a raw JSON token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Nested array
    Expression,
    /// `{ "<type-id>": { ...params } }`
    Query,
    BinaryOp,
    UnaryOp,
    /// Anything else
    Invalid,
}

impl TokenKind {
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::Array(_) => TokenKind::Expression,
            Value::Object(_) => TokenKind::Query,
            Value::String(s) => match s.parse::<Operator>() {
                Ok(Operator::Not) => TokenKind::UnaryOp,
                Ok(_) => TokenKind::BinaryOp,
                Err(_) => TokenKind::Invalid,
            },
            _ => TokenKind::Invalid,
        }
    }

    /// Whether an expression may begin with this kind.
    pub fn may_start(self) -> bool {
        !matches!(self, TokenKind::BinaryOp)
    }

    /// Whether `next` may directly follow this kind.
    pub fn may_precede(self, next: TokenKind) -> bool {
        use TokenKind::*;
        match (self, next) {
            (Invalid, _) | (_, Invalid) => true,
            (Expression | Query, BinaryOp) => true,
            (BinaryOp, Expression | Query | UnaryOp) => true,
            (UnaryOp, Expression | Query) => true,
            _ => false,
        }
    }

    /// Whether an expression may end with this kind.
    pub fn may_end(self) -> bool {
        !matches!(self, TokenKind::BinaryOp | TokenKind::UnaryOp)
    }

    fn expected_after(self) -> &'static str {
        match self {
            TokenKind::Expression | TokenKind::Query => "`AND` or `OR`",
            TokenKind::BinaryOp => "a query, an expression or `NOT`",
            TokenKind::UnaryOp => "a query or an expression",
            TokenKind::Invalid => "a valid token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Expression => "expression",
            TokenKind::Query => "query",
            TokenKind::BinaryOp => "binary operator",
            TokenKind::UnaryOp => "unary operator",
            TokenKind::Invalid => "invalid token",
        };
        f.write_str(s)
    }
}

/// Operator token as written in request JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    And,
    Or,
    Not,
}

impl Operator {
    pub fn as_binary(self) -> Option<BinaryOp> {
        match self {
            Operator::And => Some(BinaryOp::And),
            Operator::Or => Some(BinaryOp::Or),
            Operator::Not => None,
        }
    }

    pub fn as_unary(self) -> Option<UnaryOp> {
        match self {
            Operator::Not => Some(UnaryOp::Not),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(Operator::And),
            "OR" => Ok(Operator::Or),
            "NOT" => Ok(Operator::Not),
            other => Err(format!("invalid operator `{}`", other)),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated token, ready for the parser.
#[derive(Debug)]
pub enum Token {
    Query(Query),
    Operator(Operator),
    Group(Vec<Token>),
}

/// Walks an expression, collecting every grammar and registry issue.
pub(crate) struct ExpressionValidator<'a> {
    queries: &'a Registry<dyn QueryLeaf>,
    issues: &'a mut Vec<ValidationIssue>,
}

impl<'a> ExpressionValidator<'a> {
    pub(crate) fn new(
        queries: &'a Registry<dyn QueryLeaf>,
        issues: &'a mut Vec<ValidationIssue>,
    ) -> Self {
        Self { queries, issues }
    }

    /// Validates one token. Returns `None` if it or any nested token is invalid.
    pub(crate) fn token(&mut self, value: &Value, path: &mut JsonPath) -> Option<Token> {
        match value {
            Value::Array(items) => self.expression(items, path).map(Token::Group),
            Value::Object(_) => self.query(value, path).map(Token::Query),
            Value::String(s) => match s.parse::<Operator>() {
                Ok(op) => Some(Token::Operator(op)),
                Err(message) => {
                    self.issue(path, IssueKind::InvalidOperator, message);
                    None
                }
            },
            other => {
                self.issue(
                    path,
                    IssueKind::UnexpectedToken,
                    format!("unrecognized token `{}`", other),
                );
                None
            }
        }
    }

    fn expression(&mut self, items: &[Value], path: &mut JsonPath) -> Option<Vec<Token>> {
        if items.is_empty() {
            self.issue(path, IssueKind::UnexpectedToken, "expression is empty");
            return None;
        }

        let mut tokens = Vec::with_capacity(items.len());
        let mut valid = true;
        let mut prev: Option<TokenKind> = None;

        for (i, item) in items.iter().enumerate() {
            path.push_index(i);
            let kind = TokenKind::classify(item);
            let allowed = match prev {
                None => kind.may_start(),
                Some(prev) => prev.may_precede(kind),
            };
            if !allowed {
                let message = match prev {
                    None => format!("expression cannot begin with {}", describe(item, kind)),
                    Some(prev) => format!(
                        "unexpected {}, expected {}",
                        describe(item, kind),
                        prev.expected_after()
                    ),
                };
                self.issue(path, IssueKind::UnexpectedToken, message);
                valid = false;
            }

            match self.token(item, path) {
                Some(token) => tokens.push(token),
                None => valid = false,
            }
            path.pop();
            prev = Some(kind);
        }

        if let Some(last) = prev.filter(|kind| !kind.may_end()) {
            path.push_index(items.len() - 1);
            self.issue(
                path,
                IssueKind::UnexpectedToken,
                format!("expected {} after {}", last.expected_after(), last),
            );
            path.pop();
            valid = false;
        }

        valid.then_some(tokens)
    }

    fn query(&mut self, value: &Value, path: &JsonPath) -> Option<Query> {
        let Some((type_id, params)) = split_type_entry(value) else {
            self.issue(
                path,
                IssueKind::WrongType,
                "query must contain exactly one `{\"<type-id>\": {...}}` entry",
            );
            return None;
        };

        match self.queries.get(type_id, params) {
            Ok(leaf) => Some(Query::leaf(type_id, leaf)),
            Err(e) => {
                let kind = match e {
                    RegistryError::UnknownType { .. } => IssueKind::UnknownTypeId,
                    RegistryError::InvalidParams { .. } => IssueKind::InvalidParams,
                };
                self.issue(path, kind, e.to_string());
                None
            }
        }
    }

    fn issue(&mut self, path: &JsonPath, kind: IssueKind, message: impl Into<String>) {
        self.issues
            .push(ValidationIssue::new(path.clone(), kind, message));
    }
}

fn describe(value: &Value, kind: TokenKind) -> String {
    match (value, kind) {
        (Value::String(s), TokenKind::BinaryOp | TokenKind::UnaryOp) => {
            format!("{} `{}`", kind, s)
        }
        _ => kind.to_string(),
    }
}
