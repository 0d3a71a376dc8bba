//! Second compilation pass: precedence climbing over validated tokens.

use std::iter::Peekable;
use std::vec::IntoIter;

use thiserror::Error;

use super::ast::{BinaryOp, Query};
use super::grammar::{Operator, Token};

/// Structural errors the parser can still hit on unvalidated token lists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expression is empty")]
    Empty,

    #[error("expected an operand after `{0}`")]
    MissingOperand(Operator),

    #[error("unexpected operator `{0}`")]
    UnexpectedOperator(Operator),

    #[error("unexpected token after complete expression")]
    TrailingTokens,
}

/// Builds a query tree from a flat token list.
///
/// `NOT` applies to the single operand that follows it. Binary operators
/// group by precedence (`AND` over `OR`) and associate to the left.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Query, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
    };
    let lhs = parser.operand(None)?;
    let query = parser.expression(lhs, 0)?;

    if parser.tokens.next().is_some() {
        return Err(ParseError::TrailingTokens);
    }
    Ok(query)
}

struct Parser {
    tokens: Peekable<IntoIter<Token>>,
}

impl Parser {
    /// Consumes an optional `NOT` followed by a primary.
    fn operand(&mut self, after: Option<Operator>) -> Result<Query, ParseError> {
        match self.tokens.next() {
            Some(Token::Operator(Operator::Not)) => {
                let operand = self.primary(Operator::Not)?;
                Ok(Query::not(operand))
            }
            Some(token) => Self::resolve(token),
            None => Err(after.map_or(ParseError::Empty, ParseError::MissingOperand)),
        }
    }

    fn primary(&mut self, after: Operator) -> Result<Query, ParseError> {
        match self.tokens.next() {
            Some(token) => Self::resolve(token),
            None => Err(ParseError::MissingOperand(after)),
        }
    }

    fn resolve(token: Token) -> Result<Query, ParseError> {
        match token {
            Token::Query(query) => Ok(query),
            Token::Group(tokens) => parse_tokens(tokens),
            Token::Operator(op) => Err(ParseError::UnexpectedOperator(op)),
        }
    }

    fn peek_binary(&mut self) -> Option<BinaryOp> {
        match self.tokens.peek() {
            Some(Token::Operator(op)) => op.as_binary(),
            _ => None,
        }
    }

    fn expression(&mut self, mut lhs: Query, min_precedence: u8) -> Result<Query, ParseError> {
        while let Some(op) = self
            .peek_binary()
            .filter(|op| op.precedence() >= min_precedence)
        {
            self.tokens.next();
            let mut rhs = self.operand(Some(binary_operator(op)))?;

            while let Some(next) = self
                .peek_binary()
                .filter(|next| next.precedence() > op.precedence())
            {
                rhs = self.expression(rhs, next.precedence())?;
            }
            lhs = Query::binary(lhs, op, rhs);
        }
        Ok(lhs)
    }
}

fn binary_operator(op: BinaryOp) -> Operator {
    match op {
        BinaryOp::And => Operator::And,
        BinaryOp::Or => Operator::Or,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::testing::FieldQuery;

    fn q(name: &str) -> Token {
        Token::Query(Query::leaf(
            "eq",
            Box::new(FieldQuery {
                field: name.to_string(),
            }),
        ))
    }

    fn op(op: Operator) -> Token {
        Token::Operator(op)
    }

    fn shape(query: &Query) -> String {
        match query {
            Query::Leaf(leaf) => leaf.downcast::<FieldQuery>().unwrap().field.clone(),
            Query::Binary(expr) => {
                format!("({} {} {})", shape(&expr.left), expr.op, shape(&expr.right))
            }
            Query::Unary(expr) => format!("({} {})", expr.op, shape(&expr.operand)),
        }
    }

    fn parse(tokens: Vec<Token>) -> String {
        shape(&parse_tokens(tokens).unwrap())
    }

    #[test]
    fn test_single_operand() {
        assert_eq!(parse(vec![q("a")]), "a");
        assert_eq!(parse(vec![op(Operator::Not), q("a")]), "(NOT a)");
    }

    #[test]
    fn test_precedence() {
        use Operator::*;
        assert_eq!(
            parse(vec![q("a"), op(Or), q("b"), op(And), q("c")]),
            "(a OR (b AND c))"
        );
        assert_eq!(
            parse(vec![q("a"), op(And), q("b"), op(Or), q("c")]),
            "((a AND b) OR c)"
        );
        assert_eq!(
            parse(vec![
                q("a"),
                op(Or),
                q("b"),
                op(And),
                q("c"),
                op(Or),
                q("d")
            ]),
            "((a OR (b AND c)) OR d)"
        );
    }

    #[test]
    fn test_not_in_binary_chain() {
        use Operator::*;
        assert_eq!(
            parse(vec![q("a"), op(And), op(Not), q("b"), op(Or), q("c")]),
            "((a AND (NOT b)) OR c)"
        );
    }

    #[test]
    fn test_group() {
        use Operator::*;
        let group = Token::Group(vec![q("a"), op(Or), q("b")]);
        assert_eq!(
            parse(vec![op(Not), group, op(And), q("c")]),
            "((NOT (a OR b)) AND c)"
        );
    }

    #[test]
    fn test_structural_errors() {
        use Operator::*;
        assert_eq!(parse_tokens(vec![]).unwrap_err(), ParseError::Empty);
        assert_eq!(
            parse_tokens(vec![q("a"), op(And)]).unwrap_err(),
            ParseError::MissingOperand(And)
        );
        assert_eq!(
            parse_tokens(vec![op(Not)]).unwrap_err(),
            ParseError::MissingOperand(Not)
        );
        assert_eq!(
            parse_tokens(vec![op(Or), q("a")]).unwrap_err(),
            ParseError::UnexpectedOperator(Or)
        );
        assert_eq!(
            parse_tokens(vec![q("a"), q("b")]).unwrap_err(),
            ParseError::TrailingTokens
        );
    }
}
