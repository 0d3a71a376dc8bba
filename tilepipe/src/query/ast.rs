use std::any::Any;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::registry::Parse;

/// A backend-defined query predicate.
///
/// Leaves are built by the query registry and parsed from their request
/// parameters. Tile backends recover their concrete type with
/// [`Query::as_leaf`] or [`LeafQuery::downcast`].
pub trait QueryLeaf: Parse + Send + Sync + fmt::Debug + 'static {
    /// Deterministic fingerprint of the parsed parameters.
    fn hash(&self) -> String;

    /// Enables downcasting to the concrete leaf type.
    fn as_any(&self) -> &dyn Any;
}

/// Errors raised when inspecting a compiled query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The query is not a leaf of the requested concrete type
    #[error("query type `{type_id}` is not supported")]
    UnsupportedQueryType { type_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    And,
    Or,
}

impl BinaryOp {
    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::And => 2,
            BinaryOp::Or => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
}

impl UnaryOp {
    pub fn precedence(self) -> u8 {
        3
    }

    pub fn as_str(self) -> &'static str {
        "NOT"
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved query object together with the type-id it was registered as.
#[derive(Debug)]
pub struct LeafQuery {
    type_id: String,
    leaf: Box<dyn QueryLeaf>,
}

impl LeafQuery {
    pub fn new(type_id: impl Into<String>, leaf: Box<dyn QueryLeaf>) -> Self {
        Self {
            type_id: type_id.into(),
            leaf,
        }
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn leaf(&self) -> &dyn QueryLeaf {
        self.leaf.as_ref()
    }

    /// Returns the leaf as `T`, or `UnsupportedQueryType` if it is another type.
    pub fn downcast<T: QueryLeaf>(&self) -> Result<&T, QueryError> {
        self.leaf
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| QueryError::UnsupportedQueryType {
                type_id: self.type_id.clone(),
            })
    }
}

#[derive(Debug)]
pub struct BinaryExpression {
    pub left: Box<Query>,
    pub op: BinaryOp,
    pub right: Box<Query>,
}

#[derive(Debug)]
pub struct UnaryExpression {
    pub op: UnaryOp,
    pub operand: Box<Query>,
}

/// A compiled boolean query tree.
#[derive(Debug)]
pub enum Query {
    Leaf(LeafQuery),
    Binary(BinaryExpression),
    Unary(UnaryExpression),
}

impl Query {
    pub fn leaf(type_id: impl Into<String>, leaf: Box<dyn QueryLeaf>) -> Self {
        Query::Leaf(LeafQuery::new(type_id, leaf))
    }

    pub fn binary(left: Query, op: BinaryOp, right: Query) -> Self {
        Query::Binary(BinaryExpression {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    pub fn and(left: Query, right: Query) -> Self {
        Self::binary(left, BinaryOp::And, right)
    }

    pub fn or(left: Query, right: Query) -> Self {
        Self::binary(left, BinaryOp::Or, right)
    }

    pub fn not(operand: Query) -> Self {
        Query::Unary(UnaryExpression {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        })
    }

    /// Deterministic, structure-preserving fingerprint.
    ///
    /// Leaves hash as `"<type-id>":"<leaf hash>"` with JSON string quoting,
    /// binary nodes as `(<left> AND <right>)` and unary nodes as
    /// `(NOT <operand>)`. Quoting keeps leaf content from being mistaken for
    /// expression structure.
    pub fn hash(&self) -> String {
        match self {
            Query::Leaf(leaf) => format!(
                "{}:{}",
                quote(&leaf.type_id),
                quote(&leaf.leaf.hash())
            ),
            Query::Binary(expr) => {
                format!("({} {} {})", expr.left.hash(), expr.op, expr.right.hash())
            }
            Query::Unary(expr) => format!("({} {})", expr.op, expr.operand.hash()),
        }
    }

    /// Returns the query as leaf type `T`.
    ///
    /// Fails with `UnsupportedQueryType` for expressions and for leaves of
    /// another type, letting backends reject queries they cannot evaluate.
    pub fn as_leaf<T: QueryLeaf>(&self) -> Result<&T, QueryError> {
        match self {
            Query::Leaf(leaf) => leaf.downcast(),
            Query::Binary(expr) => Err(QueryError::UnsupportedQueryType {
                type_id: expr.op.to_string(),
            }),
            Query::Unary(expr) => Err(QueryError::UnsupportedQueryType {
                type_id: expr.op.to_string(),
            }),
        }
    }

    /// Iterates the leaves from left to right.
    pub fn leaves(&self) -> impl Iterator<Item = &LeafQuery> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            while let Some(node) = stack.pop() {
                match node {
                    Query::Leaf(leaf) => return Some(leaf),
                    Query::Binary(expr) => {
                        stack.push(&expr.right);
                        stack.push(&expr.left);
                    }
                    Query::Unary(expr) => stack.push(&expr.operand),
                }
            }
            None
        })
    }
}

fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::testing::{FieldQuery, MatchAll};

    fn field(name: &str) -> Query {
        Query::leaf(
            "eq",
            Box::new(FieldQuery {
                field: name.to_string(),
            }),
        )
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = Query::and(field("a"), Query::not(field("b")));
        let b = Query::and(field("a"), Query::not(field("b")));
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_hash_is_order_sensitive() {
        let ab = Query::and(field("a"), field("b"));
        let ba = Query::and(field("b"), field("a"));
        assert_ne!(ab.hash(), ba.hash());
    }

    #[test]
    fn test_hash_distinguishes_operators() {
        let and = Query::and(field("a"), field("b"));
        let or = Query::or(field("a"), field("b"));
        assert_ne!(and.hash(), or.hash());
    }

    #[test]
    fn test_leaf_content_cannot_forge_structure() {
        let forged = field(r#"a" AND "eq":"b"#);
        let real = Query::and(field("a"), field("b"));
        assert_ne!(forged.hash(), real.hash());
    }

    #[test]
    fn test_as_leaf() {
        let query = field("a");
        assert_eq!(query.as_leaf::<FieldQuery>().unwrap().field, "a");
        assert_eq!(
            query.as_leaf::<MatchAll>().unwrap_err(),
            QueryError::UnsupportedQueryType {
                type_id: "eq".to_string()
            }
        );
    }

    #[test]
    fn test_as_leaf_on_expression() {
        let query = Query::or(field("a"), field("b"));
        assert_eq!(
            query.as_leaf::<FieldQuery>().unwrap_err().to_string(),
            "query type `OR` is not supported"
        );
    }

    #[test]
    fn test_leaves_in_order() {
        let query = Query::or(Query::and(field("a"), Query::not(field("b"))), field("c"));
        let fields: Vec<&str> = query
            .leaves()
            .map(|leaf| leaf.downcast::<FieldQuery>().unwrap().field.as_str())
            .collect();
        assert_eq!(fields, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_precedence_order() {
        assert!(UnaryOp::Not.precedence() > BinaryOp::And.precedence());
        assert!(BinaryOp::And.precedence() > BinaryOp::Or.precedence());
    }
}
