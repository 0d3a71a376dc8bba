//! JSON paths, validation issues and the annotated document renderer.
//!
//! Validation never stops at the first problem. Every issue is collected
//! with the [`JsonPath`] of the offending node, and the whole set is then
//! rendered against the input document:
//!
//! ```text
//! {
//!     "coord": {
//!         "x": 12,
//!         vvvvvvvvv
//!         "y": true,
//!         ^^^^^^^^^ Error: `coord.y` is not of type `number`
//!         "z": 4
//!     },
//!     "uri": "dataset"
//! }
//! ```

mod path;
mod render;

pub use path::{JsonPath, PathSegment};
pub use render::render_annotated;

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Category of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    /// A required key is absent
    MissingField,
    /// A value has the wrong JSON type or shape
    WrongType,
    /// A type-id is not present in its registry
    UnknownTypeId,
    /// A string token in an expression is not a recognised operator
    InvalidOperator,
    /// A token is not permitted after its predecessor
    UnexpectedToken,
    /// A registered type rejected its parameters
    InvalidParams,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueKind::MissingField => "missing field",
            IssueKind::WrongType => "wrong type",
            IssueKind::UnknownTypeId => "unknown type",
            IssueKind::InvalidOperator => "invalid operator",
            IssueKind::UnexpectedToken => "unexpected token",
            IssueKind::InvalidParams => "invalid parameters",
        };
        f.write_str(s)
    }
}

/// One problem found in a request document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: JsonPath,
    pub kind: IssueKind,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: JsonPath, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }
}

/// Aggregated validation failure.
///
/// Displays as the input document annotated at every offending position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{rendered}")]
pub struct ValidationError {
    issues: Vec<ValidationIssue>,
    rendered: String,
}

impl ValidationError {
    /// Builds the error, rendering `issues` against `document`.
    pub fn new(document: &Value, issues: Vec<ValidationIssue>) -> Self {
        let rendered = render_annotated(document, &issues);
        Self { issues, rendered }
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// The annotated document.
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// Returns true if any issue is anchored at `path`.
    pub fn has_issue_at(&self, path: &JsonPath) -> bool {
        self.issues.iter().any(|issue| &issue.path == path)
    }
}
