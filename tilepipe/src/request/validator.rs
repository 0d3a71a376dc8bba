//! Request validation.
//!
//! Each field is checked independently so a single response can report
//! every problem in the document. Nothing is returned unless the whole
//! request is valid.

use serde_json::{Map, Value};

use super::{MetaRequest, TileRequest};
use crate::coord::TileCoord;
use crate::json::{IssueKind, JsonPath, ValidationError, ValidationIssue};
use crate::query;
use crate::registry::{split_type_entry, Parse, Registry, RegistryError, TypeRegistries};

/// Builds typed requests from JSON, resolving type-ids through `registries`.
///
/// The input document is only ever borrowed; validation never alters it.
#[derive(Debug, Clone, Copy)]
pub struct RequestValidator<'a> {
    registries: &'a TypeRegistries,
}

impl<'a> RequestValidator<'a> {
    pub fn new(registries: &'a TypeRegistries) -> Self {
        Self { registries }
    }

    /// Validates a `{uri, coord, tile, query?}` document.
    pub fn tile_request(&self, document: &Value) -> Result<TileRequest, ValidationError> {
        let args = root_object(document)?;
        let mut issues = Vec::new();

        let uri = uri(args, &mut issues);
        let coord = coord(args, &mut issues);
        let tile = typed_entry("tile", &self.registries.tiles, args, &mut issues);
        let query = match args.get("query") {
            Some(expression) => query::compile_at(
                expression,
                JsonPath::root().key("query"),
                &self.registries.queries,
                &mut issues,
            ),
            None => None,
        };

        match (uri, coord, tile) {
            (Some(uri), Some(coord), Some((tile_type, tile))) if issues.is_empty() => {
                Ok(TileRequest::new(uri, coord, tile_type, tile, query))
            }
            _ => Err(ValidationError::new(document, issues)),
        }
    }

    /// Validates a `{uri, meta}` document.
    pub fn meta_request(&self, document: &Value) -> Result<MetaRequest, ValidationError> {
        let args = root_object(document)?;
        let mut issues = Vec::new();

        let uri = uri(args, &mut issues);
        let meta = typed_entry("meta", &self.registries.metas, args, &mut issues);

        match (uri, meta) {
            (Some(uri), Some((meta_type, meta))) if issues.is_empty() => {
                Ok(MetaRequest::new(uri, meta_type, meta))
            }
            _ => Err(ValidationError::new(document, issues)),
        }
    }
}

fn root_object(document: &Value) -> Result<&Map<String, Value>, ValidationError> {
    document.as_object().ok_or_else(|| {
        ValidationError::new(
            document,
            vec![ValidationIssue::new(
                JsonPath::root(),
                IssueKind::WrongType,
                "request is not of type `object`",
            )],
        )
    })
}

fn uri(args: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) -> Option<String> {
    let path = JsonPath::root().key("uri");
    match args.get("uri") {
        Some(Value::String(uri)) => Some(uri.clone()),
        Some(_) => {
            issues.push(wrong_type(path, "uri", "string"));
            None
        }
        None => {
            issues.push(missing(path, "uri"));
            None
        }
    }
}

fn coord(args: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) -> Option<TileCoord> {
    let path = JsonPath::root().key("coord");
    let coord = match args.get("coord") {
        Some(Value::Object(coord)) => coord,
        Some(_) => {
            issues.push(wrong_type(path, "coord", "object"));
            return None;
        }
        None => {
            issues.push(missing(path, "coord"));
            return None;
        }
    };

    let mut axis = |name: &str| -> Option<u32> {
        let path = path.key(name);
        let label = format!("coord.{}", name);
        match coord.get(name) {
            Some(Value::Number(n)) => match n.as_f64().and_then(tile_index) {
                Some(index) => Some(index),
                None => {
                    issues.push(ValidationIssue::new(
                        path,
                        IssueKind::WrongType,
                        format!("`{}` is not a valid tile index", label),
                    ));
                    None
                }
            },
            Some(_) => {
                issues.push(wrong_type(path, &label, "number"));
                None
            }
            None => {
                issues.push(missing(path, &label));
                None
            }
        }
    };

    let x = axis("x");
    let y = axis("y");
    let z = axis("z");
    Some(TileCoord::new(x?, y?, z?))
}

/// Truncates a JSON number to a tile index.
fn tile_index(value: f64) -> Option<u32> {
    if !value.is_finite() || value < 0.0 || value >= u32::MAX as f64 + 1.0 {
        return None;
    }
    Some(value.trunc() as u32)
}

/// Resolves a `{ "<type-id>": { ...params } }` field through `registry`.
fn typed_entry<T: ?Sized + Parse>(
    key: &str,
    registry: &Registry<T>,
    args: &Map<String, Value>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<(String, Box<T>)> {
    let path = JsonPath::root().key(key);
    let Some(value) = args.get(key) else {
        issues.push(missing(path, key));
        return None;
    };
    let Some((type_id, params)) = split_type_entry(value) else {
        issues.push(ValidationIssue::new(
            path,
            IssueKind::WrongType,
            format!(
                "`{}` must contain exactly one `{{\"<type-id>\": {{...}}}}` entry",
                key
            ),
        ));
        return None;
    };

    match registry.get(type_id, params) {
        Ok(instance) => Some((type_id.to_string(), instance)),
        Err(e) => {
            let kind = match e {
                RegistryError::UnknownType { .. } => IssueKind::UnknownTypeId,
                RegistryError::InvalidParams { .. } => IssueKind::InvalidParams,
            };
            issues.push(ValidationIssue::new(path, kind, e.to_string()));
            None
        }
    }
}

fn missing(path: JsonPath, label: &str) -> ValidationIssue {
    ValidationIssue::new(path, IssueKind::MissingField, format!("`{}` not found", label))
}

fn wrong_type(path: JsonPath, label: &str, expected: &str) -> ValidationIssue {
    ValidationIssue::new(
        path,
        IssueKind::WrongType,
        format!("`{}` is not of type `{}`", label, expected),
    )
}
