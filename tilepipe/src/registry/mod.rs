//! Constructor registries for pluggable query, tile and meta types.
//!
//! A registry maps a string type-id to a constructor. Every lookup builds a
//! fresh instance and populates it through [`Parse`], so no instance is ever
//! shared between two requests.
//!
//! # Example
//!
//! ```
//! use tilepipe::registry::{BackendError, Params, Parse, Registry};
//!
//! #[derive(Default)]
//! struct Resolution(u64);
//!
//! impl Parse for Resolution {
//!     fn parse(&mut self, params: &Params) -> Result<(), BackendError> {
//!         self.0 = params.get("resolution").and_then(|v| v.as_u64()).unwrap_or(256);
//!         Ok(())
//!     }
//! }
//!
//! let mut registry: Registry<Resolution> = Registry::new("tile");
//! registry.register("grid", || Box::new(Resolution::default()));
//!
//! let params = serde_json::json!({ "resolution": 64 });
//! let grid = registry.get("grid", params.as_object().unwrap()).unwrap();
//! assert_eq!(grid.0, 64);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::query::QueryLeaf;
use crate::request::{Meta, Tile};

/// Parameters object attached to a type-id in request JSON.
pub type Params = Map<String, Value>;

/// Error type returned by backend implementations.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Constructor stored in a [`Registry`].
pub type Constructor<T> = Arc<dyn Fn() -> Box<T> + Send + Sync>;

/// Populates a freshly constructed instance from its request parameters.
pub trait Parse {
    /// Parses `params`, rejecting missing or malformed values.
    fn parse(&mut self, params: &Params) -> Result<(), BackendError>;
}

/// Errors raised while resolving a type-id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No constructor is registered under the id
    #[error("unrecognized {kind} type `{id}`")]
    UnknownType { kind: &'static str, id: String },

    /// The constructed instance rejected its parameters
    #[error("invalid `{id}` parameters: {message}")]
    InvalidParams { id: String, message: String },
}

/// Maps type-ids to constructors for one family of types.
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    ctors: HashMap<String, Constructor<T>>,
}

impl<T: ?Sized + Parse> Registry<T> {
    /// Creates an empty registry; `kind` names the family in error messages.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            ctors: HashMap::new(),
        }
    }

    /// Installs a constructor, replacing any previous one with the same id.
    pub fn register<F>(&mut self, id: impl Into<String>, ctor: F)
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        self.ctors.insert(id.into(), Arc::new(ctor));
    }

    /// Instantiates the type registered under `id` and parses `params` into it.
    pub fn get(&self, id: &str, params: &Params) -> Result<Box<T>, RegistryError> {
        let ctor = self.ctors.get(id).ok_or_else(|| RegistryError::UnknownType {
            kind: self.kind,
            id: id.to_string(),
        })?;

        let mut instance = ctor();
        instance
            .parse(params)
            .map_err(|e| RegistryError::InvalidParams {
                id: id.to_string(),
                message: e.to_string(),
            })?;
        Ok(instance)
    }

    /// Returns true if a constructor is registered under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.ctors.contains_key(id)
    }

    /// Returns the registered ids in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.ctors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the family name used in error messages.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.ctors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctors.is_empty()
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.ctors.keys().collect();
        ids.sort_unstable();
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("ids", &ids)
            .finish()
    }
}

/// The three type registries a pipeline resolves requests against.
#[derive(Debug)]
pub struct TypeRegistries {
    pub queries: Registry<dyn QueryLeaf>,
    pub tiles: Registry<dyn Tile>,
    pub metas: Registry<dyn Meta>,
}

impl TypeRegistries {
    pub fn new() -> Self {
        Self {
            queries: Registry::new("query"),
            tiles: Registry::new("tile"),
            metas: Registry::new("meta"),
        }
    }
}

impl Default for TypeRegistries {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits a `{ "<type-id>": { ...params } }` object into its id and params.
///
/// Returns `None` unless the object holds exactly one entry whose value is
/// itself an object.
pub fn split_type_entry(value: &Value) -> Option<(&str, &Params)> {
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }
    let (id, params) = object.iter().next()?;
    Some((id.as_str(), params.as_object()?))
}
