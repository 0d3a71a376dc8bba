use std::fmt;
use std::sync::Arc;

use super::{hash_components, GenerationRequest, Meta};
use crate::registry::BackendError;

/// Request to generate a dataset's metadata document.
#[derive(Clone)]
pub struct MetaRequest {
    uri: String,
    meta_type: String,
    meta: Arc<dyn Meta>,
}

impl MetaRequest {
    pub fn new(uri: impl Into<String>, meta_type: impl Into<String>, meta: Box<dyn Meta>) -> Self {
        Self {
            uri: uri.into(),
            meta_type: meta_type.into(),
            meta: Arc::from(meta),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn meta_type(&self) -> &str {
        &self.meta_type
    }

    pub fn meta(&self) -> &dyn Meta {
        self.meta.as_ref()
    }
}

impl GenerationRequest for MetaRequest {
    fn hash(&self) -> String {
        let meta_hash = self.meta.hash();
        hash_components(&["meta", &self.uri, &self.meta_type, &meta_hash])
    }

    fn create(&self) -> Result<Vec<u8>, BackendError> {
        self.meta.create(&self.uri)
    }
}

impl fmt::Debug for MetaRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaRequest")
            .field("uri", &self.uri)
            .field("meta_type", &self.meta_type)
            .finish()
    }
}
