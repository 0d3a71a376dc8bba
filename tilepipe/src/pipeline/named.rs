//! Multiple pipelines addressed by id.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::engine::Pipeline;
use super::error::PipelineError;

/// A set of independently configured pipelines, for example one per dataset
/// or store.
#[derive(Default)]
pub struct PipelineRegistry {
    pipelines: HashMap<String, Arc<Pipeline>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `pipeline` under `id`, replacing any previous entry.
    pub fn register(&mut self, id: impl Into<String>, pipeline: Pipeline) -> Arc<Pipeline> {
        let pipeline = Arc::new(pipeline);
        self.pipelines.insert(id.into(), Arc::clone(&pipeline));
        pipeline
    }

    pub fn get(&self, id: &str) -> Result<Arc<Pipeline>, PipelineError> {
        self.pipelines
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownPipeline(id.to_string()))
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.pipelines.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub async fn generate_tile(&self, id: &str, document: &Value) -> Result<(), PipelineError> {
        let pipeline = self.get(id)?;
        let request = pipeline.new_tile_request(document)?;
        pipeline.generate(&request).await
    }

    pub async fn get_tile(&self, id: &str, document: &Value) -> Result<Vec<u8>, PipelineError> {
        let pipeline = self.get(id)?;
        let request = pipeline.new_tile_request(document)?;
        pipeline.get(&request).await
    }

    pub async fn generate_and_get_tile(
        &self,
        id: &str,
        document: &Value,
    ) -> Result<Vec<u8>, PipelineError> {
        let pipeline = self.get(id)?;
        let request = pipeline.new_tile_request(document)?;
        pipeline.generate_and_get(&request).await
    }

    pub async fn generate_meta(&self, id: &str, document: &Value) -> Result<(), PipelineError> {
        let pipeline = self.get(id)?;
        let request = pipeline.new_meta_request(document)?;
        pipeline.generate(&request).await
    }

    pub async fn get_meta(&self, id: &str, document: &Value) -> Result<Vec<u8>, PipelineError> {
        let pipeline = self.get(id)?;
        let request = pipeline.new_meta_request(document)?;
        pipeline.get(&request).await
    }

    pub async fn generate_and_get_meta(
        &self,
        id: &str,
        document: &Value,
    ) -> Result<Vec<u8>, PipelineError> {
        let pipeline = self.get(id)?;
        let request = pipeline.new_meta_request(document)?;
        pipeline.generate_and_get(&request).await
    }
}
