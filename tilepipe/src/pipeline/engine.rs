//! The pipeline façade.
//!
//! ```text
//! generate(req)
//!   │
//!   ├─► store.exists(key) ── yes ──► Ok
//!   │
//!   └─► PromiseMap.get_or_create(key)
//!         ├─ joined ─────────────────────────────► wait
//!         └─ created ─► spawn ─► AdmissionQueue.send(req)
//!                                  └─► compress ─► store.set(key)
//!                                        └─► resolve(key) ──► wait
//! ```
//!
//! The store key is the request hash followed by the compression id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::error::PipelineError;
use super::executor::{BlockingExecutor, TokioExecutor};
use super::promise::PromiseMap;
use super::queue::AdmissionQueue;
use super::stats::PipelineStats;
use crate::compression::Compression;
use crate::config::PipelineConfig;
use crate::query::{self, Query, QueryLeaf};
use crate::registry::TypeRegistries;
use crate::request::{GenerationRequest, Meta, MetaRequest, RequestValidator, Tile, TileRequest};
use crate::store::{Store, StoreConnection, StoreError, StoreFactory};

type Outcome = Result<(), PipelineError>;

#[derive(Debug, Default)]
struct Counters {
    store_hits: AtomicU64,
    generated: AtomicU64,
    failed: AtomicU64,
}

/// Everything a spawned generation task needs.
#[derive(Clone)]
struct Generator {
    queue: Arc<AdmissionQueue>,
    promises: Arc<PromiseMap<Outcome>>,
    store: Option<StoreFactory>,
    compression: Compression,
    executor: TokioExecutor,
    counters: Arc<Counters>,
}

impl Generator {
    fn key<R: GenerationRequest>(&self, request: &R) -> String {
        format!("{}:{}", request.hash(), self.compression)
    }

    async fn generate<R: GenerationRequest + Clone>(&self, request: &R) -> Outcome {
        let key = self.key(request);

        if self.is_stored(&key).await? {
            self.counters.store_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Payload already stored");
            return Ok(());
        }

        let (promise, existed) = self.promises.get_or_create(&key);
        if !existed {
            let generator = self.clone();
            let request = request.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let outcome = generator.produce(&key, request).await;
                match &outcome {
                    Ok(true) => {
                        generator.counters.generated.fetch_add(1, Ordering::Relaxed);
                        debug!(key = %key, "Generated payload");
                    }
                    Ok(false) => {
                        generator.counters.store_hits.fetch_add(1, Ordering::Relaxed);
                        debug!(key = %key, "Payload stored by an earlier generation");
                    }
                    Err(e) => {
                        generator.counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(key = %key, error = %e, "Generation failed");
                    }
                }
                generator.promises.resolve(&key, outcome.map(|_| ()));
            });
        }

        promise.wait().await.unwrap_or_else(|| {
            Err(PipelineError::Internal(
                "generation finished without a result".to_string(),
            ))
        })
    }

    /// Generates, compresses and stores the payload for `key`.
    ///
    /// Returns false, without calling the backend, if the payload is
    /// already stored.
    async fn produce<R: GenerationRequest>(
        &self,
        key: &str,
        request: R,
    ) -> Result<bool, PipelineError> {
        if self.is_stored(key).await? {
            return Ok(false);
        }

        let payload = self.queue.send(request).await?;

        let compression = self.compression;
        let packed = self
            .executor
            .execute_blocking(move || compression.compress(&payload))
            .await??;

        let key = key.to_string();
        self.with_store(move |store| store.set(&key, packed)).await?;
        Ok(true)
    }

    async fn is_stored(&self, key: &str) -> Result<bool, PipelineError> {
        let key = key.to_string();
        self.with_store(move |store| store.exists(&key)).await
    }

    async fn get<R: GenerationRequest>(&self, request: &R) -> Result<Vec<u8>, PipelineError> {
        let key = self.key(request);
        let lookup = key.clone();
        let packed = self
            .with_store(move |store| store.get(&lookup))
            .await?
            .ok_or(StoreError::NotFound(key))?;

        let compression = self.compression;
        Ok(self
            .executor
            .execute_blocking(move || compression.decompress(&packed))
            .await??)
    }

    /// Opens a fresh store connection on the blocking pool and runs `op` on it.
    async fn with_store<T, F>(&self, op: F) -> Result<T, PipelineError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Store) -> Result<T, StoreError> + Send + 'static,
    {
        let factory = self.store.clone().ok_or(StoreError::NotConfigured)?;
        let result = self
            .executor
            .execute_blocking(move || {
                let mut connection = StoreConnection::open(&factory)?;
                op(connection.store())
            })
            .await?;
        Ok(result?)
    }
}

/// Validates requests, de-duplicates generation and mediates the store.
///
/// Register backends and a store first, then share the pipeline (for
/// example in an `Arc`) across the tasks that serve requests.
///
/// # Example
///
/// ```ignore
/// let mut pipeline = Pipeline::new(PipelineConfig::default());
/// pipeline.register_tile("heatmap", || Box::new(Heatmap::default()));
/// pipeline.register_query("exists", || Box::new(Exists::default()));
/// pipeline.register_store_factory(MemoryStore::default().factory());
///
/// let request = pipeline.new_tile_request(&json)?;
/// let bytes = pipeline.generate_and_get(&request).await?;
/// ```
pub struct Pipeline {
    registries: TypeRegistries,
    generator: Generator,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            registries: TypeRegistries::new(),
            generator: Generator {
                queue: Arc::new(AdmissionQueue::new(
                    config.max_concurrent,
                    config.queue_length,
                    TokioExecutor,
                )),
                promises: Arc::new(PromiseMap::new()),
                store: None,
                compression: config.compression,
                executor: TokioExecutor,
                counters: Arc::new(Counters::default()),
            },
        }
    }

    /// Registers a query leaf type.
    pub fn register_query<F>(&mut self, id: impl Into<String>, ctor: F)
    where
        F: Fn() -> Box<dyn QueryLeaf> + Send + Sync + 'static,
    {
        self.registries.queries.register(id, ctor);
    }

    /// Registers a tile renderer type.
    pub fn register_tile<F>(&mut self, id: impl Into<String>, ctor: F)
    where
        F: Fn() -> Box<dyn Tile> + Send + Sync + 'static,
    {
        self.registries.tiles.register(id, ctor);
    }

    /// Registers a metadata generator type.
    pub fn register_meta<F>(&mut self, id: impl Into<String>, ctor: F)
    where
        F: Fn() -> Box<dyn Meta> + Send + Sync + 'static,
    {
        self.registries.metas.register(id, ctor);
    }

    /// Sets the store constructor. Each operation opens its own connection.
    pub fn register_store<F>(&mut self, ctor: F)
    where
        F: Fn() -> Result<Box<dyn Store>, StoreError> + Send + Sync + 'static,
    {
        self.register_store_factory(Arc::new(ctor));
    }

    pub fn register_store_factory(&mut self, factory: StoreFactory) {
        self.generator.store = Some(factory);
    }

    pub fn registries(&self) -> &TypeRegistries {
        &self.registries
    }

    pub fn compression(&self) -> Compression {
        self.generator.compression
    }

    /// Changes the number of concurrent backend calls.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        self.generator.queue.set_max_concurrent(max_concurrent);
    }

    /// Changes how many requests may wait for a generation slot.
    pub fn set_queue_length(&self, queue_length: usize) {
        self.generator.queue.set_max_backlog(queue_length);
    }

    /// Validates a tile request document.
    pub fn new_tile_request(&self, document: &Value) -> Result<TileRequest, PipelineError> {
        Ok(RequestValidator::new(&self.registries).tile_request(document)?)
    }

    /// Validates a meta request document.
    pub fn new_meta_request(&self, document: &Value) -> Result<MetaRequest, PipelineError> {
        Ok(RequestValidator::new(&self.registries).meta_request(document)?)
    }

    /// Compiles a standalone query expression against the query registry.
    pub fn compile_query(&self, expression: &Value) -> Result<Option<Query>, PipelineError> {
        Ok(query::compile(expression, &self.registries.queries)?)
    }

    /// Makes sure the payload for `request` is in the store.
    ///
    /// Concurrent calls for the same request share one backend `create`.
    pub async fn generate<R: GenerationRequest + Clone>(
        &self,
        request: &R,
    ) -> Result<(), PipelineError> {
        self.generator.generate(request).await
    }

    /// Reads and decompresses the stored payload for `request`.
    ///
    /// Fails with `StoreError::NotFound` if it has not been generated.
    pub async fn get<R: GenerationRequest>(&self, request: &R) -> Result<Vec<u8>, PipelineError> {
        self.generator.get(request).await
    }

    /// Generates the payload if needed, then returns it.
    pub async fn generate_and_get<R: GenerationRequest + Clone>(
        &self,
        request: &R,
    ) -> Result<Vec<u8>, PipelineError> {
        self.generate(request).await?;
        self.get(request).await
    }

    /// Returns the store key used for `request`.
    pub fn store_key<R: GenerationRequest>(&self, request: &R) -> String {
        self.generator.key(request)
    }

    pub fn stats(&self) -> PipelineStats {
        let counters = &self.generator.counters;
        PipelineStats {
            store_hits: counters.store_hits.load(Ordering::Relaxed),
            generated: counters.generated.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            requests: self.generator.promises.stats(),
            queue: self.generator.queue.stats(),
        }
    }

    /// Logs current statistics.
    pub fn log_stats(&self) {
        self.stats().log();
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
