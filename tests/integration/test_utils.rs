//! Shared test adapters and helpers

use async_trait::async_trait;
use eapply::adapter::memory::{MemoryAdapter, MemoryStore};
use eapply::adapter::{
    AdapterRegistry, Capabilities, Collection, EntityAdapter, ParentContext, ReadRequest,
    ReadResponse, WriteRequest,
};
use eapply::error::AdapterError;
use eapply::Declaration;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub fn declaration(value: Value) -> Declaration {
    Declaration::from_value(value, "@").unwrap()
}

pub fn path(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

/// Registry with a plain memory adapter for each name, all sharing `store`
pub fn memory_registry(names: &[&str], store: &MemoryStore) -> AdapterRegistry {
    names.iter().fold(AdapterRegistry::new(), |registry, name| {
        registry.with(*name, Arc::new(MemoryAdapter::new(store.clone())))
    })
}

/// One observed read: the layer breadcrumb and the parent context it was given
#[derive(Debug, Clone)]
pub struct ObservedRead {
    pub path: Vec<String>,
    pub parent: ParentContext,
}

/// Memory adapter that remembers every read it served
#[derive(Clone)]
pub struct RecordingAdapter {
    inner: MemoryAdapter,
    reads: Arc<Mutex<Vec<ObservedRead>>>,
}

impl RecordingAdapter {
    pub fn new(inner: MemoryAdapter) -> Self {
        Self {
            inner,
            reads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn reads(&self) -> Vec<ObservedRead> {
        self.reads.lock().clone()
    }
}

#[async_trait]
impl EntityAdapter for RecordingAdapter {
    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    async fn get(&self, request: &ReadRequest<'_>) -> Result<ReadResponse, AdapterError> {
        self.reads.lock().push(ObservedRead {
            path: request.path.to_vec(),
            parent: request.parent.clone(),
        });
        self.inner.get(request).await
    }

    async fn create(&self, request: &WriteRequest<'_>) -> Result<Value, AdapterError> {
        self.inner.create(request).await
    }

    async fn update(&self, request: &WriteRequest<'_>) -> Result<Option<Value>, AdapterError> {
        self.inner.update(request).await
    }

    async fn delete(&self, request: &WriteRequest<'_>) -> Result<Option<Value>, AdapterError> {
        self.inner.delete(request).await
    }
}

/// Memory adapter whose create fails for one entity name
pub struct FailingCreateAdapter {
    inner: MemoryAdapter,
    failing_name: String,
}

impl FailingCreateAdapter {
    pub fn new(inner: MemoryAdapter, failing_name: &str) -> Self {
        Self {
            inner,
            failing_name: failing_name.to_string(),
        }
    }
}

#[async_trait]
impl EntityAdapter for FailingCreateAdapter {
    async fn get(&self, request: &ReadRequest<'_>) -> Result<ReadResponse, AdapterError> {
        self.inner.get(request).await
    }

    async fn create(&self, request: &WriteRequest<'_>) -> Result<Value, AdapterError> {
        if request.name == self.failing_name {
            return Err(format!("quota exceeded creating {}", request.name).into());
        }
        self.inner.create(request).await
    }

    async fn update(&self, request: &WriteRequest<'_>) -> Result<Option<Value>, AdapterError> {
        self.inner.update(request).await
    }

    async fn delete(&self, request: &WriteRequest<'_>) -> Result<Option<Value>, AdapterError> {
        self.inner.delete(request).await
    }
}

/// Always reports the same live items and accepts every write without effect
pub struct StubbornAdapter {
    items: BTreeMap<String, Value>,
}

impl StubbornAdapter {
    pub fn new(items: BTreeMap<String, Value>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl EntityAdapter for StubbornAdapter {
    async fn get(&self, _request: &ReadRequest<'_>) -> Result<ReadResponse, AdapterError> {
        Ok(ReadResponse::Collection(Collection::new(self.items.clone())))
    }

    async fn create(&self, request: &WriteRequest<'_>) -> Result<Value, AdapterError> {
        Ok(request.body.clone())
    }

    async fn update(&self, _request: &WriteRequest<'_>) -> Result<Option<Value>, AdapterError> {
        Ok(None)
    }

    async fn delete(&self, _request: &WriteRequest<'_>) -> Result<Option<Value>, AdapterError> {
        Ok(None)
    }
}

/// Collection adapter that refuses every write
pub struct ReadOnlyCollectionAdapter {
    inner: MemoryAdapter,
}

impl ReadOnlyCollectionAdapter {
    pub fn new(inner: MemoryAdapter) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl EntityAdapter for ReadOnlyCollectionAdapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities::read_only()
    }

    async fn get(&self, request: &ReadRequest<'_>) -> Result<ReadResponse, AdapterError> {
        self.inner.get(request).await
    }

    async fn create(&self, _request: &WriteRequest<'_>) -> Result<Value, AdapterError> {
        Err("not writable".into())
    }

    async fn update(&self, _request: &WriteRequest<'_>) -> Result<Option<Value>, AdapterError> {
        Err("not writable".into())
    }

    async fn delete(&self, _request: &WriteRequest<'_>) -> Result<Option<Value>, AdapterError> {
        Err("not writable".into())
    }
}
