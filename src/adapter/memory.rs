//! In-memory adapters
//!
//! [`MemoryAdapter`] persists entities in a shared [`MemoryStore`], scoped by
//! the breadcrumb of the layer they belong to, so the same adapter can back a
//! collection nested under many parents. The store's document form is the
//! same shape as a transaction's `configAfter` snapshot.

use crate::adapter::{
    Capabilities, Collection, EntityAdapter, ReadRequest, ReadResponse, WriteRequest,
};
use crate::error::{AdapterError, ReconcileError};
use crate::filter::PropertyOptions;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Default separator between breadcrumb segments in store scopes
pub const SCOPE_SEPARATOR: &str = "/";

type Scopes = BTreeMap<String, BTreeMap<String, Value>>;

/// Shared entity storage keyed by layer scope, then entity name
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    scopes: Arc<RwLock<Scopes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a `{ "<scope>": { "<name>": entity } }` document
    pub fn from_document(document: &Value) -> Result<Self, ReconcileError> {
        let Value::Object(scopes) = document else {
            return Err(ReconcileError::Configuration(
                "memory store document must be an object".to_string(),
            ));
        };
        let mut loaded = Scopes::new();
        for (scope, items) in scopes {
            let Value::Object(items) = items else {
                return Err(ReconcileError::Configuration(format!(
                    "memory store scope '{}' must be an object",
                    scope
                )));
            };
            loaded.insert(
                scope.clone(),
                items.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            );
        }
        Ok(Self {
            scopes: Arc::new(RwLock::new(loaded)),
        })
    }

    /// Current content as a document; empty scopes are left out
    pub fn to_document(&self) -> Value {
        let scopes = self.scopes.read();
        Value::Object(
            scopes
                .iter()
                .filter(|(_, items)| !items.is_empty())
                .map(|(scope, items)| {
                    let items: Map<String, Value> =
                        items.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                    (scope.clone(), Value::Object(items))
                })
                .collect(),
        )
    }

    /// Entities stored under a scope
    pub fn items(&self, scope: &str) -> BTreeMap<String, Value> {
        self.scopes.read().get(scope).cloned().unwrap_or_default()
    }

    pub fn get(&self, scope: &str, name: &str) -> Option<Value> {
        self.scopes.read().get(scope).and_then(|items| items.get(name).cloned())
    }

    pub fn insert(&self, scope: &str, name: &str, value: Value) -> Option<Value> {
        self.scopes
            .write()
            .entry(scope.to_string())
            .or_default()
            .insert(name.to_string(), value)
    }

    pub fn remove(&self, scope: &str, name: &str) -> Option<Value> {
        self.scopes
            .write()
            .get_mut(scope)
            .and_then(|items| items.remove(name))
    }

    /// Total number of stored entities
    pub fn len(&self) -> usize {
        self.scopes.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scope key for a layer breadcrumb
pub fn scope_key(path: &[String], separator: &str) -> String {
    path.join(separator)
}

/// Collection adapter that faithfully persists what it is asked to write
#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    store: MemoryStore,
    reads: BTreeSet<String>,
    ignore_keys: BTreeSet<String>,
    property_options: PropertyOptions,
    response_properties: Map<String, Value>,
    transient_properties: BTreeSet<String>,
    separator: String,
}

impl MemoryAdapter {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            reads: Capabilities::default().reads,
            ignore_keys: BTreeSet::new(),
            property_options: PropertyOptions::new(),
            response_properties: Map::new(),
            transient_properties: BTreeSet::new(),
            separator: SCOPE_SEPARATOR.to_string(),
        }
    }

    /// Join scope breadcrumbs the way the engine joins snapshot keys
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Answer a custom read operation with the same collection as `get`
    pub fn with_read(mut self, operation: impl Into<String>) -> Self {
        self.reads.insert(operation.into());
        self
    }

    /// Report these names as ignored on every read
    pub fn with_ignore_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn with_property_options(mut self, options: PropertyOptions) -> Self {
        self.property_options = options;
        self
    }

    /// Attach a top-level property to every created entity, as a server would
    pub fn with_response_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.response_properties.insert(key.into(), value);
        self
    }

    /// Drop a top-level property before persisting, as a write-only field would be
    pub fn with_transient_property(mut self, key: impl Into<String>) -> Self {
        self.transient_properties.insert(key.into());
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn scope(&self, path: &[String]) -> String {
        scope_key(path, &self.separator)
    }

    fn persistable(&self, body: &Value) -> Value {
        match body {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(k, _)| !self.transient_properties.contains(*k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

#[async_trait]
impl EntityAdapter for MemoryAdapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            reads: self.reads.clone(),
            ..Capabilities::default()
        }
    }

    async fn get(&self, request: &ReadRequest<'_>) -> Result<ReadResponse, AdapterError> {
        let items = self.store.items(&self.scope(request.path));
        Ok(ReadResponse::Collection(
            Collection::new(items)
                .with_ignore_keys(self.ignore_keys.iter().cloned())
                .with_property_options(self.property_options.clone()),
        ))
    }

    async fn read(
        &self,
        operation: &str,
        request: &ReadRequest<'_>,
    ) -> Result<ReadResponse, AdapterError> {
        if !self.reads.contains(operation) {
            return Err(format!("read operation '{}' is not offered", operation).into());
        }
        self.get(request).await
    }

    async fn create(&self, request: &WriteRequest<'_>) -> Result<Value, AdapterError> {
        let scope = self.scope(request.layer_path);
        if self.store.get(&scope, request.name).is_some() {
            return Err(format!("Entity '{}' already exists in '{}'", request.name, scope).into());
        }
        let mut stored = self.persistable(request.body);
        if let Value::Object(map) = &mut stored {
            for (key, value) in &self.response_properties {
                map.insert(key.clone(), value.clone());
            }
        }
        self.store.insert(&scope, request.name, stored.clone());
        Ok(stored)
    }

    async fn update(&self, request: &WriteRequest<'_>) -> Result<Option<Value>, AdapterError> {
        let scope = self.scope(request.layer_path);
        let Some(current) = self.store.get(&scope, request.name) else {
            return Err(format!(
                "Cannot update entity with name '{}' as it does not exist.",
                request.name
            )
            .into());
        };
        let mut stored = self.persistable(request.body);
        if let (Value::Object(map), Value::Object(current)) = (&mut stored, &current) {
            for key in self.response_properties.keys() {
                if let Some(value) = current.get(key) {
                    map.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        self.store.insert(&scope, request.name, stored.clone());
        Ok(Some(stored))
    }

    async fn delete(&self, request: &WriteRequest<'_>) -> Result<Option<Value>, AdapterError> {
        Ok(self.store.remove(&self.scope(request.layer_path), request.name))
    }
}

/// Read-only adapter reporting one fixed, externally managed object
#[derive(Debug, Clone)]
pub struct SingletonAdapter {
    value: Value,
}

impl SingletonAdapter {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

#[async_trait]
impl EntityAdapter for SingletonAdapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities::read_only()
    }

    async fn get(&self, _request: &ReadRequest<'_>) -> Result<ReadResponse, AdapterError> {
        Ok(ReadResponse::Singleton(self.value.clone()))
    }

    async fn create(&self, _request: &WriteRequest<'_>) -> Result<Value, AdapterError> {
        Err("singleton entities cannot be created".into())
    }

    async fn update(&self, _request: &WriteRequest<'_>) -> Result<Option<Value>, AdapterError> {
        Err("singleton entities cannot be updated".into())
    }

    async fn delete(&self, _request: &WriteRequest<'_>) -> Result<Option<Value>, AdapterError> {
        Err("singleton entities cannot be deleted".into())
    }
}
