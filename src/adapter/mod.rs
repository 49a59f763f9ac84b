//! Entity Adapters
//!
//! An adapter reads and mutates one resource domain. The engine only talks to
//! adapters through [`EntityAdapter`]; which operations an adapter offers is
//! advertised through [`Capabilities`] and checked by the registry before any
//! call is made.

use crate::declaration::{EntityType, DEFAULT_OPERATION};
use crate::error::{AdapterError, ReconcileError};
use crate::filter::PropertyOptions;
use crate::transaction::ChangeAction;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub mod memory;
mod registry;

pub use registry::AdapterRegistry;

/// Most recent "after" value of every ancestor layer, keyed by entity type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParentContext(BTreeMap<String, Value>);

impl ParentContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ancestor value for an entity type, e.g. `ctx.get("servers")`
    pub fn get(&self, entity_type: &str) -> Option<&Value> {
        self.0.get(entity_type)
    }

    /// Copy of this context with `value` recorded for `entity_type`
    ///
    /// A deeper layer of the same type replaces the shallower value.
    pub fn with(&self, entity_type: &EntityType, value: Value) -> Self {
        let mut next = self.0.clone();
        next.insert(entity_type.to_string(), value);
        Self(next)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Arguments of a read
#[derive(Debug, Clone, Copy)]
pub struct ReadRequest<'a> {
    pub parent: &'a ParentContext,
    /// Breadcrumb of the layer being read, ending with its marker key
    pub path: &'a [String],
}

/// Arguments of a create, update or delete
#[derive(Debug, Clone, Copy)]
pub struct WriteRequest<'a> {
    pub name: &'a str,
    /// Context-stripped body: the desired entity, or the live entity for deletes
    pub body: &'a Value,
    pub parent: &'a ParentContext,
    /// Stripped live entity, for updates
    pub existing: Option<&'a Value>,
    /// Breadcrumb of the layer the entity lives in
    pub layer_path: &'a [String],
}

/// Live state of a managed collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    pub items: BTreeMap<String, Value>,
    /// Names excluded from create/delete consideration
    pub ignore_keys: BTreeSet<String>,
    pub property_options: PropertyOptions,
}

impl Collection {
    pub fn new(items: BTreeMap<String, Value>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn with_ignore_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_property_options(mut self, options: PropertyOptions) -> Self {
        self.property_options = options;
        self
    }
}

/// Result of a read: a managed collection, or a bare externally managed object
#[derive(Debug, Clone, PartialEq)]
pub enum ReadResponse {
    Collection(Collection),
    Singleton(Value),
}

impl ReadResponse {
    /// Classify a raw JSON response
    ///
    /// An object carrying an `items` object is a collection (with optional
    /// `ignoreKeys` array and `propertyOptions` document); anything else is a
    /// singleton.
    pub fn from_value(value: Value) -> Result<Self, ReconcileError> {
        let Value::Object(mut map) = value else {
            return Ok(ReadResponse::Singleton(value));
        };
        let items = match map.remove("items") {
            Some(Value::Object(items)) => items,
            Some(other) => {
                map.insert("items".to_string(), other);
                return Ok(ReadResponse::Singleton(Value::Object(map)));
            }
            None => return Ok(ReadResponse::Singleton(Value::Object(map))),
        };

        let ignore_keys = match map.get("ignoreKeys") {
            Some(Value::Array(keys)) => keys
                .iter()
                .map(|k| {
                    k.as_str().map(str::to_string).ok_or_else(|| {
                        ReconcileError::Configuration(format!("ignoreKeys entry {} is not a string", k))
                    })
                })
                .collect::<Result<BTreeSet<_>, _>>()?,
            Some(other) => {
                return Err(ReconcileError::Configuration(format!(
                    "ignoreKeys must be an array, found {}",
                    other
                )))
            }
            None => BTreeSet::new(),
        };
        let property_options = match map.get("propertyOptions") {
            Some(doc) => PropertyOptions::from_value(doc)?,
            None => PropertyOptions::new(),
        };

        Ok(ReadResponse::Collection(Collection {
            items: items.into_iter().collect(),
            ignore_keys,
            property_options,
        }))
    }
}

/// Operations an adapter offers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub reads: BTreeSet<String>,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            reads: BTreeSet::from([DEFAULT_OPERATION.to_string()]),
            create: true,
            update: true,
            delete: true,
        }
    }
}

impl Capabilities {
    /// `get` only; every write is refused
    pub fn read_only() -> Self {
        Self {
            create: false,
            update: false,
            delete: false,
            ..Self::default()
        }
    }

    /// Also offer a custom read operation
    pub fn with_read(mut self, operation: impl Into<String>) -> Self {
        self.reads.insert(operation.into());
        self
    }

    pub fn supports_read(&self, operation: &str) -> bool {
        self.reads.contains(operation)
    }

    pub fn supports(&self, action: ChangeAction) -> bool {
        match action {
            ChangeAction::Create => self.create,
            ChangeAction::Update => self.update,
            ChangeAction::Delete => self.delete,
        }
    }
}

/// Handlers for one resource domain
#[async_trait]
pub trait EntityAdapter: Send + Sync {
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Fetch the live state of a layer
    async fn get(&self, request: &ReadRequest<'_>) -> Result<ReadResponse, AdapterError>;

    /// Dispatch a named read operation; only `get` unless overridden
    async fn read(
        &self,
        operation: &str,
        request: &ReadRequest<'_>,
    ) -> Result<ReadResponse, AdapterError> {
        if operation == DEFAULT_OPERATION {
            self.get(request).await
        } else {
            Err(format!("read operation '{}' is not implemented", operation).into())
        }
    }

    /// Create an entity, returning its live value
    async fn create(&self, request: &WriteRequest<'_>) -> Result<Value, AdapterError>;

    /// Update an entity, optionally returning its new live value
    async fn update(&self, request: &WriteRequest<'_>) -> Result<Option<Value>, AdapterError>;

    async fn delete(&self, request: &WriteRequest<'_>) -> Result<Option<Value>, AdapterError>;
}
