//! Adapter registry: typed lookup of adapters by name, failing closed.

use crate::adapter::EntityAdapter;
use crate::declaration::EntityType;
use crate::error::ReconcileError;
use crate::transaction::ChangeAction;
use std::collections::HashMap;
use std::sync::Arc;

/// Adapters available to a run, keyed by adapter name
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn EntityAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, returning the one it replaced
    pub fn register(
        &mut self,
        name: impl Into<String>,
        adapter: Arc<dyn EntityAdapter>,
    ) -> Option<Arc<dyn EntityAdapter>> {
        self.adapters.insert(name.into(), adapter)
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, name: impl Into<String>, adapter: Arc<dyn EntityAdapter>) -> Self {
        self.register(name, adapter);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn EntityAdapter>> {
        self.adapters.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    /// Registered adapter names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn get_or_error(&self, entity_type: &EntityType) -> Result<&Arc<dyn EntityAdapter>, ReconcileError> {
        self.get(entity_type.adapter()).ok_or_else(|| {
            ReconcileError::Configuration(format!(
                "No adapter registered for '{}'",
                entity_type.adapter()
            ))
        })
    }

    /// Adapter for reading a layer of `entity_type`
    pub fn resolve_read(
        &self,
        entity_type: &EntityType,
    ) -> Result<Arc<dyn EntityAdapter>, ReconcileError> {
        let adapter = self.get_or_error(entity_type)?;
        if !adapter.capabilities().supports_read(entity_type.operation()) {
            return Err(ReconcileError::Configuration(format!(
                "Handler for '{}:{}' not found",
                entity_type.adapter(),
                entity_type.operation()
            )));
        }
        Ok(Arc::clone(adapter))
    }

    /// Adapter for applying `action` to an entity of `entity_type`
    pub fn resolve_write(
        &self,
        entity_type: &EntityType,
        action: ChangeAction,
    ) -> Result<Arc<dyn EntityAdapter>, ReconcileError> {
        let adapter = self.get_or_error(entity_type)?;
        if !adapter.capabilities().supports(action) {
            return Err(ReconcileError::Configuration(format!(
                "Handler for '{}:{}' not found",
                entity_type.adapter(),
                action
            )));
        }
        Ok(Arc::clone(adapter))
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.names())
            .finish()
    }
}
