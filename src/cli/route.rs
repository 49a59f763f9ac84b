//! CLI route: single route table and run context. Dispatches to the engine and presentation.

use crate::adapter::memory::{MemoryAdapter, MemoryStore};
use crate::adapter::AdapterRegistry;
use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{
    format_layers_text, format_transaction_json, format_transaction_text,
};
use crate::config::{ConfigLoader, EngineConfig};
use crate::declaration::Declaration;
use crate::engine::Engine;
use crate::error::ReconcileError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runtime context for CLI execution: workspace and loaded configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: EngineConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ReconcileError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> Result<String, ReconcileError> {
        match command {
            Commands::Apply {
                declaration,
                state,
                format,
            } => self.handle_apply(declaration, state, *format),
            Commands::Validate { declaration } => self.handle_validate(declaration),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    fn handle_validate(&self, declaration: &Path) -> Result<String, ReconcileError> {
        let declaration =
            Declaration::from_path(&self.resolve(declaration), &self.config.engine.layer_sigil)?;
        Ok(format_layers_text(
            &declaration,
            &self.config.engine.path_separator,
        ))
    }

    fn handle_apply(
        &self,
        declaration: &Path,
        state: &Path,
        format: OutputFormat,
    ) -> Result<String, ReconcileError> {
        let state_path = self.resolve(state);
        let store = load_state(&state_path)?;

        let declaration =
            Declaration::from_path(&self.resolve(declaration), &self.config.engine.layer_sigil)?;
        let separator = &self.config.engine.path_separator;
        let engine = Engine::with_settings(
            memory_registry(&declaration, &store, separator),
            self.config.engine.clone(),
        );

        let runtime = tokio::runtime::Runtime::new()?;
        let outcome = runtime.block_on(engine.apply(&declaration));

        // Partial writes of a failed run are real state too
        save_state(&state_path, &store)?;

        match outcome {
            Ok(transaction) => {
                info!(state = %state_path.display(), "State written");
                match format {
                    OutputFormat::Text => Ok(format_transaction_text(&transaction, separator)),
                    OutputFormat::Json => format_transaction_json(&transaction),
                }
            }
            Err(failure) => {
                warn!(
                    applied = failure.transaction.changes().len(),
                    "Run failed after partial application"
                );
                Err(failure.into_error())
            }
        }
    }
}

/// One memory adapter per referenced adapter name, all backed by `store`
fn memory_registry(
    declaration: &Declaration,
    store: &MemoryStore,
    separator: &str,
) -> AdapterRegistry {
    let mut adapters: BTreeMap<String, MemoryAdapter> = BTreeMap::new();
    for entity_type in declaration.entity_types() {
        let adapter = adapters
            .remove(entity_type.adapter())
            .unwrap_or_else(|| MemoryAdapter::new(store.clone()).with_separator(separator));
        adapters.insert(
            entity_type.adapter().to_string(),
            adapter.with_read(entity_type.operation()),
        );
    }

    let mut registry = AdapterRegistry::new();
    for (name, adapter) in adapters {
        debug!(adapter = %name, "Registering memory adapter");
        registry.register(name, Arc::new(adapter));
    }
    registry
}

fn load_state(path: &Path) -> Result<MemoryStore, ReconcileError> {
    if !path.exists() {
        debug!(state = %path.display(), "No state file, starting empty");
        return Ok(MemoryStore::new());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(MemoryStore::new());
    }
    let document: Value = serde_json::from_str(&content)?;
    MemoryStore::from_document(&document)
}

fn save_state(path: &Path, store: &MemoryStore) -> Result<(), ReconcileError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let rendered = serde_json::to_string_pretty(&store.to_document())?;
    std::fs::write(path, rendered)?;
    Ok(())
}
