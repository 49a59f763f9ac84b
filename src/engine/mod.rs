//! Reconciliation engine
//!
//! Drives live state toward a declaration tree: every layer is fetched,
//! diffed, applied, verified and then descended into, with sibling layers
//! and sibling entities processed concurrently. Nothing is persisted between
//! runs and nothing is rolled back when a run fails.

mod applier;
mod layer;

use crate::adapter::AdapterRegistry;
use crate::declaration::{Declaration, DEFAULT_SIGIL};
use crate::error::{ApplyFailure, ReconcileError};
use crate::transaction::{ChangeRecord, Snapshot, Transaction};
use futures::stream::{FuturesUnordered, StreamExt};
use layer::LayerProcessor;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Key prefix marking a layer in declarations
    #[serde(default = "default_layer_sigil")]
    pub layer_sigil: String,

    /// Separator joining breadcrumbs in snapshot keys, logs and error paths
    #[serde(default = "default_path_separator")]
    pub path_separator: String,
}

fn default_layer_sigil() -> String {
    DEFAULT_SIGIL.to_string()
}

fn default_path_separator() -> String {
    "/".to_string()
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            layer_sigil: default_layer_sigil(),
            path_separator: default_path_separator(),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.layer_sigil.is_empty() {
            return Err("Layer sigil cannot be empty".to_string());
        }
        if self.path_separator.is_empty() {
            return Err("Path separator cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Reconciles declaration trees against a set of adapters
pub struct Engine {
    registry: Arc<AdapterRegistry>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(registry: AdapterRegistry) -> Self {
        Self::with_settings(registry, EngineSettings::default())
    }

    pub fn with_settings(registry: AdapterRegistry, settings: EngineSettings) -> Self {
        Self {
            registry: Arc::new(registry),
            settings,
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Parse a declaration using the configured sigil
    pub fn parse_declaration(&self, value: Value) -> Result<Declaration, ReconcileError> {
        Declaration::from_value(value, &self.settings.layer_sigil)
    }

    /// Load a declaration file using the configured sigil
    pub fn load_declaration(&self, path: &Path) -> Result<Declaration, ReconcileError> {
        Declaration::from_path(path, &self.settings.layer_sigil)
    }

    /// Apply a declaration tree, resolving once every layer has converged
    ///
    /// On failure the returned [`ApplyFailure`] carries the transaction in
    /// `error` status with the audit log and snapshots gathered so far.
    pub async fn apply(&self, declaration: &Declaration) -> Result<Transaction, ApplyFailure> {
        let mut transaction = Transaction::new();
        if let Err(err) = transaction.begin() {
            return Err(ApplyFailure::new(err, transaction));
        }
        info!(layers = declaration.layers().count(), "Applying declaration");

        let state = RunState::default();
        let outcome = LayerProcessor::new(&self.registry, &self.settings, &state, declaration.sigil())
            .process_root(declaration)
            .await;
        let (changes, before, after) = state.into_parts();

        match outcome {
            Ok(()) => {
                if let Err(err) = transaction.complete(changes, before, after) {
                    return Err(ApplyFailure::new(err, transaction));
                }
                let summary = transaction.summary();
                info!(
                    created = summary.created,
                    updated = summary.updated,
                    deleted = summary.deleted,
                    "Declaration converged"
                );
                Ok(transaction)
            }
            Err(err) => {
                error!(error = %err, "Transaction failed");
                if let Err(state_err) = transaction.fail(changes, before, after) {
                    error!(error = %state_err, "Could not record failed transaction");
                }
                Err(ApplyFailure::new(err, transaction))
            }
        }
    }
}

/// Apply `declaration` with `registry` and default settings
pub async fn apply(
    declaration: &Declaration,
    registry: &AdapterRegistry,
) -> Result<Transaction, ApplyFailure> {
    Engine::new(registry.clone()).apply(declaration).await
}

/// Log and snapshots shared by every layer of one run
#[derive(Default)]
pub(crate) struct RunState {
    changes: Mutex<Vec<ChangeRecord>>,
    before: Mutex<Snapshot>,
    after: Mutex<Snapshot>,
}

impl RunState {
    pub(crate) fn log_change(&self, change: ChangeRecord) {
        self.changes.lock().push(change);
    }

    /// Keep the first fetch of a layer only
    pub(crate) fn record_before(&self, key: &str, value: Value) {
        self.before.lock().entry(key.to_string()).or_insert(value);
    }

    pub(crate) fn record_after(&self, key: &str, value: Value) {
        self.after.lock().insert(key.to_string(), value);
    }

    fn into_parts(self) -> (Vec<ChangeRecord>, Snapshot, Snapshot) {
        (
            self.changes.into_inner(),
            self.before.into_inner(),
            self.after.into_inner(),
        )
    }
}

/// Run every branch to completion, then report the first failure observed
pub(crate) async fn settle_all<I, F>(branches: I) -> Result<(), ReconcileError>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<(), ReconcileError>>,
{
    let mut pending: FuturesUnordered<F> = branches.into_iter().collect();
    let mut first_error = None;
    while let Some(outcome) = pending.next().await {
        if let Err(err) = outcome {
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}
