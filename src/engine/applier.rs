//! Change Applier: runs one layer's batch of writes concurrently and folds the
//! results into the layer's after snapshot and the run's audit log.

use crate::adapter::{AdapterRegistry, EntityAdapter, ParentContext, WriteRequest};
use crate::declaration::EntityType;
use crate::engine::RunState;
use crate::error::ReconcileError;
use crate::transaction::{ChangeAction, ChangeRecord};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) struct ChangeApplier<'a> {
    pub registry: &'a AdapterRegistry,
    pub entity_type: &'a EntityType,
    pub layer_path: &'a [String],
    pub parent: &'a ParentContext,
    pub state: &'a RunState,
    /// Joins tree paths in logs and errors, as in snapshot keys
    pub separator: &'a str,
}

impl<'a> ChangeApplier<'a> {
    /// Apply every change, waiting for all of them even after a failure
    ///
    /// Handlers are resolved before anything runs, so a missing handler
    /// aborts the batch without touching the resource store. After that the
    /// first failure in completion order is returned once the whole batch has
    /// settled; changes that succeeded are logged regardless.
    pub async fn apply(
        &self,
        changes: Vec<ChangeRecord>,
        after: &mut BTreeMap<String, Value>,
    ) -> Result<usize, ReconcileError> {
        let resolved = changes
            .into_iter()
            .map(|change| {
                let adapter = self.registry.resolve_write(self.entity_type, change.action)?;
                Ok((adapter, change))
            })
            .collect::<Result<Vec<_>, ReconcileError>>()?;

        let mut pending: FuturesUnordered<_> = resolved
            .into_iter()
            .map(|(adapter, change)| self.run(adapter, change))
            .collect();

        let mut applied = 0usize;
        let mut first_error = None;
        while let Some(outcome) = pending.next().await {
            match outcome {
                Ok(change) => {
                    match change.action {
                        ChangeAction::Create => {
                            after.insert(
                                change.name.clone(),
                                change.response.clone().unwrap_or(Value::Null),
                            );
                        }
                        ChangeAction::Update => {
                            if let Some(response) = &change.response {
                                after.insert(change.name.clone(), response.clone());
                            }
                        }
                        ChangeAction::Delete => {
                            after.remove(&change.name);
                        }
                    }
                    applied += 1;
                    self.state.log_change(change);
                }
                Err(err) => {
                    warn!(error = %err, "Change failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(applied),
        }
    }

    async fn run(
        &self,
        adapter: Arc<dyn EntityAdapter>,
        mut change: ChangeRecord,
    ) -> Result<ChangeRecord, ReconcileError> {
        debug!(
            action = %change.action,
            tree_path = %change.tree_path.join(self.separator),
            "Applying change"
        );
        let request = WriteRequest {
            name: &change.name,
            body: &change.request,
            parent: self.parent,
            existing: change.existing_config.as_ref(),
            layer_path: self.layer_path,
        };
        let result = match change.action {
            ChangeAction::Create => adapter.create(&request).await.map(Some),
            ChangeAction::Update => adapter.update(&request).await,
            ChangeAction::Delete => adapter.delete(&request).await,
        };
        let response = result.map_err(|source| ReconcileError::Adapter {
            entity_type: self.entity_type.to_string(),
            operation: change.action.to_string(),
            path: change.tree_path.join(self.separator),
            source,
        })?;
        change.response = response;
        Ok(change)
    }
}
