//! Transaction: lifecycle state, audit log, and before/after snapshots of one apply run.

use crate::declaration::EntityType;
use crate::diff::StructuralDiff;
use crate::error::ReconcileError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Live state per layer, keyed by the layer's joined breadcrumb
pub type Snapshot = BTreeMap<String, Value>;

/// Lifecycle of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Init,
    Applying,
    Done,
    Error,
}

impl TransactionStatus {
    fn can_transition_to(self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Init, TransactionStatus::Applying)
                | (TransactionStatus::Applying, TransactionStatus::Done)
                | (TransactionStatus::Applying, TransactionStatus::Error)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Init => "init",
            TransactionStatus::Applying => "applying",
            TransactionStatus::Done => "done",
            TransactionStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Mutation applied to one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeAction::Create => "create",
            ChangeAction::Update => "update",
            ChangeAction::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// One entry of the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub action: ChangeAction,
    pub name: String,
    /// Filtered desired body, or the stripped live body for deletes
    pub request: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<StructuralDiff>,
    pub entity_type: EntityType,
    /// Breadcrumb from the root to this entity
    pub tree_path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl ChangeRecord {
    pub fn create(entity_type: EntityType, layer_path: &[String], name: &str, request: Value) -> Self {
        Self::new(ChangeAction::Create, entity_type, layer_path, name, request)
    }

    pub fn delete(entity_type: EntityType, layer_path: &[String], name: &str, live: Value) -> Self {
        Self::new(ChangeAction::Delete, entity_type, layer_path, name, live)
    }

    pub fn update(
        entity_type: EntityType,
        layer_path: &[String],
        name: &str,
        request: Value,
        existing: Value,
        diff: StructuralDiff,
    ) -> Self {
        let mut record = Self::new(ChangeAction::Update, entity_type, layer_path, name, request);
        record.existing_config = Some(existing);
        record.diff = Some(diff);
        record
    }

    fn new(
        action: ChangeAction,
        entity_type: EntityType,
        layer_path: &[String],
        name: &str,
        request: Value,
    ) -> Self {
        let mut tree_path = layer_path.to_vec();
        tree_path.push(name.to_string());
        Self {
            action,
            name: name.to_string(),
            request,
            existing_config: None,
            diff: None,
            entity_type,
            tree_path,
            response: None,
        }
    }

    /// Short human-readable form, e.g. `update @servers/server-1 (size)`
    pub fn describe(&self, separator: &str) -> String {
        let path = self.tree_path.join(separator);
        match &self.diff {
            Some(diff) => format!("{} {} ({})", self.action, path, diff.paths().join(", ")),
            None => format!("{} {}", self.action, path),
        }
    }
}

/// Per-action change counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl ChangeSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// State of one apply run
///
/// The audit log is ordered by completion time. Changes within a layer and
/// across sibling layers run concurrently, so the relative order of
/// unrelated entries is not deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    status: TransactionStatus,
    changes: Vec<ChangeRecord>,
    config_before: Snapshot,
    config_after: Snapshot,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            status: TransactionStatus::Init,
            changes: Vec::new(),
            config_before: Snapshot::new(),
            config_after: Snapshot::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    pub fn config_before(&self) -> &Snapshot {
        &self.config_before
    }

    pub fn config_after(&self) -> &Snapshot {
        &self.config_after
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Changes recorded for one entity type
    pub fn changes_for(&self, entity_type: &EntityType) -> Vec<&ChangeRecord> {
        self.changes
            .iter()
            .filter(|c| &c.entity_type == entity_type)
            .collect()
    }

    pub fn summary(&self) -> ChangeSummary {
        self.changes
            .iter()
            .fold(ChangeSummary::default(), |mut acc, change| {
                match change.action {
                    ChangeAction::Create => acc.created += 1,
                    ChangeAction::Update => acc.updated += 1,
                    ChangeAction::Delete => acc.deleted += 1,
                }
                acc
            })
    }

    /// `init -> applying`
    pub fn begin(&mut self) -> Result<(), ReconcileError> {
        self.transition(TransactionStatus::Applying)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `applying -> done`, taking ownership of the run's log and snapshots
    pub fn complete(
        &mut self,
        changes: Vec<ChangeRecord>,
        before: Snapshot,
        after: Snapshot,
    ) -> Result<(), ReconcileError> {
        self.transition(TransactionStatus::Done)?;
        self.record(changes, before, after);
        Ok(())
    }

    /// `applying -> error`, keeping whatever the run logged before it failed
    pub fn fail(
        &mut self,
        changes: Vec<ChangeRecord>,
        before: Snapshot,
        after: Snapshot,
    ) -> Result<(), ReconcileError> {
        self.transition(TransactionStatus::Error)?;
        self.record(changes, before, after);
        Ok(())
    }

    fn record(&mut self, changes: Vec<ChangeRecord>, before: Snapshot, after: Snapshot) {
        self.changes = changes;
        self.config_before = before;
        self.config_after = after;
        self.finished_at = Some(Utc::now());
    }

    fn transition(&mut self, next: TransactionStatus) -> Result<(), ReconcileError> {
        if !self.status.can_transition_to(next) {
            return Err(ReconcileError::State(format!(
                "cannot move transaction from '{}' to '{}'",
                self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}
