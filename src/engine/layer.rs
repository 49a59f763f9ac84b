//! Layer Processor
//!
//! One invocation handles one layer: fetch its live state, classify the
//! declared and live entities, apply the resulting changes, re-run once as a
//! verification pass, then descend into the layers nested inside each
//! entity. A verification pass that still finds changes is fatal.
//!
//! Breadcrumbs restart at each collection entity: a layer nested in entity
//! `server-1` has the path `["server-1", "@containers"]`, whatever sits
//! above that entity. Ancestors are reachable through the parent context.

use crate::adapter::{AdapterRegistry, Collection, ParentContext, ReadRequest, ReadResponse};
use crate::declaration::{nested_layers, nested_layers_in, strip_layer_keys, Declaration, Layer};
use crate::diff::{NameClassification, StructuralDiff};
use crate::engine::applier::ChangeApplier;
use crate::engine::{settle_all, EngineSettings, RunState};
use crate::error::ReconcileError;
use crate::filter::filter_properties;
use crate::transaction::ChangeRecord;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn, Instrument};

#[derive(Clone, Copy)]
pub(crate) struct LayerProcessor<'a> {
    registry: &'a AdapterRegistry,
    settings: &'a EngineSettings,
    state: &'a RunState,
    sigil: &'a str,
}

impl<'a> LayerProcessor<'a> {
    pub(crate) fn new(
        registry: &'a AdapterRegistry,
        settings: &'a EngineSettings,
        state: &'a RunState,
        sigil: &'a str,
    ) -> Self {
        Self {
            registry,
            settings,
            state,
            sigil,
        }
    }

    /// Process every top-level layer concurrently; plain root properties are ignored
    pub(crate) async fn process_root(self, declaration: &'a Declaration) -> Result<(), ReconcileError> {
        settle_all(declaration.layers().map(|layer| {
            self.process_layer(layer, vec![layer.key().to_string()], ParentContext::new(), false)
        }))
        .await
    }

    pub(crate) fn process_layer(
        self,
        layer: &'a Layer,
        path: Vec<String>,
        parent: ParentContext,
        verification: bool,
    ) -> BoxFuture<'a, Result<(), ReconcileError>> {
        let key = path.join(&self.settings.path_separator);
        let span = tracing::debug_span!("layer", path = %key, verification);
        async move {
            let entity_type = layer.entity_type();
            let adapter = self.registry.resolve_read(entity_type)?;

            debug!(entity_type = %entity_type, "Fetching layer");
            let request = ReadRequest {
                parent: &parent,
                path: &path,
            };
            let response = adapter
                .read(entity_type.operation(), &request)
                .await
                .map_err(|source| ReconcileError::Adapter {
                    entity_type: entity_type.to_string(),
                    operation: entity_type.operation().to_string(),
                    path: key.clone(),
                    source,
                })?;

            match response {
                ReadResponse::Singleton(value) => {
                    self.descend_singleton(layer, &path, &key, &parent, value).await
                }
                ReadResponse::Collection(collection) => {
                    self.reconcile_collection(layer, path, key, parent, collection, verification)
                        .await
                }
            }
        }
        .instrument(span)
        .boxed()
    }

    /// A singleton is externally managed: record it and descend, no diffing
    async fn descend_singleton(
        self,
        layer: &'a Layer,
        path: &[String],
        key: &str,
        parent: &ParentContext,
        value: Value,
    ) -> Result<(), ReconcileError> {
        self.state.record_before(key, value.clone());
        self.state.record_after(key, value.clone());

        let context = parent.with(layer.entity_type(), value);
        settle_all(nested_layers_in(layer.declarations()).into_iter().map(|nested| {
            let mut child_path = path.to_vec();
            child_path.extend(nested.path);
            self.process_layer(nested.layer, child_path, context.clone(), false)
        }))
        .await
    }

    async fn reconcile_collection(
        self,
        layer: &'a Layer,
        path: Vec<String>,
        key: String,
        parent: ParentContext,
        collection: Collection,
        verification: bool,
    ) -> Result<(), ReconcileError> {
        if !verification {
            self.state.record_before(&key, items_document(&collection.items));
        }

        let changes = self.plan_changes(layer, &path, &collection);
        if verification && !changes.is_empty() {
            let separator = self.settings.path_separator.as_str();
            let pending: Vec<String> = changes.iter().map(|c| c.describe(separator)).collect();
            warn!(layer = %key, pending = ?pending, "Layer did not converge");
            return Err(ReconcileError::Convergence {
                entity_type: layer.entity_type().to_string(),
                path: key,
                pending,
            });
        }

        let mut after = collection.items.clone();
        if !changes.is_empty() {
            info!(layer = %key, changes = changes.len(), "Applying layer changes");
            let applier = ChangeApplier {
                registry: self.registry,
                entity_type: layer.entity_type(),
                layer_path: &path,
                parent: &parent,
                state: self.state,
                separator: &self.settings.path_separator,
            };
            let applied = applier.apply(changes, &mut after).await;
            self.state.record_after(&key, items_document(&after));
            applied?;

            // Confirm the fixed point and refresh the snapshot before descending.
            return self.process_layer(layer, path, parent, true).await;
        }

        self.state.record_after(&key, items_document(&after));
        self.descend_collection(layer, &parent, &after).await
    }

    /// Create, delete and update changes for one collection read
    fn plan_changes(&self, layer: &Layer, path: &[String], collection: &Collection) -> Vec<ChangeRecord> {
        let classification = NameClassification::classify(
            layer.entity_names(),
            collection.items.keys().map(String::as_str),
            &collection.ignore_keys,
        );
        let entity_type = layer.entity_type();
        let mut changes = Vec::new();

        for name in &classification.to_create {
            if let Some(entity) = layer.entity(name) {
                changes.push(ChangeRecord::create(
                    entity_type.clone(),
                    path,
                    name,
                    entity.to_stripped_value(),
                ));
            }
        }

        for name in &classification.to_delete {
            if let Some(live) = collection.items.get(name) {
                changes.push(ChangeRecord::delete(
                    entity_type.clone(),
                    path,
                    name,
                    strip_layer_keys(live, self.sigil),
                ));
            }
        }

        for name in &classification.to_keep {
            let (Some(entity), Some(live)) = (layer.entity(name), collection.items.get(name)) else {
                continue;
            };
            let existing = strip_layer_keys(live, self.sigil);
            let filtered = filter_properties(
                entity.to_stripped_value(),
                existing.clone(),
                &collection.property_options,
            );
            let diff = StructuralDiff::between(&filtered.expected, &filtered.existing);
            if !diff.is_empty() {
                changes.push(ChangeRecord::update(
                    entity_type.clone(),
                    path,
                    name,
                    filtered.expected,
                    existing,
                    diff,
                ));
            }
        }

        changes
    }

    /// Recurse into the nested layers of every entity present after convergence
    ///
    /// A converged layer holds every declared name that is not ignored, so
    /// only ignored names can be missing here; their nested layers are skipped.
    async fn descend_collection(
        self,
        layer: &'a Layer,
        parent: &ParentContext,
        after: &BTreeMap<String, Value>,
    ) -> Result<(), ReconcileError> {
        let mut branches = Vec::new();
        for name in layer.entity_names() {
            let Some(entity) = layer.entity(name) else {
                continue;
            };
            let nested = nested_layers(entity);
            if nested.is_empty() {
                continue;
            }
            let Some(value) = after.get(name) else {
                debug!(entity = name, "Skipping nested layers of ignored entity");
                continue;
            };

            let context = parent.with(layer.entity_type(), value.clone());
            for found in nested {
                let mut child_path = vec![name.to_string()];
                child_path.extend(found.path);
                branches.push(self.process_layer(found.layer, child_path, context.clone(), false));
            }
        }
        settle_all(branches).await
    }
}

fn items_document(items: &BTreeMap<String, Value>) -> Value {
    Value::Object(
        items
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Map<String, Value>>(),
    )
}
