//! Verification pass and configuration failures

use super::test_utils::{declaration, memory_registry, ReadOnlyCollectionAdapter, StubbornAdapter};
use eapply::adapter::memory::{MemoryAdapter, MemoryStore};
use eapply::{apply, AdapterRegistry, ChangeAction, ReconcileError, TransactionStatus};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

#[tokio::test]
async fn test_adapter_reporting_residual_difference_fails_convergence() {
    let live = BTreeMap::from([("web".to_string(), json!({ "size": "small" }))]);
    let registry = AdapterRegistry::new().with("servers", Arc::new(StubbornAdapter::new(live)));
    let decl = declaration(json!({ "@servers": { "web": { "size": "large" } } }));

    let failure = apply(&decl, &registry).await.unwrap_err();

    match &failure.error {
        ReconcileError::Convergence {
            entity_type,
            path,
            pending,
        } => {
            assert_eq!(entity_type, "servers");
            assert_eq!(path, "@servers");
            assert_eq!(pending.len(), 1);
            assert!(pending[0].contains("size"));
        }
        other => panic!("expected convergence error, got {other}"),
    }
    assert_eq!(failure.transaction.status(), TransactionStatus::Error);
    assert_eq!(failure.transaction.changes().len(), 1);
    assert_eq!(failure.transaction.changes()[0].action, ChangeAction::Update);
    assert!(failure.transaction.finished_at().is_some());
}

#[tokio::test]
async fn test_unknown_adapter_is_configuration_error() {
    let store = MemoryStore::new();
    let registry = memory_registry(&["servers"], &store);
    let decl = declaration(json!({ "@dns": { "example.com": {} } }));

    let failure = apply(&decl, &registry).await.unwrap_err();
    assert!(matches!(failure.error, ReconcileError::Configuration(_)));
    assert_eq!(failure.transaction.status(), TransactionStatus::Error);
    assert!(failure.transaction.changes().is_empty());
}

#[tokio::test]
async fn test_unknown_read_operation_is_configuration_error() {
    let store = MemoryStore::new();
    let registry = memory_registry(&["servers"], &store);
    let decl = declaration(json!({ "@servers:running": { "web": {} } }));

    let failure = apply(&decl, &registry).await.unwrap_err();
    assert!(failure.error.to_string().contains("servers:running"));
}

#[tokio::test]
async fn test_custom_read_operation_is_dispatched() {
    let store = MemoryStore::new();
    let adapter = MemoryAdapter::new(store.clone()).with_read("running");
    let registry = AdapterRegistry::new().with("servers", Arc::new(adapter));
    let decl = declaration(json!({ "@servers:running": { "web": {} } }));

    let tx = apply(&decl, &registry).await.unwrap();
    assert_eq!(tx.changes().len(), 1);
    assert_eq!(tx.changes()[0].entity_type.to_string(), "servers:running");
}

#[tokio::test]
async fn test_missing_write_handler_touches_nothing() {
    let store = MemoryStore::from_document(&json!({
        "@servers": { "old": { "size": "small" } }
    }))
    .unwrap();
    let adapter = ReadOnlyCollectionAdapter::new(MemoryAdapter::new(store.clone()));
    let registry = AdapterRegistry::new().with("servers", Arc::new(adapter));
    let decl = declaration(json!({ "@servers": { "new": {} } }));

    let failure = apply(&decl, &registry).await.unwrap_err();
    assert!(matches!(failure.error, ReconcileError::Configuration(_)));
    assert!(failure.transaction.changes().is_empty());
    assert_eq!(store.get("@servers", "old"), Some(json!({ "size": "small" })));
    assert_eq!(store.get("@servers", "new"), None);
}
