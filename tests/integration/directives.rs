//! Property directives keep server-managed and write-only fields out of the diff

use super::test_utils::{declaration, path};
use eapply::adapter::memory::{MemoryAdapter, MemoryStore};
use eapply::filter::{PropertyDirective, PropertyOptions};
use eapply::{apply, AdapterRegistry, ChangeAction, ReconcileError};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_immutable_response_property_does_not_cause_updates() {
    let store = MemoryStore::new();
    let options = PropertyOptions::new()
        .with("id", PropertyDirective::ImmutableResponse)
        .unwrap();
    let adapter = MemoryAdapter::new(store.clone())
        .with_response_property("id", json!("srv-0001"))
        .with_property_options(options);
    let registry = AdapterRegistry::new().with("servers", Arc::new(adapter));
    let decl = declaration(json!({ "@servers": { "web": { "size": "small" } } }));

    let first = apply(&decl, &registry).await.unwrap();
    assert_eq!(first.changes().len(), 1);
    assert_eq!(
        first.config_after()["@servers"]["web"],
        json!({ "size": "small", "id": "srv-0001" })
    );

    let second = apply(&decl, &registry).await.unwrap();
    assert!(second.changes().is_empty());
}

#[tokio::test]
async fn test_response_property_without_directive_fails_verification() {
    let store = MemoryStore::new();
    let adapter =
        MemoryAdapter::new(store.clone()).with_response_property("id", json!("srv-0001"));
    let registry = AdapterRegistry::new().with("servers", Arc::new(adapter));
    let decl = declaration(json!({ "@servers": { "web": { "size": "small" } } }));

    let failure = apply(&decl, &registry).await.unwrap_err();
    assert!(matches!(failure.error, ReconcileError::Convergence { .. }));
    assert_eq!(failure.transaction.changes().len(), 1);
}

#[tokio::test]
async fn test_create_only_property_is_sent_once() {
    let store = MemoryStore::new();
    let options = PropertyOptions::new()
        .with("password", PropertyDirective::CreateOnly)
        .unwrap();
    let adapter = MemoryAdapter::new(store.clone())
        .with_transient_property("password")
        .with_property_options(options);
    let registry = AdapterRegistry::new().with("users", Arc::new(adapter));
    let decl = declaration(json!({
        "@users": { "alice": { "role": "admin", "password": "hunter2" } }
    }));

    let first = apply(&decl, &registry).await.unwrap();
    assert_eq!(first.changes().len(), 1);
    assert_eq!(first.changes()[0].action, ChangeAction::Create);
    assert_eq!(first.changes()[0].request["password"], json!("hunter2"));
    assert_eq!(
        store.get("@users", "alice"),
        Some(json!({ "role": "admin" }))
    );

    for _ in 0..2 {
        let again = apply(&decl, &registry).await.unwrap();
        assert!(again.changes().is_empty());
    }
}

#[tokio::test]
async fn test_wildcard_directive_covers_every_array_element() {
    let store = MemoryStore::from_document(&json!({
        "@routers": {
            "r1": {
                "ports": [
                    { "number": 80, "mac": "aa:01" },
                    { "number": 443, "mac": "aa:02" }
                ]
            }
        }
    }))
    .unwrap();
    let options = PropertyOptions::from_value(&json!({
        "ports.*.mac": "IMMUTABLE_RESPONSE"
    }))
    .unwrap();
    let adapter = MemoryAdapter::new(store.clone()).with_property_options(options);
    let registry = AdapterRegistry::new().with("routers", Arc::new(adapter));
    let decl = declaration(json!({
        "@routers": { "r1": { "ports": [{ "number": 80 }, { "number": 443 }] } }
    }));

    let tx = apply(&decl, &registry).await.unwrap();
    assert!(tx.changes().is_empty());
}

#[tokio::test]
async fn test_changed_port_still_updates_under_wildcard_directive() {
    let store = MemoryStore::from_document(&json!({
        "@routers": {
            "r1": { "ports": [{ "number": 80, "mac": "aa:01" }] }
        }
    }))
    .unwrap();
    let options = PropertyOptions::from_value(&json!({
        "ports": [{ "mac": "IMMUTABLE_RESPONSE" }]
    }))
    .unwrap();
    let adapter = MemoryAdapter::new(store.clone()).with_property_options(options);
    let registry = AdapterRegistry::new().with("routers", Arc::new(adapter));
    let decl = declaration(json!({
        "@routers": { "r1": { "ports": [{ "number": 8080 }] } }
    }));

    let tx = apply(&decl, &registry).await.unwrap();
    assert_eq!(tx.changes().len(), 1);
    let update = &tx.changes()[0];
    assert_eq!(update.action, ChangeAction::Update);
    assert_eq!(update.tree_path, path(&["@routers", "r1"]));
    let diff = update.diff.as_ref().unwrap();
    assert!(diff.updated.contains_key("ports.0.number"));
    assert_eq!(
        store.get("@routers", "r1"),
        Some(json!({ "ports": [{ "number": 8080 }] }))
    );
}
