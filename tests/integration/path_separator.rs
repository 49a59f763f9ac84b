//! A configured path separator reaches snapshot keys, audit output and errors

use super::test_utils::{declaration, FailingCreateAdapter, StubbornAdapter};
use eapply::adapter::memory::{MemoryAdapter, MemoryStore};
use eapply::{AdapterRegistry, Engine, EngineSettings, ReconcileError};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn settings() -> EngineSettings {
    EngineSettings {
        path_separator: "::".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_nested_snapshot_keys_use_separator() {
    let store = MemoryStore::new();
    let registry = AdapterRegistry::new()
        .with(
            "servers",
            Arc::new(MemoryAdapter::new(store.clone()).with_separator("::")),
        )
        .with(
            "containers",
            Arc::new(MemoryAdapter::new(store.clone()).with_separator("::")),
        );
    let decl = declaration(json!({
        "@servers": { "server-1": { "@containers": { "container-1": {} } } }
    }));

    let tx = Engine::with_settings(registry, settings())
        .apply(&decl)
        .await
        .unwrap();

    assert_eq!(
        tx.config_after()["server-1::@containers"],
        json!({ "container-1": {} })
    );
    assert!(!tx.config_after().contains_key("server-1/@containers"));
    assert_eq!(store.items("server-1::@containers").len(), 1);

    let child = tx.changes().iter().find(|c| c.name == "container-1").unwrap();
    assert_eq!(child.describe("::"), "create server-1::@containers::container-1");
}

#[tokio::test]
async fn test_adapter_error_path_uses_separator() {
    let store = MemoryStore::new();
    let adapter = FailingCreateAdapter::new(MemoryAdapter::new(store), "broken");
    let registry = AdapterRegistry::new().with("servers", Arc::new(adapter));
    let decl = declaration(json!({ "@servers": { "broken": {} } }));

    let failure = Engine::with_settings(registry, settings())
        .apply(&decl)
        .await
        .unwrap_err();

    match &failure.error {
        ReconcileError::Adapter { path, .. } => assert_eq!(path, "@servers::broken"),
        other => panic!("expected adapter error, got {other}"),
    }
}

#[tokio::test]
async fn test_convergence_pending_uses_separator() {
    let live = BTreeMap::from([("web".to_string(), json!({ "size": "small" }))]);
    let registry = AdapterRegistry::new().with("servers", Arc::new(StubbornAdapter::new(live)));
    let decl = declaration(json!({ "@servers": { "web": { "size": "large" } } }));

    let failure = Engine::with_settings(registry, settings())
        .apply(&decl)
        .await
        .unwrap_err();

    match &failure.error {
        ReconcileError::Convergence { pending, .. } => {
            assert_eq!(pending, &vec!["update @servers::web (size)".to_string()]);
        }
        other => panic!("expected convergence error, got {other}"),
    }
}
