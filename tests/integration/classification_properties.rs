//! Property-based tests for set classification and idempotence

use eapply::adapter::memory::{MemoryAdapter, MemoryStore};
use eapply::diff::NameClassification;
use eapply::{apply, AdapterRegistry, Declaration};
use proptest::collection::{btree_map, btree_set};
use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

fn names() -> impl Strategy<Value = BTreeSet<String>> {
    btree_set("[a-e]{1,2}", 0..8)
}

/// The three sets partition the declared and live names minus the ignored ones
#[test]
fn test_classification_partitions_names() {
    let mut runner = TestRunner::default();

    runner
        .run(&(names(), names(), names()), |(declared, live, ignored)| {
            let classified = NameClassification::classify(
                declared.iter().map(String::as_str),
                live.iter().map(String::as_str),
                &ignored,
            );

            let universe: BTreeSet<String> = declared
                .union(&live)
                .filter(|n| !ignored.contains(*n))
                .cloned()
                .collect();

            let mut seen = BTreeSet::new();
            for set in [&classified.to_create, &classified.to_delete, &classified.to_keep] {
                for name in set {
                    prop_assert!(seen.insert(name.clone()), "{} in two sets", name);
                }
            }
            prop_assert_eq!(&seen, &universe);

            for name in &classified.to_create {
                prop_assert!(declared.contains(name) && !live.contains(name));
            }
            for name in &classified.to_delete {
                prop_assert!(live.contains(name) && !declared.contains(name));
            }
            for name in &classified.to_keep {
                prop_assert!(declared.contains(name) && live.contains(name));
            }
            Ok(())
        })
        .unwrap();
}

fn entity() -> impl Strategy<Value = Value> {
    (0u32..4, proptest::option::of("[a-z]{1,4}"), btree_set("[a-z]{1,3}", 0..3)).prop_map(
        |(size, label, children)| {
            let mut map = Map::new();
            map.insert("size".to_string(), json!(size));
            if let Some(label) = label {
                map.insert("label".to_string(), json!(label));
            }
            if !children.is_empty() {
                let nested: Map<String, Value> = children
                    .into_iter()
                    .map(|c| (c, json!({ "enabled": true })))
                    .collect();
                map.insert("@containers".to_string(), Value::Object(nested));
            }
            Value::Object(map)
        },
    )
}

fn layer() -> impl Strategy<Value = Value> {
    btree_map("[a-z]{1,4}", entity(), 0..5)
        .prop_map(|entities| Value::Object(entities.into_iter().collect()))
}

/// Applying any declaration twice leaves nothing to do the second time
#[test]
fn test_apply_is_idempotent() {
    let mut runner = TestRunner::new(Config {
        cases: 32,
        ..Config::default()
    });
    let rt = tokio::runtime::Runtime::new().unwrap();

    runner
        .run(&(layer(), layer()), |(initial, target)| {
            let store = MemoryStore::new();
            let registry = AdapterRegistry::new()
                .with("servers", Arc::new(MemoryAdapter::new(store.clone())))
                .with("containers", Arc::new(MemoryAdapter::new(store.clone())));

            let seed = Declaration::from_value(json!({ "@servers": initial }), "@").unwrap();
            rt.block_on(apply(&seed, &registry)).unwrap();

            let decl = Declaration::from_value(json!({ "@servers": target }), "@").unwrap();
            let first = rt.block_on(apply(&decl, &registry)).unwrap();
            let second = rt.block_on(apply(&decl, &registry)).unwrap();

            prop_assert!(second.changes().is_empty(), "{:?}", second.changes());
            prop_assert_eq!(first.config_after(), second.config_before());
            Ok(())
        })
        .unwrap();
}
