//! Difference computation: name-set classification for a layer and the
//! structural diff between a filtered expected body and the live body.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Declared and live entity names of one layer, split by the action they need
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameClassification {
    pub to_create: BTreeSet<String>,
    pub to_delete: BTreeSet<String>,
    pub to_keep: BTreeSet<String>,
}

impl NameClassification {
    /// Classify declared vs live names; ignored names take part in none of the sets
    pub fn classify<'n>(
        declared: impl IntoIterator<Item = &'n str>,
        live: impl IntoIterator<Item = &'n str>,
        ignored: &BTreeSet<String>,
    ) -> Self {
        let declared: BTreeSet<&str> = declared
            .into_iter()
            .filter(|n| !ignored.contains(*n))
            .collect();
        let live: BTreeSet<&str> = live.into_iter().filter(|n| !ignored.contains(*n)).collect();

        Self {
            to_create: declared.difference(&live).map(|n| n.to_string()).collect(),
            to_delete: live.difference(&declared).map(|n| n.to_string()).collect(),
            to_keep: declared.intersection(&live).map(|n| n.to_string()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty() && self.to_keep.is_empty()
    }
}

/// A leaf present on both sides with different values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    pub expected: Value,
    pub existing: Value,
}

/// Keyed difference between an expected body and an existing body
///
/// Keys are dot-joined property paths; array indices are path segments.
/// `added` holds paths only the existing side has, `deleted` paths only the
/// expected side has.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralDiff {
    pub added: BTreeMap<String, Value>,
    pub deleted: BTreeMap<String, Value>,
    pub updated: BTreeMap<String, ValueChange>,
}

impl StructuralDiff {
    pub fn between(expected: &Value, existing: &Value) -> Self {
        let mut diff = Self::default();
        diff.walk(expected, existing, &mut Vec::new());
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }

    /// Every path touched by the diff, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .added
            .keys()
            .chain(self.deleted.keys())
            .chain(self.updated.keys())
            .map(String::as_str)
            .collect();
        paths.sort_unstable();
        paths
    }

    fn walk(&mut self, expected: &Value, existing: &Value, path: &mut Vec<String>) {
        match (expected, existing) {
            (Value::Object(lhs), Value::Object(rhs)) => {
                for (key, left) in lhs {
                    path.push(key.clone());
                    match rhs.get(key) {
                        Some(right) => self.walk(left, right, path),
                        None => {
                            self.deleted.insert(path.join("."), left.clone());
                        }
                    }
                    path.pop();
                }
                for (key, right) in rhs {
                    if !lhs.contains_key(key) {
                        path.push(key.clone());
                        self.added.insert(path.join("."), right.clone());
                        path.pop();
                    }
                }
            }
            (Value::Array(lhs), Value::Array(rhs)) => {
                for (index, left) in lhs.iter().enumerate() {
                    path.push(index.to_string());
                    match rhs.get(index) {
                        Some(right) => self.walk(left, right, path),
                        None => {
                            self.deleted.insert(path.join("."), left.clone());
                        }
                    }
                    path.pop();
                }
                for (index, right) in rhs.iter().enumerate().skip(lhs.len()) {
                    path.push(index.to_string());
                    self.added.insert(path.join("."), right.clone());
                    path.pop();
                }
            }
            (left, right) if left == right => {}
            (left, right) => {
                self.updated.insert(
                    path.join("."),
                    ValueChange {
                        expected: left.clone(),
                        existing: right.clone(),
                    },
                );
            }
        }
    }
}
