//! Property Filter
//!
//! Directive-driven exclusion of "don't care" properties before two entity
//! bodies are diffed. Adapters attach directives to a collection read:
//!
//! - `CREATE_ONLY` at P: P only takes effect at creation, so when the live
//!   entity lacks P it is dropped from the expected body.
//! - `IMMUTABLE_RESPONSE` at P: P is assigned by the resource store, so when
//!   the declaration never mentions P it is dropped from the live body.
//!
//! Paths are dot-separated. A `*` segment matches every index of the array
//! found at that position, expanded separately against each body.

use crate::error::ReconcileError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Array wildcard segment
pub const WILDCARD: &str = "*";

/// Exclusion rule attached to a property path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyDirective {
    CreateOnly,
    ImmutableResponse,
}

impl FromStr for PropertyDirective {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE_ONLY" => Ok(PropertyDirective::CreateOnly),
            "IMMUTABLE_RESPONSE" => Ok(PropertyDirective::ImmutableResponse),
            other => Err(ReconcileError::InvalidDirective(format!(
                "unknown directive '{}' (expected CREATE_ONLY or IMMUTABLE_RESPONSE)",
                other
            ))),
        }
    }
}

impl fmt::Display for PropertyDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyDirective::CreateOnly => write!(f, "CREATE_ONLY"),
            PropertyDirective::ImmutableResponse => write!(f, "IMMUTABLE_RESPONSE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Key(String),
    Wildcard,
}

/// Property path with optional array wildcards
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath(Vec<Segment>);

impl PropertyPath {
    fn from_segments<'s>(segments: impl IntoIterator<Item = &'s str>) -> Self {
        PropertyPath(
            segments
                .into_iter()
                .map(|s| {
                    if s == WILDCARD {
                        Segment::Wildcard
                    } else {
                        Segment::Key(s.to_string())
                    }
                })
                .collect(),
        )
    }

    /// Concrete paths this pattern addresses within `value`
    ///
    /// Plain segments are kept even when absent; a wildcard over anything
    /// but an array yields nothing.
    pub fn expand(&self, value: &Value) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        expand_into(&self.0, Some(value), &mut Vec::new(), &mut out);
        out
    }
}

fn expand_into(
    segments: &[Segment],
    current: Option<&Value>,
    prefix: &mut Vec<String>,
    out: &mut Vec<Vec<String>>,
) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(prefix.clone());
        return;
    };
    match head {
        Segment::Key(key) => {
            prefix.push(key.clone());
            expand_into(rest, current.and_then(|v| child(v, key)), prefix, out);
            prefix.pop();
        }
        Segment::Wildcard => {
            if let Some(Value::Array(items)) = current {
                for (index, item) in items.iter().enumerate() {
                    prefix.push(index.to_string());
                    expand_into(rest, Some(item), prefix, out);
                    prefix.pop();
                }
            }
        }
    }
}

impl FromStr for PropertyPath {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.split('.').any(str::is_empty) {
            return Err(ReconcileError::InvalidDirective(format!(
                "invalid property path '{}'",
                s
            )));
        }
        Ok(Self::from_segments(s.split('.')))
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self
            .0
            .iter()
            .map(|s| match s {
                Segment::Key(key) => key.as_str(),
                Segment::Wildcard => WILDCARD,
            })
            .collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Directives reported by a collection read, applied in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyOptions {
    entries: Vec<(PropertyPath, PropertyDirective)>,
}

impl PropertyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directive; an existing entry for the same path is replaced
    pub fn insert(&mut self, path: PropertyPath, directive: PropertyDirective) {
        match self.entries.iter_mut().find(|(p, _)| *p == path) {
            Some(entry) => entry.1 = directive,
            None => self.entries.push((path, directive)),
        }
    }

    /// Builder form of [`insert`](Self::insert) taking a path string
    pub fn with(mut self, path: &str, directive: PropertyDirective) -> Result<Self, ReconcileError> {
        self.insert(path.parse()?, directive);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyPath, PropertyDirective)> {
        self.entries.iter().map(|(p, d)| (p, *d))
    }

    /// Parse a directive document
    ///
    /// Keys may be dotted paths (`{"service.ports.*.nodePort": "IMMUTABLE_RESPONSE"}`)
    /// or nested objects (`{"service": {"ports": [{"nodePort": "IMMUTABLE_RESPONSE"}]}}`);
    /// an array in the nested form stands for a wildcard over its elements.
    pub fn from_value(value: &Value) -> Result<Self, ReconcileError> {
        let Value::Object(map) = value else {
            return Err(ReconcileError::InvalidDirective(
                "property options must be an object".to_string(),
            ));
        };
        let mut options = Self::new();
        for (key, child) in map {
            let prefix: Vec<&str> = key.split('.').collect();
            collect_directives(child, &prefix, &mut options)?;
        }
        Ok(options)
    }
}

fn collect_directives(
    value: &Value,
    prefix: &[&str],
    options: &mut PropertyOptions,
) -> Result<(), ReconcileError> {
    match value {
        Value::String(token) => {
            let path: PropertyPath = prefix.join(".").parse()?;
            options.insert(path, token.parse()?);
            Ok(())
        }
        Value::Object(map) => {
            for (key, child) in map {
                let mut nested = prefix.to_vec();
                nested.extend(key.split('.'));
                collect_directives(child, &nested, options)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            let mut nested = prefix.to_vec();
            nested.push(WILDCARD);
            for item in items {
                collect_directives(item, &nested, options)?;
            }
            Ok(())
        }
        other => Err(ReconcileError::InvalidDirective(format!(
            "directive at '{}' must be a string, found {}",
            prefix.join("."),
            other
        ))),
    }
}

/// Expected and existing bodies after directive filtering
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredPair {
    pub expected: Value,
    pub existing: Value,
}

/// Apply every directive to a context-stripped (expected, existing) pair
pub fn filter_properties(expected: Value, existing: Value, options: &PropertyOptions) -> FilteredPair {
    let mut expected = expected;
    let mut existing = existing;
    for (path, directive) in options.iter() {
        match directive {
            PropertyDirective::CreateOnly => {
                for concrete in path.expand(&expected).iter().rev() {
                    if lookup(&existing, concrete).is_none() && lookup(&expected, concrete).is_some() {
                        remove(&mut expected, concrete);
                    }
                }
            }
            PropertyDirective::ImmutableResponse => {
                for concrete in path.expand(&existing).iter().rev() {
                    if lookup(&expected, concrete).is_none() && lookup(&existing, concrete).is_some() {
                        remove(&mut existing, concrete);
                    }
                }
            }
        }
    }
    FilteredPair { expected, existing }
}

fn child<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Value at a concrete path; JSON `null` counts as present
pub fn lookup<'v>(value: &'v Value, path: &[String]) -> Option<&'v Value> {
    path.iter().try_fold(value, |current, key| child(current, key))
}

fn remove(value: &mut Value, path: &[String]) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    let mut current = value;
    for key in parents {
        current = match current {
            Value::Object(map) => match map.get_mut(key.as_str()) {
                Some(next) => next,
                None => return false,
            },
            Value::Array(items) => match key.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(next) => next,
                None => return false,
            },
            _ => return false,
        };
    }
    match current {
        Value::Object(map) => map.remove(last.as_str()).is_some(),
        Value::Array(items) => match last.parse::<usize>() {
            Ok(index) if index < items.len() => {
                items.remove(index);
                true
            }
            _ => false,
        },
        _ => false,
    }
}
