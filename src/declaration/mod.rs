//! Declaration tree
//!
//! The desired state is a tree of plain properties and layer markers. Keys
//! carrying the configured sigil become [`Node::Layer`] at parse time, so the
//! rest of the engine never looks at key prefixes of declared content again.
//! Live values returned by adapters are plain JSON and are stripped with
//! [`strip_layer_keys`].

mod entity_type;
pub mod visitor;

pub use entity_type::{EntityType, EntityTypeParseError, DEFAULT_OPERATION};
pub use visitor::{nested_layers, nested_layers_in, NestedLayer, NodeVisitor};

use crate::error::ReconcileError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Default key prefix marking a layer
pub const DEFAULT_SIGIL: &str = "@";

/// Keyed children of an object node
pub type Properties = BTreeMap<String, Node>;

/// One node of the declaration tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Value),
    List(Vec<Node>),
    Object(Properties),
    Layer(Layer),
}

impl Node {
    /// The node as a plain value with every layer marker removed
    ///
    /// A bare layer node has no property content and strips to `null`.
    pub fn to_stripped_value(&self) -> Value {
        match self {
            Node::Scalar(value) => value.clone(),
            Node::List(items) => Value::Array(items.iter().map(Node::to_stripped_value).collect()),
            Node::Object(properties) => Value::Object(strip_properties(properties)),
            Node::Layer(_) => Value::Null,
        }
    }

    pub fn as_layer(&self) -> Option<&Layer> {
        match self {
            Node::Layer(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn is_layer(&self) -> bool {
        matches!(self, Node::Layer(_))
    }
}

/// Plain-property map for a set of children, markers dropped
pub fn strip_properties(properties: &Properties) -> Map<String, Value> {
    properties
        .iter()
        .filter(|(_, node)| !node.is_layer())
        .map(|(key, node)| (key.clone(), node.to_stripped_value()))
        .collect()
}

/// Remove every sigil-prefixed key from a live value, recursively
pub fn strip_layer_keys(value: &Value, sigil: &str) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !key.starts_with(sigil))
                .map(|(key, child)| (key.clone(), strip_layer_keys(child, sigil)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| strip_layer_keys(item, sigil)).collect())
        }
        other => other.clone(),
    }
}

/// A resource collection (or singleton) managed by one adapter
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    key: String,
    entity_type: EntityType,
    declarations: Properties,
}

impl Layer {
    /// Marker key as written in the declaration, sigil included
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Everything declared under the marker, nested markers included
    pub fn declarations(&self) -> &Properties {
        &self.declarations
    }

    /// Names of the entities declared in this collection
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.declarations
            .iter()
            .filter(|(_, node)| !node.is_layer())
            .map(|(name, _)| name.as_str())
    }

    /// Declaration of one named entity
    pub fn entity(&self, name: &str) -> Option<&Node> {
        self.declarations.get(name).filter(|node| !node.is_layer())
    }
}

/// Parsed declaration tree
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    root: Properties,
    sigil: String,
}

impl Declaration {
    /// Parse a JSON value; the root must be an object
    pub fn from_value(value: Value, sigil: &str) -> Result<Self, ReconcileError> {
        if sigil.is_empty() {
            return Err(invalid(&[], "layer sigil must not be empty"));
        }
        let Value::Object(map) = value else {
            return Err(invalid(&[], "declaration root must be an object"));
        };
        let mut path = Vec::new();
        let root = parse_object(map, sigil, &mut path)?;
        Ok(Self {
            root,
            sigil: sigil.to_string(),
        })
    }

    pub fn from_json_str(source: &str, sigil: &str) -> Result<Self, ReconcileError> {
        Self::from_value(serde_json::from_str(source)?, sigil)
    }

    pub fn from_toml_str(source: &str, sigil: &str) -> Result<Self, ReconcileError> {
        let table: toml::Value = toml::from_str(source)?;
        Self::from_value(serde_json::to_value(table)?, sigil)
    }

    /// Load a declaration file; `.toml` files are read as TOML, everything else as JSON
    pub fn from_path(path: &Path, sigil: &str) -> Result<Self, ReconcileError> {
        let source = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&source, sigil),
            _ => Self::from_json_str(&source, sigil),
        }
    }

    pub fn root(&self) -> &Properties {
        &self.root
    }

    pub fn sigil(&self) -> &str {
        &self.sigil
    }

    /// Top-level layers; plain root properties are not part of any layer
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.root.values().filter_map(Node::as_layer)
    }

    /// Every entity type referenced anywhere in the tree, sorted and deduplicated
    pub fn entity_types(&self) -> Vec<EntityType> {
        let mut types = Vec::new();
        let mut pending: Vec<&Layer> = self.layers().collect();
        while let Some(layer) = pending.pop() {
            if !types.contains(layer.entity_type()) {
                types.push(layer.entity_type().clone());
            }
            pending.extend(nested_layers_in(layer.declarations()).into_iter().map(|n| n.layer));
        }
        types.sort_by_key(|t| t.to_string());
        types
    }

    /// Every adapter name referenced anywhere in the tree
    pub fn adapter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entity_types()
            .iter()
            .map(|t| t.adapter().to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

fn parse_object(
    map: Map<String, Value>,
    sigil: &str,
    path: &mut Vec<String>,
) -> Result<Properties, ReconcileError> {
    let mut properties = Properties::new();
    for (key, value) in map {
        path.push(key.clone());
        let node = match key.strip_prefix(sigil) {
            Some(type_name) => Node::Layer(parse_layer(&key, type_name, value, sigil, path)?),
            None => parse_node(value, sigil, path)?,
        };
        path.pop();
        properties.insert(key, node);
    }
    Ok(properties)
}

fn parse_layer(
    key: &str,
    type_name: &str,
    value: Value,
    sigil: &str,
    path: &mut Vec<String>,
) -> Result<Layer, ReconcileError> {
    let entity_type: EntityType = type_name
        .parse()
        .map_err(|e: EntityTypeParseError| invalid(path, &e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(invalid(path, "layer marker must map entity names to declarations"));
    };
    Ok(Layer {
        key: key.to_string(),
        entity_type,
        declarations: parse_object(map, sigil, path)?,
    })
}

fn parse_node(value: Value, sigil: &str, path: &mut Vec<String>) -> Result<Node, ReconcileError> {
    match value {
        Value::Object(map) => Ok(Node::Object(parse_object(map, sigil, path)?)),
        Value::Array(items) => {
            let mut nodes = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                path.push(index.to_string());
                nodes.push(parse_node(item, sigil, path)?);
                path.pop();
            }
            Ok(Node::List(nodes))
        }
        scalar => Ok(Node::Scalar(scalar)),
    }
}

fn invalid(path: &[String], message: &str) -> ReconcileError {
    ReconcileError::InvalidDeclaration {
        path: path.join("/"),
        message: message.to_string(),
    }
}
