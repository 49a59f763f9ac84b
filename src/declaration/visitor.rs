//! Recursive visitor over declaration nodes
//!
//! Walks plain properties and lists, carrying the breadcrumb of keys (list
//! indices become decimal segments). A layer marker ends the walk on its
//! branch: markers nested under it are discovered by that layer's own
//! recursion once its entities exist.

use crate::declaration::{Layer, Node, Properties};

/// Callbacks for a declaration walk
pub trait NodeVisitor<'a> {
    /// Called for each layer marker; `path` ends with the marker key
    fn visit_layer(&mut self, path: &[String], layer: &'a Layer);
}

/// Walk one node, reporting every reachable layer marker
pub fn walk<'a, V: NodeVisitor<'a>>(node: &'a Node, path: &mut Vec<String>, visitor: &mut V) {
    match node {
        Node::Scalar(_) => {}
        Node::List(items) => {
            for (index, item) in items.iter().enumerate() {
                path.push(index.to_string());
                walk(item, path, visitor);
                path.pop();
            }
        }
        Node::Object(properties) => walk_properties(properties, path, visitor),
        Node::Layer(layer) => visitor.visit_layer(path, layer),
    }
}

/// Walk a property map, reporting every reachable layer marker
pub fn walk_properties<'a, V: NodeVisitor<'a>>(
    properties: &'a Properties,
    path: &mut Vec<String>,
    visitor: &mut V,
) {
    for (key, child) in properties {
        path.push(key.clone());
        walk(child, path, visitor);
        path.pop();
    }
}

/// A layer marker found below an entity, with its path relative to that entity
#[derive(Debug, Clone)]
pub struct NestedLayer<'a> {
    pub path: Vec<String>,
    pub layer: &'a Layer,
}

#[derive(Default)]
struct LayerCollector<'a> {
    found: Vec<NestedLayer<'a>>,
}

impl<'a> NodeVisitor<'a> for LayerCollector<'a> {
    fn visit_layer(&mut self, path: &[String], layer: &'a Layer) {
        self.found.push(NestedLayer {
            path: path.to_vec(),
            layer,
        });
    }
}

/// All layer markers nested in an entity declaration, at any depth
pub fn nested_layers(node: &Node) -> Vec<NestedLayer<'_>> {
    let mut collector = LayerCollector::default();
    walk(node, &mut Vec::new(), &mut collector);
    collector.found
}

/// All layer markers nested in a property map, at any depth
pub fn nested_layers_in(properties: &Properties) -> Vec<NestedLayer<'_>> {
    let mut collector = LayerCollector::default();
    walk_properties(properties, &mut Vec::new(), &mut collector);
    collector.found
}
