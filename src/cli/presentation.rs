//! CLI presentation: text and json formatters for apply and validate.

use crate::declaration::visitor::walk_properties;
use crate::declaration::{Declaration, Layer, NodeVisitor};
use crate::error::ReconcileError;
use crate::transaction::{ChangeAction, Transaction};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Transaction summary plus one table row per logged change.
pub fn format_transaction_text(transaction: &Transaction, separator: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Transaction")));
    out.push_str(&format!("  Status: {}\n", transaction.status()));

    let summary = transaction.summary();
    out.push_str(&format!(
        "  Created: {}  Updated: {}  Deleted: {}\n",
        summary.created, summary.updated, summary.deleted
    ));
    out.push_str(&format!("  Layers: {}\n", transaction.config_after().len()));

    if summary.total() == 0 {
        out.push_str("\nNo changes: live state already matches the declaration.\n");
        return out;
    }

    out.push_str(&format!("\n{}\n\n", format_section_heading("Changes")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Action", "Entity type", "Path", "Properties"]);
    for change in transaction.changes() {
        let properties = match (&change.action, &change.diff) {
            (ChangeAction::Update, Some(diff)) => diff.paths().join(", "),
            _ => "-".to_string(),
        };
        table.add_row(vec![
            change.action.to_string(),
            change.entity_type.to_string(),
            change.tree_path.join(separator),
            properties,
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

pub fn format_transaction_json(transaction: &Transaction) -> Result<String, ReconcileError> {
    Ok(serde_json::to_string_pretty(transaction)?)
}

struct LayerRow {
    path: String,
    entity_type: String,
    entities: usize,
}

struct LayerLister<'s> {
    separator: &'s str,
    prefix: Vec<String>,
    rows: Vec<LayerRow>,
}

impl<'a> NodeVisitor<'a> for LayerLister<'_> {
    fn visit_layer(&mut self, path: &[String], layer: &'a Layer) {
        let mut full = self.prefix.clone();
        full.extend_from_slice(path);
        self.rows.push(LayerRow {
            path: full.join(self.separator),
            entity_type: layer.entity_type().to_string(),
            entities: layer.entity_names().count(),
        });

        // Markers below this one are only reachable through it
        let saved = std::mem::replace(&mut self.prefix, full);
        walk_properties(layer.declarations(), &mut Vec::new(), self);
        self.prefix = saved;
    }
}

/// Every layer of a declaration with its position from the root and declared entity count.
pub fn format_layers_text(declaration: &Declaration, separator: &str) -> String {
    let mut lister = LayerLister {
        separator,
        prefix: Vec::new(),
        rows: Vec::new(),
    };
    walk_properties(declaration.root(), &mut Vec::new(), &mut lister);

    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Declaration")));
    if lister.rows.is_empty() {
        out.push_str("  No layers declared.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Layer", "Entity type", "Entities"]);
    for row in &lister.rows {
        table.add_row(vec![
            row.path.clone(),
            row.entity_type.clone(),
            row.entities.to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}
