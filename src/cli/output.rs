//! CLI output: error mapping from domain errors to the CLI surface.

use crate::error::ReconcileError;

/// Map engine errors to a string for CLI output.
pub fn map_error(e: &ReconcileError) -> String {
    match e {
        ReconcileError::Convergence { pending, .. } => {
            let mut out = e.to_string();
            for change in pending {
                out.push_str(&format!("\n  - {}", change));
            }
            out
        }
        other => other.to_string(),
    }
}
