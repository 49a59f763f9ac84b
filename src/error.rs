//! Error types for the reconciliation engine.

use crate::transaction::Transaction;
use thiserror::Error;

/// Errors raised while reconciling a declaration tree
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Unknown adapter, or an adapter that does not offer the requested operation
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A verification pass still produced changes after the layer was applied
    #[error("Layer '{entity_type}' at '{path}' generated changes on verification run: {pending:?}")]
    Convergence {
        entity_type: String,
        path: String,
        pending: Vec<String>,
    },

    /// An adapter handler failed; the source error is kept verbatim
    #[error("Adapter '{entity_type}' failed during '{operation}' at '{path}': {source}")]
    Adapter {
        entity_type: String,
        operation: String,
        path: String,
        #[source]
        source: AdapterError,
    },

    #[error("Invalid declaration at '{path}': {message}")]
    InvalidDeclaration { path: String, message: String },

    #[error("Invalid property directive: {0}")]
    InvalidDirective(String),

    #[error("Transaction state error: {0}")]
    State(String),

    #[error("Settings error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<config::ConfigError> for ReconcileError {
    fn from(err: config::ConfigError) -> Self {
        ReconcileError::Config(err.to_string())
    }
}

/// Error type adapters return from their handlers
pub type AdapterError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failed apply: the error plus the transaction as it stood when the run aborted
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ApplyFailure {
    #[source]
    pub error: ReconcileError,
    pub transaction: Box<Transaction>,
}

impl ApplyFailure {
    pub fn new(error: ReconcileError, transaction: Transaction) -> Self {
        Self {
            error,
            transaction: Box::new(transaction),
        }
    }

    /// Consume the failure, returning the inner error
    pub fn into_error(self) -> ReconcileError {
        self.error
    }
}
