//! eapply: Declarative Entity Reconciliation
//!
//! Drives live resource state toward a nested declaration tree. Each layer
//! marker in the tree names an adapter; the engine fetches the layer's live
//! entities, computes creates, updates and deletes, applies them, verifies
//! that the layer converged, and recurses into collections nested inside each
//! entity.

pub mod adapter;
pub mod cli;
pub mod config;
pub mod declaration;
pub mod diff;
pub mod engine;
pub mod error;
pub mod filter;
pub mod logging;
pub mod transaction;

pub use adapter::{AdapterRegistry, EntityAdapter, ParentContext, ReadResponse};
pub use declaration::{Declaration, EntityType};
pub use engine::{apply, Engine, EngineSettings};
pub use error::{ApplyFailure, ReconcileError};
pub use transaction::{ChangeAction, ChangeRecord, Transaction, TransactionStatus};
