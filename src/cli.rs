//! CLI domain: parse, route, output, and presentation only.
//! No reconciliation logic; the route table hands work to the engine.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{format_layers_text, format_transaction_json, format_transaction_text};
pub use route::RunContext;
