//! Integration tests for the reconciliation engine

mod classification_properties;
mod cli_apply;
mod convergence;
mod directives;
mod path_separator;
mod test_utils;
