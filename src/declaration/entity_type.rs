//! Entity type identifiers: `adapter` or `adapter:operation`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Read operation used when an identifier does not name one
pub const DEFAULT_OPERATION: &str = "get";

/// Adapter name plus the read operation used to fetch a layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityType {
    adapter: String,
    operation: String,
}

impl EntityType {
    pub fn new(adapter: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            operation: operation.into(),
        }
    }

    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// True when the identifier did not name a custom read operation
    pub fn is_default_operation(&self) -> bool {
        self.operation == DEFAULT_OPERATION
    }
}

/// Identifier parse failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid entity type '{0}'")]
pub struct EntityTypeParseError(pub String);

impl FromStr for EntityType {
    type Err = EntityTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let adapter = parts.next().unwrap_or_default();
        let operation = parts.next();
        if parts.next().is_some() || adapter.is_empty() {
            return Err(EntityTypeParseError(s.to_string()));
        }
        match operation {
            None => Ok(Self::new(adapter, DEFAULT_OPERATION)),
            Some("") => Err(EntityTypeParseError(s.to_string())),
            Some(op) => Ok(Self::new(adapter, op)),
        }
    }
}

impl TryFrom<String> for EntityType {
    type Error = EntityTypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default_operation() {
            write!(f, "{}", self.adapter)
        } else {
            write!(f, "{}:{}", self.adapter, self.operation)
        }
    }
}
