//! UUID utilities
//!
//! Ids are stored as TEXT columns; these helpers turn a decode failure into
//! a crate error naming the offending column.

use crate::{Error, Result};
use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse a UUID read from a TEXT column
pub fn parse_column(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::InvalidInput(format!("invalid uuid in {}: '{}' ({})", column, value, e)))
}

/// Parse a nullable UUID column
pub fn parse_optional_column(column: &str, value: Option<&str>) -> Result<Option<Uuid>> {
    value.map(|v| parse_column(column, v)).transpose()
}
