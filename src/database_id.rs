//! Database ID type definition.

/// Alias for the integer type the store uses for record IDs.
pub type DatabaseId = i64;
