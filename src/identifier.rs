//! Identifier handling for SQL text.
//!
//! Values always travel as bound parameters. Identifiers can't, so everything that lands
//! in identifier position of a statement goes through this module first.

use std::fmt::{Display, Formatter};

/// Strip every character outside `[A-Za-z0-9_]`.
///
/// Never fails: an input made only of invalid characters becomes an empty string,
/// which the engine will then reject when the statement runs.
pub fn sanitize(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Wrap an identifier in double quotes, doubling any embedded double quote.
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Escape a string so it can sit inside a single-quoted SQL literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// A table name that has been through [`sanitize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName(String);

impl TableName {
    pub fn sanitized(raw: &str) -> Self {
        Self(sanitize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn quoted(&self) -> String {
        quote_identifier(&self.0)
    }
}

impl Display for TableName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
