//! Data-definition statements: `CREATE TABLE` from column definitions, and the fixed
//! bootstrap script behind `POST /db/init`.
//!
//! Types and defaults are interpolated into the statement text. This is an admin tool,
//! so a default like `now()` or `gen_random_uuid()` is passed through as written.

use itertools::Itertools;

use crate::identifier::{escape_literal, quote_identifier};
use crate::schema::{ColumnDefinition, ColumnType};

pub const DEFAULT_VECTOR_DIMENSIONS: &str = "1536";

/// Example table with an `updated_at` trigger. Every statement is idempotent.
pub const INIT_SCRIPT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id SERIAL PRIMARY KEY,
  name VARCHAR(255) NOT NULL,
  email VARCHAR(255) UNIQUE NOT NULL,
  created_at TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP,
  updated_at TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP
);

CREATE OR REPLACE FUNCTION update_updated_at_column()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = CURRENT_TIMESTAMP;
    RETURN NEW;
END;
$$ language 'plpgsql';

DROP TRIGGER IF EXISTS update_users_updated_at ON users;

CREATE TRIGGER update_users_updated_at
    BEFORE UPDATE ON users
    FOR EACH ROW
    EXECUTE FUNCTION update_updated_at_column();
"#;

fn column_clause(column: &ColumnDefinition) -> String {
    let mut clause = format!(
        "  {} {}",
        quote_identifier(&column.name),
        column.column_type
    );

    // For vectors the "default value" field carries the dimension count
    if column.column_type == ColumnType::Vector {
        clause.push_str(&format!(
            "({})",
            column.default_value().unwrap_or(DEFAULT_VECTOR_DIMENSIONS)
        ));
    }

    if column.is_primary_key {
        clause.push_str(" PRIMARY KEY");
    }
    if column.is_unique {
        clause.push_str(" UNIQUE");
    }
    if !column.is_nullable {
        clause.push_str(" NOT NULL");
    }

    if column.has_default {
        match (column.column_type, column.default_value()) {
            (ColumnType::Vector, _) => {}
            (ColumnType::Jsonb, value) => clause.push_str(&format!(
                " DEFAULT '{}'::jsonb",
                escape_literal(value.unwrap_or("{}"))
            )),
            (ColumnType::Timestamp, _) => clause.push_str(" DEFAULT CURRENT_TIMESTAMP"),
            (_, Some(value)) => clause.push_str(&format!(" DEFAULT {value}")),
            (_, None) => {}
        }
    }

    clause
}

fn foreign_key_clause(column: &ColumnDefinition) -> Option<String> {
    let (table, referenced) = column.foreign_key_target()?;

    let mut clause = format!(
        "  FOREIGN KEY ({}) REFERENCES {}({})",
        quote_identifier(&column.name),
        quote_identifier(table),
        quote_identifier(referenced),
    );
    if let Some(action) = column.on_delete {
        clause.push_str(&format!(" ON DELETE {action}"));
    }
    Some(clause)
}

/// Build a `CREATE TABLE IF NOT EXISTS` statement.
///
/// Re-running it against an existing table is a no-op even if the columns differ: there
/// is no `ALTER`. A foreign key missing its referenced table or column is left out.
pub fn build_create_table(table_name: &str, columns: &[ColumnDefinition]) -> String {
    let lines = columns
        .iter()
        .map(column_clause)
        .chain(columns.iter().filter_map(foreign_key_clause))
        .join(",\n");

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
        quote_identifier(table_name),
        lines
    )
}
