use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Column types offered when creating a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Deserialize)]
#[serde(try_from = "String")]
#[strum(ascii_case_insensitive)]
pub enum ColumnType {
    #[strum(serialize = "SERIAL")]
    Serial,
    #[strum(serialize = "INTEGER")]
    Integer,
    #[strum(serialize = "BIGINT")]
    BigInt,
    #[strum(serialize = "TEXT")]
    Text,
    #[strum(serialize = "VARCHAR")]
    Varchar,
    #[strum(serialize = "BOOLEAN")]
    Boolean,
    #[strum(serialize = "TIMESTAMP")]
    Timestamp,
    #[strum(serialize = "DATE")]
    Date,
    #[strum(serialize = "JSONB")]
    Jsonb,
    // pgvector spells its type in lowercase
    #[strum(serialize = "vector")]
    Vector,
    #[strum(serialize = "NUMERIC")]
    Numeric,
    #[strum(serialize = "UUID")]
    Uuid,
    #[strum(serialize = "BYTEA")]
    Bytea,
}

impl TryFrom<String> for ColumnType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ColumnType::from_str(&value).map_err(|_| format!("unsupported column type {value:?}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize)]
pub enum OnDeleteAction {
    #[serde(rename = "CASCADE")]
    #[strum(serialize = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    #[strum(serialize = "SET NULL")]
    SetNull,
    #[serde(rename = "RESTRICT")]
    #[strum(serialize = "RESTRICT")]
    Restrict,
    #[serde(rename = "NO ACTION")]
    #[strum(serialize = "NO ACTION")]
    NoAction,
}

fn default_true() -> bool {
    true
}

/// Declarative description of one column in a `CREATE TABLE` request. Only lives for the
/// duration of that request; afterwards the column is observed through the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default = "default_true")]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub has_default: bool,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub is_foreign_key: bool,
    #[serde(default)]
    pub reference_table: Option<String>,
    #[serde(default)]
    pub reference_column: Option<String>,
    #[serde(default)]
    pub on_delete: Option<OnDeleteAction>,
}

impl ColumnDefinition {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            is_nullable: true,
            is_primary_key: false,
            is_unique: false,
            has_default: false,
            default_value: None,
            is_foreign_key: false,
            reference_table: None,
            reference_column: None,
            on_delete: None,
        }
    }

    /// The user-supplied default, treating an empty string as absent
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref().filter(|v| !v.is_empty())
    }

    /// Referenced (table, column) if this column carries a complete foreign key
    pub fn foreign_key_target(&self) -> Option<(&str, &str)> {
        if !self.is_foreign_key {
            return None;
        }
        match (
            self.reference_table.as_deref().filter(|t| !t.is_empty()),
            self.reference_column.as_deref().filter(|c| !c.is_empty()),
        ) {
            (Some(table), Some(column)) => Some((table, column)),
            _ => None,
        }
    }
}

/// Column as listed in `GET /db/tables`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Read-only projection of a table from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub table_name: String,
    pub columns: Vec<ColumnSummary>,
}

/// Column metadata returned alongside table rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ColumnMetadata {
    pub column_name: String,
    pub data_type: String,
    pub column_default: Option<String>,
    pub is_nullable: String,
}

/// A column as the engine knows it, with a type name that can be used in a cast
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CatalogColumn {
    pub name: String,
    pub sql_type: String,
}

impl CatalogColumn {
    pub fn new(name: &str, sql_type: &str) -> Self {
        Self {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
        }
    }
}
