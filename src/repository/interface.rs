use std::fmt::Debug;

use async_trait::async_trait;

use crate::{
    data_types::{FieldMap, FieldValue, Record},
    identifier::TableName,
    schema::{ColumnDefinition, ColumnMetadata, TableInfo},
};

/// Columns and every current row of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescription {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Record>,
}

/// Message the engine attached to an error, falling back to the error's own text
pub fn engine_message(error: &sqlx::Error) -> String {
    match error {
        sqlx::Error::Database(d) => d.message().to_string(),
        other => other.to_string(),
    }
}

/// Wrapper for conversion of database-specific error codes into actual errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Record not found")]
    NotFound,

    #[error("relation \"{name}\" does not exist")]
    UndefinedTable { name: String },

    #[error("column \"{column}\" of relation \"{table}\" does not exist")]
    UnknownColumn { table: String, column: String },

    #[error("{0}")]
    Validation(String),

    #[error("{}", engine_message(.0))]
    UniqueConstraintViolation(sqlx::Error),

    #[error("{}", engine_message(.0))]
    FKConstraintViolation(sqlx::Error),

    #[error("{}", engine_message(.0))]
    NotNullConstraintViolation(sqlx::Error),

    // Pool exhausted or the database can't be reached
    #[error("{}", engine_message(.0))]
    Connection(sqlx::Error),

    // All other errors
    #[error("{}", engine_message(.0))]
    SqlxError(sqlx::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[async_trait]
pub trait Repository: Send + Sync + Debug {
    /// Create the example `users` table and its `updated_at` trigger
    async fn setup(&self) -> Result<(), Error>;

    /// Run caller-supplied SQL as-is and return the rows of every statement in it
    async fn execute_query(&self, query: &str) -> Result<Vec<Record>, Error>;

    async fn list_tables(&self) -> Result<Vec<TableInfo>, Error>;

    async fn describe_table(&self, table: &TableName) -> Result<TableDescription, Error>;

    async fn list_rows(&self, table: &TableName) -> Result<Vec<Record>, Error>;

    async fn insert_row(&self, table: &TableName, fields: FieldMap) -> Result<Record, Error>;

    async fn update_row(
        &self,
        table: &TableName,
        id: Option<FieldValue>,
        fields: FieldMap,
    ) -> Result<Record, Error>;

    async fn delete_row(&self, table: &TableName, id: FieldValue) -> Result<Record, Error>;

    /// Create a table and return the statement that was executed
    async fn create_table(
        &self,
        table_name: &str,
        columns: &[ColumnDefinition],
    ) -> Result<String, Error>;

    async fn drop_table(&self, table: &TableName) -> Result<(), Error>;
}
