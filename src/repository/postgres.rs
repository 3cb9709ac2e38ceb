use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{Number, Value};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    types::Json,
    Column, Either, Executor, PgPool, Row, TypeInfo,
};
use tracing::debug;

use super::{
    interface::{Error, Repository, Result, TableDescription},
    statements::{self, Statement},
};
use crate::{
    data_types::{FieldMap, FieldValue, Record},
    ddl::{build_create_table, INIT_SCRIPT},
    identifier::{quote_identifier, TableName},
    schema::{CatalogColumn, ColumnDefinition, ColumnMetadata, ColumnSummary, TableInfo},
};

const LIST_TABLES: &str = r#"
SELECT
    table_name::text AS table_name,
    json_agg(json_build_object('name', column_name, 'type', data_type)) AS columns
FROM information_schema.columns
WHERE table_schema = $1
GROUP BY table_name"#;

const DESCRIBE_COLUMNS: &str = r#"
SELECT
    column_name::text AS column_name,
    data_type::text AS data_type,
    column_default::text AS column_default,
    is_nullable::text AS is_nullable
FROM information_schema.columns
WHERE table_name = $1 AND table_schema = $2
ORDER BY ordinal_position"#;

// Resolved through the search path, the same way the row statements resolve the table.
// The type modifier is left out: an explicit CAST to varchar(n) truncates silently,
// while assignment to the column rejects values that are too long.
const CATALOG_COLUMNS: &str = r#"
SELECT
    a.attname::text AS name,
    format_type(a.atttypid, NULL) AS sql_type
FROM pg_catalog.pg_attribute a
WHERE a.attrelid = to_regclass($1) AND a.attnum > 0 AND NOT a.attisdropped
ORDER BY a.attnum"#;

#[derive(sqlx::FromRow)]
struct TableColumnsRow {
    table_name: String,
    columns: Json<Vec<ColumnSummary>>,
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub min_connections: u32,
    pub max_connections: u32,
    pub idle_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 16,
            idle_timeout: Duration::from_millis(30000),
        }
    }
}

#[derive(Debug)]
pub struct PostgresRepository {
    pub executor: PgPool,
    pub schema_name: String,
}

impl PostgresRepository {
    /// Connect and make sure the target schema exists
    pub async fn try_new(
        dsn: &str,
        schema_name: String,
        settings: PoolSettings,
    ) -> std::result::Result<Self, sqlx::Error> {
        let repo = PostgresRepository::connect(dsn, schema_name, settings).await?;

        repo.executor
            .execute(
                format!(
                    "CREATE SCHEMA IF NOT EXISTS {};",
                    quote_identifier(&repo.schema_name)
                )
                .as_str(),
            )
            .await?;

        Ok(repo)
    }

    pub async fn connect(
        dsn: &str,
        schema_name: String,
        settings: PoolSettings,
    ) -> std::result::Result<Self, sqlx::Error> {
        let search_path = format!("{},public", quote_identifier(&schema_name));

        let pool = PgPoolOptions::new()
            .min_connections(settings.min_connections)
            .max_connections(settings.max_connections)
            .idle_timeout(settings.idle_timeout)
            .test_before_acquire(true)
            .after_connect(move |c, _m| {
                let query = format!("SET search_path TO {search_path};");
                Box::pin(async move {
                    c.execute(query.as_str()).await?;
                    Ok(())
                })
            })
            .connect(dsn)
            .await?;

        Ok(Self {
            executor: pool,
            schema_name,
        })
    }

    pub fn interpret_error(error: sqlx::Error) -> Error {
        if let sqlx::Error::Database(ref d) = error {
            // Reference: https://www.postgresql.org/docs/current/errcodes-appendix.html
            if let Some(code) = d.code() {
                match &*code {
                    "23505" => return Error::UniqueConstraintViolation(error),
                    "23503" => return Error::FKConstraintViolation(error),
                    "23502" => return Error::NotNullConstraintViolation(error),
                    _ => {}
                }
            }
        }

        match error {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Error::Connection(error),
            _ => Error::SqlxError(error),
        }
    }

    async fn catalog_columns(&self, table: &TableName) -> Result<Vec<CatalogColumn>> {
        let columns: Vec<CatalogColumn> = sqlx::query_as(CATALOG_COLUMNS)
            .bind(table.quoted())
            .fetch_all(&self.executor)
            .await
            .map_err(Self::interpret_error)?;

        if columns.is_empty() {
            return Err(Error::UndefinedTable {
                name: table.to_string(),
            });
        }
        Ok(columns)
    }

    async fn fetch_records(&self, sql: &str) -> Result<Vec<Record>> {
        let rows: Vec<(Json<Record>,)> = sqlx::query_as(sql)
            .fetch_all(&self.executor)
            .await
            .map_err(Self::interpret_error)?;

        Ok(rows.into_iter().map(|(Json(record),)| record).collect())
    }

    async fn fetch_affected(&self, statement: Statement) -> Result<Option<Record>> {
        debug!("Executing {:?} with {} parameter(s)", statement.sql, statement.params.len());

        let mut query = sqlx::query_as::<_, (Json<Record>,)>(&statement.sql);
        for param in statement.params {
            query = query.bind(param);
        }

        let row = query
            .fetch_optional(&self.executor)
            .await
            .map_err(Self::interpret_error)?;

        Ok(row.map(|(Json(record),)| record))
    }
}

/// Convert a value received in text format into JSON, based on its column type.
/// Numerics, timestamps, UUIDs and anything unknown stay strings.
pub fn text_to_json(type_name: &str, text: Option<String>) -> Value {
    let Some(text) = text else {
        return Value::Null;
    };

    match type_name {
        "BOOL" => Value::Bool(text == "t"),
        "INT2" | "INT4" | "INT8" | "OID" => text
            .parse::<i64>()
            .map(|i| Value::Number(i.into()))
            .unwrap_or(Value::String(text)),
        "FLOAT4" | "FLOAT8" => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(text)),
        "JSON" | "JSONB" => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        _ => Value::String(text),
    }
}

fn text_row_to_record(row: &PgRow) -> Result<Record> {
    let mut record = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        // Simple-protocol results are always text, whatever the column type
        let raw: Option<String> = row
            .try_get_unchecked(i)
            .map_err(PostgresRepository::interpret_error)?;
        record.insert(
            column.name().to_string(),
            text_to_json(column.type_info().name(), raw),
        );
    }
    Ok(record)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn setup(&self) -> Result<(), Error> {
        self.executor
            .execute(INIT_SCRIPT)
            .await
            .map_err(Self::interpret_error)?;
        Ok(())
    }

    async fn execute_query(&self, query: &str) -> Result<Vec<Record>, Error> {
        // A plain &str goes through the simple query protocol, which allows several
        // statements in one go
        let mut stream = (&self.executor).fetch_many(query);
        let mut records = Vec::new();

        while let Some(step) = stream.try_next().await.map_err(Self::interpret_error)? {
            if let Either::Right(row) = step {
                records.push(text_row_to_record(&row)?);
            }
        }
        Ok(records)
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>, Error> {
        let rows: Vec<TableColumnsRow> = sqlx::query_as(LIST_TABLES)
            .bind(&self.schema_name)
            .fetch_all(&self.executor)
            .await
            .map_err(Self::interpret_error)?;

        Ok(rows
            .into_iter()
            .map(|row| TableInfo {
                table_name: row.table_name,
                columns: row.columns.0,
            })
            .collect())
    }

    async fn describe_table(&self, table: &TableName) -> Result<TableDescription, Error> {
        let columns: Vec<ColumnMetadata> = sqlx::query_as(DESCRIBE_COLUMNS)
            .bind(table.as_str())
            .bind(&self.schema_name)
            .fetch_all(&self.executor)
            .await
            .map_err(Self::interpret_error)?;

        // Separate autocommitted statement: a concurrent ALTER can make the two disagree
        let rows = self.fetch_records(&statements::select_all(table)).await?;

        Ok(TableDescription { columns, rows })
    }

    async fn list_rows(&self, table: &TableName) -> Result<Vec<Record>, Error> {
        self.fetch_records(&statements::select_all(table)).await
    }

    async fn insert_row(&self, table: &TableName, fields: FieldMap) -> Result<Record, Error> {
        let columns = self.catalog_columns(table).await?;
        let statement = statements::insert(table, &columns, &fields.without_empty())?;

        self.fetch_affected(statement)
            .await?
            .ok_or(Error::NotFound)
    }

    async fn update_row(
        &self,
        table: &TableName,
        id: Option<FieldValue>,
        fields: FieldMap,
    ) -> Result<Record, Error> {
        let id = match id {
            Some(FieldValue::Null) | None => return Err(Error::NotFound),
            Some(id) => id,
        };

        let columns = self.catalog_columns(table).await?;
        let fields = fields.without_empty().without(statements::ID_COLUMN);
        let statement = statements::update(table, &columns, &id, &fields)?;

        self.fetch_affected(statement)
            .await?
            .ok_or(Error::NotFound)
    }

    async fn delete_row(&self, table: &TableName, id: FieldValue) -> Result<Record, Error> {
        let columns = self.catalog_columns(table).await?;
        let statement = statements::delete(table, &columns, &id)?;

        self.fetch_affected(statement)
            .await?
            .ok_or(Error::NotFound)
    }

    async fn create_table(
        &self,
        table_name: &str,
        columns: &[ColumnDefinition],
    ) -> Result<String, Error> {
        let sql = build_create_table(table_name, columns);
        debug!("Creating table {table_name:?}: {sql}");

        self.executor
            .execute(sql.as_str())
            .await
            .map_err(Self::interpret_error)?;
        Ok(sql)
    }

    async fn drop_table(&self, table: &TableName) -> Result<(), Error> {
        self.executor
            .execute(statements::drop_table(table).as_str())
            .await
            .map_err(Self::interpret_error)?;
        Ok(())
    }
}

pub mod testutils {
    use rand::Rng;

    use super::{PoolSettings, PostgresRepository};

    pub fn get_random_schema() -> String {
        // Generate a random schema (taken from IOx)
        let mut rng = rand::thread_rng();
        (&mut rng)
            .sample_iter(rand::distributions::Alphanumeric)
            .filter(|c| c.is_ascii_alphabetic())
            .take(20)
            .map(char::from)
            .collect::<String>()
            .to_lowercase()
    }

    pub async fn make_repository(dsn: &str) -> PostgresRepository {
        let schema_name = get_random_schema();

        PostgresRepository::try_new(dsn, schema_name, PoolSettings::default())
            .await
            .expect("Error setting up the database")
    }
}
