//! Statement builders for row operations.
//!
//! Only the sanitized table name and catalog-validated column names are written into
//! the SQL text. Every value is a bound text parameter, cast to the column's catalog type.
//! JSON arrays bound to array columns are written as array literals.
//! Returned rows are projected through `row_to_json` so they come back as JSON objects.

use itertools::Itertools;

use super::interface::{Error, Result};
use crate::data_types::{FieldMap, FieldValue};
use crate::identifier::{quote_identifier, TableName};
use crate::schema::CatalogColumn;

pub const ID_COLUMN: &str = "id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

fn column_type<'a>(
    table: &TableName,
    columns: &'a [CatalogColumn],
    name: &str,
) -> Result<&'a str> {
    columns
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.sql_type.as_str())
        .ok_or_else(|| Error::UnknownColumn {
            table: table.to_string(),
            column: name.to_string(),
        })
}

fn cast_placeholder(position: usize, sql_type: &str) -> String {
    format!("CAST(${position} AS {sql_type})")
}

fn returning_json(modifying: String) -> String {
    format!(
        "WITH affected AS (\n{modifying}\nRETURNING *\n)\nSELECT row_to_json(affected) AS record FROM affected"
    )
}

pub fn select_all(table: &TableName) -> String {
    format!(
        "SELECT row_to_json(t) AS record FROM {} t",
        table.quoted()
    )
}

pub fn insert(
    table: &TableName,
    columns: &[CatalogColumn],
    fields: &FieldMap,
) -> Result<Statement> {
    if fields.is_empty() {
        return Ok(Statement {
            sql: returning_json(format!("INSERT INTO {} DEFAULT VALUES", table.quoted())),
            params: vec![],
        });
    }

    let mut names = Vec::with_capacity(fields.len());
    let mut placeholders = Vec::with_capacity(fields.len());
    let mut params = Vec::with_capacity(fields.len());

    for (position, (name, value)) in fields.iter().enumerate() {
        let sql_type = column_type(table, columns, name)?;
        names.push(quote_identifier(name));
        placeholders.push(cast_placeholder(position + 1, sql_type));
        params.push(value.to_parameter_for(sql_type));
    }

    Ok(Statement {
        sql: returning_json(format!(
            "INSERT INTO {} ({})\nVALUES ({})",
            table.quoted(),
            names.join(", "),
            placeholders.join(", ")
        )),
        params,
    })
}

/// `fields` must already have `id` and empty strings removed.
pub fn update(
    table: &TableName,
    columns: &[CatalogColumn],
    id: &FieldValue,
    fields: &FieldMap,
) -> Result<Statement> {
    if fields.is_empty() {
        return Err(Error::Validation("No fields to update".to_string()));
    }

    let id_type = column_type(table, columns, ID_COLUMN)?;
    let mut params = vec![id.to_parameter()];
    let mut assignments = Vec::with_capacity(fields.len());

    for (position, (name, value)) in fields.iter().enumerate() {
        let sql_type = column_type(table, columns, name)?;
        // $1 is the row id
        assignments.push(format!(
            "{} = {}",
            quote_identifier(name),
            cast_placeholder(position + 2, sql_type)
        ));
        params.push(value.to_parameter_for(sql_type));
    }

    Ok(Statement {
        sql: returning_json(format!(
            "UPDATE {}\nSET {}\nWHERE {} = {}",
            table.quoted(),
            assignments.iter().join(", "),
            quote_identifier(ID_COLUMN),
            cast_placeholder(1, id_type)
        )),
        params,
    })
}

pub fn delete(table: &TableName, columns: &[CatalogColumn], id: &FieldValue) -> Result<Statement> {
    let id_type = column_type(table, columns, ID_COLUMN)?;

    Ok(Statement {
        sql: returning_json(format!(
            "DELETE FROM {}\nWHERE {} = {}",
            table.quoted(),
            quote_identifier(ID_COLUMN),
            cast_placeholder(1, id_type)
        )),
        params: vec![id.to_parameter()],
    })
}

pub fn drop_table(table: &TableName) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE;", table.quoted())
}
