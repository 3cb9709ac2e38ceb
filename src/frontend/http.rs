use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use warp::hyper::body::Bytes;
use warp::hyper::{Body, Response};
use warp::{Filter, Reply};

use crate::{
    config::schema::HttpFrontend,
    context::PlaygroundContext,
    data_types::FieldValue,
    identifier::TableName,
    schema::ColumnDefinition,
};

use super::http_utils::{handle_rejection, into_response, ApiError};

#[derive(Debug, Deserialize)]
struct QueryBody {
    query: String,
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTableBody {
    table_name: String,
    columns: Vec<ColumnDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteTableBody {
    table_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("Error parsing the listen address {address:?}: {source}")]
    Address {
        address: String,
        source: AddrParseError,
    },

    #[error(transparent)]
    Bind(#[from] warp::Error),
}

// Bodies are read as raw bytes and parsed in the handler, so that a malformed body on
// a matched route is answered with a JSON 400 instead of falling through to other routes
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(ApiError::invalid_body)
}

fn table_from_path(raw: &str) -> TableName {
    TableName::sanitized(&percent_decode_str(raw).decode_utf8_lossy())
}

fn with_context(
    context: Arc<PlaygroundContext>,
) -> impl Filter<Extract = (Arc<PlaygroundContext>,), Error = Infallible> + Clone {
    warp::any().map(move || context.clone())
}

fn body_bytes(
    max_length: u64,
) -> impl Filter<Extract = (Bytes,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(max_length).and(warp::body::bytes())
}

/// POST /db/init
pub async fn init_database(
    context: Arc<PlaygroundContext>,
) -> Result<Response<Body>, ApiError> {
    context
        .repository
        .setup()
        .await
        .map_err(|e| ApiError::from_repository("Failed to initialize database", e))?;

    info!("Database initialized");
    Ok(warp::reply::json(&json!({"message": "Database initialized successfully"})).into_response())
}

/// POST /db/query
pub async fn execute_query(
    body: Bytes,
    context: Arc<PlaygroundContext>,
) -> Result<Response<Body>, ApiError> {
    let QueryBody { query } = parse_body(&body)?;
    debug!("Executing raw query: {query:?}");

    let results = context
        .repository
        .execute_query(&query)
        .await
        .map_err(|e| ApiError::from_repository("Failed to execute query", e))?;
    Ok(warp::reply::json(&json!({ "results": results })).into_response())
}

/// POST /db/natural-query
pub async fn natural_query(
    body: Bytes,
    context: Arc<PlaygroundContext>,
) -> Result<Response<Body>, ApiError> {
    let QueryBody { query } = parse_body(&body)?;

    let sql = context
        .translate_question(&query)
        .await
        .map_err(ApiError::from_translation)?;
    Ok(warp::reply::json(&json!({ "sql": sql })).into_response())
}

/// GET /db/tables
pub async fn list_tables(context: Arc<PlaygroundContext>) -> Result<Response<Body>, ApiError> {
    let tables = context
        .repository
        .list_tables()
        .await
        .map_err(|e| ApiError::from_repository("Failed to fetch database tables", e))?;
    Ok(warp::reply::json(&json!({ "tables": tables })).into_response())
}

/// GET /db/tables/:name
pub async fn table_data(
    name: String,
    context: Arc<PlaygroundContext>,
) -> Result<Response<Body>, ApiError> {
    let table = table_from_path(&name);

    let description = context
        .repository
        .describe_table(&table)
        .await
        .map_err(|e| ApiError::from_repository("Failed to fetch table data", e))?;
    Ok(warp::reply::json(&json!({
        "data": description.rows,
        "columns": description.columns,
    }))
    .into_response())
}

/// POST /db/tables/:name
pub async fn insert_row(
    name: String,
    body: Bytes,
    context: Arc<PlaygroundContext>,
) -> Result<Response<Body>, ApiError> {
    let table = table_from_path(&name);
    let fields: Map<String, Value> = parse_body(&body)?;

    let row = context
        .repository
        .insert_row(&table, fields.into())
        .await
        .map_err(|e| ApiError::from_repository("Failed to insert data", e))?;
    Ok(warp::reply::json(&json!({ "data": row })).into_response())
}

/// PUT /db/tables/:name
pub async fn update_row(
    name: String,
    body: Bytes,
    context: Arc<PlaygroundContext>,
) -> Result<Response<Body>, ApiError> {
    let table = table_from_path(&name);
    let UpdateBody { id, data } = parse_body(&body)?;

    let row = context
        .repository
        .update_row(&table, id.map(FieldValue::from), data.into())
        .await
        .map_err(|e| ApiError::from_repository("Failed to update data", e))?;
    Ok(warp::reply::json(&json!({ "data": row })).into_response())
}

/// DELETE /db/tables/:name?id=...
pub async fn delete_row(
    name: String,
    params: HashMap<String, String>,
    context: Arc<PlaygroundContext>,
) -> Result<Response<Body>, ApiError> {
    let table = table_from_path(&name);
    let id = match params.get("id") {
        Some(id) if !id.is_empty() => FieldValue::from(id.as_str()),
        _ => return Err(ApiError::bad_request("ID is required")),
    };

    let row = context
        .repository
        .delete_row(&table, id)
        .await
        .map_err(|e| ApiError::from_repository("Failed to delete data", e))?;
    Ok(warp::reply::json(&json!({ "data": row })).into_response())
}

/// POST /db/tables/create
pub async fn create_table(
    body: Bytes,
    context: Arc<PlaygroundContext>,
) -> Result<Response<Body>, ApiError> {
    let CreateTableBody {
        table_name,
        columns,
    } = parse_body(&body)?;

    let query = context
        .repository
        .create_table(&table_name, &columns)
        .await
        .map_err(|e| ApiError::from_repository("Failed to create table", e))?;

    debug!("Created table {table_name:?}: {query}");
    Ok(warp::reply::json(&json!({
        "message": "Table created successfully",
        "query": query,
    }))
    .into_response())
}

/// POST /db/tables/delete
pub async fn delete_table(
    body: Bytes,
    context: Arc<PlaygroundContext>,
) -> Result<Response<Body>, ApiError> {
    let DeleteTableBody { table_name } = parse_body(&body)?;

    context
        .repository
        .drop_table(&TableName::sanitized(&table_name))
        .await
        .map_err(|e| ApiError::from_repository("Failed to delete table", e))?;

    info!("Dropped table {table_name:?}");
    Ok(warp::reply::json(&json!({
        "message": format!("Table {table_name} deleted successfully")
    }))
    .into_response())
}

pub fn filters(
    context: Arc<PlaygroundContext>,
    config: HttpFrontend,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let mut cors = warp::cors()
        .allow_headers(vec!["Content-Type"])
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"]);
    if config.cors_allow_any_origin {
        cors = cors.allow_any_origin();
    }

    let ctx = with_context(context);
    let body = body_bytes(config.body_max_length);

    let init_route = warp::path!("db" / "init")
        .and(warp::post())
        .and(ctx.clone())
        .then(init_database)
        .map(into_response);

    let query_route = warp::path!("db" / "query")
        .and(warp::post())
        .and(body.clone())
        .and(ctx.clone())
        .then(execute_query)
        .map(into_response);

    let natural_query_route = warp::path!("db" / "natural-query")
        .and(warp::post())
        .and(body.clone())
        .and(ctx.clone())
        .then(natural_query)
        .map(into_response);

    let list_tables_route = warp::path!("db" / "tables")
        .and(warp::get())
        .and(ctx.clone())
        .then(list_tables)
        .map(into_response);

    // The two fixed paths need to come before /db/tables/:name
    let create_table_route = warp::path!("db" / "tables" / "create")
        .and(warp::post())
        .and(body.clone())
        .and(ctx.clone())
        .then(create_table)
        .map(into_response);

    let delete_table_route = warp::path!("db" / "tables" / "delete")
        .and(warp::post())
        .and(body.clone())
        .and(ctx.clone())
        .then(delete_table)
        .map(into_response);

    let table_data_route = warp::path!("db" / "tables" / String)
        .and(warp::get())
        .and(ctx.clone())
        .then(table_data)
        .map(into_response);

    let insert_route = warp::path!("db" / "tables" / String)
        .and(warp::post())
        .and(body.clone())
        .and(ctx.clone())
        .then(insert_row)
        .map(into_response);

    let update_route = warp::path!("db" / "tables" / String)
        .and(warp::put())
        .and(body)
        .and(ctx.clone())
        .then(update_row)
        .map(into_response);

    let delete_row_route = warp::path!("db" / "tables" / String)
        .and(warp::delete())
        .and(warp::query::<HashMap<String, String>>())
        .and(ctx)
        .then(delete_row)
        .map(into_response);

    init_route
        .or(query_route)
        .or(natural_query_route)
        .or(list_tables_route)
        .or(create_table_route)
        .or(delete_table_route)
        .or(table_data_route)
        .or(insert_route)
        .or(update_route)
        .or(delete_row_route)
        .with(cors)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

pub async fn run_server(
    context: Arc<PlaygroundContext>,
    config: HttpFrontend,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServeError> {
    let address = format!("{}:{}", config.bind_host, config.bind_port);
    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|source| ServeError::Address { address, source })?;

    let filters = filters(context, config);
    let (bound, server) =
        warp::serve(filters).try_bind_with_graceful_shutdown(socket_addr, shutdown)?;

    info!("Starting the HTTP frontend on {bound}");
    server.await;
    info!("HTTP frontend stopped");
    Ok(())
}
