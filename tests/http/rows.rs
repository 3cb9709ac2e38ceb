use serde_json::json;
use warp::hyper::StatusCode;

use super::TestServer;

#[tokio::test]
async fn test_init_and_row_lifecycle() {
    let server = match TestServer::start().await {
        Some(server) => server,
        None => return,
    };

    let (status, body) = server.post("/db/init", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Database initialized successfully"}));

    // Running it twice is fine
    let (status, _) = server.post("/db/init", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server.get("/db/tables").await;
    assert_eq!(status, StatusCode::OK);
    let tables = body["tables"].as_array().unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0]["table_name"], "users");
    assert!(tables[0]["columns"]
        .as_array()
        .unwrap()
        .contains(&json!({"name": "id", "type": "integer"})));

    // Insert: empty strings are left out, the engine fills in the rest
    let (status, body) = server
        .post(
            "/db/tables/users",
            json!({"name": "Ada", "email": "ada@example.com", "created_at": ""}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["data"]["id"].clone();
    assert_eq!(id, json!(1));
    assert_eq!(body["data"]["name"], "Ada");
    assert!(body["data"]["created_at"].is_string());

    // Unique email
    let (status, body) = server
        .post(
            "/db/tables/users",
            json!({"name": "Ada again", "email": "ada@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to insert data");
    assert!(body["details"].as_str().unwrap().contains("duplicate key"));

    // NOT NULL name
    let (status, body) = server
        .post("/db/tables/users", json!({"email": "grace@example.com"}))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["details"].as_str().unwrap().contains("null value"));

    // Update never touches id
    let (status, body) = server
        .put(
            "/db/tables/users",
            json!({"id": id, "data": {"id": 100, "name": "Ada Lovelace", "email": ""}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], json!(1));
    assert_eq!(body["data"]["name"], "Ada Lovelace");
    assert_eq!(body["data"]["email"], "ada@example.com");

    let (status, body) = server
        .put("/db/tables/users", json!({"id": 42, "data": {"name": "Nobody"}}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Record not found"}));

    // Table data with column metadata
    let (status, body) = server.get("/db/tables/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["columns"][0]["column_name"], "id");
    assert_eq!(body["columns"][0]["is_nullable"], "NO");
    assert!(body["columns"][0]["column_default"]
        .as_str()
        .unwrap()
        .starts_with("nextval("));

    // Raw SQL, several statements
    let (status, body) = server
        .post(
            "/db/query",
            json!({"query": "SELECT name FROM users; SELECT count(*) AS c, true AS b FROM users"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"results": [{"name": "Ada Lovelace"}, {"c": 1, "b": true}]})
    );

    let (status, body) = server.post("/db/query", json!({"query": "SELEC 1"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to execute query");

    // Delete
    let (status, body) = server.delete("/db/tables/users?id=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ada Lovelace");

    let (status, _) = server.delete("/db/tables/users?id=1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server.delete("/db/tables/users").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "ID is required"}));

    server.stop().await;
}

#[tokio::test]
async fn test_natural_query_without_api_key() {
    let server = match TestServer::start().await {
        Some(server) => server,
        None => return,
    };

    let (status, body) = server
        .post("/db/natural-query", json!({"query": "how many users are there"}))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to generate SQL query");
    assert_eq!(body["details"], "Language model API key is not configured");

    server.stop().await;
}
