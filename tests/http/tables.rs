use serde_json::json;
use warp::hyper::StatusCode;

use super::TestServer;

#[tokio::test]
async fn test_create_and_drop_tables() {
    let server = match TestServer::start().await {
        Some(server) => server,
        None => return,
    };

    let (status, _) = server.post("/db/init", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server
        .post(
            "/db/tables/create",
            json!({
                "tableName": "posts",
                "columns": [
                    {"name": "id", "type": "SERIAL", "isPrimaryKey": true, "isNullable": false},
                    {"name": "title", "type": "VARCHAR", "isNullable": false},
                    {"name": "metadata", "type": "JSONB", "hasDefault": true, "defaultValue": "{\"draft\": true}"},
                    {"name": "published_at", "type": "TIMESTAMP", "hasDefault": true},
                    {
                        "name": "author_id",
                        "type": "INTEGER",
                        "isForeignKey": true,
                        "referenceTable": "users",
                        "referenceColumn": "id",
                        "onDelete": "CASCADE"
                    }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Table created successfully");
    assert!(body["query"]
        .as_str()
        .unwrap()
        .contains("FOREIGN KEY (\"author_id\") REFERENCES \"users\"(\"id\") ON DELETE CASCADE"));

    let (_, body) = server.get("/db/tables").await;
    let mut names: Vec<_> = body["tables"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["table_name"].as_str().unwrap().to_string())
        .collect();
    // Table order is up to the engine
    names.sort();
    assert_eq!(names, vec!["posts", "users"]);

    let (status, user) = server
        .post(
            "/db/tables/users",
            json!({"name": "Ada", "email": "ada@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Defaults apply, structured values land in JSONB as-is
    let (status, body) = server
        .post(
            "/db/tables/posts",
            json!({"title": "Notes", "author_id": user["data"]["id"]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["metadata"], json!({"draft": true}));
    assert!(body["data"]["published_at"].is_string());

    let (status, body) = server
        .put(
            "/db/tables/posts",
            json!({"id": body["data"]["id"], "data": {"metadata": {"tags": ["a", "b"]}}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["metadata"], json!({"tags": ["a", "b"]}));

    // Dangling foreign key
    let (status, body) = server
        .post("/db/tables/posts", json!({"title": "Orphan", "author_id": 999}))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("foreign key constraint"));

    // Unknown columns never reach the database
    let (status, body) = server
        .post("/db/tables/posts", json!({"title": "Typo", "auhtor_id": 1}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Failed to insert data");

    // Deleting the user cascades to their posts
    let (status, _) = server.delete("/db/tables/users?id=1").await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = server.get("/db/tables/posts").await;
    assert_eq!(body["data"], json!([]));

    let (status, body) = server
        .post("/db/tables/delete", json!({"tableName": "posts"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Table posts deleted successfully"}));

    let (status, body) = server.get("/db/tables/posts").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to fetch table data");

    server.stop().await;
}
