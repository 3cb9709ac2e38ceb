use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::sync::oneshot::Sender;
use tokio::task::JoinHandle;
use warp::hyper::body::to_bytes;
use warp::hyper::client::HttpConnector;
use warp::hyper::{Body, Client, Method, Request, StatusCode};

use tidepool::config::context::build_context;
use tidepool::frontend::http::filters;

use crate::test_config;

mod rows;
mod tables;

/// A server listening on a random free port against the test database, in its own schema
struct TestServer {
    addr: SocketAddr,
    client: Client<HttpConnector>,
    terminate: Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Option<Self> {
        let config = test_config()?;
        let context = build_context(&config)
            .await
            .expect("Error connecting to the test database");

        let filters = filters(Arc::new(context), config.frontend.http.clone());
        let (tx, rx) = oneshot::channel();
        let (addr, server) = warp::serve(filters).bind_with_graceful_shutdown(
            // Pass port :0 to pick a random free port
            "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
            async {
                rx.await.ok();
            },
        );

        Some(Self {
            addr,
            client: Client::new(),
            terminate: tx,
            handle: tokio::task::spawn(server),
        })
    }

    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(format!("http://{}{}", self.addr, path))
            .header("content-type", "application/json");
        let body = match body {
            Some(body) => Body::from(serde_json::to_vec(&body).unwrap()),
            None => Body::empty(),
        };

        let resp = self
            .client
            .request(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, path, None).await
    }

    async fn stop(self) {
        self.terminate.send(()).unwrap();
        self.handle.await.unwrap();
    }
}
