//! Local HTTP server for tests
//!
//! Serves a small signup page for Chrome tests and a fake OpenAI-compatible
//! embeddings API, so nothing depends on external services.
//!
//! Each server instance runs on a random available port for perfect test isolation.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::sync::oneshot;
use warp::http::StatusCode;
use warp::Filter;

/// Bearer token the embeddings endpoint accepts
pub const API_KEY: &str = "test-key";

/// Dimensions of the fake embeddings, one per word
pub const VOCABULARY: &[&str] = &["submit", "button", "email", "input", "home"];

pub const SIGNUP_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <title>Sign up</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
    <div>
        <h1>Create your account</h1>
        <input id="email" type="email">
        <button onclick="document.title = 'Submitted'">Submit</button>
        <p><a href="/">Home</a></p>
    </div>
</body>
</html>"#;

/// Bag-of-words vector over [`VOCABULARY`]
pub fn embed(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    VOCABULARY
        .iter()
        .map(|v| words.iter().filter(|w| *w == v).count() as f32)
        .collect()
}

fn embeddings_reply(authorization: Option<String>, body: Value) -> warp::reply::WithStatus<warp::reply::Json> {
    let expected = format!("Bearer {}", API_KEY);
    if authorization.as_deref() != Some(expected.as_str()) {
        return warp::reply::with_status(
            warp::reply::json(&json!({ "error": { "message": "invalid api key" } })),
            StatusCode::UNAUTHORIZED,
        );
    }

    let inputs: Vec<String> = body["input"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    // reversed, so clients must honour `index`
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .rev()
        .map(|(index, text)| json!({ "object": "embedding", "index": index, "embedding": embed(text) }))
        .collect();

    warp::reply::with_status(
        warp::reply::json(&json!({ "object": "list", "model": body["model"], "data": data })),
        StatusCode::OK,
    )
}

/// Test server that serves the signup page and a fake embeddings API
pub struct TestServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Start a new test server on a random available port
    pub async fn start() -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        // Routes
        let index = warp::get()
            .and(warp::path::end())
            .map(|| warp::reply::html(SIGNUP_HTML));

        let embeddings = warp::post()
            .and(warp::path!("v1" / "embeddings"))
            .and(warp::header::optional::<String>("authorization"))
            .and(warp::body::json())
            .map(embeddings_reply);

        let broken = warp::post()
            .and(warp::path!("broken" / "v1" / "embeddings"))
            .map(|| {
                warp::reply::with_status(
                    warp::reply::json(&json!({ "error": { "message": "model overloaded" } })),
                    StatusCode::INTERNAL_SERVER_ERROR,
                )
            });

        // Always answers with a single embedding
        let short = warp::post()
            .and(warp::path!("short" / "v1" / "embeddings"))
            .map(|| {
                warp::reply::with_status(
                    warp::reply::json(&json!({ "data": [{ "index": 0, "embedding": [1.0, 0.0] }] })),
                    StatusCode::OK,
                )
            });

        let routes = index.or(embeddings).or(broken).or(short);

        // Bind to random port
        let (addr, server) =
            warp::serve(routes).bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async {
                shutdown_rx.await.ok();
            });

        // Spawn server in background
        tokio::spawn(server);

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this server (e.g., "http://127.0.0.1:12345")
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Base URL of the healthy embeddings API
    pub fn embeddings_url(&self) -> String {
        format!("{}/v1", self.url())
    }

    /// Wait for the server to be ready by making a test request
    pub async fn wait_ready(&self) -> anyhow::Result<()> {
        let url = self.url();
        let max_attempts = 10;

        for attempt in 1..=max_attempts {
            match reqwest::get(&url).await {
                Ok(response) if response.status().is_success() => {
                    println!("✅ Test server ready on: {}", url);
                    return Ok(());
                }
                Ok(response) => {
                    println!(
                        "⚠️ Attempt {}: Server returned status {}",
                        attempt,
                        response.status()
                    );
                }
                Err(e) => {
                    println!("⚠️ Attempt {}: Server not ready - {}", attempt, e);
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            }
        }

        anyhow::bail!(
            "Server did not become ready after {} attempts",
            max_attempts
        )
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Signal server to shutdown
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
