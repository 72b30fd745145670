//! Integration tests for the RocketShoes cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p rocketshoes-integration-tests
//! ```
//!
//! The tests start an in-process fake of the inventory API on an ephemeral
//! port, so no external services are required.
//!
//! # Test Categories
//!
//! - `http_inventory` - HTTP client status/body handling and caching
//! - `cart_end_to_end` - cart store over HTTP inventory and file storage

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rocketshoes_cart::Notifier;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

// =============================================================================
// Fake inventory server
// =============================================================================

/// A canned response returned instead of the normal handler.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: StatusCode,
    pub body: String,
    pub retry_after: Option<u64>,
}

#[derive(Default)]
struct ServerState {
    stock: Mutex<HashMap<i32, i64>>,
    products: Mutex<HashMap<i32, Value>>,
    canned: Mutex<HashMap<String, CannedResponse>>,
    hits: Mutex<HashMap<String, usize>>,
    bearer_token: Option<String>,
    requests: AtomicUsize,
}

impl ServerState {
    fn record(&self, path: &str) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self
            .hits
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default() += 1;
    }

    /// Short-circuit with an auth failure or canned response, if one applies.
    fn intercept(&self, path: &str, headers: &HeaderMap) -> Option<Response> {
        if let Some(token) = &self.bearer_token {
            let expected = format!("Bearer {token}");
            let authorized = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == expected);
            if !authorized {
                return Some((StatusCode::UNAUTHORIZED, "missing token").into_response());
            }
        }

        let canned = self.canned.lock().unwrap().get(path).cloned()?;
        let mut response = (canned.status, canned.body).into_response();
        if let Some(seconds) = canned.retry_after {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from_str(&seconds.to_string()).unwrap(),
            );
        }
        Some(response)
    }
}

/// In-process fake of the inventory/catalog API.
///
/// Serves `GET /stock/{id}` and `GET /products/{id}` from in-memory tables.
pub struct FakeInventoryServer {
    base_url: String,
    state: Arc<ServerState>,
    handle: JoinHandle<()>,
}

impl FakeInventoryServer {
    /// Start a server with the storefront's demo catalog and no stock.
    pub async fn start() -> Self {
        Self::start_with_token(None).await
    }

    /// Start a server that rejects requests without `Bearer {token}`.
    pub async fn start_with_token(token: Option<&str>) -> Self {
        let state = Arc::new(ServerState {
            bearer_token: token.map(String::from),
            ..ServerState::default()
        });

        for product in demo_catalog() {
            let id = i32::try_from(product["id"].as_i64().unwrap()).unwrap();
            state.products.lock().unwrap().insert(id, product);
        }

        let app = Router::new()
            .route("/stock/{id}", get(stock_handler))
            .route("/products/{id}", get(product_handler))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake inventory server");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Fake inventory server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    /// Base URL to configure the cart with.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set the stock level reported for `id`.
    pub fn set_stock(&self, id: i32, amount: i64) {
        self.state.stock.lock().unwrap().insert(id, amount);
    }

    /// Replace the response for `path` (e.g. `stock/1`).
    pub fn respond_with(&self, path: &str, response: CannedResponse) {
        self.state
            .canned
            .lock()
            .unwrap()
            .insert(path.to_string(), response);
    }

    /// Number of requests received for `path` (e.g. `products/1`).
    #[must_use]
    pub fn hits(&self, path: &str) -> usize {
        self.state
            .hits
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// Number of requests received in total.
    #[must_use]
    pub fn total_requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }
}

impl Drop for FakeInventoryServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn stock_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Response {
    let path = format!("stock/{id}");
    state.record(&path);
    if let Some(response) = state.intercept(&path, &headers) {
        return response;
    }

    let amount = state.stock.lock().unwrap().get(&id).copied();
    match amount {
        Some(amount) => Json(json!({ "id": id, "amount": amount })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn product_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Response {
    let path = format!("products/{id}");
    state.record(&path);
    if let Some(response) = state.intercept(&path, &headers) {
        return response;
    }

    let product = state.products.lock().unwrap().get(&id).cloned();
    match product {
        Some(product) => Json(product).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// The storefront's demo catalog.
#[must_use]
pub fn demo_catalog() -> Vec<Value> {
    vec![
        json!({
            "id": 1,
            "title": "Tênis de Caminhada Leve Confortável",
            "price": 179.9,
            "image": "https://rocketseat-cdn.s3-sa-east-1.amazonaws.com/modulo-redux/tenis1.jpg"
        }),
        json!({
            "id": 2,
            "title": "Tênis VR Caminhada Confortável Detalhes Couro Masculino",
            "price": 139.9,
            "image": "https://rocketseat-cdn.s3-sa-east-1.amazonaws.com/modulo-redux/tenis2.jpg"
        }),
        json!({
            "id": 3,
            "title": "Tênis Adidas Duramo Lite 2.0",
            "price": 219.9,
            "image": "https://rocketseat-cdn.s3-sa-east-1.amazonaws.com/modulo-redux/tenis3.jpg"
        }),
    ]
}

// =============================================================================
// Helpers
// =============================================================================

/// Notifier that records every message it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    /// Messages received so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_error(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// A fresh, not-yet-existing file path for a storage file.
#[must_use]
pub fn temp_cart_file(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "rocketshoes-it-{}-{name}.json",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}
