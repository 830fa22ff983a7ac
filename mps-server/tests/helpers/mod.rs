//! Shared helpers for mps-server integration tests
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use mps_server::cache::{ArtifactStore, InMemoryStore};
use mps_server::clock::MockClock;
use mps_server::config::ServerConfig;
use mps_server::session::SessionId;
use mps_server::source::StaticSource;
use mps_server::{build_router, AppState};

/// Deterministic series with repeated structure, light noise and an outlier
/// bump near the middle.
pub fn test_series(len: usize) -> Vec<f64> {
    let mut state = 0x5eed_u64;
    let mut series: Vec<f64> = (0..len)
        .map(|i| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let noise = ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
            let t = i as f64;
            (t / 11.0).sin() + 0.4 * (t / 37.0).cos() + 0.05 * noise
        })
        .collect();
    let mid = len / 2;
    for k in 0..8.min(len - mid) {
        series[mid + k] += 3.0;
    }
    series
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub clock: Arc<MockClock>,
}

impl TestApp {
    /// Build the full router over `series` with an in-memory store on a mock clock.
    pub fn new(series: Vec<f64>) -> Self {
        Self::with_config(series, |_| {})
    }

    pub fn with_config(series: Vec<f64>, configure: impl FnOnce(&mut ServerConfig)) -> Self {
        let clock = Arc::new(MockClock::new());
        let store: Arc<dyn ArtifactStore> = Arc::new(InMemoryStore::with_clock(clock.clone()));
        Self::with_store(series, store, clock, configure)
    }

    pub fn with_store(
        series: Vec<f64>,
        store: Arc<dyn ArtifactStore>,
        clock: Arc<MockClock>,
        configure: impl FnOnce(&mut ServerConfig),
    ) -> Self {
        let mut config = ServerConfig::default();
        configure(&mut config);
        let state = AppState::new(config, Arc::new(StaticSource::new(series)), store).unwrap();
        let app = build_router(state.clone());
        Self { app, state, clock }
    }

    /// A client that picks up the session cookie from its first response
    pub fn client(&self) -> TestClient {
        TestClient {
            app: self.app.clone(),
            cookie: None,
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|e| panic!("body is not JSON ({e}): {}", String::from_utf8_lossy(&self.body)))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Assert the failure envelope and return its `error` message
    pub fn expect_error(&self, status: StatusCode, cache_expired: bool) -> String {
        assert_eq!(self.status, status, "body: {}", self.text());
        let body = self.json();
        assert_eq!(body["cache_expired"], Value::Bool(cache_expired), "body: {body}");
        body["error"].as_str().expect("error message").to_string()
    }
}

pub struct TestClient {
    app: Router,
    pub cookie: Option<String>,
}

impl TestClient {
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&mut self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(body.to_string())).await
    }

    pub async fn post_raw(&mut self, uri: &str, body: &str) -> TestResponse {
        self.send(Method::POST, uri, Some(body.to_string())).await
    }

    pub async fn delete(&mut self, uri: &str) -> TestResponse {
        self.send(Method::DELETE, uri, None).await
    }

    /// Session the server assigned to this client
    pub fn session(&self) -> SessionId {
        let cookie = self.cookie.as_deref().expect("no session cookie yet");
        let (_, value) = cookie.split_once('=').expect("cookie pair");
        SessionId::parse(value).expect("valid session id")
    }

    async fn send(&mut self, method: Method, uri: &str, body: Option<String>) -> TestResponse {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body)),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        if self.cookie.is_none() {
            self.cookie = session_cookie(&headers);
        }

        TestResponse { status, headers, body }
    }
}

/// `name=value` pair from a `Set-Cookie` header, if any
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|pair| pair.trim().to_string())
}

/// Population mean and standard deviation
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Flatten a JSON array of numbers
pub fn floats(value: &Value) -> Vec<f64> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_f64().expect("number"))
        .collect()
}
