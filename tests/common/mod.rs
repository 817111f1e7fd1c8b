//! In-process test fixture.
//!
//! Builds the full router over an in-memory blob store and a mock transcoder,
//! so HTTP tests run without S3 or ffmpeg.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use hls_pipeline::app::create_app;
use hls_pipeline::config::settings::AppConfig;
use hls_pipeline::infrastructure::storage::InMemoryStore;
use hls_pipeline::state::AppState;
use hls_pipeline::testing::MockTranscoder;

pub const UPLOAD_BUCKET: &str = "uploads";
pub const OUTPUT_BUCKET: &str = "converted";
pub const BACKUP_BUCKET: &str = "backups";

pub struct TestFixture {
    pub router: Router,
    /// Shared with the router; inspect or sabotage it directly.
    pub store: InMemoryStore,
    pub transcoder: MockTranscoder,
    pub config: AppConfig,
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Bytes,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with(
            AppConfig::in_memory(UPLOAD_BUCKET, Some(OUTPUT_BUCKET)),
            MockTranscoder::succeeding(3),
        )
    }

    pub fn with_transcoder(transcoder: MockTranscoder) -> Self {
        Self::with(AppConfig::in_memory(UPLOAD_BUCKET, Some(OUTPUT_BUCKET)), transcoder)
    }

    pub fn with(config: AppConfig, transcoder: MockTranscoder) -> Self {
        let store = InMemoryStore::new();
        let state = AppState::new(
            config.clone(),
            Arc::new(store.clone()),
            Arc::new(transcoder.clone()),
        );
        Self {
            router: create_app(state),
            store,
            transcoder,
            config,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.post_with_content_type(path, &body.to_string(), "application/json")
            .await
    }

    pub async fn post_with_content_type(
        &self,
        path: &str,
        body: &str,
        content_type: &str,
    ) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            bytes,
            body,
        }
    }

    /// Uploads `content` and returns the new unique key.
    pub async fn upload(&self, filename: &str, content: &[u8]) -> String {
        let response = self
            .post(
                "/upload",
                json!({ "file": STANDARD.encode(content), "filename": filename }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "upload failed: {:?}", response.body);
        response.body["data"]["unique_key"]
            .as_str()
            .expect("unique_key in upload response")
            .to_string()
    }

    pub async fn convert(&self, unique_key: &str) -> TestResponse {
        self.post("/convert", json!({ "unique_key": unique_key })).await
    }

    pub async fn status_of(&self, unique_key: &str) -> String {
        let response = self.get(&format!("/status/{}", unique_key)).await;
        response.body["data"]["status"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }
}
