//! HTTP surface: status codes and envelopes.

mod common;

use std::io::Cursor;
use std::time::Duration;

use axum::http::{header, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde_json::json;

use hls_pipeline::config::settings::AppConfig;
use hls_pipeline::infrastructure::storage::BlobStore;
use hls_pipeline::modules::jobs::keys::{self, Marker};
use hls_pipeline::modules::jobs::model::JobKey;
use hls_pipeline::testing::MockTranscoder;

use common::{TestFixture, BACKUP_BUCKET, OUTPUT_BUCKET, UPLOAD_BUCKET};

#[tokio::test]
async fn health_check_responds() {
    let fixture = TestFixture::new();
    let response = fixture.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "success");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let fixture = TestFixture::new();
    let response = fixture.get("/nope").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["message"], "Not Found");
}

#[tokio::test]
async fn upload_stores_original_and_reports_pending() {
    let fixture = TestFixture::new();
    let key = fixture.upload("clip.mp4", b"video").await;

    let parsed = JobKey::parse(&key).unwrap();
    let object = fixture
        .store
        .object(UPLOAD_BUCKET, &keys::original_key(&parsed, "clip.mp4"))
        .unwrap();
    assert_eq!(object.body, Bytes::from_static(b"video"));
    assert_eq!(object.content_type, "video/mp4");
    assert_eq!(fixture.status_of(&key).await, "pending");
}

#[tokio::test]
async fn upload_without_file_is_bad_request() {
    let fixture = TestFixture::new();
    let response = fixture.post("/upload", json!({ "filename": "clip.mp4" })).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "file field is required");
}

#[tokio::test]
async fn upload_rejects_multipart_and_bad_base64() {
    let fixture = TestFixture::new();
    let response = fixture
        .post_with_content_type("/upload", "--boundary--", "multipart/form-data; boundary=boundary")
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Please use base64 encoded file in JSON body");

    let response = fixture.post("/upload", json!({ "file": "***" })).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_accepts_line_wrapped_base64() {
    let fixture = TestFixture::new();
    let content: Vec<u8> = (0..200u8).collect();
    let encoded = STANDARD.encode(&content);
    let wrapped = encoded
        .as_bytes()
        .chunks(76)
        .map(|line| std::str::from_utf8(line).unwrap())
        .collect::<Vec<_>>()
        .join("\r\n");

    let response = fixture
        .post("/upload", json!({ "file": wrapped, "filename": "clip.mp4" }))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let key = JobKey::parse(response.body["data"]["unique_key"].as_str().unwrap()).unwrap();
    let object = fixture
        .store
        .object(UPLOAD_BUCKET, &keys::original_key(&key, "clip.mp4"))
        .unwrap();
    assert_eq!(object.body.to_vec(), content);
}

#[tokio::test]
async fn convert_validates_its_input() {
    let fixture = TestFixture::new();

    let response = fixture.post("/convert", json!({})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "unique_key is required");

    let response = fixture.convert("../escape").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = fixture.convert("20240101000000-deadbeef").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["message"], "Original file not found");
}

#[tokio::test]
async fn convert_without_output_bucket_is_server_error() {
    let fixture = TestFixture::with(AppConfig::in_memory(UPLOAD_BUCKET, None), MockTranscoder::succeeding(1));
    let key = fixture.upload("clip.mp4", b"video").await;

    let response = fixture.convert(&key).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(fixture.status_of(&key).await, "pending");

    let response = fixture
        .post("/convert", json!({ "unique_key": key, "output_bucket": "elsewhere" }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(fixture.store.keys("elsewhere", "converted/").len(), 2);
}

#[tokio::test]
async fn null_backup_override_skips_configured_backup() {
    let mut config = AppConfig::in_memory(UPLOAD_BUCKET, Some(OUTPUT_BUCKET));
    config.backup_bucket = Some(BACKUP_BUCKET.to_string());
    let fixture = TestFixture::with(config, MockTranscoder::succeeding(1));

    let opted_out = fixture.upload("clip.mp4", b"video").await;
    let response = fixture
        .post("/convert", json!({ "unique_key": opted_out, "backup_bucket": null }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["data"].get("backup_location").is_none());
    assert!(fixture.store.keys(BACKUP_BUCKET, "").is_empty());

    let backed_up = fixture.upload("clip.mp4", b"video").await;
    let response = fixture.convert(&backed_up).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["data"]["backup_location"].is_string());
    assert_eq!(
        fixture
            .store
            .keys(BACKUP_BUCKET, &format!("backup/{}/", backed_up))
            .len(),
        2
    );
}

#[tokio::test]
async fn convert_then_convert_again() {
    let fixture = TestFixture::new();
    let key = fixture.upload("clip.mp4", b"video").await;

    let response = fixture.convert(&key).await;
    assert_eq!(response.status, StatusCode::OK);
    let data = &response.body["data"];
    assert_eq!(data["status"], "completed");
    assert_eq!(data["files_count"], 4);
    assert_eq!(data["output_location"], format!("s3://{}/converted/{}/", OUTPUT_BUCKET, key));
    assert!(data["playlist_url"].as_str().unwrap().ends_with("playlist.m3u8"));

    let response = fixture.convert(&key).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "completed");
    assert_eq!(response.body["data"]["files_count"], 4);
    assert_eq!(fixture.transcoder.calls(), 1);
}

#[tokio::test]
async fn convert_while_processing_is_accepted() {
    let fixture = TestFixture::new();
    let key = fixture.upload("clip.mp4", b"video").await;
    let parsed = JobKey::parse(&key).unwrap();
    fixture
        .store
        .put(
            UPLOAD_BUCKET,
            &keys::marker_key(&parsed, Marker::Processing),
            Bytes::from_static(b"{}"),
            "application/json",
        )
        .await
        .unwrap();

    let response = fixture.convert(&key).await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["data"]["status"], "processing");
    assert_eq!(fixture.transcoder.calls(), 0);

    let response = fixture.get(&format!("/download/{}", key)).await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["data"]["status"], "processing");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parallel_convert_requests_transcode_once() {
    let fixture = TestFixture::with_transcoder(
        MockTranscoder::succeeding(1).with_delay(Duration::from_millis(200)),
    );
    let key = fixture.upload("clip.mp4", b"video").await;

    let (a, b) = tokio::join!(fixture.convert(&key), fixture.convert(&key));
    let mut codes = vec![a.status, b.status];
    codes.sort();
    assert!(
        codes == vec![StatusCode::OK, StatusCode::OK] || codes == vec![StatusCode::OK, StatusCode::ACCEPTED],
        "unexpected status codes {:?}",
        codes
    );
    assert_eq!(fixture.transcoder.calls(), 1);
}

#[tokio::test]
async fn download_returns_zip_of_converted_output() {
    let fixture = TestFixture::new();
    let key = fixture.upload("clip.mp4", b"video").await;
    fixture.convert(&key).await;

    let response = fixture.get(&format!("/download/{}", key)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{}.zip\"", key).as_str()
    );

    let zip = zip::ZipArchive::new(Cursor::new(response.bytes.to_vec())).unwrap();
    let mut names: Vec<&str> = zip.file_names().collect();
    names.sort();
    assert_eq!(
        names,
        vec!["playlist.m3u8", "segment_000.ts", "segment_001.ts", "segment_002.ts"]
    );
}

#[tokio::test]
async fn download_maps_job_state_to_status_codes() {
    let fixture = TestFixture::with_transcoder(MockTranscoder::failing("moov atom not found"));

    let response = fixture.get("/download/20240101000000-deadbeef").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let key = fixture.upload("clip.mp4", b"video").await;
    let response = fixture.get(&format!("/download/{}", key)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["data"]["status"], "pending");

    let response = fixture.convert(&key).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["message"]
        .as_str()
        .unwrap()
        .contains("moov atom not found"));

    let response = fixture.get(&format!("/download/{}", key)).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["data"]["status"], "error");
    assert!(response.body["data"]["error_details"]["error"]
        .as_str()
        .unwrap()
        .contains("moov atom not found"));
}

#[tokio::test]
async fn status_endpoint_reports_error_details() {
    let fixture = TestFixture::with_transcoder(MockTranscoder::failing("bad input"));
    let key = fixture.upload("clip.mp4", b"video").await;
    fixture.convert(&key).await;

    let response = fixture.get(&format!("/status/{}", key)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "error");
    assert_eq!(
        response.body["data"]["error_details"]["error"],
        "FFmpeg conversion failed: bad input"
    );

    let response = fixture.get("/status/20240101000000-deadbeef").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "not_found");
}
