use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hls_pipeline::app;
use hls_pipeline::config::settings::{AppConfig, StorageBackend};
use hls_pipeline::infrastructure::storage::{BlobStore, InMemoryStore, S3Store};
use hls_pipeline::infrastructure::transcoder::ffmpeg::FfmpegTranscoder;
use hls_pipeline::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting server...");

    let config = AppConfig::new().context("Failed to load configuration")?;

    let store: Arc<dyn BlobStore> = match config.storage_backend {
        StorageBackend::S3 => Arc::new(S3Store::new(&config.s3).await),
        StorageBackend::Memory => {
            info!("Using in-memory storage; objects are lost on restart");
            Arc::new(InMemoryStore::new())
        }
    };
    let transcoder = Arc::new(FfmpegTranscoder::new(
        config.ffmpeg_path.clone(),
        config.hls_segment_seconds,
    ));

    let port = config.server_port;
    info!(
        upload_bucket = %config.upload_bucket,
        output_bucket = config.output_bucket.as_deref().unwrap_or("<unset>"),
        "Storage configured"
    );

    let app = app::create_app(AppState::new(config, store, transcoder));

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
