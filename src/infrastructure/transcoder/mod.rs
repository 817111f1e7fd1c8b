//! Transcoder adapter: local input file in, HLS output set out.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub mod ffmpeg;

pub use ffmpeg::FfmpegTranscoder;

pub const PLAYLIST_NAME: &str = "playlist.m3u8";

#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The transcoder binary could not be started.
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exited nonzero. The whole output set is discarded.
    #[error("FFmpeg conversion failed: {stderr}")]
    Failed { stderr: String },

    /// Exit status was zero but no playlist was written.
    #[error("Transcoder produced no playlist in {0}")]
    MissingPlaylist(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Files produced by one successful run.
#[derive(Debug, Clone)]
pub struct HlsOutput {
    pub playlist: PathBuf,
    pub segments: Vec<PathBuf>,
}

impl HlsOutput {
    pub fn file_count(&self) -> usize {
        self.segments.len() + 1
    }
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Converts `input` into a playlist plus segments inside `output_dir`.
    ///
    /// All-or-nothing: on `Err` nothing in `output_dir` may be used.
    async fn transcode(&self, input: &Path, output_dir: &Path) -> Result<HlsOutput, TranscodeError>;
}
