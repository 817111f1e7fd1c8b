use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info};

use super::{HlsOutput, PLAYLIST_NAME, TranscodeError, Transcoder};

const SEGMENT_PATTERN: &str = "segment_%03d.ts";

pub struct FfmpegTranscoder {
    program: String,
    segment_seconds: u32,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>, segment_seconds: u32) -> Self {
        Self {
            program: program.into(),
            segment_seconds,
        }
    }

    fn build_args(&self, input: &Path, output_dir: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-hls_time".to_string(),
            self.segment_seconds.to_string(),
            // Keep every segment in the playlist (VOD)
            "-hls_list_size".to_string(),
            "0".to_string(),
            "-hls_segment_filename".to_string(),
            output_dir.join(SEGMENT_PATTERN).to_string_lossy().to_string(),
            "-f".to_string(),
            "hls".to_string(),
            output_dir.join(PLAYLIST_NAME).to_string_lossy().to_string(),
        ]
    }
}

/// Reads back what ffmpeg wrote: the playlist and the `.ts` segments, sorted.
pub(crate) async fn collect_output(output_dir: &Path) -> Result<HlsOutput, TranscodeError> {
    let playlist = output_dir.join(PLAYLIST_NAME);
    if !tokio::fs::try_exists(&playlist).await? {
        return Err(TranscodeError::MissingPlaylist(output_dir.to_path_buf()));
    }

    let mut segments: Vec<PathBuf> = Vec::new();
    let mut entries = tokio::fs::read_dir(output_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "ts") {
            segments.push(path);
        }
    }
    segments.sort();

    Ok(HlsOutput { playlist, segments })
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output_dir: &Path) -> Result<HlsOutput, TranscodeError> {
        let args = self.build_args(input, output_dir);
        info!(program = %self.program, input = %input.display(), "Starting HLS transcode");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| TranscodeError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(status = ?output.status.code(), "FFmpeg exited with failure");
            return Err(TranscodeError::Failed { stderr });
        }

        let result = collect_output(output_dir).await?;
        info!(segments = result.segments.len(), "HLS transcode finished");
        Ok(result)
    }
}
