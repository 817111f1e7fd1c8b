//! Test doubles shared by unit and integration tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::infrastructure::transcoder::ffmpeg::collect_output;
use crate::infrastructure::transcoder::{HlsOutput, PLAYLIST_NAME, TranscodeError, Transcoder};

enum Behavior {
    Succeed { segments: usize },
    Fail { stderr: String },
}

/// Writes a fake HLS output set instead of running ffmpeg.
#[derive(Clone)]
pub struct MockTranscoder {
    behavior: Arc<Behavior>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockTranscoder {
    pub fn succeeding(segments: usize) -> Self {
        Self::with_behavior(Behavior::Succeed { segments })
    }

    pub fn failing(stderr: &str) -> Self {
        Self::with_behavior(Behavior::Fail {
            stderr: stderr.to_string(),
        })
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior: Arc::new(behavior),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleeps before producing output, to hold the processing window open.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Playlist body referencing `segments` segment files.
    pub fn playlist(segments: usize) -> String {
        let mut body = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n");
        for i in 0..segments {
            body.push_str(&format!("#EXTINF:10.0,\n{}\n", Self::segment_name(i)));
        }
        body.push_str("#EXT-X-ENDLIST\n");
        body
    }

    pub fn segment_name(index: usize) -> String {
        format!("segment_{:03}.ts", index)
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    async fn transcode(&self, input: &Path, output_dir: &Path) -> Result<HlsOutput, TranscodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        // The original must have been staged before we are called
        tokio::fs::metadata(input).await?;

        match self.behavior.as_ref() {
            Behavior::Fail { stderr } => Err(TranscodeError::Failed {
                stderr: stderr.clone(),
            }),
            Behavior::Succeed { segments } => {
                tokio::fs::write(output_dir.join(PLAYLIST_NAME), Self::playlist(*segments)).await?;
                for i in 0..*segments {
                    let body = format!("segment-{}", i);
                    tokio::fs::write(output_dir.join(Self::segment_name(i)), body).await?;
                }
                collect_output(output_dir).await
            }
        }
    }
}
