//! Object layout for a job.
//!
//! ```text
//! uploads/{key}/original_{filename}     upload bucket
//! uploads/{key}/{marker}.txt            upload bucket
//! uploads/{key}/converted/*             upload bucket (primary copy)
//! converted/{key}/*                     output bucket
//! backup/{key}/{timestamp}_{stem}/*     backup bucket
//! ```

use std::path::Path;

use time::OffsetDateTime;

use super::model::JobKey;

pub const DEFAULT_FILENAME: &str = "video.mp4";
const ORIGINAL_PREFIX: &str = "original_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Processing,
    Completed,
    Error,
}

impl Marker {
    pub fn file_name(&self) -> &'static str {
        match self {
            Marker::Processing => "processing.txt",
            Marker::Completed => "completed.txt",
            Marker::Error => "error.txt",
        }
    }
}

pub fn job_prefix(key: &JobKey) -> String {
    format!("uploads/{}/", key)
}

pub fn original_prefix(key: &JobKey) -> String {
    format!("uploads/{}/{}", key, ORIGINAL_PREFIX)
}

pub fn original_key(key: &JobKey, filename: &str) -> String {
    format!("{}{}", original_prefix(key), filename)
}

pub fn marker_key(key: &JobKey, marker: Marker) -> String {
    format!("uploads/{}/{}", key, marker.file_name())
}

/// Primary converted copy, inside the upload bucket.
pub fn converted_prefix(key: &JobKey) -> String {
    format!("uploads/{}/converted/", key)
}

/// Copy in the output destination.
pub fn output_prefix(key: &JobKey) -> String {
    format!("converted/{}/", key)
}

pub fn backup_prefix(key: &JobKey, at: OffsetDateTime, original_filename: &str) -> String {
    let stem = original_filename.split('.').next().unwrap_or_default();
    format!("backup/{}/{}_{}/", key, compact_timestamp(at), stem)
}

/// Filename the client uploaded, recovered from the original's object key.
pub fn original_filename(object_key: &str) -> &str {
    let base = object_key.rsplit('/').next().unwrap_or(object_key);
    base.strip_prefix(ORIGINAL_PREFIX).unwrap_or(base)
}

/// `YYYYmmddHHMMSS`
pub fn compact_timestamp(at: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

/// Reduces a client-supplied filename to its base name.
pub fn sanitize_filename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or(DEFAULT_FILENAME)
        .to_string()
}

pub fn content_type_for(file_name: &str) -> &'static str {
    if file_name.ends_with(".m3u8") {
        "application/x-mpegURL"
    } else {
        "video/MP2T"
    }
}
