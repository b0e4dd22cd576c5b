//! BlobStore port: opaque named artifacts grouped in buckets.
//!
//! Holds game configuration documents, videos and run logs.

use std::path::{Component, Path};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob {name:?} not found in bucket {bucket:?}")]
    NotFound { bucket: String, name: String },

    #[error("blob {name:?} in bucket {bucket:?} is not valid JSON: {source}")]
    InvalidJson {
        bucket: String,
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("blob io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a local file under `name`.
    async fn write_artifact(&self, local_path: &Path, name: &str, bucket: &str)
    -> Result<(), BlobError>;

    /// Fetch and parse a JSON document.
    async fn read_config(&self, name: &str, bucket: &str) -> Result<serde_json::Value, BlobError>;

    /// Basenames of the direct children of `prefix` (empty prefix = bucket root).
    async fn list_names(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, BlobError>;
}

/// Public location of a blob, as stored in the Match/Game records.
pub fn blob_url(bucket: &str, name: &str) -> String {
    format!("{bucket}/{name}")
}

/// Blob name relative to its bucket.
///
/// Paths often carry the bucket as one of their components
/// (`/data/videos/match-1/game.ppm` in bucket `videos`); everything after the
/// first component equal to the bucket name is the blob name. Paths without
/// the bucket are returned unchanged.
pub fn strip_bucket_prefix(path: &str, bucket: &str) -> String {
    let parts: Vec<&str> = Path::new(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    match parts.iter().position(|part| *part == bucket) {
        Some(index) => parts[index + 1..].join("/"),
        None => path.to_string(),
    }
}
