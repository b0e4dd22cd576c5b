//! LocalBlobStore - one directory per bucket under a root directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::ports::{BlobError, BlobStore, strip_bucket_prefix};

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, bucket: &str, name: &str) -> PathBuf {
        self.root
            .join(bucket)
            .join(strip_bucket_prefix(name, bucket))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn write_artifact(
        &self,
        local_path: &Path,
        name: &str,
        bucket: &str,
    ) -> Result<(), BlobError> {
        let target = self.blob_path(bucket, name);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &target).await?;
        tracing::debug!(bucket, name, target = %target.display(), "artifact stored");
        Ok(())
    }

    async fn read_config(&self, name: &str, bucket: &str) -> Result<serde_json::Value, BlobError> {
        let bytes = match tokio::fs::read(self.blob_path(bucket, name)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BlobError::NotFound {
                    bucket: bucket.to_string(),
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|source| BlobError::InvalidJson {
            bucket: bucket.to_string(),
            name: name.to_string(),
            source,
        })
    }

    async fn list_names(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, BlobError> {
        let dir = self.root.join(bucket).join(prefix.trim_matches('/'));
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
