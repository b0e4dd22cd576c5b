//! InMemoryBlobStore - blobs held in a map, for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::ports::{BlobError, BlobStore, strip_bucket_prefix};

#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    failing_writes: AtomicU32,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, name: &str, bytes: impl Into<Vec<u8>>) {
        let name = strip_bucket_prefix(name, bucket);
        self.lock().insert((bucket.to_string(), name), bytes.into());
    }

    pub fn get(&self, bucket: &str, name: &str) -> Option<Vec<u8>> {
        let name = strip_bucket_prefix(name, bucket);
        self.lock().get(&(bucket.to_string(), name)).cloned()
    }

    /// Make the next `attempts` uploads fail.
    pub fn fail_next_writes(&self, attempts: u32) {
        self.failing_writes.store(attempts, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(String, String), Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn write_artifact(
        &self,
        local_path: &Path,
        name: &str,
        bucket: &str,
    ) -> Result<(), BlobError> {
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(BlobError::Backend("injected upload failure".into()));
        }
        let bytes = tokio::fs::read(local_path).await?;
        self.put(bucket, name, bytes);
        Ok(())
    }

    async fn read_config(&self, name: &str, bucket: &str) -> Result<serde_json::Value, BlobError> {
        let bytes = self.get(bucket, name).ok_or_else(|| BlobError::NotFound {
            bucket: bucket.to_string(),
            name: name.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|source| BlobError::InvalidJson {
            bucket: bucket.to_string(),
            name: name.to_string(),
            source,
        })
    }

    async fn list_names(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, BlobError> {
        let dir = prefix.trim_matches('/');
        let names: BTreeSet<String> = self
            .lock()
            .keys()
            .filter(|(b, _)| b == bucket)
            .filter_map(|(_, name)| {
                let rest = if dir.is_empty() {
                    name.as_str()
                } else {
                    name.strip_prefix(dir)?.strip_prefix('/')?
                };
                rest.split('/').next().map(str::to_string)
            })
            .filter(|child| !child.is_empty())
            .collect();
        Ok(names.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_json_documents() {
        let blobs = InMemoryBlobStore::new();
        blobs.put("config", "a.json", br#"{"x": 1}"#.to_vec());
        let value = blobs.read_config("config/a.json", "config").await.unwrap();
        assert_eq!(value["x"], 1);
    }

    #[tokio::test]
    async fn missing_and_invalid_documents_are_errors() {
        let blobs = InMemoryBlobStore::new();
        blobs.put("config", "broken.json", "not json");
        assert!(matches!(
            blobs.read_config("absent.json", "config").await,
            Err(BlobError::NotFound { .. })
        ));
        assert!(matches!(
            blobs.read_config("broken.json", "config").await,
            Err(BlobError::InvalidJson { .. })
        ));
    }

    #[tokio::test]
    async fn lists_direct_children_of_a_prefix() {
        let blobs = InMemoryBlobStore::new();
        blobs.put("config", "10x10_balanced.json", "{}");
        blobs.put("config", "daily/2024_01_01_10x10.json", "{}");
        blobs.put("videos", "other.ppm", "");

        let root = blobs.list_names("config", "").await.unwrap();
        assert_eq!(root, vec!["10x10_balanced.json", "daily"]);
        let daily = blobs.list_names("config", "daily/").await.unwrap();
        assert_eq!(daily, vec!["2024_01_01_10x10.json"]);
    }

    #[tokio::test]
    async fn uploads_local_files_and_can_fail_on_demand() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"frames").unwrap();

        let blobs = InMemoryBlobStore::new();
        blobs.fail_next_writes(1);
        assert!(blobs.write_artifact(file.path(), "v.ppm", "videos").await.is_err());
        blobs.write_artifact(file.path(), "v.ppm", "videos").await.unwrap();
        assert_eq!(blobs.get("videos", "v.ppm").unwrap(), b"frames");
    }
}
