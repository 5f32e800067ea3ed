use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Key/value metadata attached to a stored object.
pub type Tags = HashMap<String, String>;

/// The durable store holding raw exports and named snapshots. Keys are
/// `/`-separated logical paths; there is no atomic rename, only copy and
/// delete.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str, tags: &Tags) -> Result<()>;
    async fn copy(&self, src: &str, dst: &str) -> Result<()>;
    /// Deleting an absent key succeeds; the store is left in the same state.
    async fn delete(&self, key: &str) -> Result<()>;
    async fn tags(&self, key: &str) -> Result<Tags>;
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
    tags: Tags,
}

/// In-memory store for development and testing.
pub struct InMemoryStore {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        let objects = self.objects.lock().unwrap();
        objects.get(key).map(|o| o.content_type.clone())
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let objects = self.objects.lock().unwrap();
        objects
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| PipelineError::KeyNotFound(key.to_string()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str, tags: &Tags) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        objects.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                tags: tags.clone(),
            },
        );
        debug!("Stored object at '{}'", key);
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        let object = objects
            .get(src)
            .cloned()
            .ok_or_else(|| PipelineError::KeyNotFound(src.to_string()))?;
        objects.insert(dst.to_string(), object);
        debug!("Copied '{}' to '{}'", src, dst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        objects.remove(key);
        debug!("Deleted '{}'", key);
        Ok(())
    }

    async fn tags(&self, key: &str) -> Result<Tags> {
        let objects = self.objects.lock().unwrap();
        objects
            .get(key)
            .map(|o| o.tags.clone())
            .ok_or_else(|| PipelineError::KeyNotFound(key.to_string()))
    }
}

/// Filesystem-backed store. Objects live under a root directory; tags sit in
/// a JSON sidecar next to each object.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn tags_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.tags"))
    }

    fn map_io(key: &str, e: std::io::Error) -> PipelineError {
        if e.kind() == std::io::ErrorKind::NotFound {
            PipelineError::KeyNotFound(key.to_string())
        } else {
            PipelineError::Io(e)
        }
    }

    async fn write_tags(&self, key: &str, tags: &Tags) -> Result<()> {
        let encoded = serde_json::to_vec(tags)
            .map_err(|e| PipelineError::Storage(format!("tag encoding for '{key}': {e}")))?;
        tokio::fs::write(self.tags_path(key), encoded).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.object_path(key))
            .await
            .map_err(|e| Self::map_io(key, e))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str, tags: &Tags) -> Result<()> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        self.write_tags(key, tags).await?;
        debug!("Stored object at '{}'", path.display());
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        let bytes = self.get(src).await?;
        let tags = self.tags(src).await?;
        let path = self.object_path(dst);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        self.write_tags(dst, &tags).await?;
        debug!("Copied '{}' to '{}'", src, dst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        for path in [self.object_path(key), self.tags_path(key)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn tags(&self, key: &str) -> Result<Tags> {
        if !self.object_path(key).exists() {
            return Err(PipelineError::KeyNotFound(key.to_string()));
        }
        match tokio::fs::read(self.tags_path(key)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| PipelineError::Storage(format!("tag decoding for '{key}': {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Tags::new()),
            Err(e) => Err(e.into()),
        }
    }
}
