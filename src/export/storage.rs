//! Object storage for export files, backed by the `object_store` crate

use bytes::Bytes;
use object_store::{ObjectStore, path::Path as StoragePath};
use std::sync::Arc;

use super::{ExportError, Result};

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: usize,
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct ExportStorage {
    store: Arc<dyn ObjectStore>,
    pub bucket: String,
    pub key_prefix: String,
}

impl ExportStorage {
    /// Create a storage client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, bucket: String, key_prefix: String) -> Self {
        Self {
            store,
            bucket,
            key_prefix,
        }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory(bucket: String, key_prefix: String) -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()), bucket, key_prefix)
    }

    pub fn key_for(&self, file_name: &str) -> String {
        format!("{}{}", self.key_prefix, file_name)
    }

    /// Upload bytes to storage
    pub async fn upload(&self, key: &str, data: impl Into<Bytes>) -> Result<UploadMetadata> {
        let data: Bytes = data.into();
        let path = StoragePath::from(key);
        let size = data.len();

        let put_result = self.store.put(&path, data.into()).await?;

        tracing::info!(bucket = %self.bucket, key, size, "Uploaded export");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag.clone(),
            size,
        })
    }

    /// Download from storage
    pub async fn download(&self, key: &str) -> Result<Bytes> {
        let path = StoragePath::from(key);

        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(ExportError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(result.bytes().await?)
    }
}
