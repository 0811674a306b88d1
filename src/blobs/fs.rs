use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use super::{validate_key, BlobError, BlobStore, Bucket};

/// Buckets as directories under a root: `<root>/<bucket>/<key>`.
pub struct FsBlobStore {
    root: PathBuf,
    public_base: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        let public_base = public_base.into().trim_end_matches('/').to_string();
        Self {
            root: root.into(),
            public_base,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: Bucket, key: &str) -> Result<PathBuf, BlobError> {
        validate_key(key)?;
        Ok(self.root.join(bucket.as_str()).join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, bucket: Bucket, key: &str, data: Bytes) -> Result<(), BlobError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        tracing::debug!("Stored {} bytes at {}/{}", data.len(), bucket, key);
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        format!("{}/blobs/{}/{}", self.public_base, bucket, key)
    }

    async fn remove(&self, bucket: Bucket, keys: &[String]) -> Result<(), BlobError> {
        for key in keys {
            let path = self.object_path(bucket, key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("Blob {}/{} already gone", bucket, key);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn read(&self, bucket: Bucket, key: &str) -> Result<Bytes, BlobError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(format!("{}/{}", bucket, key)))
            }
            Err(e) => Err(e.into()),
        }
    }
}
