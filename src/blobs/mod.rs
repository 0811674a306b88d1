mod fs;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use self::fs::FsBlobStore;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Unknown bucket: {0}")]
    UnknownBucket(String),
}

/// The two buckets content is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Covers,
    Pages,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Covers => "covers",
            Bucket::Pages => "pages",
        }
    }

    pub fn parse(name: &str) -> Result<Self, BlobError> {
        match name {
            "covers" => Ok(Bucket::Covers),
            "pages" => Ok(Bucket::Pages),
            other => Err(BlobError::UnknownBucket(other.to_string())),
        }
    }

    /// Substring that separates a public URL from the object key.
    pub fn url_marker(&self) -> String {
        format!("/{}/", self.as_str())
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An object that has been written to a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredBlob {
    pub bucket: Bucket,
    pub key: String,
    pub public_url: String,
}

/// Blob storage, modelled on a hosted bucket service.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, bucket: Bucket, key: &str, data: Bytes) -> Result<(), BlobError>;

    fn public_url(&self, bucket: Bucket, key: &str) -> String;

    /// Remove a batch of objects. Keys that do not exist are ignored.
    async fn remove(&self, bucket: Bucket, keys: &[String]) -> Result<(), BlobError>;

    async fn read(&self, bucket: Bucket, key: &str) -> Result<Bytes, BlobError>;

    /// Generate a key from `display_name`, upload, and resolve the public URL.
    async fn store(
        &self,
        bucket: Bucket,
        prefix: Option<&str>,
        display_name: &str,
        data: Bytes,
    ) -> Result<StoredBlob, BlobError> {
        let key = generate_key(display_name, prefix);
        self.upload(bucket, &key, data).await?;
        let public_url = self.public_url(bucket, &key);
        Ok(StoredBlob {
            bucket,
            key,
            public_url,
        })
    }
}

/// `[<prefix>/]<uuid>[.<ext>]`, where ext is whatever follows the last `.` of the name.
pub fn generate_key(display_name: &str, prefix: Option<&str>) -> String {
    let id = uuid::Uuid::new_v4();
    let file = match extension(display_name) {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    };
    match prefix {
        Some(p) if !p.is_empty() => format!("{}/{}", p.trim_matches('/'), file),
        _ => file,
    }
}

fn extension(display_name: &str) -> Option<&str> {
    let base = display_name.rsplit(['/', '\\']).next().unwrap_or(display_name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// Recover an object key from a public URL by locating the bucket marker.
///
/// Only used for rows written before keys were stored next to the URL.
pub fn key_from_public_url(url: &str, bucket: Bucket) -> Option<String> {
    let marker = bucket.url_marker();
    let idx = url.find(&marker)?;
    let key = &url[idx + marker.len()..];
    let key = key.split(['?', '#']).next().unwrap_or(key);
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// Reject keys that could escape the bucket directory.
pub fn validate_key(key: &str) -> Result<(), BlobError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        Err(BlobError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_keeps_extension() {
        let key = generate_key("cover.final.PNG", None);
        assert!(key.ends_with(".PNG"));
        assert_eq!(key.len(), 36 + 4);
    }

    #[test]
    fn generated_key_has_prefix() {
        let key = generate_key("001.jpg", Some("chapter-1"));
        assert!(key.starts_with("chapter-1/"));
        assert!(key.ends_with(".jpg"));
        validate_key(&key).unwrap();
    }

    #[test]
    fn generated_key_without_extension() {
        assert_eq!(generate_key("README", None).len(), 36);
        assert_eq!(generate_key(".hidden", None).len(), 36);
    }

    #[test]
    fn generated_keys_are_unique() {
        assert_ne!(generate_key("a.png", None), generate_key("a.png", None));
    }

    #[test]
    fn key_from_url_finds_marker() {
        let url = "https://host/storage/v1/object/public/covers/abc.png";
        assert_eq!(
            key_from_public_url(url, Bucket::Covers).as_deref(),
            Some("abc.png")
        );
        let url = "http://localhost:3000/blobs/pages/ch1/p.webp?v=2";
        assert_eq!(
            key_from_public_url(url, Bucket::Pages).as_deref(),
            Some("ch1/p.webp")
        );
    }

    #[test]
    fn key_from_url_without_marker_is_none() {
        assert!(key_from_public_url("https://elsewhere/img.png", Bucket::Covers).is_none());
        assert!(key_from_public_url("https://host/pages/x.png", Bucket::Covers).is_none());
        assert!(key_from_public_url("https://host/covers/", Bucket::Covers).is_none());
    }

    #[test]
    fn validate_key_rejects_traversal() {
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/abs.png").is_err());
        assert!(validate_key("a//b.png").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("ch/./x").is_err());
        assert!(validate_key("ch/page.png").is_ok());
    }

    #[test]
    fn bucket_round_trips_through_name() {
        assert_eq!(Bucket::parse("covers").unwrap(), Bucket::Covers);
        assert_eq!(Bucket::parse("pages").unwrap(), Bucket::Pages);
        assert!(Bucket::parse("avatars").is_err());
    }
}
