//! Object storage collaborator
//!
//! The pipeline only needs per-key atomic get/put plus listing, so any
//! backend that can offer that sits behind [`ObjectStore`].

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

pub use crate::error::{StorageError, StorageResult};

/// Metadata of a stored object
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub info: ObjectInfo,
    pub data: Vec<u8>,
}

/// Body and headers of a write
#[derive(Debug, Clone, Default)]
pub struct PutObject {
    pub data: Vec<u8>,
    pub content_type: String,
    pub cache_control: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl PutObject {
    pub fn new(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
            ..Default::default()
        }
    }

    pub fn cache_control(mut self, directive: impl Into<String>) -> Self {
        self.cache_control = Some(directive.into());
        self
    }

    pub fn metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    fn into_stored(self, key: &str) -> StoredObject {
        StoredObject {
            info: ObjectInfo {
                key: key.to_string(),
                size: self.data.len() as u64,
                content_type: self.content_type,
                cache_control: self.cache_control,
                metadata: self.metadata,
                last_modified: Utc::now(),
            },
            data: self.data,
        }
    }
}

/// Storage operations consumed by the pipeline, the upload path and the catalog
///
/// Writes to one key must be atomic: a reader sees either the previous
/// object or the complete new one.
pub trait ObjectStore: Send + Sync {
    fn get_object(&self, bucket: &str, key: &str) -> StorageResult<StoredObject>;

    fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectInfo>;

    fn put_object(&self, bucket: &str, key: &str, object: PutObject) -> StorageResult<()>;

    /// Objects whose key starts with `prefix`, sorted by key
    fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for std::sync::Arc<S> {
    fn get_object(&self, bucket: &str, key: &str) -> StorageResult<StoredObject> {
        (**self).get_object(bucket, key)
    }

    fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectInfo> {
        (**self).head_object(bucket, key)
    }

    fn put_object(&self, bucket: &str, key: &str, object: PutObject) -> StorageResult<()> {
        (**self).put_object(bucket, key, object)
    }

    fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        (**self).list_objects(bucket, prefix)
    }
}

/// Reject keys that could escape a bucket directory
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.ends_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key.split('/').any(|segment| segment == ".." || segment == ".");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub(crate) fn validate_bucket(bucket: &str) -> StorageResult<()> {
    let valid = !bucket.is_empty()
        && !bucket.starts_with('.')
        && bucket
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(StorageError::InvalidBucket(bucket.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation() {
        assert!(validate_key("uploads/a.png").is_ok());
        assert!(validate_key("uploads/nested/dir/a b.png").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("uploads/../../secret").is_err());
        assert!(validate_key("uploads/").is_err());
        assert!(validate_key("uploads\\a.png").is_err());
    }

    #[test]
    fn bucket_validation() {
        assert!(validate_bucket("uploads").is_ok());
        assert!(validate_bucket("imagasaur-processed").is_ok());
        assert!(validate_bucket("").is_err());
        assert!(validate_bucket(".meta").is_err());
        assert!(validate_bucket("a/b").is_err());
    }

    #[test]
    fn put_builder_collects_headers() {
        let put = PutObject::new(vec![1, 2, 3], "image/jpeg")
            .cache_control("no-cache")
            .metadata("original-file", "uploads/a.png");

        let stored = put.into_stored("processed/a_thumbnail.jpg");

        assert_eq!(stored.info.size, 3);
        assert_eq!(stored.info.cache_control.as_deref(), Some("no-cache"));
        assert_eq!(stored.info.metadata["original-file"], "uploads/a.png");
    }
}
