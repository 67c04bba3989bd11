use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{
    validate_bucket, validate_key, ObjectInfo, ObjectStore, PutObject, StorageError, StorageResult,
    StoredObject,
};

type Bucket = BTreeMap<String, StoredObject>;

/// In-process store, mostly for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: RwLock<BTreeMap<String, Bucket>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently held in `bucket`
    pub fn len(&self, bucket: &str) -> usize {
        self.buckets.read().get(bucket).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, bucket: &str) -> bool {
        self.len(bucket) == 0
    }

    fn not_found(bucket: &str, key: &str) -> StorageError {
        StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

impl ObjectStore for MemoryStore {
    fn get_object(&self, bucket: &str, key: &str) -> StorageResult<StoredObject> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or_else(|| Self::not_found(bucket, key))
    }

    fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectInfo> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.info.clone())
            .ok_or_else(|| Self::not_found(bucket, key))
    }

    fn put_object(&self, bucket: &str, key: &str, object: PutObject) -> StorageResult<()> {
        validate_bucket(bucket)?;
        validate_key(key)?;

        let stored = object.into_stored(key);
        self.buckets
            .write()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), stored);
        Ok(())
    }

    fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let buckets = self.buckets.read();
        let Some(objects) = buckets.get(bucket) else {
            return Ok(Vec::new());
        };

        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, object)| object.info.clone())
            .collect())
    }
}
