//! Read side of the outbound bucket

use crate::config::ThumbnailerConfig;
use crate::error::StorageResult;
use crate::naming;
use crate::store::{ObjectInfo, ObjectStore};

/// All derived thumbnails, sorted by key
pub fn list_thumbnails(
    store: &impl ObjectStore,
    config: &ThumbnailerConfig,
) -> StorageResult<Vec<ObjectInfo>> {
    let objects = store.list_objects(&config.outbound_bucket, &config.outbound_prefix)?;

    Ok(objects
        .into_iter()
        .filter(|info| naming::is_thumbnail_key(&config.outbound_prefix, &info.key))
        .collect())
}

pub fn describe(
    store: &impl ObjectStore,
    config: &ThumbnailerConfig,
    key: &str,
) -> StorageResult<ObjectInfo> {
    store.head_object(&config.outbound_bucket, key)
}
