//! Directory-backed object store
//!
//! Payloads live at `<root>/<bucket>/<key>`, metadata as JSON sidecars at
//! `<root>/.meta/<bucket>/<key>.json`.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use super::{
    validate_bucket, validate_key, ObjectInfo, ObjectStore, PutObject, StorageError, StorageResult,
    StoredObject,
};

const META_DIR: &str = ".meta";
const TEMP_PREFIX: &str = ".tmp";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Objects are written as payload plus sidecar; `swap` keeps readers from
/// observing one without the other.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    swap: Arc<RwLock<()>>,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            swap: Arc::default(),
        }
    }

    /// Create the root directory if needed
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let store = Self::new(root);
        fs::create_dir_all(&store.root)?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        Ok(self.root.join(bucket).join(key))
    }

    fn meta_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root
            .join(META_DIR)
            .join(bucket)
            .join(format!("{key}.json"))
    }

    fn read_info(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<ObjectInfo> {
        let fs_meta = match fs::metadata(path) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(not_found(bucket, key)),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found(bucket, key)),
            Err(e) => return Err(e.into()),
        };

        let mut info = match fs::read(self.meta_path(bucket, key)) {
            Ok(json) => serde_json::from_slice::<ObjectInfo>(&json).map_err(|source| {
                StorageError::Metadata {
                    key: key.to_string(),
                    source,
                }
            })?,
            // payload placed without going through put_object
            Err(e) if e.kind() == ErrorKind::NotFound => ObjectInfo {
                key: key.to_string(),
                size: 0,
                content_type: FALLBACK_CONTENT_TYPE.to_string(),
                cache_control: None,
                metadata: Default::default(),
                last_modified: fs_meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now()),
            },
            Err(e) => return Err(e.into()),
        };

        info.size = fs_meta.len();
        Ok(info)
    }
}

fn not_found(bucket: &str, key: &str) -> StorageError {
    StorageError::NotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

/// Fully write `bytes` to a temp file next to `path`
fn stage(path: &Path, bytes: &[u8]) -> io::Result<NamedTempFile> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "object path has no parent"))?;
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

fn persist(tmp: NamedTempFile, path: &Path) -> io::Result<()> {
    tmp.persist(path).map(|_| ()).map_err(|e| e.error)
}

/// Put the previous sidecar back, or remove it if there was none
fn restore_sidecar(path: &Path, previous: Option<Vec<u8>>) -> io::Result<()> {
    match previous {
        Some(bytes) => persist(stage(path, &bytes)?, path),
        None => match fs::remove_file(path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        },
    }
}

impl ObjectStore for LocalStore {
    fn get_object(&self, bucket: &str, key: &str) -> StorageResult<StoredObject> {
        let path = self.object_path(bucket, key)?;
        let _swap = self.swap.read();
        let info = self.read_info(bucket, key, &path)?;

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found(bucket, key)),
            Err(e) => return Err(e.into()),
        };

        Ok(StoredObject { info, data })
    }

    fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectInfo> {
        let path = self.object_path(bucket, key)?;
        let _swap = self.swap.read();
        self.read_info(bucket, key, &path)
    }

    fn put_object(&self, bucket: &str, key: &str, object: PutObject) -> StorageResult<()> {
        let path = self.object_path(bucket, key)?;
        let stored = object.into_stored(key);

        let json = serde_json::to_vec_pretty(&stored.info).map_err(|source| {
            StorageError::Metadata {
                key: key.to_string(),
                source,
            }
        })?;

        let meta_path = self.meta_path(bucket, key);
        let meta_tmp = stage(&meta_path, &json)?;
        let data_tmp = stage(&path, &stored.data)?;

        let _swap = self.swap.write();
        let previous = match fs::read(&meta_path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        persist(meta_tmp, &meta_path)?;
        if let Err(err) = persist(data_tmp, &path) {
            if let Err(restore) = restore_sidecar(&meta_path, previous) {
                log::error!("Failed to restore metadata for {bucket}/{key}: {restore}");
            }
            return Err(err.into());
        }

        log::debug!("Stored {bucket}/{key} ({} bytes)", stored.info.size);
        Ok(())
    }

    fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        validate_bucket(bucket)?;
        let bucket_dir = self.root.join(bucket);
        if !bucket_dir.is_dir() {
            return Ok(Vec::new());
        }

        let _swap = self.swap.read();
        let mut objects = Vec::new();
        for entry in WalkDir::new(&bucket_dir).follow_links(false) {
            let entry = entry.map_err(|e| {
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::new(ErrorKind::Other, "filesystem loop"))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&bucket_dir) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if key.starts_with(prefix) {
                objects.push(self.read_info(bucket, &key, entry.path())?);
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("objects")).unwrap();
        (dir, store)
    }

    #[test]
    fn put_then_get_round_trips_metadata() {
        let (_dir, store) = store();

        let put = PutObject::new(b"jpeg bytes".to_vec(), "image/jpeg")
            .cache_control("public, max-age=31536000, immutable")
            .metadata("original-file", "uploads/a.png");
        store.put_object("processed", "processed/a_thumbnail.jpg", put).unwrap();

        let object = store.get_object("processed", "processed/a_thumbnail.jpg").unwrap();

        assert_eq!(object.data, b"jpeg bytes");
        assert_eq!(object.info.content_type, "image/jpeg");
        assert_eq!(object.info.size, 10);
        assert_eq!(object.info.metadata["original-file"], "uploads/a.png");
        assert!(store
            .root()
            .join("processed/processed/a_thumbnail.jpg")
            .is_file());
    }

    #[test]
    fn missing_object_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.get_object("uploads", "uploads/missing.png"),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn traversal_is_rejected() {
        let (_dir, store) = store();
        let result = store.put_object("uploads", "../../etc/passwd", PutObject::new(vec![], "x/y"));
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn overwrite_replaces_payload_and_metadata() {
        let (_dir, store) = store();
        store
            .put_object("b", "k.bin", PutObject::new(vec![1; 100], "a/one"))
            .unwrap();
        store
            .put_object("b", "k.bin", PutObject::new(vec![2; 3], "a/two"))
            .unwrap();

        let object = store.get_object("b", "k.bin").unwrap();
        assert_eq!(object.data, vec![2; 3]);
        assert_eq!(object.info.content_type, "a/two");
    }

    #[test]
    fn lists_nested_keys_sorted() {
        let (_dir, store) = store();
        for key in ["processed/z_thumbnail.jpg", "processed/a_thumbnail.jpg", "uploads/x.png"] {
            store.put_object("mixed", key, PutObject::new(vec![0], "image/jpeg")).unwrap();
        }

        let keys: Vec<_> = store
            .list_objects("mixed", "processed/")
            .unwrap()
            .into_iter()
            .map(|info| info.key)
            .collect();

        assert_eq!(keys, vec!["processed/a_thumbnail.jpg", "processed/z_thumbnail.jpg"]);
        assert!(store.list_objects("empty", "").unwrap().is_empty());
    }

    #[test]
    fn failed_payload_write_keeps_previous_metadata() {
        let (_dir, store) = store();
        store
            .put_object("b", "k.bin", PutObject::new(vec![1], "a/one"))
            .unwrap();

        // a directory in place of the payload makes the final rename fail
        let payload = store.root().join("b/k.bin");
        fs::remove_file(&payload).unwrap();
        fs::create_dir(&payload).unwrap();

        let result = store.put_object("b", "k.bin", PutObject::new(vec![2], "a/two"));
        assert!(result.is_err());

        let sidecar: ObjectInfo =
            serde_json::from_slice(&fs::read(store.meta_path("b", "k.bin")).unwrap()).unwrap();
        assert_eq!(sidecar.content_type, "a/one");
    }

    #[test]
    fn failed_first_write_leaves_no_sidecar() {
        let (_dir, store) = store();
        fs::create_dir_all(store.root().join("b/k.bin")).unwrap();

        let result = store.put_object("b", "k.bin", PutObject::new(vec![2], "a/two"));

        assert!(result.is_err());
        assert!(!store.meta_path("b", "k.bin").exists());
    }

    #[test]
    fn concurrent_writers_never_mix_payload_and_metadata() {
        let (_dir, store) = store();
        let key = "processed/a_thumbnail.jpg";

        std::thread::scope(|scope| {
            for writer in 0..4u8 {
                let store = &store;
                scope.spawn(move || {
                    for _ in 0..25 {
                        let put = PutObject::new(vec![writer; 64], format!("image/w{writer}"));
                        store.put_object("processed", key, put).unwrap();
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..100 {
                    if let Ok(object) = store.get_object("processed", key) {
                        let writer = object.data[0];
                        assert_eq!(object.info.content_type, format!("image/w{writer}"));
                    }
                }
            });
        });
    }

    #[test]
    fn payload_without_sidecar_gets_fallback_info() {
        let (_dir, store) = store();
        let path = store.root().join("uploads/uploads/manual.png");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, [1, 2, 3, 4]).unwrap();

        let info = store.head_object("uploads", "uploads/manual.png").unwrap();

        assert_eq!(info.size, 4);
        assert_eq!(info.content_type, FALLBACK_CONTENT_TYPE);
    }
}
