use std::io;

use thiserror::Error;

/// Bytes that could not be turned into a raster
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unrecognized image data")]
    UnknownFormat,

    #[error("failed to decode image: {0}")]
    Image(#[from] imageproc::image::ImageError),

    #[error("image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },

    #[error("failed to read image data: {0}")]
    Io(#[from] io::Error),
}

/// Failure in one of the image stages
#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("resize failed: {0}")]
    Resize(String),

    #[error("failed to encode thumbnail: {0}")]
    Encode(#[source] imageproc::image::ImageError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },

    #[error("invalid object key `{0}`")]
    InvalidKey(String),

    #[error("invalid bucket name `{0}`")]
    InvalidBucket(String),

    #[error("corrupt metadata for `{key}`: {source}")]
    Metadata {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// The notification payload itself is unusable, so no item can be processed
#[derive(Debug, Error)]
pub enum MalformedEventError {
    #[error("event is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record {index} is missing `{field}`")]
    MissingField { index: usize, field: &'static str },
}

/// Error raised while deriving a single batch item
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("source object `{key}` vanished from bucket `{bucket}`")]
    NotFound { bucket: String, key: String },

    #[error("failed to fetch source object: {0}")]
    Fetch(#[source] StorageError),

    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),

    #[error("failed to store thumbnail `{key}`: {source}")]
    StorageWrite {
        key: String,
        #[source]
        source: StorageError,
    },
}

impl ItemError {
    pub(crate) fn from_fetch(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { bucket, key } => ItemError::NotFound { bucket, key },
            other => ItemError::Fetch(other),
        }
    }
}
