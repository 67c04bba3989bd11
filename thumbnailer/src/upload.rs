//! Upload path: validate an incoming file and place it in the inbound bucket
//!
//! Request parsing stays with the caller, which hands over the already
//! extracted `(filename, bytes, content type)`.

use imageproc::image::ImageFormat;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ThumbnailerConfig;
use crate::error::StorageError;
use crate::naming;
use crate::store::{ObjectStore, PutObject};

pub const ALLOWED_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp"];
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file selected")]
    EmptyFilename,

    #[error("invalid file type `{0}`, allowed: {allowed}", allowed = ALLOWED_EXTENSIONS.join(", "))]
    UnsupportedExtension(String),

    #[error("file is {size} bytes, limit is {}", MAX_UPLOAD_BYTES)]
    TooLarge { size: usize },

    #[error("failed to store upload: {0}")]
    Storage(#[from] StorageError),
}

/// A validated upload, not yet written
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    pub key: String,
    pub original_filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UploadReceipt {
    pub bucket: String,
    pub key: String,
    pub filename: String,
    pub size: usize,
    /// Where the pipeline will write the thumbnail for this upload
    pub thumbnail_key: String,
}

/// Validate the file and assign it a fresh, collision-free key
pub fn prepare(
    filename: &str,
    data: Vec<u8>,
    content_type: &str,
    config: &ThumbnailerConfig,
) -> Result<PreparedUpload, UploadError> {
    let original_filename = sanitize_filename(filename);
    if original_filename.is_empty() {
        return Err(UploadError::EmptyFilename);
    }

    let extension = allowed_extension(&original_filename)?;

    if data.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge { size: data.len() });
    }

    let key = format!("{}{}.{extension}", config.inbound_prefix, Uuid::new_v4());

    Ok(PreparedUpload {
        key,
        original_filename,
        content_type: content_type.to_string(),
        data,
    })
}

/// Validate and write the file to the inbound bucket
pub fn upload(
    store: &impl ObjectStore,
    config: &ThumbnailerConfig,
    filename: &str,
    data: Vec<u8>,
    content_type: &str,
) -> Result<UploadReceipt, UploadError> {
    let prepared = prepare(filename, data, content_type, config)?;
    let size = prepared.data.len();

    let put = PutObject::new(prepared.data, prepared.content_type)
        .metadata("original-filename", prepared.original_filename.as_str())
        .metadata("file-size", size.to_string());
    store.put_object(&config.inbound_bucket, &prepared.key, put)?;

    log::info!("File uploaded successfully: {}", prepared.key);

    Ok(UploadReceipt {
        bucket: config.inbound_bucket.clone(),
        thumbnail_key: naming::derived_key_with_prefix(&config.outbound_prefix, &prepared.key),
        key: prepared.key,
        filename: prepared.original_filename,
        size,
    })
}

fn allowed_extension(filename: &str) -> Result<String, UploadError> {
    let (_, ext) = naming::split_extension(filename);
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(UploadError::UnsupportedExtension(ext))
    }
}

/// Best-effort MIME type from the file extension
pub fn content_type_for(filename: &str) -> &'static str {
    let (_, ext) = naming::split_extension(filename);
    ImageFormat::from_extension(ext.trim_start_matches('.'))
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Reduce a client-supplied name to a safe basename
///
/// Path components are dropped, characters outside `[A-Za-z0-9._-]` become
/// `_`, and leading dots are removed.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect();

    cleaned.trim_start_matches('.').to_string()
}
