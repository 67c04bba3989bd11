//! Key naming rules shared by the upload path and the pipeline

use crate::image::EXTENSION;

pub const THUMBNAIL_SUFFIX: &str = "_thumbnail";

/// Last path segment of an object key
pub fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Split a file name into stem and extension (including the dot)
///
/// Leading dots belong to the stem, so `.profile` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) if name[..dot].bytes().any(|b| b != b'.') => name.split_at(dot),
        _ => (name, ""),
    }
}

/// Derived thumbnail key for `source_key` under the default outbound prefix
///
/// `uploads/cats/tabby.final.png` -> `processed/tabby.final_thumbnail.jpg`
pub fn derived_key(source_key: &str) -> String {
    derived_key_with_prefix("processed/", source_key)
}

pub fn derived_key_with_prefix(outbound_prefix: &str, source_key: &str) -> String {
    let (stem, _) = split_extension(basename(source_key));
    format!("{outbound_prefix}{stem}{THUMBNAIL_SUFFIX}.{EXTENSION}")
}

/// Whether `key` names a derived thumbnail under `outbound_prefix`
pub fn is_thumbnail_key(outbound_prefix: &str, key: &str) -> bool {
    key.starts_with(outbound_prefix) && key.ends_with(&format!("{THUMBNAIL_SUFFIX}.{EXTENSION}"))
}
