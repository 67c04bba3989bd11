use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub const DEFAULT_THUMBNAIL_SIZE: u32 = 100;
pub const DEFAULT_QUALITY: u8 = 85;
/// Largest accepted thumbnail edge, in pixels
pub const MAX_THUMBNAIL_SIZE: u32 = 4096;
pub const CACHE_CONTROL_IMMUTABLE: &str = "public, max-age=31536000, immutable";

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThumbnailerConfig {
    /// Bucket receiving uploads
    pub inbound_bucket: String,
    /// Bucket receiving derived thumbnails
    pub outbound_bucket: String,
    /// Only keys under this prefix are derived
    pub inbound_prefix: String,
    pub outbound_prefix: String,
    // Edge length of the square thumbnail, in pixels
    pub thumbnail_size: u32,
    // JPEG quality: 1-100
    pub encode_quality: u8,
}

impl Default for ThumbnailerConfig {
    fn default() -> Self {
        Self {
            inbound_bucket: "uploads".to_string(),
            outbound_bucket: "processed".to_string(),
            inbound_prefix: "uploads/".to_string(),
            outbound_prefix: "processed/".to_string(),
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            encode_quality: DEFAULT_QUALITY,
        }
    }
}

impl ThumbnailerConfig {
    /// Read a JSON config file; absent fields keep their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Apply `UPLOADS_BUCKET` and `PROCESSED_BUCKET` when set
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(bucket) = non_empty("UPLOADS_BUCKET") {
            self.inbound_bucket = bucket;
        }
        if let Some(bucket) = non_empty("PROCESSED_BUCKET") {
            self.outbound_bucket = bucket;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_THUMBNAIL_SIZE).contains(&self.thumbnail_size) {
            anyhow::bail!("Thumbnail size must be between 1 and {MAX_THUMBNAIL_SIZE} pixels");
        }
        if !(1..=100).contains(&self.encode_quality) {
            anyhow::bail!("Encode quality must be between 1 and 100");
        }
        if self.inbound_bucket.is_empty() || self.outbound_bucket.is_empty() {
            anyhow::bail!("Bucket names must not be empty");
        }
        if self.inbound_prefix.is_empty() || self.outbound_prefix.is_empty() {
            anyhow::bail!("Inbound and outbound prefixes must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_the_derivation_contract() {
        let config = ThumbnailerConfig::default();
        assert_eq!(config.inbound_prefix, "uploads/");
        assert_eq!(config.outbound_prefix, "processed/");
        assert_eq!(config.thumbnail_size, 100);
        assert_eq!(config.encode_quality, 85);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ThumbnailerConfig =
            serde_json::from_str(r#"{"outboundBucket": "thumbs", "thumbnailSize": 64}"#).unwrap();

        assert_eq!(config.outbound_bucket, "thumbs");
        assert_eq!(config.thumbnail_size, 64);
        assert_eq!(config.inbound_bucket, "uploads");
        assert_eq!(config.encode_quality, 85);
    }

    #[test]
    fn env_overrides_buckets() {
        let env: HashMap<&str, &str> =
            HashMap::from([("UPLOADS_BUCKET", "in"), ("PROCESSED_BUCKET", "  ")]);

        let config = ThumbnailerConfig::default()
            .with_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.inbound_bucket, "in");
        // blank values are ignored
        assert_eq!(config.outbound_bucket, "processed");
    }

    #[test]
    fn rejects_out_of_range_values() {
        let zero = ThumbnailerConfig {
            thumbnail_size: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let huge = ThumbnailerConfig {
            thumbnail_size: 65536,
            ..Default::default()
        };
        assert!(huge.validate().is_err());

        let largest = ThumbnailerConfig {
            thumbnail_size: MAX_THUMBNAIL_SIZE,
            ..Default::default()
        };
        assert!(largest.validate().is_ok());

        let quality = ThumbnailerConfig {
            encode_quality: 0,
            ..Default::default()
        };
        assert!(quality.validate().is_err());

        let prefix = ThumbnailerConfig {
            inbound_prefix: String::new(),
            ..Default::default()
        };
        assert!(prefix.validate().is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = ThumbnailerConfig {
            encode_quality: 70,
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(ThumbnailerConfig::load(&path).unwrap(), config);
    }
}
