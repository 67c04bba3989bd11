//! Derivation orchestrator
//!
//! Turns a batch of object-created notifications into stored thumbnails.
//! Every item ends in exactly one [`ItemOutcome`]; a failing item never
//! aborts its siblings.

use chrono::{SecondsFormat, Utc};
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use serde::Serialize;

use crate::config::{ThumbnailerConfig, CACHE_CONTROL_IMMUTABLE};
use crate::error::{ItemError, MalformedEventError, ThumbnailError};
use crate::event::{self, EventRecord, Notification};
use crate::image::{self, CONTENT_TYPE};
use crate::naming;
use crate::store::{ObjectStore, PutObject};

pub const META_ORIGINAL_FILE: &str = "original-file";
pub const META_PROCESSED_TIMESTAMP: &str = "processed-timestamp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    OutsideInboundPrefix,
    NotAnImage { content_type: String },
    NotAStorageRecord,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    Fetch,
    Decode,
    Transform,
    Encode,
    StorageWrite,
}

impl From<&ItemError> for FailureKind {
    fn from(err: &ItemError) -> Self {
        match err {
            ItemError::NotFound { .. } => FailureKind::NotFound,
            ItemError::Fetch(_) => FailureKind::Fetch,
            ItemError::Thumbnail(ThumbnailError::Decode(_)) => FailureKind::Decode,
            ItemError::Thumbnail(ThumbnailError::Resize(_)) => FailureKind::Transform,
            ItemError::Thumbnail(ThumbnailError::Encode(_)) => FailureKind::Encode,
            ItemError::StorageWrite { .. } => FailureKind::StorageWrite,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Stored { derived_key: String },
    Skipped(SkipReason),
    Failed { kind: FailureKind, reason: String },
}

impl ItemOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, ItemOutcome::Stored { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ItemOutcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ItemOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    /// Position of the record in the delivered batch
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub items: Vec<ItemReport>,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.items.len()
    }

    pub fn stored(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_stored()).count()
    }

    pub fn skipped(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_failed()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|i| i.outcome.is_failed())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "processed": self.processed(),
            "stored": self.stored(),
            "skipped": self.skipped(),
            "failed": self.failed(),
            "items": self.items,
        })
    }
}

/// Derives thumbnails for notification batches against one object store
pub struct Pipeline<S> {
    store: S,
    config: ThumbnailerConfig,
}

impl<S: ObjectStore> Pipeline<S> {
    pub fn new(store: S, config: ThumbnailerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ThumbnailerConfig {
        &self.config
    }

    /// Parse a raw notification payload and process every record
    ///
    /// Only an unusable payload is an error; item failures are reported in
    /// the summary.
    pub fn handle_event(&self, payload: &str) -> Result<BatchSummary, MalformedEventError> {
        let records = event::parse_notifications(payload).inspect_err(|e| {
            log::error!("Rejecting malformed notification batch: {e}");
        })?;
        Ok(self.process_batch(records))
    }

    /// Process records in parallel, reporting outcomes in delivery order
    pub fn process_batch(&self, records: Vec<EventRecord>) -> BatchSummary {
        log::info!("Processing batch of {} records", records.len());

        let items: Vec<ItemReport> = records
            .into_par_iter()
            .enumerate()
            .map(|(index, record)| self.process_record(index, record))
            .collect();

        let summary = BatchSummary { items };
        log::info!(
            "Batch done: {} stored, {} skipped, {} failed",
            summary.stored(),
            summary.skipped(),
            summary.failed()
        );
        summary
    }

    fn process_record(&self, index: usize, record: EventRecord) -> ItemReport {
        let notification = match record {
            EventRecord::Object(notification) => notification,
            EventRecord::Other => {
                log::warn!("Record {index} is not a storage notification, skipping");
                return ItemReport {
                    index,
                    bucket: None,
                    key: None,
                    outcome: ItemOutcome::Skipped(SkipReason::NotAStorageRecord),
                };
            }
        };

        let span = tracing::info_span!(
            "derive",
            index,
            bucket = %notification.bucket,
            key = %notification.key
        );
        let _guard = span.enter();

        let outcome = match self.process_item(&notification) {
            Ok(outcome) => outcome,
            Err(err) => {
                log::error!(
                    "Failed to derive thumbnail for {}/{}: {err}",
                    notification.bucket,
                    notification.key
                );
                ItemOutcome::Failed {
                    kind: FailureKind::from(&err),
                    reason: err.to_string(),
                }
            }
        };

        ItemReport {
            index,
            bucket: Some(notification.bucket),
            key: Some(notification.key),
            outcome,
        }
    }

    /// Derive and store the thumbnail for a single notification
    ///
    /// Runs filter, fetch, decode, transform, encode and store in order.
    /// Re-running for the same source overwrites the same derived key.
    pub fn process_item(&self, notification: &Notification) -> Result<ItemOutcome, ItemError> {
        let Notification { bucket, key } = notification;

        if !key.starts_with(&self.config.inbound_prefix) {
            log::info!("Skipping {key}: outside {}", self.config.inbound_prefix);
            return Ok(ItemOutcome::Skipped(SkipReason::OutsideInboundPrefix));
        }

        let source = self
            .store
            .get_object(bucket, key)
            .map_err(ItemError::from_fetch)?;

        let content_type = source.info.content_type;
        if !content_type.starts_with("image/") {
            log::info!("Skipping non-image file: {key} ({content_type})");
            return Ok(ItemOutcome::Skipped(SkipReason::NotAnImage { content_type }));
        }

        log::debug!("Fetched {bucket}/{key} ({} bytes)", source.data.len());

        let thumbnail = image::derive_thumbnail(&source.data, &content_type, &self.config)?;

        let derived_key = naming::derived_key_with_prefix(&self.config.outbound_prefix, key);
        let put = PutObject::new(thumbnail.data, CONTENT_TYPE)
            .cache_control(CACHE_CONTROL_IMMUTABLE)
            .metadata(META_ORIGINAL_FILE, key.as_str())
            .metadata(META_PROCESSED_TIMESTAMP, processed_timestamp());

        self.store
            .put_object(&self.config.outbound_bucket, &derived_key, put)
            .map_err(|source| ItemError::StorageWrite {
                key: derived_key.clone(),
                source,
            })?;

        log::info!("Successfully processed {key} -> {derived_key}");
        Ok(ItemOutcome::Stored { derived_key })
    }
}

/// UTC ISO-8601 with microseconds, e.g. `2024-05-01T12:30:00.123456Z`
fn processed_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
