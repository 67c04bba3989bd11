pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod image;
pub mod naming;
pub mod pipeline;
pub mod store;
pub mod upload;

// Re-export commonly used types
pub use config::ThumbnailerConfig;
pub use error::{DecodeError, ItemError, MalformedEventError, StorageError, ThumbnailError};
pub use event::{parse_notifications, EventRecord, Notification};
pub use image::{derive_thumbnail, Thumbnail};
pub use naming::derived_key;
pub use pipeline::{BatchSummary, FailureKind, ItemOutcome, ItemReport, Pipeline, SkipReason};
pub use store::{LocalStore, MemoryStore, ObjectInfo, ObjectStore, PutObject, StoredObject};
