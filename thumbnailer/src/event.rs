//! Object-created notification batches

use serde::Deserialize;

use crate::error::MalformedEventError;

/// One object-created notification, with the key already URL-decoded
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Notification {
    pub bucket: String,
    pub key: String,
}

impl Notification {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// A record of a notification batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRecord {
    Object(Notification),
    /// The record does not describe a storage object
    Other,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "Records")]
    records: Vec<RawRecord>,
}

#[derive(Deserialize)]
struct RawRecord {
    s3: Option<RawEntity>,
}

#[derive(Deserialize)]
struct RawEntity {
    bucket: Option<RawBucket>,
    object: Option<RawObject>,
}

#[derive(Deserialize)]
struct RawBucket {
    name: Option<String>,
}

#[derive(Deserialize)]
struct RawObject {
    key: Option<String>,
}

/// Parse an S3-style notification payload
///
/// Records without an `s3` section come back as [`EventRecord::Other`].
/// A storage record missing its bucket name or object key makes the whole
/// payload malformed.
pub fn parse_notifications(payload: &str) -> Result<Vec<EventRecord>, MalformedEventError> {
    let event: RawEvent = serde_json::from_str(payload)?;

    event
        .records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let Some(entity) = record.s3 else {
                return Ok(EventRecord::Other);
            };

            let bucket = entity
                .bucket
                .and_then(|b| b.name)
                .ok_or(MalformedEventError::MissingField {
                    index,
                    field: "s3.bucket.name",
                })?;
            let key = entity
                .object
                .and_then(|o| o.key)
                .ok_or(MalformedEventError::MissingField {
                    index,
                    field: "s3.object.key",
                })?;

            Ok(EventRecord::Object(Notification {
                bucket,
                key: decode_key(&key),
            }))
        })
        .collect()
}

/// Build a payload in the same shape, keys percent-encoded
pub fn to_payload(notifications: &[Notification]) -> serde_json::Value {
    let records: Vec<_> = notifications
        .iter()
        .map(|n| {
            serde_json::json!({
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": n.bucket },
                    "object": { "key": encode_key(&n.key) },
                },
            })
        })
        .collect();

    serde_json::json!({ "Records": records })
}

/// Form-style URL decoding: `+` is a space, invalid UTF-8 is replaced
pub fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    let bytes = urlencoding::decode_binary(spaced.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).replace("%20", "+"))
        .collect::<Vec<_>>()
        .join("/")
}
