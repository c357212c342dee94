//! The storage notification which triggers an extraction. Shaped like an S3 event notification,
//! only the fields we act on are modelled.

use serde::Deserialize;

use crate::error::{ExtractError, Result};

#[derive(Debug, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<StorageEventRecord>,
}

#[derive(Debug, Deserialize)]
pub struct StorageEventRecord {
    pub s3: StorageEntity,
}

#[derive(Debug, Deserialize)]
pub struct StorageEntity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectEntity {
    pub key: String,
    #[serde(default)]
    pub size: u64,
}

/// The one archive an invocation works on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveObject {
    pub bucket: String,
    pub key: String,
    /// Compressed object size as declared by the notification.
    pub size: u64,
}

impl ArchiveObject {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, size: u64) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            size,
        }
    }
}

impl StorageEvent {
    /// Only the first record is processed, matching how the trigger delivers one object per
    /// notification.
    pub fn first_archive(&self) -> Result<ArchiveObject> {
        let record = self.records.first().ok_or(ExtractError::EmptyEvent)?;
        if record.s3.bucket.name.is_empty() || record.s3.object.key.is_empty() {
            return Err(ExtractError::EmptyEvent);
        }

        Ok(ArchiveObject::new(
            record.s3.bucket.name.as_str(),
            record.s3.object.key.as_str(),
            record.s3.object.size,
        ))
    }
}
