use thiserror::Error;

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;

/// Every way a single extraction can fail. An invocation surfaces exactly one of these.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no records in event")]
    EmptyEvent,

    #[error(
        "archive too large: {size} bytes exceeds limit of {limit} bytes{}",
        quarantine_suffix(.quarantine_error)
    )]
    ArchiveTooLarge {
        size: u64,
        limit: u64,
        quarantine_error: Option<object_store::Error>,
    },

    #[error("failed to get object {bucket}/{key}: {source}")]
    Fetch {
        bucket: String,
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("failed to read archive: {0}")]
    Decode(#[from] zip::result::ZipError),

    #[error("too many files: {count} exceeds limit of {limit}")]
    TooManyFiles { count: usize, limit: usize },

    #[error("total extracted size too large: {total} bytes exceeds limit of {limit} bytes")]
    ExtractSizeExceeded { total: u64, limit: u64 },

    #[error("archive entry {name:?} does not map to a key under the destination prefix")]
    InvalidEntryPath { name: String },

    #[error("failed to open archive entry {name}: {reason}")]
    OpenEntry { name: String, reason: String },

    #[error("failed to read archive entry {name}: {source}")]
    ReadEntry {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to put object {key}: {source}")]
    PutEntry {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("extraction cancelled before completing")]
    Cancelled,

    #[error("extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

fn quarantine_suffix(quarantine_error: &Option<object_store::Error>) -> String {
    match quarantine_error {
        Some(e) => format!("; failed to move archive to quarantine: {e}"),
        None => String::new(),
    }
}
