use object_store::path::Path;

use crate::env::{
    EnvConfig, DEFAULT_JOB_QUEUE_CAPACITY, DEFAULT_MAX_ARCHIVE_SIZE, DEFAULT_MAX_EXTRACT_SIZE,
    DEFAULT_MAX_FILE_COUNT, DEFAULT_QUARANTINE_KEY, DEFAULT_WORKER_COUNT,
};

/// Static limits for a single extraction. Built once per process and handed to the extractor.
#[derive(Clone, Debug)]
pub struct ExtractConfig {
    /// Archives whose object size exceeds this are quarantined without being fetched.
    pub max_archive_size: u64,
    /// Cumulative declared decompressed size across admitted entries.
    pub max_extract_size: u64,
    pub max_file_count: usize,
    pub worker_count: usize,
    pub job_queue_capacity: usize,
    pub quarantine_key: Path,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_archive_size: DEFAULT_MAX_ARCHIVE_SIZE,
            max_extract_size: DEFAULT_MAX_EXTRACT_SIZE,
            max_file_count: DEFAULT_MAX_FILE_COUNT,
            worker_count: DEFAULT_WORKER_COUNT,
            job_queue_capacity: DEFAULT_JOB_QUEUE_CAPACITY,
            quarantine_key: Path::from(DEFAULT_QUARANTINE_KEY),
        }
    }
}

impl From<&EnvConfig> for ExtractConfig {
    fn from(env_config: &EnvConfig) -> Self {
        Self {
            max_archive_size: env_config.max_archive_size,
            max_extract_size: env_config.max_extract_size,
            max_file_count: env_config.max_file_count,
            // A pool or queue of zero would never make progress.
            worker_count: env_config.worker_count.max(1),
            job_queue_capacity: env_config.job_queue_capacity.max(1),
            quarantine_key: Path::parse(&env_config.quarantine_key).unwrap_or_else(|e| {
                panic!(
                    "QUARANTINE_KEY present: {}, but not a valid object key: {e}",
                    env_config.quarantine_key
                )
            }),
        }
    }
}
