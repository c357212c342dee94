//! Runs one extraction end to end: validating, fetching, extracting, done.

use std::sync::Arc;

use object_store::path::Path;
use tokio::{sync::mpsc, task::spawn_blocking};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::{
    aggregator::ErrorAggregator,
    archive::{ArchiveReader, ZipArchiveReader},
    config::ExtractConfig,
    error::{ExtractError, Result},
    event::{ArchiveObject, StorageEvent},
    object_stores::ObjectStorage,
    performance::ExtractionStats,
    quarantine,
    quota::QuotaGuard,
    scanner::{self, destination_prefix},
    workers::{WorkerContext, WorkerPool},
};

/// Returned when every admitted entry was written.
pub const SUCCESS_MARKER: &str = "extraction complete";

pub struct Extractor {
    storage: Arc<dyn ObjectStorage>,
    config: ExtractConfig,
}

impl Extractor {
    /// `storage` is shared by every invocation this extractor handles.
    pub fn new(storage: Arc<dyn ObjectStorage>, config: ExtractConfig) -> Self {
        Self { storage, config }
    }

    pub async fn handle_event(
        &self,
        event: &StorageEvent,
        parent: &CancellationToken,
    ) -> Result<&'static str> {
        let archive = event.first_archive()?;
        self.extract(&archive, parent).await
    }

    #[instrument(skip_all, fields(bucket = %archive.bucket, key = %archive.key))]
    pub async fn extract(
        &self,
        archive: &ArchiveObject,
        parent: &CancellationToken,
    ) -> Result<&'static str> {
        info!(size = archive.size, "validating archive");
        quarantine::check_archive_size(
            self.storage.as_ref(),
            archive,
            self.config.max_archive_size,
            &self.config.quarantine_key,
        )
        .await?;

        info!("fetching archive");
        let reader = self.fetch(archive).await?;

        let prefix = destination_prefix(&archive.key);
        info!(
            prefix,
            entries = reader.entries().len(),
            "extracting archive"
        );
        self.extract_archive(reader, &archive.bucket, prefix, parent)
            .await?;

        info!("extraction done");
        Ok(SUCCESS_MARKER)
    }

    async fn fetch(&self, archive: &ArchiveObject) -> Result<Arc<dyn ArchiveReader>> {
        let fetch_error = |source: object_store::Error| ExtractError::Fetch {
            bucket: archive.bucket.clone(),
            key: archive.key.clone(),
            source,
        };

        // Keys arrive as stored, they must not be encoded a second time.
        let key = Path::parse(&archive.key)
            .map_err(|source| fetch_error(object_store::Error::InvalidPath { source }))?;
        let bytes = self
            .storage
            .get(&archive.bucket, &key)
            .await
            .map_err(fetch_error)?;

        let reader = spawn_blocking(move || ZipArchiveReader::new(bytes)).await??;
        Ok(Arc::new(reader))
    }

    /// Scan `archive` into the worker pool and wait for the pool to drain. Entries are written to
    /// `<prefix>/<entry name>` in `bucket`. Returns the first failure seen by any worker or by the
    /// scanner.
    pub async fn extract_archive(
        &self,
        archive: Arc<dyn ArchiveReader>,
        bucket: &str,
        prefix: &str,
        parent: &CancellationToken,
    ) -> Result<()> {
        let cancel = parent.child_token();
        let aggregator = ErrorAggregator::spawn(cancel.clone());
        let stats = Arc::new(ExtractionStats::new());

        let (jobs_tx, jobs_rx) = mpsc::channel(self.config.job_queue_capacity.max(1));
        let pool = WorkerPool::spawn(
            self.config.worker_count,
            jobs_rx,
            WorkerContext {
                archive: archive.clone(),
                storage: self.storage.clone(),
                bucket: bucket.to_string(),
                reporter: aggregator.reporter(),
                cancel: cancel.clone(),
                stats: stats.clone(),
            },
        );

        let mut quota = QuotaGuard::new(self.config.max_extract_size, self.config.max_file_count);
        let reporter = aggregator.reporter();
        let admitted = scanner::scan(
            archive.entries(),
            prefix,
            &mut quota,
            jobs_tx,
            &reporter,
            &cancel,
        )
        .await;
        drop(reporter);

        let pool_result = pool.join().await;
        let first_error = aggregator.finish().await?;
        info!(admitted, "worker pool joined");
        stats.log();

        pool_result?;
        if let Some(e) = first_error {
            return Err(e);
        }
        // Cancelled from above with nothing going wrong here, the archive is only partly written.
        if cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }

        Ok(())
    }
}
