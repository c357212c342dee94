//! The extraction worker pool. A fixed number of jobs are in flight at once, each one decodes a
//! single entry in full and writes it to the destination store.
//!
//! Failures never stop the pool directly, they are reported to the aggregator which cancels the
//! shared token. Cancellation stops new jobs from being picked up, jobs already past their check
//! run to completion.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::{
    sync::mpsc,
    task::{spawn_blocking, JoinHandle},
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::{
    aggregator::ErrorReporter,
    archive::{ArchiveReader, EntryError},
    error::{ExtractError, Result},
    object_stores::ObjectStorage,
    performance::ExtractionStats,
    scanner::ExtractionJob,
};

#[derive(Clone)]
pub struct WorkerContext {
    pub archive: Arc<dyn ArchiveReader>,
    pub storage: Arc<dyn ObjectStorage>,
    pub bucket: String,
    pub reporter: ErrorReporter,
    pub cancel: CancellationToken,
    pub stats: Arc<ExtractionStats>,
}

#[instrument(skip_all, fields(entry = %job.entry.name, destination = %job.destination))]
async fn extract_entry(
    archive: Arc<dyn ArchiveReader>,
    storage: &dyn ObjectStorage,
    bucket: &str,
    job: ExtractionJob,
) -> Result<u64> {
    if job.entry.is_dir {
        debug!("directory entry, nothing to write");
        return Ok(0);
    }

    let index = job.entry.index;
    let contents = spawn_blocking(move || archive.read_entry(index))
        .await?
        .map_err(|e| match e {
            EntryError::Open(reason) => ExtractError::OpenEntry {
                name: job.entry.name.clone(),
                reason,
            },
            EntryError::Read(source) => ExtractError::ReadEntry {
                name: job.entry.name.clone(),
                source,
            },
        })?;

    let size = contents.len() as u64;
    storage
        .put(bucket, &job.destination, Bytes::from(contents))
        .await
        .map_err(|source| ExtractError::PutEntry {
            key: job.destination.to_string(),
            source,
        })?;

    debug!(size, "stored entry");

    Ok(size)
}

async fn run_workers(
    worker_count: usize,
    jobs_rx: mpsc::Receiver<ExtractionJob>,
    context: WorkerContext,
) {
    let cancel = context.cancel.clone();

    ReceiverStream::new(jobs_rx)
        .take_until(cancel.cancelled())
        .for_each_concurrent(worker_count, |job| {
            let context = context.clone();
            async move {
                if context.cancel.is_cancelled() {
                    debug!(entry = %job.entry.name, "extraction cancelled, skipping entry");
                    return;
                }

                let is_dir = job.entry.is_dir;
                let result = extract_entry(
                    context.archive.clone(),
                    context.storage.as_ref(),
                    &context.bucket,
                    job,
                )
                .await;

                match result {
                    // Directories write nothing.
                    Ok(_) if is_dir => {}
                    Ok(size) => context.stats.record_entry(size),
                    Err(e) => {
                        context.reporter.report_or_drop(e);
                    }
                }
            }
        })
        .await;

    debug!("worker pool drained");
}

pub struct WorkerPool {
    handle: JoinHandle<()>,
}

impl WorkerPool {
    /// Start draining `jobs_rx` with at most `worker_count` entries in flight. The pool stops
    /// when the queue closes or `context.cancel` fires.
    pub fn spawn(
        worker_count: usize,
        jobs_rx: mpsc::Receiver<ExtractionJob>,
        context: WorkerContext,
    ) -> Self {
        let handle = tokio::spawn(run_workers(worker_count.max(1), jobs_rx, context));
        Self { handle }
    }

    /// Wait for every in-flight job to finish.
    pub async fn join(self) -> Result<()> {
        self.handle.await?;
        Ok(())
    }
}
