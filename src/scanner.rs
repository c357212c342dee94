//! Walks the archive directory in stored order, admitting entries against the quota and feeding
//! them to the worker pool.

use object_store::path::{Path, DELIMITER};
use tokio::{select, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::{
    aggregator::ErrorReporter, archive::ArchiveEntry, error::ExtractError, quota::QuotaGuard,
};

/// An admitted entry together with the key it will be written to. The key is derived once, here,
/// workers never recompute it.
#[derive(Clone, Debug)]
pub struct ExtractionJob {
    pub entry: ArchiveEntry,
    pub destination: Path,
}

/// The archive key with the extension of its last segment stripped, `uploads/images.zip` becomes
/// `uploads/images`.
pub fn destination_prefix(archive_key: &str) -> &str {
    let file_name_start = archive_key.rfind(DELIMITER).map_or(0, |i| i + 1);
    match archive_key[file_name_start..].rfind('.') {
        Some(dot) => &archive_key[..file_name_start + dot],
        None => archive_key,
    }
}

/// `<prefix>/<entry name>`. Empty segments collapse, names which would step outside the prefix are
/// refused.
pub fn destination_key(prefix: &str, entry_name: &str) -> Result<Path, ExtractError> {
    let invalid = || ExtractError::InvalidEntryPath {
        name: entry_name.to_string(),
    };

    let entry_segments: Vec<&str> = entry_name
        .split(DELIMITER)
        .filter(|segment| !segment.is_empty())
        .collect();
    if entry_segments.is_empty() || entry_segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(invalid());
    }

    let joined = prefix
        .split(DELIMITER)
        .filter(|segment| !segment.is_empty())
        .chain(entry_segments)
        .collect::<Vec<_>>()
        .join(DELIMITER);

    Path::parse(joined).map_err(|_| invalid())
}

/// Admit entries until the archive is exhausted, a quota is breached, or work is cancelled. Quota
/// and path failures go to `reporter`. Returns the number of jobs handed to the pool. Dropping
/// `jobs_tx` on return closes the queue.
#[instrument(skip_all, fields(prefix = %prefix, entries = entries.len()))]
pub async fn scan(
    entries: &[ArchiveEntry],
    prefix: &str,
    quota: &mut QuotaGuard,
    jobs_tx: mpsc::Sender<ExtractionJob>,
    reporter: &ErrorReporter,
    cancel: &CancellationToken,
) -> usize {
    let mut admitted = 0;

    for entry in entries {
        if let Err(e) = quota.admit(entry.declared_size) {
            warn!(
                entry = %entry.name,
                files_so_far = quota.files_so_far(),
                bytes_so_far = quota.bytes_so_far(),
                "quota exceeded, stopping scan"
            );
            reporter.report_or_drop(e);
            break;
        }

        let destination = match destination_key(prefix, &entry.name) {
            Ok(destination) => destination,
            Err(e) => {
                warn!(entry = %entry.name, "unsafe entry path, stopping scan");
                reporter.report_or_drop(e);
                break;
            }
        };

        let job = ExtractionJob {
            entry: entry.clone(),
            destination,
        };

        // A full queue blocks us, a failure elsewhere must still be able to stop us.
        select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("extraction cancelled, stopping scan");
                break;
            }
            result = jobs_tx.send(job) => {
                if result.is_err() {
                    debug!("worker pool gone, stopping scan");
                    break;
                }
                admitted += 1;
            }
        }
    }

    admitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ErrorAggregator;

    fn entry(index: usize, name: &str, declared_size: u64) -> ArchiveEntry {
        ArchiveEntry {
            index,
            name: name.to_string(),
            declared_size,
            is_dir: name.ends_with('/'),
        }
    }

    #[test]
    fn destination_prefix_test() {
        assert_eq!(destination_prefix("images.zip"), "images");
        assert_eq!(destination_prefix("uploads/images.zip"), "uploads/images");
        assert_eq!(destination_prefix("backup.tar.gz"), "backup.tar");
        assert_eq!(destination_prefix("v1.2/archive"), "v1.2/archive");
        assert_eq!(destination_prefix("noext"), "noext");
    }

    #[test]
    fn destination_key_test() {
        assert_eq!(
            destination_key("images", "a.png").unwrap().as_ref(),
            "images/a.png"
        );
        assert_eq!(
            destination_key("uploads/images", "nested//dir/b.png")
                .unwrap()
                .as_ref(),
            "uploads/images/nested/dir/b.png"
        );
        assert_eq!(destination_key("images", "docs/").unwrap().as_ref(), "images/docs");
        assert_eq!(destination_key("", "/a.png").unwrap().as_ref(), "a.png");
    }

    #[test]
    fn destination_key_refuses_traversal_test() {
        for name in ["../etc/passwd", "a/../../b", "./a", "", "/"] {
            assert!(
                matches!(
                    destination_key("images", name),
                    Err(ExtractError::InvalidEntryPath { .. })
                ),
                "{name} should be refused"
            );
        }
    }

    #[tokio::test]
    async fn enqueues_in_stored_order_test() {
        let entries = vec![entry(0, "b.png", 2), entry(1, "a.png", 1)];
        let (jobs_tx, mut jobs_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let aggregator = ErrorAggregator::spawn(cancel.clone());
        let mut quota = QuotaGuard::new(100, 100);

        let admitted = scan(
            &entries,
            "images",
            &mut quota,
            jobs_tx,
            &aggregator.reporter(),
            &cancel,
        )
        .await;

        assert_eq!(admitted, 2);
        assert_eq!(jobs_rx.recv().await.unwrap().destination.as_ref(), "images/b.png");
        assert_eq!(jobs_rx.recv().await.unwrap().destination.as_ref(), "images/a.png");
        assert!(jobs_rx.recv().await.is_none());
        assert!(aggregator.finish().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn halts_before_entry_breaching_size_test() {
        let entries = vec![
            entry(0, "a", 4),
            entry(1, "b", 4),
            entry(2, "c", 4),
            entry(3, "d", 1),
        ];
        let (jobs_tx, mut jobs_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let aggregator = ErrorAggregator::spawn(cancel.clone());
        let mut quota = QuotaGuard::new(10, 100);

        let admitted = scan(&entries, "p", &mut quota, jobs_tx, &aggregator.reporter(), &cancel).await;

        assert_eq!(admitted, 2);
        let mut names = Vec::new();
        while let Some(job) = jobs_rx.recv().await {
            names.push(job.entry.name);
        }
        // "d" would fit on its own but scanning has stopped.
        assert_eq!(names, vec!["a", "b"]);
        assert!(matches!(
            aggregator.finish().await.unwrap(),
            Some(ExtractError::ExtractSizeExceeded { total: 12, limit: 10 })
        ));
    }

    #[tokio::test]
    async fn halts_on_unsafe_path_test() {
        let entries = vec![entry(0, "ok.txt", 1), entry(1, "../escape.txt", 1)];
        let (jobs_tx, _jobs_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let aggregator = ErrorAggregator::spawn(cancel.clone());
        let mut quota = QuotaGuard::new(100, 100);

        let admitted = scan(&entries, "p", &mut quota, jobs_tx, &aggregator.reporter(), &cancel).await;

        assert_eq!(admitted, 1);
        assert!(matches!(
            aggregator.finish().await.unwrap(),
            Some(ExtractError::InvalidEntryPath { .. })
        ));
    }

    #[tokio::test]
    async fn cancellation_unblocks_full_queue_test() {
        let entries: Vec<_> = (0..4).map(|i| entry(i, &format!("{i}.txt"), 1)).collect();
        // Nobody drains this queue, the second send would block forever.
        let (jobs_tx, _jobs_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let aggregator = ErrorAggregator::spawn(cancel.clone());
        let mut quota = QuotaGuard::new(100, 100);

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        let admitted = scan(&entries, "p", &mut quota, jobs_tx, &aggregator.reporter(), &cancel).await;
        canceller.await.unwrap();

        assert_eq!(admitted, 1);
    }
}
