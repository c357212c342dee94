//! Pre-flight rejection of archives which are too large to fetch. Rejected archives are moved out
//! of the way to a fixed quarantine key.

use object_store::path::Path;
use tracing::{instrument, warn};

use crate::{
    error::{ExtractError, Result},
    event::ArchiveObject,
    object_stores::ObjectStorage,
};

/// Copy then delete. Not atomic, a failed delete leaves the object in both places.
pub async fn move_object(
    storage: &dyn ObjectStorage,
    bucket: &str,
    key: &Path,
    dest_bucket: &str,
    dest_key: &Path,
) -> object_store::Result<()> {
    storage.copy(bucket, key, dest_bucket, dest_key).await?;
    storage.delete(bucket, key).await
}

/// Reject `archive` before anything is fetched when its compressed size exceeds `max_archive_size`.
#[instrument(skip_all, fields(bucket = %archive.bucket, key = %archive.key, size = archive.size))]
pub async fn check_archive_size(
    storage: &dyn ObjectStorage,
    archive: &ArchiveObject,
    max_archive_size: u64,
    quarantine_key: &Path,
) -> Result<()> {
    if archive.size <= max_archive_size {
        return Ok(());
    }

    warn!(
        limit = max_archive_size,
        quarantine_key = %quarantine_key,
        "archive too large, moving to quarantine"
    );

    let quarantine_error = match Path::parse(&archive.key) {
        Ok(key) => move_object(
            storage,
            &archive.bucket,
            &key,
            &archive.bucket,
            quarantine_key,
        )
        .await
        .err(),
        Err(source) => Some(object_store::Error::InvalidPath { source }),
    };

    if let Some(e) = &quarantine_error {
        warn!(error = %e, "failed to move archive to quarantine");
    }

    Err(ExtractError::ArchiveTooLarge {
        size: archive.size,
        limit: max_archive_size,
        quarantine_error,
    })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::object_stores::ObjectStores;

    #[tokio::test]
    async fn accepts_archive_at_limit_test() {
        let storage = ObjectStores::in_memory();
        let archive = ArchiveObject::new("uploads", "images.zip", 100);

        let result = check_archive_size(&storage, &archive, 100, &Path::from("invalid")).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn moves_oversize_archive_test() {
        let storage = ObjectStores::in_memory();
        let key = Path::from("huge.zip");
        storage
            .put("uploads", &key, Bytes::from_static(b"zip"))
            .await
            .unwrap();
        let archive = ArchiveObject::new("uploads", "huge.zip", 101);

        let result = check_archive_size(&storage, &archive, 100, &Path::from("invalid")).await;

        assert!(matches!(
            result,
            Err(ExtractError::ArchiveTooLarge {
                size: 101,
                limit: 100,
                quarantine_error: None
            })
        ));
        assert_eq!(
            storage.get("uploads", &Path::from("invalid")).await.unwrap(),
            "zip"
        );
        assert!(storage.get("uploads", &key).await.is_err());
    }

    #[tokio::test]
    async fn moves_key_as_stored_test() {
        let storage = ObjectStores::in_memory();
        let key = Path::parse("scans/2024 [raw].zip").unwrap();
        storage
            .put("uploads", &key, Bytes::from_static(b"zip"))
            .await
            .unwrap();
        let archive = ArchiveObject::new("uploads", "scans/2024 [raw].zip", 101);

        let result = check_archive_size(&storage, &archive, 100, &Path::from("invalid")).await;

        assert!(matches!(
            result,
            Err(ExtractError::ArchiveTooLarge {
                quarantine_error: None,
                ..
            })
        ));
        assert!(storage.get("uploads", &key).await.is_err());
    }

    #[tokio::test]
    async fn folds_failed_move_into_error_test() {
        // Nothing stored under the key, so the copy fails.
        let storage = ObjectStores::in_memory();
        let archive = ArchiveObject::new("uploads", "huge.zip", 101);

        let error = check_archive_size(&storage, &archive, 100, &Path::from("invalid"))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            ExtractError::ArchiveTooLarge {
                quarantine_error: Some(_),
                ..
            }
        ));
        assert!(error
            .to_string()
            .contains("failed to move archive to quarantine"));
    }
}
