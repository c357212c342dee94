//! Random-access view over a fully fetched archive.

use std::io::{Cursor, Read};

use bytes::Bytes;
use thiserror::Error;
use zip::ZipArchive;

/// Entries larger than this are not pre-allocated for, declared sizes are untrusted.
const MAX_PREALLOCATION: u64 = 8 * 1024 * 1024;

/// Directory metadata of a single entry, as stored in the archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub index: usize,
    /// Relative path within the archive.
    pub name: String,
    /// Decompressed size claimed by the archive's directory, not verified until read.
    pub declared_size: u64,
    pub is_dir: bool,
}

#[derive(Debug, Error)]
pub enum EntryError {
    #[error("{0}")]
    Open(String),
    #[error(transparent)]
    Read(#[from] std::io::Error),
}

pub trait ArchiveReader: Send + Sync {
    /// Entries in stored order.
    fn entries(&self) -> &[ArchiveEntry];

    /// Open the entry at `index` and read it to the end. The entry's stream is released before
    /// this returns. Blocking.
    fn read_entry(&self, index: usize) -> Result<Vec<u8>, EntryError>;
}

pub struct ZipArchiveReader {
    archive: ZipArchive<Cursor<Bytes>>,
    entries: Vec<ArchiveEntry>,
}

impl ZipArchiveReader {
    /// Parses the central directory. Fails on anything that isn't a readable zip.
    pub fn new(bytes: Bytes) -> zip::result::ZipResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index)?;
            entries.push(ArchiveEntry {
                index,
                name: file.name().to_string(),
                declared_size: file.size(),
                is_dir: file.is_dir(),
            });
        }

        Ok(Self { archive, entries })
    }
}

impl ArchiveReader for ZipArchiveReader {
    fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    fn read_entry(&self, index: usize) -> Result<Vec<u8>, EntryError> {
        // Clones share the parsed directory and the underlying bytes, each reader gets its own
        // cursor.
        let mut archive = self.archive.clone();
        let mut file = archive
            .by_index(index)
            .map_err(|e| EntryError::Open(e.to_string()))?;

        let capacity = file.size().min(MAX_PREALLOCATION) as usize;
        let mut buf = Vec::with_capacity(capacity);
        file.read_to_end(&mut buf)?;

        Ok(buf)
    }
}
