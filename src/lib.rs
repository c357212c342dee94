//! # Archive Extractor
//! Takes a zip archive which landed in an object storage bucket, and writes every entry it holds
//! back to the bucket under a prefix named after the archive, `images.zip` becomes `images/...`.
//!
//! ## Architecture
//! - An oversize guard which quarantines archives too large to fetch, before fetching them.
//! - A scanner which walks the archive directory in stored order, enforcing quotas on the entry
//!   count and the cumulative decompressed size, and queues admitted entries.
//! - A fixed size worker pool which decodes entries and writes them to the store.
//! - An error aggregator which keeps the first failure and cancels all outstanding work.
//!
//! Quotas are enforced against the sizes the archive declares in its directory, not the bytes an
//! entry actually decodes to. An archive which under-declares its entries gets past the quota.
pub mod aggregator;
pub mod archive;
pub mod config;
pub mod env;
pub mod error;
pub mod event;
pub mod extractor;
pub mod log;
pub mod object_stores;
pub mod performance;
pub mod quarantine;
pub mod quota;
pub mod scanner;
pub mod workers;

pub use config::ExtractConfig;
pub use error::ExtractError;
pub use event::{ArchiveObject, StorageEvent};
pub use extractor::{Extractor, SUCCESS_MARKER};
pub use object_stores::{ObjectStorage, ObjectStores};
