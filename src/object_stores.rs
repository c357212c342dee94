//! Storage backend the extractor reads archives from and writes entries to. Every operation names
//! its bucket, stores for each bucket are built on first use and reused for the rest of the
//! process.

use std::{
    collections::HashMap,
    fmt::Debug,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory, path::Path, ObjectStore,
    RetryConfig,
};
use tracing::{debug, info};

use crate::env::EnvConfig;

#[async_trait]
pub trait ObjectStorage: Debug + Send + Sync {
    /// Fetch a full object.
    async fn get(&self, bucket: &str, key: &Path) -> object_store::Result<Bytes>;

    async fn put(&self, bucket: &str, key: &Path, bytes: Bytes) -> object_store::Result<()>;

    async fn copy(
        &self,
        bucket: &str,
        src_key: &Path,
        dest_bucket: &str,
        dest_key: &Path,
    ) -> object_store::Result<()>;

    async fn delete(&self, bucket: &str, key: &Path) -> object_store::Result<()>;
}

#[derive(Debug, Clone)]
enum Backend {
    S3 { endpoint: Option<String> },
    Local { root: PathBuf },
    Memory,
}

#[derive(Debug)]
pub struct ObjectStores {
    backend: Backend,
    stores: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl ObjectStores {
    fn new(backend: Backend) -> Self {
        Self {
            backend,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// S3 stores, credentials and region come from the standard AWS environment variables.
    pub fn s3(endpoint: Option<String>) -> Self {
        Self::new(Backend::S3 { endpoint })
    }

    /// One directory per bucket under `root`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self::new(Backend::Local { root: root.into() })
    }

    pub fn in_memory() -> Self {
        Self::new(Backend::Memory)
    }

    pub fn from_env_config(env_config: &EnvConfig) -> Self {
        if env_config.use_local_store {
            info!(root = %env_config.local_store_root, "using local file store");
            Self::local(&env_config.local_store_root)
        } else {
            info!(endpoint = ?env_config.aws_endpoint, "using S3 store");
            Self::s3(env_config.aws_endpoint.clone())
        }
    }

    fn build_store(&self, bucket: &str) -> object_store::Result<Arc<dyn ObjectStore>> {
        let store: Arc<dyn ObjectStore> = match &self.backend {
            Backend::S3 { endpoint } => {
                let mut builder = AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_retry(RetryConfig {
                        retry_timeout: Duration::from_secs(16),
                        ..RetryConfig::default()
                    });
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                Arc::new(builder.build()?)
            }
            Backend::Local { root } => {
                let bucket_root = root.join(bucket);
                std::fs::create_dir_all(&bucket_root).map_err(|e| object_store::Error::Generic {
                    store: "LocalFileSystem",
                    source: Box::new(e),
                })?;
                Arc::new(LocalFileSystem::new_with_prefix(bucket_root)?)
            }
            Backend::Memory => Arc::new(InMemory::new()),
        };

        Ok(store)
    }

    /// The store for `bucket`, built on first request.
    pub fn store(&self, bucket: &str) -> object_store::Result<Arc<dyn ObjectStore>> {
        let mut stores = self
            .stores
            .lock()
            .expect("expect to acquire lock on object stores");

        if let Some(store) = stores.get(bucket) {
            return Ok(store.clone());
        }

        debug!(bucket, "building object store");
        let store = self.build_store(bucket)?;
        stores.insert(bucket.to_string(), store.clone());
        Ok(store)
    }
}

#[async_trait]
impl ObjectStorage for ObjectStores {
    async fn get(&self, bucket: &str, key: &Path) -> object_store::Result<Bytes> {
        let store = self.store(bucket)?;
        store.get(key).await?.bytes().await
    }

    async fn put(&self, bucket: &str, key: &Path, bytes: Bytes) -> object_store::Result<()> {
        let store = self.store(bucket)?;
        store.put(key, bytes).await?;
        Ok(())
    }

    async fn copy(
        &self,
        bucket: &str,
        src_key: &Path,
        dest_bucket: &str,
        dest_key: &Path,
    ) -> object_store::Result<()> {
        let src_store = self.store(bucket)?;
        if bucket == dest_bucket {
            return src_store.copy(src_key, dest_key).await;
        }

        // Stores are scoped to a bucket, crossing buckets means moving the bytes ourselves.
        let bytes = src_store.get(src_key).await?.bytes().await?;
        self.store(dest_bucket)?.put(dest_key, bytes).await?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &Path) -> object_store::Result<()> {
        self.store(bucket)?.delete(key).await
    }
}
