//! Extracts the archive named by a storage notification.
//!
//! Usage: `unzip-archive [EVENT_JSON_PATH]`, the notification is read from stdin when no path is
//! given.
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use unzipper::{
    env::ENV_CONFIG, log, ExtractConfig, Extractor, ObjectStorage, ObjectStores, StorageEvent,
};

async fn read_event(path: Option<String>) -> Result<StorageEvent> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read event from {path}"))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("failed to read event from stdin")?;
            raw
        }
    };

    serde_json::from_str(&raw).context("failed to parse event")
}

#[tokio::main]
async fn main() -> Result<()> {
    log::init();

    info!("starting archive extractor");

    let event = read_event(std::env::args().nth(1)).await?;
    if event.records.len() > 1 {
        warn!(
            records = event.records.len(),
            "event carries more than one record, only the first is extracted"
        );
    }

    // Built once, shared by everything that follows.
    let storage: Arc<dyn ObjectStorage> = Arc::new(ObjectStores::from_env_config(&ENV_CONFIG));
    let extractor = Extractor::new(storage, ExtractConfig::from(&*ENV_CONFIG));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("received interrupt, cancelling extraction");
                shutdown.cancel();
            }
        }
    });

    match extractor.handle_event(&event, &shutdown).await {
        Ok(marker) => {
            println!("{marker}");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "extraction failed");
            Err(e.into())
        }
    }
}
