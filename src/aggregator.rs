//! First-failure-wins error aggregation.
//!
//! Workers and the scanner report failures through a single-slot channel without ever waiting on
//! it. If the slot is taken or the listener has already seen an error, the report is dropped: only
//! the first failure of an invocation is surfaced. The listener cancels all outstanding work as
//! soon as that first failure arrives.

use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::{ExtractError, Result};

#[derive(Clone, Debug)]
pub struct ErrorReporter {
    tx: mpsc::Sender<ExtractError>,
}

impl ErrorReporter {
    /// Report-or-drop. Returns whether the error was accepted, never waits.
    pub fn report_or_drop(&self, error: ExtractError) -> bool {
        match self.tx.try_send(error) {
            Ok(()) => true,
            Err(TrySendError::Full(error)) | Err(TrySendError::Closed(error)) => {
                debug!(%error, "an earlier error was already reported, dropping error");
                false
            }
        }
    }
}

type ListenerOutput = (Option<ExtractError>, mpsc::Receiver<ExtractError>);

pub struct ErrorAggregator {
    reporter: ErrorReporter,
    listener: JoinHandle<ListenerOutput>,
}

impl ErrorAggregator {
    /// Start listening. The first error received cancels `cancel`.
    pub fn spawn(cancel: CancellationToken) -> Self {
        let (tx, mut rx) = mpsc::channel(1);

        let listener = tokio::spawn(async move {
            let first = rx.recv().await;
            if let Some(e) = &first {
                error!(error = %e, "extraction failed, cancelling outstanding work");
                cancel.cancel();
                // Later reports see a closed channel and are dropped.
                rx.close();
            }
            (first, rx)
        });

        Self {
            reporter: ErrorReporter { tx },
            listener,
        }
    }

    pub fn reporter(&self) -> ErrorReporter {
        self.reporter.clone()
    }

    /// Wait for the listener and return the error that won, if any. Every reporter handed out must
    /// have been dropped, otherwise this waits forever.
    pub async fn finish(self) -> Result<Option<ExtractError>> {
        let Self { reporter, listener } = self;
        drop(reporter);

        let (first, mut rx) = listener.await?;
        // Anything that slipped in after the listener stopped.
        let late = rx.try_recv().ok();
        Ok(first.or(late))
    }
}
