//! Document status polling.
//!
//! Fixed-interval polling of a document until it reaches a terminal status.
//! Attempts within one poll are strictly sequential: the next fetch starts
//! only after the previous response and the interval sleep.

mod coalesce;

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ExtractionClient;
use crate::config::PollingConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{DocumentRecord, DocumentStatus};

pub use coalesce::PollCoalescer;

/// Callback invoked with every snapshot fetched. An `Err` aborts the poll
/// and is returned to the caller unchanged.
pub type Observer<'a> = &'a mut (dyn FnMut(&DocumentRecord) -> ClientResult<()> + Send);

/// Anything that can fetch a document snapshot by id
pub trait DocumentSource: Send + Sync {
    fn fetch_document(
        &self,
        document_id: &str,
    ) -> impl Future<Output = ClientResult<DocumentRecord>> + Send;
}

impl DocumentSource for ExtractionClient {
    fn fetch_document(
        &self,
        document_id: &str,
    ) -> impl Future<Output = ClientResult<DocumentRecord>> + Send {
        self.get_document(document_id)
    }
}

/// Polling bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            max_attempts: 60,
        }
    }
}

impl From<&PollingConfig> for PollOptions {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_attempts: config.max_attempts,
        }
    }
}

/// Poll until the document is `completed`, returning that snapshot.
///
/// Fails with [`ClientError::ProcessingFailed`] as soon as a `failed`
/// snapshot is seen, with [`ClientError::PollingTimeout`] after
/// `max_attempts` non-terminal snapshots (no further fetch is made), and
/// with [`ClientError::Cancelled`] once `cancel` fires. Fetch errors are
/// returned immediately.
pub async fn poll_until_complete<S: DocumentSource>(
    source: &S,
    document_id: &str,
    options: &PollOptions,
    cancel: &CancellationToken,
    mut observer: Option<Observer<'_>>,
) -> ClientResult<DocumentRecord> {
    let cancelled = || ClientError::Cancelled {
        document_id: document_id.to_string(),
    };

    let mut attempts = 0;
    while attempts < options.max_attempts {
        let record = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            record = source.fetch_document(document_id) => record?,
        };

        if let Some(observer) = observer.as_mut() {
            observer(&record)?;
        }

        match record.status {
            DocumentStatus::Completed => {
                info!(doc_id = %document_id, attempts = attempts + 1, "Document processing completed");
                return Ok(record);
            }
            DocumentStatus::Failed => {
                warn!(doc_id = %document_id, "Document processing failed");
                return Err(ClientError::ProcessingFailed {
                    document_id: document_id.to_string(),
                });
            }
            DocumentStatus::Processing => {}
        }

        attempts += 1;
        debug!(doc_id = %document_id, attempt = attempts, "Document still processing");

        if attempts < options.max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = tokio::time::sleep(options.interval) => {}
            }
        }
    }

    warn!(doc_id = %document_id, attempts, "Polling timed out");
    Err(ClientError::PollingTimeout {
        document_id: document_id.to_string(),
        attempts,
    })
}
