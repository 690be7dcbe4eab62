//! Opening a document: wait for extraction and resolve the PDF preview together.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{ExtractionClient, redact_query};
use crate::config::ClientConfig;
use crate::error::{ClientResult, format_error_chain};
use crate::models::DocumentRecord;
use crate::poller::{Observer, PollCoalescer, PollOptions};
use crate::view::DocumentView;

/// A completed document with its display view and, if it resolved, a preview link
#[derive(Debug, Clone)]
pub struct ExtractionView {
    pub record: DocumentRecord,
    pub view: DocumentView,
    pub pdf_url: Option<String>,
}

/// Client plus a shared poll coalescer; clone freely.
#[derive(Clone)]
pub struct DocumentWorkflow {
    client: ExtractionClient,
    polls: PollCoalescer<ExtractionClient>,
}

impl DocumentWorkflow {
    pub fn new(client: ExtractionClient, options: PollOptions) -> Self {
        let polls = PollCoalescer::new(Arc::new(client.clone()), options);
        Self { client, polls }
    }

    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let client = ExtractionClient::new(config)?;
        Ok(Self::new(client, PollOptions::from(&config.polling)))
    }

    pub fn client(&self) -> &ExtractionClient {
        &self.client
    }

    pub fn polls(&self) -> &PollCoalescer<ExtractionClient> {
        &self.polls
    }

    /// Wait for `document_id` to complete and resolve its PDF preview link.
    ///
    /// Both halves wait on the same shared poll. A preview link that cannot
    /// be resolved is logged and left out; only the status poll can fail
    /// the call, and when it does the preview half is stopped with it.
    pub async fn open_document(
        &self,
        document_id: &str,
        cancel: &CancellationToken,
        observer: Option<Observer<'_>>,
    ) -> ClientResult<ExtractionView> {
        // Stop the preview half when the status half fails
        let preview_cancel = cancel.child_token();
        let status = async {
            let result = self
                .polls
                .poll_until_complete(document_id, cancel, observer)
                .await;
            if result.is_err() {
                preview_cancel.cancel();
            }
            result
        };
        let (record, pdf_url) = tokio::join!(status, self.preview_url(document_id, &preview_cancel));
        let record = record?;

        info!(
            doc_id = %document_id,
            header_fields = record.data.form_data.len(),
            line_items = record.data.table_data.len(),
            preview = pdf_url.is_some(),
            "Document ready"
        );
        Ok(ExtractionView {
            view: DocumentView::from_record(&record),
            record,
            pdf_url,
        })
    }

    /// Presigned link to the source PDF, once the document has completed
    pub async fn preview_url(&self, document_id: &str, cancel: &CancellationToken) -> Option<String> {
        let record = match self.polls.poll_until_complete(document_id, cancel, None).await {
            Ok(record) => record,
            Err(e) => {
                warn!(doc_id = %document_id, error = %format_error_chain(&e), "Skipping PDF preview");
                return None;
            }
        };

        let Some(s3_key) = record.s3_key.as_deref().filter(|k| !k.is_empty()) else {
            warn!(doc_id = %document_id, "Completed document has no storage key, skipping PDF preview");
            return None;
        };

        match self.client.generate_download_link(s3_key).await {
            Ok(url) => {
                info!(doc_id = %document_id, url = %redact_query(&url), "Resolved PDF preview link");
                Some(url)
            }
            Err(e) => {
                warn!(doc_id = %document_id, error = %format_error_chain(&e), "Failed to resolve PDF preview link");
                None
            }
        }
    }
}
