//! Client for an asynchronous document-extraction service.
//!
//! Upload a PDF straight to object storage through a presigned POST, poll the
//! backend until extraction finishes, then read the extracted header fields
//! and line items, preview the source PDF, or export the result.

pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod poller;
pub mod upload;
pub mod view;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use api::ExtractionClient;
pub use config::{ClientConfig, load_config};
pub use error::{ClientError, ClientResult, ValidationError};
pub use export::Navigator;
pub use models::{DocumentRecord, DocumentStatus, UploadReceipt};
pub use poller::{DocumentSource, PollCoalescer, PollOptions, poll_until_complete};
pub use upload::{UploadFile, extract_document_id};
pub use view::{DocumentView, ItemStatus};
pub use workflow::{DocumentWorkflow, ExtractionView};
