use std::sync::Arc;

use thiserror::Error;

/// Main client error type
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Upload link generation failed (status {status}): {message}")]
    LinkGeneration { status: u16, message: String },

    #[error("Malformed upload descriptor: {message}")]
    MalformedDescriptor { message: String },

    #[error("Upload to storage failed (status {status}): {body}")]
    Upload { status: u16, body: String },

    #[error("Failed to fetch document {document_id} (status {status})")]
    DocumentFetch { document_id: String, status: u16 },

    #[error("Document processing failed: {document_id}")]
    ProcessingFailed { document_id: String },

    #[error("Polling timeout: document {document_id} not complete after {attempts} attempts")]
    PollingTimeout { document_id: String, attempts: u32 },

    #[error("Polling cancelled for document {document_id}")]
    Cancelled { document_id: String },

    #[error("Download link generation failed (status {status}) for {s3_path}")]
    DownloadLink { s3_path: String, status: u16 },

    #[error("Polling for document {document_id} stopped without a result")]
    PollInterrupted { document_id: String },

    #[error("No PDF preview available for document {document_id}")]
    PreviewUnavailable { document_id: String },

    #[error("Download of {url} failed (status {status})")]
    Download { url: String, status: u16 },

    #[error("Export failed: {message}")]
    Export { message: String },

    #[error("Request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid response from {url}")]
    InvalidResponse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Update observer failed: {message}")]
    Observer { message: String },

    /// One failure delivered to every caller of a coalesced poll
    #[error(transparent)]
    Shared(Arc<ClientError>),
}

/// File validation errors, raised before any network call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },

    #[error("File has no name")]
    EmptyFileName,
}

impl ClientError {
    /// Look through `Shared` wrappers to the error that actually happened.
    pub fn root(&self) -> &ClientError {
        match self {
            ClientError::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self.root() {
            ClientError::Validation(ValidationError::FileTooLarge { .. }) => "file_too_large",
            ClientError::Validation(ValidationError::UnsupportedContentType { .. }) => {
                "unsupported_content_type"
            }
            ClientError::Validation(ValidationError::EmptyFileName) => "empty_file_name",
            ClientError::LinkGeneration { .. } => "link_generation_failed",
            ClientError::MalformedDescriptor { .. } => "malformed_descriptor",
            ClientError::Upload { .. } => "upload_failed",
            ClientError::DocumentFetch { .. } => "document_fetch_failed",
            ClientError::ProcessingFailed { .. } => "processing_failed",
            ClientError::PollingTimeout { .. } => "polling_timeout",
            ClientError::Cancelled { .. } => "cancelled",
            ClientError::DownloadLink { .. } => "download_link_failed",
            ClientError::PollInterrupted { .. } => "poll_interrupted",
            ClientError::PreviewUnavailable { .. } => "preview_unavailable",
            ClientError::Download { .. } => "download_failed",
            ClientError::Export { .. } => "export_failed",
            ClientError::Request { .. } => "request_failed",
            ClientError::InvalidResponse { .. } => "invalid_response",
            ClientError::Io(_) => "io_error",
            ClientError::Config { .. } => "config_error",
            ClientError::Observer { .. } => "observer_failed",
            ClientError::Shared(_) => unreachable!("root() never returns Shared"),
        }
    }

    /// Message suitable for showing to the person who started the flow
    pub fn user_message(&self) -> String {
        match self.root() {
            ClientError::Validation(ValidationError::FileTooLarge { max, .. }) => {
                format!("File size exceeds {} limit", format_size(*max))
            }
            ClientError::Validation(ValidationError::UnsupportedContentType { .. }) => {
                "Only PDF files are supported".to_string()
            }
            ClientError::Validation(ValidationError::EmptyFileName) => {
                "Please choose a file to upload".to_string()
            }
            ClientError::LinkGeneration { .. }
            | ClientError::MalformedDescriptor { .. }
            | ClientError::Upload { .. } => "Failed to upload file. Please try again.".to_string(),
            ClientError::Export { .. } => "Failed to export CSV. Please try again.".to_string(),
            ClientError::ProcessingFailed { .. } => "Document processing failed".to_string(),
            ClientError::PollingTimeout { .. } => {
                "Polling timeout: Document processing took too long".to_string()
            }
            ClientError::Cancelled { .. } => "Stopped waiting for the document".to_string(),
            // For other errors, fall back to the technical message
            other => other.to_string(),
        }
    }

    /// Whether the person should simply try the same action again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            ClientError::LinkGeneration { .. }
                | ClientError::Upload { .. }
                | ClientError::Export { .. }
                | ClientError::DownloadLink { .. }
                | ClientError::Download { .. }
                | ClientError::DocumentFetch { .. }
                | ClientError::PollInterrupted { .. }
                | ClientError::Request { .. }
        )
    }
}

impl From<Arc<ClientError>> for ClientError {
    fn from(error: Arc<ClientError>) -> Self {
        ClientError::Shared(error)
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Render an error and its `source()` chain on one line, for logs.
pub fn format_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        let message = source.to_string();
        if !rendered.ends_with(&message) {
            rendered.push_str(": ");
            rendered.push_str(&message);
        }
        current = source.source();
    }
    rendered
}

fn format_size(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{} bytes", bytes)
    }
}
