//! Document upload: validation, presigned link, direct POST to storage.
//!
//! The flow is three sequential steps with no retries:
//! 1. validate the file locally (type and size),
//! 2. ask the backend for a presigned POST descriptor,
//! 3. POST the descriptor fields and the file straight to object storage.
//!
//! The document id is recovered from the storage key the descriptor names.

use std::path::Path;

use bytes::Bytes;
use mime::Mime;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info, warn};

use crate::api::{ExtractionClient, request_error};
use crate::config::UploadConfig;
use crate::error::{ClientError, ClientResult, ValidationError};
use crate::models::{UploadDescriptor, UploadReceipt};

/// Storage keys of uploaded documents look like `input/<documentId>/<filename>`
pub const INPUT_KEY_PREFIX: &str = "input";

/// A file selected for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    content_type: Mime,
    content: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: Mime, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type,
            content: content.into(),
        }
    }

    /// Read a file from disk, deriving its content type from the extension
    pub async fn from_path(path: &Path) -> ClientResult<Self> {
        let content = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, content_type_for(path), content))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &Mime {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Content type for a path, by extension
pub fn content_type_for(path: &Path) -> Mime {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => mime::APPLICATION_PDF,
        Some("png") => mime::IMAGE_PNG,
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        Some("csv") => mime::TEXT_CSV,
        Some("txt") => mime::TEXT_PLAIN,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// Check a file against the upload rules
pub fn validate(file: &UploadFile, rules: &UploadConfig) -> Result<(), ValidationError> {
    if file.name.trim().is_empty() {
        return Err(ValidationError::EmptyFileName);
    }
    if file.size() > rules.max_file_size_bytes {
        return Err(ValidationError::FileTooLarge {
            size: file.size(),
            max: rules.max_file_size_bytes,
        });
    }
    if !file
        .content_type
        .essence_str()
        .eq_ignore_ascii_case(&rules.allowed_content_type)
    {
        return Err(ValidationError::UnsupportedContentType {
            content_type: file.content_type.essence_str().to_string(),
        });
    }
    Ok(())
}

/// Document id encoded in a storage key of the form `input/<documentId>/<filename>`.
///
/// Returns `None` when the key does not start with the `input` segment or has
/// fewer than two segments.
pub fn extract_document_id(s3_key: &str) -> Option<String> {
    let mut parts = s3_key.split('/');
    match (parts.next(), parts.next()) {
        (Some(INPUT_KEY_PREFIX), Some(id)) if !id.is_empty() => Some(id.to_string()),
        _ => None,
    }
}

impl ExtractionClient {
    /// POST a file to storage using a presigned descriptor.
    ///
    /// Descriptor fields go first, in order, and the file part last; the
    /// storage provider ignores anything after the file.
    pub async fn upload_file(
        &self,
        descriptor: &UploadDescriptor,
        file: &UploadFile,
    ) -> ClientResult<()> {
        let mut form = Form::new();
        for (name, value) in descriptor.form_fields() {
            form = form.text(name.to_string(), value);
        }

        let part = Part::stream_with_length(reqwest::Body::from(file.content.clone()), file.size())
            .file_name(file.name.clone())
            .mime_str(file.content_type.as_ref())
            .map_err(|e| request_error(&descriptor.url, e))?;
        form = form.part("file", part);

        debug!(
            url = %crate::api::redact_query(&descriptor.url),
            fields = descriptor.fields.len(),
            "Posting file to storage"
        );
        let response = self
            .http()
            .post(&descriptor.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| request_error(&descriptor.url, e))?;

        // Storage answers 204 No Content on success
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Upload {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Validate, request a link, and upload; the complete upload flow
    pub async fn complete_upload(&self, file: &UploadFile) -> ClientResult<UploadReceipt> {
        validate(file, self.upload_config())?;

        info!(file_name = %file.name, size = file.size(), "Uploading document");
        let link = self.generate_upload_link(&file.name).await?;
        self.upload_file(&link.descriptor, file).await?;

        let s3_key = link.descriptor.key();
        let document_id = s3_key.as_deref().and_then(extract_document_id);
        match &document_id {
            Some(id) => info!(doc_id = %id, s3_path = %link.s3_path, "Upload complete"),
            None => warn!(
                s3_key = ?s3_key,
                "Upload complete but the storage key does not carry a document id"
            ),
        }

        Ok(UploadReceipt {
            document_id,
            s3_key,
            s3_path: link.s3_path,
        })
    }
}
