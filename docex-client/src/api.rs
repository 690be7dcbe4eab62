//! Extraction backend API.
//!
//! Four JSON routes under a common prefix (`generate-upload-link`,
//! `get-document`, `get-result`, `generate-download-link`) plus plain
//! downloads of presigned URLs.

mod client;
mod responses;

pub use client::ExtractionClient;
pub(crate) use client::{redact_query, request_error};
pub use responses::{DownloadLinkResponse, ResultResponse, UploadLinkRequest, UploadLinkResponse};
