//! Request and response bodies of the extraction backend.

use serde::{Deserialize, Serialize};

/// Body of `POST generate-upload-link`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLinkRequest<'a> {
    pub upload_type: &'a str,
    pub file_name: &'a str,
}

/// Raw `generate-upload-link` response.
///
/// `upload_url` is left undecoded here; see
/// [`UploadDescriptor::decode`](crate::models::UploadDescriptor::decode).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLinkResponse {
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub process_id: Option<String>,
    #[serde(default)]
    pub upload_url: Option<serde_json::Value>,
    #[serde(default)]
    pub s3_path: Option<String>,
}

/// `get-result` response: either a presigned link or an error message
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub presigned_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `generate-download-link` response
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadLinkResponse {
    pub url: String,
}

/// Generic `{statusCode, message}` envelope used to pull an error message
/// out of a failed response body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorEnvelope {
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorEnvelope {
    /// Best-effort message from a response body
    pub(crate) fn message_from(body: &str) -> String {
        serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| body.trim().to_string())
    }
}
