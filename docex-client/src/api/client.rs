//! Extraction backend HTTP client implementation.

use std::path::Path;

use futures::StreamExt;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::responses::{
    DownloadLinkResponse, ErrorEnvelope, ResultResponse, UploadLinkRequest, UploadLinkResponse,
};
use crate::config::{ApiConfig, ClientConfig, UploadConfig};
use crate::error::{ClientError, ClientResult};
use crate::models::{DocumentRecord, UploadDescriptor, UploadLink};

/// Extraction backend client.
///
/// Cheap to clone; clones share the underlying connection pool. Construct
/// one per backend and pass it to whatever needs it.
#[derive(Clone)]
pub struct ExtractionClient {
    client: Client,
    api: ApiConfig,
    upload: UploadConfig,
}

impl ExtractionClient {
    /// Create a new client from configuration
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.api.timeout())
            .user_agent(config.api.user_agent.as_str())
            .build()
            .map_err(|e| ClientError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api: config.api.clone(),
            upload: config.upload.clone(),
        })
    }

    pub fn api_config(&self) -> &ApiConfig {
        &self.api
    }

    pub fn upload_config(&self) -> &UploadConfig {
        &self.upload
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Request a presigned upload descriptor for `file_name`
    pub async fn generate_upload_link(&self, file_name: &str) -> ClientResult<UploadLink> {
        let url = self.api.endpoint("generate-upload-link");
        let request = UploadLinkRequest {
            upload_type: &self.upload.upload_type,
            file_name,
        };

        debug!(url = %url, file_name = %file_name, "Requesting upload link");
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::LinkGeneration {
                status: status.as_u16(),
                message: ErrorEnvelope::message_from(&body),
            });
        }

        let body: UploadLinkResponse = read_json(&url, response).await?;
        if let Some(code) = body.status_code
            && code != 200
        {
            return Err(ClientError::LinkGeneration {
                status: code,
                message: body
                    .message
                    .unwrap_or_else(|| "Failed to generate upload link".to_string()),
            });
        }

        let descriptor = body.upload_url.map(UploadDescriptor::decode).transpose()?.ok_or_else(
            || ClientError::MalformedDescriptor {
                message: "response has no uploadUrl".to_string(),
            },
        )?;

        // Older deployments omit s3Path; the descriptor key is the same value.
        let s3_path = body
            .s3_path
            .or_else(|| descriptor.key())
            .unwrap_or_default();

        Ok(UploadLink {
            descriptor,
            s3_path,
            process_id: body.process_id,
        })
    }

    /// Fetch the current snapshot of a document
    pub async fn get_document(&self, document_id: &str) -> ClientResult<DocumentRecord> {
        let url = format!(
            "{}?documentId={}",
            self.api.endpoint("get-document"),
            urlencoding::encode(document_id)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;

        if !response.status().is_success() {
            return Err(ClientError::DocumentFetch {
                document_id: document_id.to_string(),
                status: response.status().as_u16(),
            });
        }

        read_json(&url, response).await
    }

    /// Resolve the presigned URL of a document's exported result file
    pub async fn result_link(&self, document_id: &str) -> ClientResult<String> {
        let url = format!(
            "{}?documentId={}",
            self.api.endpoint("get-result"),
            urlencoding::encode(document_id)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Export {
                message: format!(
                    "Failed to fetch CSV: {} ({})",
                    status,
                    ErrorEnvelope::message_from(&body)
                ),
            });
        }

        let body: ResultResponse = read_json(&url, response).await?;
        match (body.status_code, body.presigned_url) {
            (Some(200), Some(link)) if !link.is_empty() => Ok(link),
            (_, _) => Err(ClientError::Export {
                message: body
                    .message
                    .unwrap_or_else(|| "Failed to get CSV download link".to_string()),
            }),
        }
    }

    /// Resolve a presigned download URL for an object in storage
    pub async fn generate_download_link(&self, s3_path: &str) -> ClientResult<String> {
        let url = format!(
            "{}?s3Path={}",
            self.api.endpoint("generate-download-link"),
            urlencoding::encode(s3_path)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;

        if !response.status().is_success() {
            return Err(ClientError::DownloadLink {
                s3_path: s3_path.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body: DownloadLinkResponse = read_json(&url, response).await?;
        Ok(body.url)
    }

    /// Stream a (presigned) URL to a local file, returning the byte count
    pub async fn download_to(&self, url: &str, destination: &Path) -> ClientResult<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        if !response.status().is_success() {
            return Err(ClientError::Download {
                url: redact_query(url),
                status: response.status().as_u16(),
            });
        }

        // Stream into a sibling temp file; the destination is only replaced
        // once the whole body has arrived. Dropping `temp_path` on an early
        // return deletes the partial file.
        let directory = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let (temp_file, temp_path) = NamedTempFile::new_in(directory)?.into_parts();
        let mut file = tokio::fs::File::from_std(temp_file);

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| request_error(url, e))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);
        temp_path.persist(destination).map_err(std::io::Error::from)?;

        info!(
            path = %destination.display(),
            bytes = written,
            "Downloaded file"
        );
        Ok(written)
    }
}

pub(crate) fn request_error(url: &str, source: reqwest::Error) -> ClientError {
    ClientError::Request {
        url: redact_query(url),
        source,
    }
}

/// Read a response body and decode it as JSON
async fn read_json<T: DeserializeOwned>(url: &str, response: Response) -> ClientResult<T> {
    let body = response.text().await.map_err(|e| request_error(url, e))?;
    serde_json::from_str(&body).map_err(|e| ClientError::InvalidResponse {
        url: redact_query(url),
        source: e,
    })
}

/// Presigned URLs carry credentials in the query string; keep them out of errors and logs.
pub(crate) fn redact_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?…", base),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentStatus;
    use crate::testing::MockBackend;
    use axum::http::StatusCode;

    #[test]
    fn test_redact_query() {
        assert_eq!(
            redact_query("https://bucket.s3.amazonaws.com/k.pdf?X-Amz-Signature=abc"),
            "https://bucket.s3.amazonaws.com/k.pdf?…"
        );
        assert_eq!(redact_query("http://backend/get"), "http://backend/get");
    }

    #[tokio::test]
    async fn test_generate_upload_link_decodes_string_descriptor() {
        let backend = MockBackend::start().await;
        let client = ExtractionClient::new(&backend.config()).unwrap();

        let link = client.generate_upload_link("po.pdf").await.unwrap();
        assert!(link.s3_path.starts_with("input/"));
        assert!(link.s3_path.ends_with("/po.pdf"));
        assert_eq!(link.descriptor.key().as_deref(), Some(link.s3_path.as_str()));
        assert_eq!(link.descriptor.url, backend.storage_url());

        let requests = backend.link_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["uploadType"], "document");
        assert_eq!(requests[0]["fileName"], "po.pdf");
    }

    #[tokio::test]
    async fn test_generate_upload_link_reports_backend_rejection() {
        let backend = MockBackend::start().await;
        backend.set_link_response(
            StatusCode::BAD_REQUEST,
            serde_json::json!({"statusCode": 400, "message": "fileName parameter is required"}),
        );
        let client = ExtractionClient::new(&backend.config()).unwrap();

        let err = client.generate_upload_link("").await.unwrap_err();
        match err {
            ClientError::LinkGeneration { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "fileName parameter is required");
            }
            other => panic!("Expected LinkGeneration, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_upload_link_rejects_missing_descriptor() {
        let backend = MockBackend::start().await;
        backend.set_link_response(
            StatusCode::OK,
            serde_json::json!({"statusCode": 200, "message": "Success", "s3Path": "input/x/a.pdf"}),
        );
        let client = ExtractionClient::new(&backend.config()).unwrap();

        let err = client.generate_upload_link("a.pdf").await.unwrap_err();
        assert!(matches!(err, ClientError::MalformedDescriptor { .. }));
    }

    #[tokio::test]
    async fn test_get_document() {
        let backend = MockBackend::start().await;
        backend.script_document(
            "doc-1",
            vec![serde_json::json!({
                "statusCode": 200,
                "documentId": "doc-1",
                "status": "completed",
                "s3Key": "input/doc-1/po.pdf",
                "data": {"formData": [], "tableData": []}
            })],
        );
        let client = ExtractionClient::new(&backend.config()).unwrap();

        let record = client.get_document("doc-1").await.unwrap();
        assert_eq!(record.status, DocumentStatus::Completed);
        assert_eq!(record.s3_key.as_deref(), Some("input/doc-1/po.pdf"));
        assert_eq!(backend.document_fetches("doc-1"), 1);
    }

    #[tokio::test]
    async fn test_get_document_http_failure() {
        let backend = MockBackend::start().await;
        backend.fail_documents(StatusCode::INTERNAL_SERVER_ERROR);
        let client = ExtractionClient::new(&backend.config()).unwrap();

        let err = client.get_document("doc-1").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::DocumentFetch { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn test_generate_download_link_encodes_path() {
        let backend = MockBackend::start().await;
        let client = ExtractionClient::new(&backend.config()).unwrap();

        let url = client
            .generate_download_link("input/doc 1/my file.pdf")
            .await
            .unwrap();
        assert_eq!(backend.download_link_paths(), vec!["input/doc 1/my file.pdf"]);
        assert!(url.starts_with(&backend.url()));
    }

    #[tokio::test]
    async fn test_download_to_file() {
        let backend = MockBackend::start().await;
        let client = ExtractionClient::new(&backend.config()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("po.pdf");

        let url = client.generate_download_link("input/doc-1/po.pdf").await.unwrap();
        let written = client.download_to(&url, &destination).await.unwrap();

        let content = std::fs::read(&destination).unwrap();
        assert_eq!(written as usize, content.len());
        assert!(content.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn test_interrupted_download_keeps_previous_file() {
        let backend = MockBackend::start().await;
        let client = ExtractionClient::new(&backend.config()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("export.xlsx");
        std::fs::write(&destination, b"previous export").unwrap();

        let result = client
            .download_to(&format!("{}/truncated", backend.url()), &destination)
            .await;

        assert!(result.is_err());
        assert_eq!(std::fs::read(&destination).unwrap(), b"previous export");
        // No partial temp file left beside it
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_download_replaces_existing_file() {
        let backend = MockBackend::start().await;
        let client = ExtractionClient::new(&backend.config()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("po.pdf");
        std::fs::write(&destination, b"stale").unwrap();

        let url = client.generate_download_link("input/doc-1/po.pdf").await.unwrap();
        client.download_to(&url, &destination).await.unwrap();

        assert!(std::fs::read(&destination).unwrap().starts_with(b"%PDF-"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_download_missing_object() {
        let backend = MockBackend::start().await;
        let client = ExtractionClient::new(&backend.config()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = client
            .download_to(&format!("{}/missing?sig=secret", backend.url()), &dir.path().join("x"))
            .await
            .unwrap_err();
        match err {
            ClientError::Download { url, status } => {
                assert_eq!(status, 404);
                assert!(!url.contains("secret"));
            }
            other => panic!("Expected Download, got {:?}", other),
        }
    }
}
