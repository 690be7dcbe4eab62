//! In-process mock of the extraction backend and object store for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::config::ClientConfig;

const PDF_BYTES: &[u8] = b"%PDF-1.4\n% mock\n%%EOF\n";

/// One multipart POST received by the mock object store
#[derive(Debug, Clone)]
pub(crate) struct ReceivedUpload {
    /// Part names in the order they arrived
    pub part_names: Vec<String>,
    pub fields: HashMap<String, String>,
    pub file_name: Option<String>,
    pub file_content_type: Option<String>,
    pub file_len: usize,
}

#[derive(Default)]
struct MockState {
    base_url: String,
    link_requests: Mutex<Vec<Value>>,
    link_response: Mutex<Option<(StatusCode, Value)>>,
    storage_status: Mutex<Option<StatusCode>>,
    uploads: Mutex<Vec<ReceivedUpload>>,
    documents: Mutex<HashMap<String, VecDeque<Value>>>,
    document_fetches: Mutex<HashMap<String, usize>>,
    document_failure: Mutex<Option<StatusCode>>,
    result_response: Mutex<Option<(StatusCode, Value)>>,
    result_requests: Mutex<Vec<String>>,
    download_link_paths: Mutex<Vec<String>>,
}

/// Running mock backend bound to an ephemeral local port
pub(crate) struct MockBackend {
    state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState {
            base_url: format!("http://{}", addr),
            ..Default::default()
        });

        let app = Router::new()
            .route("/lite-demo/generate-upload-link", post(generate_upload_link))
            .route("/lite-demo/get-document", get(get_document))
            .route("/lite-demo/get-result", get(get_result))
            .route("/lite-demo/generate-download-link", get(generate_download_link))
            .route("/storage", post(storage_upload))
            .route("/files/{*path}", get(serve_file))
            .route("/truncated", get(serve_truncated))
            .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { state }
    }

    pub fn url(&self) -> String {
        self.state.base_url.clone()
    }

    pub fn storage_url(&self) -> String {
        format!("{}/storage", self.state.base_url)
    }

    /// Client configuration pointing at this backend, with a fast poll interval
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.api.base_url = self.url();
        config.polling.interval_ms = 10;
        config
    }

    pub fn set_link_response(&self, status: StatusCode, body: Value) {
        *self.state.link_response.lock().unwrap() = Some((status, body));
    }

    pub fn set_storage_status(&self, status: StatusCode) {
        *self.state.storage_status.lock().unwrap() = Some(status);
    }

    /// Queue get-document bodies for a document; the last one repeats
    pub fn script_document(&self, document_id: &str, bodies: Vec<Value>) {
        self.state
            .documents
            .lock()
            .unwrap()
            .insert(document_id.to_string(), bodies.into());
    }

    pub fn fail_documents(&self, status: StatusCode) {
        *self.state.document_failure.lock().unwrap() = Some(status);
    }

    pub fn set_result_response(&self, status: StatusCode, body: Value) {
        *self.state.result_response.lock().unwrap() = Some((status, body));
    }

    pub fn link_requests(&self) -> Vec<Value> {
        self.state.link_requests.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.state.uploads.lock().unwrap().clone()
    }

    pub fn document_fetches(&self, document_id: &str) -> usize {
        self.state
            .document_fetches
            .lock()
            .unwrap()
            .get(document_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn result_requests(&self) -> Vec<String> {
        self.state.result_requests.lock().unwrap().clone()
    }

    pub fn download_link_paths(&self) -> Vec<String> {
        self.state.download_link_paths.lock().unwrap().clone()
    }

    /// Total requests that reached the backend or the store
    pub fn request_count(&self) -> usize {
        self.state.link_requests.lock().unwrap().len()
            + self.state.uploads.lock().unwrap().len()
            + self
                .state
                .document_fetches
                .lock()
                .unwrap()
                .values()
                .sum::<usize>()
            + self.state.result_requests.lock().unwrap().len()
            + self.state.download_link_paths.lock().unwrap().len()
    }
}

/// A get-document body for a document in the given state
pub(crate) fn document_body(document_id: &str, status: &str) -> Value {
    json!({
        "statusCode": 200,
        "message": "Success",
        "documentId": document_id,
        "status": status,
        "s3Key": format!("input/{}/po.pdf", document_id),
        "fileName": "po.pdf",
        "data": {
            "formData": [
                {"columnName": "poNumber", "displayName": "PO Number",
                 "columnValue": "PO-1001", "confidenceScore": 98, "assessException": ""}
            ],
            "tableData": [[
                {"columnName": "description", "displayName": "Description",
                 "columnValue": "Widget", "confidenceScore": 91},
                {"columnName": "itemStatus", "displayName": "Status",
                 "columnValue": "Matched", "confidenceScore": 0}
            ]]
        }
    })
}

async fn generate_upload_link(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> Response {
    state.link_requests.lock().unwrap().push(body.clone());

    if let Some((status, response)) = state.link_response.lock().unwrap().clone() {
        return (status, Json(response)).into_response();
    }

    let file_name = body["fileName"].as_str().unwrap_or_default();
    let process_id = uuid::Uuid::new_v4().to_string();
    let key = format!("input/{}/{}", process_id, file_name);
    let descriptor = json!({
        "url": format!("{}/storage", state.base_url),
        "fields": {
            "key": key,
            "x-amz-algorithm": "AWS4-HMAC-SHA256",
            "policy": "eyJjb25kaXRpb25zIjpbXX0=",
            "x-amz-signature": "0f1e2d"
        }
    });

    // The real backend sends the descriptor JSON-encoded inside a string
    Json(json!({
        "statusCode": 200,
        "message": "Success",
        "processId": process_id,
        "uploadUrl": descriptor.to_string(),
        "s3Path": key,
    }))
    .into_response()
}

async fn storage_upload(State(state): State<Arc<MockState>>, mut multipart: Multipart) -> Response {
    let mut upload = ReceivedUpload {
        part_names: Vec::new(),
        fields: HashMap::new(),
        file_name: None,
        file_content_type: None,
        file_len: 0,
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        upload.part_names.push(name.clone());
        if name == "file" {
            upload.file_name = field.file_name().map(String::from);
            upload.file_content_type = field.content_type().map(String::from);
            upload.file_len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        } else {
            let value = field.text().await.unwrap_or_default();
            upload.fields.insert(name, value);
        }
    }
    state.uploads.lock().unwrap().push(upload);

    let status = state
        .storage_status
        .lock()
        .unwrap()
        .unwrap_or(StatusCode::NO_CONTENT);
    if status.is_success() {
        status.into_response()
    } else {
        (
            status,
            "<Error><Code>AccessDenied</Code><Message>Policy expired</Message></Error>",
        )
            .into_response()
    }
}

async fn get_document(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let document_id = params.get("documentId").cloned().unwrap_or_default();
    *state
        .document_fetches
        .lock()
        .unwrap()
        .entry(document_id.clone())
        .or_default() += 1;

    if let Some(status) = *state.document_failure.lock().unwrap() {
        return (status, Json(json!({"statusCode": status.as_u16()}))).into_response();
    }

    let mut documents = state.documents.lock().unwrap();
    let body = match documents.get_mut(&document_id) {
        Some(queue) if queue.len() > 1 => queue.pop_front(),
        Some(queue) => queue.front().cloned(),
        None => None,
    };
    Json(body.unwrap_or_else(|| json!({"statusCode": 200, "message": "Success"}))).into_response()
}

async fn get_result(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let document_id = params.get("documentId").cloned().unwrap_or_default();
    state.result_requests.lock().unwrap().push(document_id.clone());

    if let Some((status, body)) = state.result_response.lock().unwrap().clone() {
        return (status, Json(body)).into_response();
    }
    Json(json!({
        "statusCode": 200,
        "message": "Success",
        "presignedUrl": format!("{}/files/result/{}.xlsx", state.base_url, document_id),
    }))
    .into_response()
}

async fn generate_download_link(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(s3_path) = params.get("s3Path").cloned() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"statusCode": 400, "message": "s3Path not found in parameters"})),
        )
            .into_response();
    };
    state.download_link_paths.lock().unwrap().push(s3_path.clone());

    Json(json!({"url": format!("{}/files/{}?X-Amz-Signature=abc", state.base_url, s3_path)}))
        .into_response()
}

async fn serve_file(Path(_path): Path<String>) -> impl IntoResponse {
    ([("content-type", "application/pdf")], PDF_BYTES)
}

/// Sends one chunk of a PDF, then fails the body mid-stream
async fn serve_truncated() -> impl IntoResponse {
    let chunks: Vec<Result<&'static [u8], std::io::Error>> = vec![
        Ok(PDF_BYTES),
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection dropped",
        )),
    ];
    (
        [("content-type", "application/pdf")],
        Body::from_stream(futures::stream::iter(chunks)),
    )
}
