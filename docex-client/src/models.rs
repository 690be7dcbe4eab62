//! Data exchanged with the extraction backend.
//!
//! The backend is loosely typed: the same field can arrive as a string, a
//! number, `null` or not at all, and the presigned upload descriptor is
//! sometimes JSON-encoded inside a string. Everything is normalised here so
//! the rest of the crate works with one shape.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{ClientError, ClientResult};

/// Processing status of an uploaded document
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Extraction still running, or the record does not exist yet
    #[default]
    Processing,
    /// Extraction finished; `data` is populated
    Completed,
    /// Extraction failed; no further transitions
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Parse a backend status string. Only the exact lowercase names are
    /// terminal; anything else keeps polling.
    pub fn parse(s: &str) -> Self {
        s.parse().unwrap_or(DocumentStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

impl<'de> Deserialize<'de> for DocumentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(DocumentStatus::parse).unwrap_or_default())
    }
}

/// Snapshot of a document as returned by `get-document`.
///
/// The response body also carries `statusCode`/`message` envelope keys,
/// which are ignored. A body with no record at all decodes to a record with
/// empty fields and [`DocumentStatus::Processing`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default)]
    pub s3_key: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: DocumentData,
}

/// Extracted content of a completed document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentData {
    /// Header fields
    #[serde(default, deserialize_with = "null_as_default")]
    pub form_data: Vec<FieldResult>,
    /// Line items; one inner vector per row
    #[serde(default, deserialize_with = "null_as_default")]
    pub table_data: Vec<Vec<CellResult>>,
}

/// One extracted value: a header field or a line item cell
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldResult {
    #[serde(default, deserialize_with = "lenient_string")]
    pub column_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub display_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub column_value: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub confidence_score: f64,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub assess_exception: bool,
}

/// Line item cells share the header field shape
pub type CellResult = FieldResult;

/// Presigned POST descriptor for a direct upload to object storage.
///
/// `fields` keeps the order the backend sent them in; the storage provider
/// expects the policy fields before the file part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadDescriptor {
    pub url: String,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl UploadDescriptor {
    /// Decode the `uploadUrl` value of a link response, which is either the
    /// descriptor object itself or a string containing its JSON encoding.
    pub fn decode(value: serde_json::Value) -> ClientResult<Self> {
        let value = match value {
            serde_json::Value::String(encoded) => serde_json::from_str(&encoded).map_err(|e| {
                ClientError::MalformedDescriptor {
                    message: format!("uploadUrl is not valid JSON: {}", e),
                }
            })?,
            other => other,
        };

        let descriptor: UploadDescriptor =
            serde_json::from_value(value).map_err(|e| ClientError::MalformedDescriptor {
                message: e.to_string(),
            })?;

        if descriptor.url.is_empty() {
            return Err(ClientError::MalformedDescriptor {
                message: "descriptor has an empty url".to_string(),
            });
        }
        Ok(descriptor)
    }

    /// Form fields as strings, in order
    pub fn form_fields(&self) -> impl Iterator<Item = (&str, String)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value_to_string(value)))
    }

    /// Storage key the object will be written under, if the descriptor names one
    pub fn key(&self) -> Option<String> {
        self.fields
            .get("key")
            .map(value_to_string)
            .filter(|k| !k.is_empty())
    }
}

/// Decoded `generate-upload-link` response
#[derive(Debug, Clone, PartialEq)]
pub struct UploadLink {
    pub descriptor: UploadDescriptor,
    /// Storage key the backend reserved for this upload
    pub s3_path: String,
    pub process_id: Option<String>,
}

/// Result of a completed upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    /// Parsed from the storage key; `None` when the key is missing or malformed
    pub document_id: Option<String>,
    pub s3_key: Option<String>,
    pub s3_path: String,
}

impl fmt::Display for UploadReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "document {} ({})",
            self.document_id.as_deref().unwrap_or("<unknown>"),
            self.s3_path
        )
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_string(&value))
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or_default(),
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').parse().unwrap_or_default(),
        _ => 0.0,
    })
}

/// Epoch seconds, integral or not; anything else is treated as absent.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_f64()
        .and_then(|secs| DateTime::from_timestamp(secs.trunc() as i64, 0)))
}

/// `assessException` arrives as a bool, an empty string, a message, or not at all.
fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => {
            let s = s.trim();
            !s.is_empty() && !s.eq_ignore_ascii_case("false")
        }
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}
