//! Wire types for the two-phase upload protocol.
//!
//! These structs define the JSON shapes exchanged with clients:
//! presign/completion requests and responses, the `GET` route listing, and
//! the object metadata returned by storage listings. Field names follow the
//! protocol's camelCase convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Arbitrary request-scoped metadata produced by middleware and echoed back
/// to clients and hooks.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Client-declared file facts. Never carries bytes: uploads go straight to
/// storage via the presigned URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Original filename as reported by the client.
    pub name: String,
    /// Declared size in bytes; signed into the presigned PUT.
    pub size: u64,
    /// Declared MIME type; signed into the presigned PUT.
    #[serde(rename = "type")]
    pub content_type: String,
}

/// The action a `POST` request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadAction {
    Presign,
    Complete,
}

impl UploadAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "presign" => Some(UploadAction::Presign),
            "complete" => Some(UploadAction::Complete),
            _ => None,
        }
    }
}

/// `POST` request body. `action` and `route` may be given here or in the
/// query string; query-string values win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completions: Option<Vec<CompletionRecord>>,
}

/// Per-file outcome of the presign phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedFile {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presigned_url: Option<String>,
    pub file: FileDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PresignedFile {
    pub fn ready(file: FileDescriptor, key: String, url: String, metadata: Metadata) -> Self {
        Self {
            success: true,
            key: Some(key),
            presigned_url: Some(url),
            file,
            metadata: if metadata.is_empty() {
                None
            } else {
                Some(metadata)
            },
            error: None,
        }
    }

    pub fn rejected(file: FileDescriptor, error: impl Into<String>) -> Self {
        Self {
            success: false,
            key: None,
            presigned_url: None,
            file,
            metadata: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregate presign response. `success` is true only when every file in the
/// batch was presigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresignResponse {
    pub success: bool,
    pub results: Vec<PresignedFile>,
}

/// Client-reported outcome for one uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub key: String,
    pub file: FileDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Set when the client's direct PUT failed; triggers the error hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-file outcome of the completion phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    pub success: bool,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate completion response, mirroring [`PresignResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub success: bool,
    pub results: Vec<CompletionResult>,
}

/// Declarative image dimension constraints. Not enforced server-side; echoed
/// to clients through the route listing so they can validate before upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDimensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
}

/// Public facets of a route's schema, exposed by the `GET` handler for
/// capability discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSummary {
    /// `"file"` or `"image"`.
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<ImageDimensions>,
}

/// One named route in the `GET` listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDescriptor {
    pub name: String,
    pub schema: SchemaSummary,
}

/// `GET` response: the routes this router serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesResponse {
    pub success: bool,
    pub routes: Vec<RouteDescriptor>,
}

/// Metadata for one stored object, as returned by listings and HEAD lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub key: String,
    /// Public URL for the object (public base URL when configured, provider
    /// URL otherwise).
    pub url: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_descriptor_uses_type_on_the_wire() {
        let file: FileDescriptor =
            serde_json::from_value(json!({"name": "a.png", "size": 1024, "type": "image/png"}))
                .unwrap();
        assert_eq!(file.content_type, "image/png");

        let back = serde_json::to_value(&file).unwrap();
        assert_eq!(back["type"], "image/png");
    }

    #[test]
    fn test_presigned_file_serializes_camel_case() {
        let file = FileDescriptor {
            name: "a.png".into(),
            size: 10,
            content_type: "image/png".into(),
        };
        let result = PresignedFile::ready(
            file,
            "av/1/ab/a.png".into(),
            "https://b.s3.amazonaws.com/av/1/ab/a.png?X-Amz-Signature=x".into(),
            Metadata::new(),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert!(json["presignedUrl"].as_str().unwrap().starts_with("https://"));
        assert!(json.get("metadata").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_upload_action_parse() {
        assert_eq!(UploadAction::parse("presign"), Some(UploadAction::Presign));
        assert_eq!(UploadAction::parse("complete"), Some(UploadAction::Complete));
        assert_eq!(UploadAction::parse("Presign"), None);
        assert_eq!(UploadAction::parse(""), None);
    }

    #[test]
    fn test_request_body_accepts_both_phases() {
        let presign: UploadRequestBody = serde_json::from_value(json!({
            "action": "presign",
            "route": "avatar",
            "files": [{"name": "a.png", "size": 1, "type": "image/png"}]
        }))
        .unwrap();
        assert_eq!(presign.files.unwrap().len(), 1);

        let complete: UploadRequestBody = serde_json::from_value(json!({
            "action": "complete",
            "route": "avatar",
            "completions": [{"key": "k", "file": {"name": "a", "size": 1, "type": "t"}}]
        }))
        .unwrap();
        assert_eq!(complete.completions.unwrap().len(), 1);
    }
}
