//! Signed HTTP client for the S3 REST surface.
//!
//! Speaks plain HTTP against whatever endpoint the provider resolved to:
//! object PUT/HEAD/DELETE, batched DeleteObjects, ListObjectsV2, and
//! presigned GET/PUT URL generation. Everything rides on the SigV4 signer;
//! there is no vendor SDK underneath.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use md5::{Digest as Md5Digest, Md5};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::provider::ProviderConfig;
use crate::signer::{payload_sha256, RequestSigner, SignError, EMPTY_PAYLOAD_SHA256};

/// Hard S3 limit on keys per DeleteObjects request.
pub const MAX_DELETE_BATCH: usize = 1000;

/// Errors from storage operations.
///
/// The core never retries; callers may retry on `Api` responses with 5xx or
/// 429 statuses (exponential backoff with jitter works well).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage endpoint returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Failed to parse storage response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error("Invalid object URL: {0}")]
    InvalidUrl(String),
}

/// One object as reported by a listing or HEAD lookup.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    /// Only populated by HEAD lookups; listings don't carry it.
    pub content_type: Option<String>,
}

/// One page of a ListObjectsV2 result.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub entries: Vec<ObjectEntry>,
    pub next_token: Option<String>,
    pub is_truncated: bool,
}

/// Outcome of a batched delete.
#[derive(Debug, Clone, Default)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    /// `(key, message)` for each object the endpoint refused to delete.
    pub errors: Vec<(String, String)>,
}

/// Options for a server-side PUT.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub acl: Option<String>,
    /// Stored as `x-amz-meta-*` headers.
    pub metadata: Vec<(String, String)>,
}

/// Parameters for presigning a client upload.
#[derive(Debug, Clone)]
pub struct PresignPut {
    pub expires_in_secs: u64,
    /// Signed into the URL; the client's PUT must match.
    pub content_type: String,
    /// Signed into the URL; the client's PUT must match.
    pub content_length: u64,
    pub acl: Option<String>,
    /// Signed as `x-amz-meta-*` headers.
    pub metadata: Vec<(String, String)>,
}

/// Config-bound S3 client. Cheap to clone; holds no mutable state.
#[derive(Debug, Clone)]
pub struct StorageClient {
    provider: Arc<ProviderConfig>,
    http: reqwest::Client,
}

impl StorageClient {
    pub fn new(provider: Arc<ProviderConfig>) -> Self {
        Self {
            provider,
            http: reqwest::Client::new(),
        }
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    fn signer(&self) -> RequestSigner<'_> {
        RequestSigner::new(self.provider.credentials(), self.provider.region())
    }

    fn object_url(&self, key: &str) -> Result<Url, StorageError> {
        let url = self.provider.object_url(key);
        Url::parse(&url).map_err(|_| StorageError::InvalidUrl(url))
    }

    /// Presign a PUT for a client upload. Pure; no I/O.
    pub fn presign_put(
        &self,
        key: &str,
        params: &PresignPut,
        now: DateTime<Utc>,
    ) -> Result<Url, StorageError> {
        let url = self.object_url(key)?;
        let mut headers = vec![
            ("content-type".to_string(), params.content_type.clone()),
            ("content-length".to_string(), params.content_length.to_string()),
        ];
        if let Some(acl) = &params.acl {
            headers.push(("x-amz-acl".to_string(), acl.clone()));
        }
        for (name, value) in &params.metadata {
            headers.push((format!("x-amz-meta-{name}"), value.clone()));
        }

        let presigned = self
            .signer()
            .presign("PUT", &url, &headers, params.expires_in_secs, now)?;
        tracing::debug!(
            key = %key,
            expires_in = params.expires_in_secs,
            content_type = %params.content_type,
            "Presigned upload URL"
        );
        Ok(presigned)
    }

    /// Presign a GET for a download. Pure; no I/O.
    pub fn presign_get(
        &self,
        key: &str,
        expires_in_secs: u64,
        response_content_type: Option<&str>,
        response_filename: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Url, StorageError> {
        let mut url = self.object_url(key)?;
        {
            let mut query = String::new();
            if let Some(content_type) = response_content_type {
                push_query(&mut query, "response-content-type", content_type);
            }
            if let Some(filename) = response_filename {
                push_query(
                    &mut query,
                    "response-content-disposition",
                    &format!("attachment; filename=\"{filename}\""),
                );
            }
            if !query.is_empty() {
                url.set_query(Some(&query));
            }
        }

        let presigned = self.signer().presign("GET", &url, &[], expires_in_secs, now)?;
        tracing::debug!(key = %key, expires_in = expires_in_secs, "Presigned download URL");
        Ok(presigned)
    }

    /// Server-side PUT of a backend-generated artifact.
    pub async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        options: &PutOptions,
    ) -> Result<Option<String>, StorageError> {
        let url = self.object_url(key)?;
        let payload_hash = payload_sha256(&bytes);

        let mut headers = vec![(
            "content-type".to_string(),
            options
                .content_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        )];
        if let Some(acl) = &options.acl {
            headers.push(("x-amz-acl".to_string(), acl.clone()));
        }
        for (name, value) in &options.metadata {
            headers.push((format!("x-amz-meta-{name}"), value.clone()));
        }

        let response = self
            .send(reqwest::Method::PUT, url, &headers, Some(bytes), &payload_hash)
            .await?;
        let response = check_status(response, key).await?;
        Ok(header_string(&response, "etag"))
    }

    /// HEAD lookup. `NotFound` when the object does not exist.
    pub async fn head_object(&self, key: &str) -> Result<ObjectEntry, StorageError> {
        let url = self.object_url(key)?;
        let response = self
            .send(reqwest::Method::HEAD, url, &[], None, EMPTY_PAYLOAD_SHA256)
            .await?;
        if response.status().as_u16() == 404 {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let response = check_status(response, key).await?;

        let size = header_string(&response, "content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let last_modified = header_string(&response, "last-modified")
            .and_then(|v| DateTime::parse_from_rfc2822(&v).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Ok(ObjectEntry {
            key: key.to_string(),
            size,
            last_modified,
            etag: header_string(&response, "etag").map(|v| v.trim_matches('"').to_string()),
            content_type: header_string(&response, "content-type"),
        })
    }

    /// Delete a single object. Idempotent: deleting a missing key succeeds.
    pub async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        let url = self.object_url(key)?;
        let response = self
            .send(reqwest::Method::DELETE, url, &[], None, EMPTY_PAYLOAD_SHA256)
            .await?;
        check_status(response, key).await?;
        tracing::debug!(key = %key, "Deleted object");
        Ok(())
    }

    /// One DeleteObjects request. Callers chunk at [`MAX_DELETE_BATCH`]; the
    /// façade does this automatically.
    pub async fn delete_objects(&self, keys: &[String]) -> Result<DeleteOutcome, StorageError> {
        if keys.is_empty() {
            return Ok(DeleteOutcome::default());
        }
        if keys.len() > MAX_DELETE_BATCH {
            return Err(StorageError::InvalidResponse(format!(
                "delete batch of {} exceeds the S3 limit of {MAX_DELETE_BATCH}",
                keys.len()
            )));
        }

        let mut body = String::from("<Delete>");
        for key in keys {
            body.push_str("<Object><Key>");
            body.push_str(&quick_xml::escape::escape(key.as_str()));
            body.push_str("</Key></Object>");
        }
        body.push_str("<Quiet>false</Quiet></Delete>");
        let body = body.into_bytes();

        let bucket_url = self.provider.bucket_url();
        let mut url =
            Url::parse(&bucket_url).map_err(|_| StorageError::InvalidUrl(bucket_url))?;
        url.set_query(Some("delete"));

        let payload_hash = payload_sha256(&body);
        let content_md5 = BASE64.encode(Md5::digest(&body));
        let headers = vec![
            ("content-type".to_string(), "application/xml".to_string()),
            ("content-md5".to_string(), content_md5),
        ];

        let response = self
            .send(reqwest::Method::POST, url, &headers, Some(body), &payload_hash)
            .await?;
        let response = check_status(response, "batch delete").await?;
        let text = response.text().await?;

        let parsed: DeleteResultXml = quick_xml::de::from_str(&text)
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;
        Ok(DeleteOutcome {
            deleted: parsed.deleted.into_iter().map(|d| d.key).collect(),
            errors: parsed
                .errors
                .into_iter()
                .map(|e| (e.key, e.message.unwrap_or_default()))
                .collect(),
        })
    }

    /// One page of ListObjectsV2.
    pub async fn list_objects(
        &self,
        prefix: Option<&str>,
        max_keys: Option<u32>,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StorageError> {
        let mut query = String::from("list-type=2");
        if let Some(prefix) = prefix {
            push_query(&mut query, "prefix", prefix);
        }
        if let Some(max_keys) = max_keys {
            push_query(&mut query, "max-keys", &max_keys.to_string());
        }
        if let Some(token) = continuation_token {
            push_query(&mut query, "continuation-token", token);
        }

        let bucket_url = self.provider.bucket_url();
        let mut url =
            Url::parse(&bucket_url).map_err(|_| StorageError::InvalidUrl(bucket_url))?;
        url.set_query(Some(&query));

        let response = self
            .send(reqwest::Method::GET, url, &[], None, EMPTY_PAYLOAD_SHA256)
            .await?;
        let response = check_status(response, "list").await?;
        let text = response.text().await?;

        let parsed: ListBucketResultXml = quick_xml::de::from_str(&text)
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;
        Ok(ListPage {
            entries: parsed
                .contents
                .into_iter()
                .map(|c| ObjectEntry {
                    key: c.key,
                    size: c.size,
                    last_modified: c.last_modified,
                    etag: c.e_tag.map(|tag| tag.trim_matches('"').to_string()),
                    content_type: None,
                })
                .collect(),
            next_token: parsed.next_continuation_token,
            is_truncated: parsed.is_truncated,
        })
    }

    /// Sign and send one request.
    async fn send(
        &self,
        method: reqwest::Method,
        url: Url,
        headers: &[(String, String)],
        body: Option<Vec<u8>>,
        payload_hash: &str,
    ) -> Result<reqwest::Response, StorageError> {
        let signed = self
            .signer()
            .sign(method.as_str(), &url, headers, payload_hash, Utc::now())?;

        let mut request = self.http.request(method, url);
        for (name, value) in &signed {
            // reqwest derives Host from the URL.
            if name != "host" {
                request = request.header(name, value);
            }
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        Ok(request.send().await?)
    }
}

/// Append a strictly-encoded `key=value` pair. The signer re-encodes from
/// the decoded form, so only RFC 3986 component encoding is safe here.
fn push_query(query: &mut String, key: &str, value: &str) {
    if !query.is_empty() {
        query.push('&');
    }
    query.push_str(key);
    query.push('=');
    query.push_str(&crate::signer::uri_encode(value, true));
}

fn header_string(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Map a non-success response to `StorageError::Api`, extracting the S3
/// error message when the body carries one.
async fn check_status(
    response: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = quick_xml::de::from_str::<S3ErrorXml>(&body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.chars().take(200).collect());
    tracing::warn!(status = status.as_u16(), context = %context, "Storage request rejected");
    Err(StorageError::Api {
        status: status.as_u16(),
        message,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResultXml {
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_continuation_token: Option<String>,
    #[serde(default, rename = "Contents")]
    contents: Vec<ContentsXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContentsXml {
    key: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
    #[serde(default, rename = "ETag")]
    e_tag: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteResultXml {
    #[serde(default, rename = "Deleted")]
    deleted: Vec<DeletedXml>,
    #[serde(default, rename = "Error")]
    errors: Vec<DeleteErrorXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeletedXml {
    key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteErrorXml {
    key: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct S3ErrorXml {
    #[serde(default)]
    message: Option<String>,
}
