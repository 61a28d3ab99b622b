//! Namespaced storage operations.
//!
//! [`Storage`] is the config-scoped entry point hosts use for everything
//! that is not the upload flow itself: listing what was uploaded, deleting,
//! metadata lookups, presigned downloads, and the occasional server-side
//! PUT of a backend-generated artifact.
//!
//! Operations are grouped the way callers think about them:
//! `storage.list().files(..)`, `storage.delete().by_prefix(..)`,
//! `storage.metadata().exists(..)`, `storage.download().presigned_url(..)`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use pushduck_common::FileInfo;

use crate::client::{
    ObjectEntry, PutOptions, StorageClient, StorageError, MAX_DELETE_BATCH,
};
use crate::provider::ProviderConfig;
use crate::signer::DEFAULT_PRESIGN_EXPIRY_SECS;

/// Config-scoped storage façade. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Storage {
    client: StorageClient,
}

impl Storage {
    pub fn new(provider: Arc<ProviderConfig>) -> Self {
        Self {
            client: StorageClient::new(provider),
        }
    }

    pub fn client(&self) -> &StorageClient {
        &self.client
    }

    pub fn provider(&self) -> &ProviderConfig {
        self.client.provider()
    }

    pub fn upload(&self) -> UploadOps<'_> {
        UploadOps { storage: self }
    }

    pub fn list(&self) -> ListOps<'_> {
        ListOps { storage: self }
    }

    pub fn delete(&self) -> DeleteOps<'_> {
        DeleteOps { storage: self }
    }

    pub fn metadata(&self) -> MetadataOps<'_> {
        MetadataOps { storage: self }
    }

    pub fn download(&self) -> DownloadOps<'_> {
        DownloadOps { storage: self }
    }

    fn file_info(&self, entry: &ObjectEntry) -> FileInfo {
        FileInfo {
            key: entry.key.clone(),
            url: self.provider().public_url(&entry.key),
            size: entry.size,
            content_type: entry.content_type.clone(),
            last_modified: entry.last_modified,
            etag: entry.etag.clone(),
        }
    }
}

// ============================================================================
// Listing
// ============================================================================

/// Sort order for one listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Key,
    Size,
    LastModified,
}

/// Query for [`ListOps::files`].
#[derive(Debug, Clone, Default)]
pub struct ListFilesQuery {
    pub prefix: Option<String>,
    pub max_results: Option<u32>,
    pub continuation_token: Option<String>,
    pub sort_by: Option<SortBy>,
}

/// One page of files plus the token for the next page.
#[derive(Debug, Clone)]
pub struct FileListing {
    pub files: Vec<FileInfo>,
    pub next_token: Option<String>,
}

pub struct ListOps<'a> {
    storage: &'a Storage,
}

impl ListOps<'_> {
    /// One page of objects under `prefix`.
    pub async fn files(&self, query: ListFilesQuery) -> Result<FileListing, StorageError> {
        let page = self
            .storage
            .client
            .list_objects(
                query.prefix.as_deref(),
                query.max_results,
                query.continuation_token.as_deref(),
            )
            .await?;

        let mut files: Vec<FileInfo> = page
            .entries
            .iter()
            .map(|entry| self.storage.file_info(entry))
            .collect();
        if let Some(sort_by) = query.sort_by {
            sort_files(&mut files, sort_by);
        }
        Ok(FileListing {
            files,
            next_token: page.next_token,
        })
    }

    /// Every object under `prefix`, across all pages.
    pub fn stream(
        &self,
        prefix: Option<String>,
    ) -> impl Stream<Item = Result<FileInfo, StorageError>> {
        let storage = self.storage.clone();
        stream::try_unfold(
            (storage, prefix, None::<String>, true),
            |(storage, prefix, token, keep_going)| async move {
                if !keep_going {
                    return Ok::<_, StorageError>(None);
                }
                let page = storage
                    .client
                    .list_objects(prefix.as_deref(), None, token.as_deref())
                    .await?;
                let files: Vec<Result<FileInfo, StorageError>> = page
                    .entries
                    .iter()
                    .map(|entry| Ok(storage.file_info(entry)))
                    .collect();
                let next = page.next_token;
                let keep_going = next.is_some();
                Ok(Some((
                    stream::iter(files),
                    (storage, prefix, next, keep_going),
                )))
            },
        )
        .try_flatten()
    }

    /// All objects whose key ends with `ext` (leading dot optional,
    /// case-insensitive). Scans every page under `prefix`.
    pub async fn by_extension(
        &self,
        ext: &str,
        prefix: Option<String>,
    ) -> Result<Vec<FileInfo>, StorageError> {
        let suffix = format!(".{}", ext.trim_start_matches('.').to_ascii_lowercase());
        let files: Vec<FileInfo> = self.stream(prefix).try_collect().await?;
        Ok(files
            .into_iter()
            .filter(|f| f.key.to_ascii_lowercase().ends_with(&suffix))
            .collect())
    }

    /// All objects with `min <= size <= max`. Scans every page.
    pub async fn by_size(
        &self,
        min: u64,
        max: Option<u64>,
    ) -> Result<Vec<FileInfo>, StorageError> {
        let files: Vec<FileInfo> = self.stream(None).try_collect().await?;
        Ok(files
            .into_iter()
            .filter(|f| f.size >= min && max.is_none_or(|max| f.size <= max))
            .collect())
    }

    /// All objects modified in `[from, to]`. Scans every page.
    pub async fn by_date(
        &self,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<FileInfo>, StorageError> {
        let files: Vec<FileInfo> = self.stream(None).try_collect().await?;
        Ok(files
            .into_iter()
            .filter(|f| {
                f.last_modified
                    .is_some_and(|ts| ts >= from && to.is_none_or(|to| ts <= to))
            })
            .collect())
    }
}

fn sort_files(files: &mut [FileInfo], sort_by: SortBy) {
    match sort_by {
        SortBy::Key => files.sort_by(|a, b| a.key.cmp(&b.key)),
        SortBy::Size => files.sort_by_key(|f| f.size),
        SortBy::LastModified => files.sort_by_key(|f| f.last_modified),
    }
}

// ============================================================================
// Deletion
// ============================================================================

/// Outcome of a multi-key delete.
#[derive(Debug, Clone, Default)]
pub struct DeleteSummary {
    pub deleted: Vec<String>,
    /// `(key, message)` per refused object.
    pub errors: Vec<(String, String)>,
}

/// Guards for [`DeleteOps::by_prefix`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteByPrefixOptions {
    /// Report what would be deleted without deleting anything.
    pub dry_run: bool,
    /// Stop collecting after this many keys.
    pub max_files: Option<usize>,
}

/// What [`DeleteOps::by_prefix`] found and did.
#[derive(Debug, Clone)]
pub struct DeleteByPrefixOutcome {
    pub matched: Vec<String>,
    pub deleted: usize,
    pub dry_run: bool,
}

pub struct DeleteOps<'a> {
    storage: &'a Storage,
}

impl DeleteOps<'_> {
    pub async fn file(&self, key: &str) -> Result<(), StorageError> {
        self.storage.client.delete_object(key).await
    }

    /// Delete many keys, chunked at the S3 batch limit of 1000.
    pub async fn files(&self, keys: &[String]) -> Result<DeleteSummary, StorageError> {
        let mut summary = DeleteSummary::default();
        for chunk in keys.chunks(MAX_DELETE_BATCH) {
            let outcome = self.storage.client.delete_objects(chunk).await?;
            summary.deleted.extend(outcome.deleted);
            summary.errors.extend(outcome.errors);
        }
        Ok(summary)
    }

    /// Delete everything under `prefix`, with dry-run and count guards.
    pub async fn by_prefix(
        &self,
        prefix: &str,
        options: DeleteByPrefixOptions,
    ) -> Result<DeleteByPrefixOutcome, StorageError> {
        let mut matched = Vec::new();
        let mut pages = std::pin::pin!(self.storage.list().stream(Some(prefix.to_string())));
        while let Some(file) = pages.next().await {
            matched.push(file?.key);
            if options.max_files.is_some_and(|max| matched.len() >= max) {
                break;
            }
        }

        if options.dry_run {
            tracing::debug!(prefix = %prefix, matched = matched.len(), "Dry-run prefix delete");
            return Ok(DeleteByPrefixOutcome {
                matched,
                deleted: 0,
                dry_run: true,
            });
        }

        let summary = self.files(&matched).await?;
        tracing::debug!(
            prefix = %prefix,
            matched = matched.len(),
            deleted = summary.deleted.len(),
            "Prefix delete"
        );
        Ok(DeleteByPrefixOutcome {
            matched,
            deleted: summary.deleted.len(),
            dry_run: false,
        })
    }
}

// ============================================================================
// Metadata
// ============================================================================

pub struct MetadataOps<'a> {
    storage: &'a Storage,
}

impl MetadataOps<'_> {
    /// Full metadata for one object via HEAD.
    pub async fn info(&self, key: &str) -> Result<FileInfo, StorageError> {
        let entry = self.storage.client.head_object(key).await?;
        Ok(self.storage.file_info(&entry))
    }

    /// Whether the object exists.
    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.storage.client.head_object(key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

// ============================================================================
// Download
// ============================================================================

/// Extras for [`DownloadOps::presigned_url_with`].
#[derive(Debug, Clone, Default)]
pub struct DownloadUrlOptions {
    pub expires_in_secs: Option<u64>,
    /// Override the `Content-Type` the storage endpoint responds with.
    pub response_content_type: Option<String>,
    /// Serve as an attachment under this filename.
    pub response_filename: Option<String>,
}

pub struct DownloadOps<'a> {
    storage: &'a Storage,
}

impl DownloadOps<'_> {
    /// Presigned GET URL, default one-hour expiry.
    pub fn presigned_url(
        &self,
        key: &str,
        expires_in_secs: Option<u64>,
    ) -> Result<String, StorageError> {
        self.presigned_url_with(
            key,
            DownloadUrlOptions {
                expires_in_secs,
                ..Default::default()
            },
        )
    }

    pub fn presigned_url_with(
        &self,
        key: &str,
        options: DownloadUrlOptions,
    ) -> Result<String, StorageError> {
        let url = self.storage.client.presign_get(
            key,
            options.expires_in_secs.unwrap_or(DEFAULT_PRESIGN_EXPIRY_SECS),
            options.response_content_type.as_deref(),
            options.response_filename.as_deref(),
            Utc::now(),
        )?;
        Ok(url.to_string())
    }
}

// ============================================================================
// Upload
// ============================================================================

pub struct UploadOps<'a> {
    storage: &'a Storage,
}

impl UploadOps<'_> {
    /// Server-side PUT. Rare on the upload path (clients PUT directly via
    /// presigned URLs); used for backend-generated artifacts.
    pub async fn file(
        &self,
        bytes: Vec<u8>,
        key: &str,
        options: PutOptions,
    ) -> Result<FileInfo, StorageError> {
        let size = bytes.len() as u64;
        let etag = self.storage.client.put_object(key, bytes, &options).await?;
        Ok(FileInfo {
            key: key.to_string(),
            url: self.storage.provider().public_url(key),
            size,
            content_type: options.content_type,
            last_modified: None,
            etag: etag.map(|tag| tag.trim_matches('"').to_string()),
        })
    }
}
