//! Provider-agnostic S3 storage layer.
//!
//! Three pieces, leaves first:
//!
//! - [`provider`] resolves a provider descriptor (AWS, Cloudflare R2,
//!   DigitalOcean Spaces, MinIO, GCS interop or a custom endpoint) plus
//!   environment variables into a canonical [`ProviderConfig`].
//! - [`signer`] signs arbitrary HTTP requests for S3-compatible endpoints
//!   with AWS Signature Version 4, either into headers or into a presigned
//!   URL query string.
//! - [`client`] and [`facade`] build on both: a thin signed HTTP client for
//!   the S3 REST surface and the namespaced storage operations
//!   (`upload` / `list` / `delete` / `metadata` / `download`).

pub mod client;
pub mod facade;
pub mod provider;
pub mod signer;

pub use client::{ObjectEntry, PresignPut, PutOptions, StorageClient, StorageError};
pub use facade::{
    DeleteByPrefixOptions, DeleteByPrefixOutcome, DeleteSummary, DownloadUrlOptions, FileListing,
    ListFilesQuery, SortBy, Storage,
};
pub use provider::{ConfigError, Credentials, ProviderConfig, ProviderKind, ProviderSettings};
pub use signer::{
    RequestSigner, SignError, DEFAULT_PRESIGN_EXPIRY_SECS, MAX_PRESIGN_EXPIRY_SECS,
    UNSIGNED_PAYLOAD,
};
