//! Direct-to-storage uploads for web applications.
//!
//! Pushduck lets clients upload files straight to S3-compatible object
//! storage without the bytes ever passing through the application server.
//! The flow has two phases:
//!
//! 1. **presign** — the client declares its files (`name`, `size`, `type`);
//!    the server validates them against the route's schema, runs the
//!    route's middleware, generates object keys, and answers with presigned
//!    PUT URLs.
//! 2. **complete** — after PUTting the bytes directly to storage, the client
//!    reports per-file outcomes and the server fires completion hooks.
//!
//! ```no_run
//! use pushduck::{
//!     FileSchema, PathsConfig, ProviderKind, ProviderSettings, UploadConfig, UploadRoute,
//!     UploadRouter,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = UploadConfig::builder()
//!     .provider(ProviderKind::Aws, ProviderSettings::default())
//!     .paths(PathsConfig {
//!         prefix: Some("uploads".into()),
//!         ..Default::default()
//!     })
//!     .build()?;
//!
//! // The same config also scopes the storage façade.
//! let storage = config.storage();
//!
//! let router = UploadRouter::builder(config)
//!     .route(
//!         "avatar",
//!         UploadRoute::builder()
//!             .schema(
//!                 FileSchema::image()
//!                     .max_file_size("5MB")
//!                     .types(["image/png", "image/jpeg"]),
//!             )
//!             .build(),
//!     )
//!     .build()?;
//!
//! let app = axum::Router::new().nest("/api/upload", router.into_axum_router());
//! # let _ = (app, storage);
//! # Ok(())
//! # }
//! ```
//!
//! Everything is scoped to the [`UploadConfig`] it was built from: building
//! a second config for another provider never affects the first. There is
//! no process-wide state anywhere in the crate.

pub mod config;
pub mod handlers;
pub mod hooks;
pub mod keys;
mod ratelimit;
pub mod route;
pub mod router;
pub mod schema;

pub use config::{
    DefaultsConfig, PathsConfig, RateLimitConfig, SecurityConfig, UploadConfig,
    UploadConfigBuilder,
};
pub use hooks::{HookError, LifecycleHooks, UploadEvent};
pub use route::{MiddlewareContext, MiddlewareError, UploadRoute, UploadRouteBuilder};
pub use router::{UploadRouter, UploadRouterBuilder};
pub use schema::{FileSchema, SchemaKind, ValidationIssue, ValidationResult};

// Wire types and the storage layer, re-exported so hosts depend on one
// crate.
pub use pushduck_common::{
    CompletionRecord, CompletionResponse, CompletionResult, ErrorResponse, FileDescriptor,
    FileInfo, ImageDimensions, Metadata, PresignResponse, PresignedFile, ProtocolError,
    RouteDescriptor, RoutesResponse, SchemaSummary, UploadAction, UploadRequestBody,
};
pub use pushduck_storage::{
    ConfigError, Credentials, ProviderConfig, ProviderKind, ProviderSettings, Storage,
    StorageClient, StorageError,
};
