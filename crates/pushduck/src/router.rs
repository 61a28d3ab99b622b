//! The upload router.
//!
//! Owns the configuration and the named routes, and implements the two
//! protocol operations: `presign` (validate, run middleware, generate keys,
//! sign PUT URLs) and `complete` (acknowledge client-reported outcomes and
//! fire completion hooks). The HTTP glue around these lives in
//! [`crate::handlers`].
//!
//! Per file the pipeline is strictly sequential:
//! validate → middleware → key → sign → `onUploadStart`. Across files the
//! batch fans out up to [`BATCH_CONCURRENCY`] at a time, and the results
//! array always preserves the request order.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use pushduck_common::{
    CompletionRecord, CompletionResponse, CompletionResult, FileDescriptor, Metadata,
    PresignResponse, PresignedFile, ProtocolError, RouteDescriptor, RoutesResponse,
};
use pushduck_storage::{ConfigError, PresignPut, StorageClient};

use crate::config::UploadConfig;
use crate::hooks::{self, UploadEvent};
use crate::keys::{self, MAX_KEY_BYTES};
use crate::ratelimit::RateLimiter;
use crate::route::{MiddlewareContext, UploadRoute};
use crate::schema::MAX_SINGLE_UPLOAD_BYTES;

/// How many files of one batch are in flight at once.
const BATCH_CONCURRENCY: usize = 8;

/// Immutable collection of named routes plus the request pipeline.
///
/// Cheap to clone; every clone shares the same routes and config. Two
/// routers built from different configs are fully independent.
#[derive(Debug, Clone)]
pub struct UploadRouter {
    inner: Arc<RouterInner>,
}

#[derive(Debug)]
struct RouterInner {
    config: UploadConfig,
    routes: BTreeMap<String, UploadRoute>,
    client: StorageClient,
    limiter: Option<RateLimiter>,
}

impl UploadRouter {
    pub fn builder(config: UploadConfig) -> UploadRouterBuilder {
        UploadRouterBuilder {
            config,
            routes: Vec::new(),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.inner.config
    }

    /// The `GET` capability listing: route names and public schema facets.
    pub fn describe_routes(&self) -> RoutesResponse {
        RoutesResponse {
            success: true,
            routes: self
                .inner
                .routes
                .iter()
                .map(|(name, route)| RouteDescriptor {
                    name: name.clone(),
                    schema: route.schema.summary(),
                })
                .collect(),
        }
    }

    /// Evaluate the rate policy for one client key, counting this request.
    pub(crate) fn check_rate_limit(&self, client: &str) -> Result<(), ProtocolError> {
        if let Some(limiter) = &self.inner.limiter {
            if !limiter.allow(client) {
                tracing::warn!(client = %client, "Upload rate limit exceeded");
                return Err(ProtocolError::RateLimited);
            }
        }
        Ok(())
    }

    /// Phase one: validate and sign a batch of files.
    ///
    /// Per-file failures are not errors here; they come back as unsuccessful
    /// entries and the HTTP layer still answers 200.
    pub async fn presign(
        &self,
        route_name: &str,
        files: Vec<FileDescriptor>,
    ) -> Result<PresignResponse, ProtocolError> {
        let route = self.route(route_name)?;

        if let Some(min) = route.schema.min_count {
            if files.len() < min {
                return Err(ProtocolError::InvalidRequest(format!(
                    "Route '{route_name}' requires at least {min} file(s) per request"
                )));
            }
        }
        if let Some(max) = route.schema.max_count {
            if files.len() > max {
                return Err(ProtocolError::InvalidRequest(format!(
                    "Route '{route_name}' accepts at most {max} file(s) per request"
                )));
            }
        }

        let shared = Arc::new(files.clone());
        let results: Vec<PresignedFile> = stream::iter(files)
            .map(|file| self.presign_one(route_name, route, file, shared.clone()))
            .buffered(BATCH_CONCURRENCY)
            .collect()
            .await;

        Ok(PresignResponse {
            success: results.iter().all(|r| r.success),
            results,
        })
    }

    /// Phase two: acknowledge client-reported outcomes.
    ///
    /// Stateless and idempotent: replaying a completion fires its hook again
    /// and returns the same envelope.
    pub async fn complete(
        &self,
        route_name: &str,
        completions: Vec<CompletionRecord>,
    ) -> Result<CompletionResponse, ProtocolError> {
        let route = self.route(route_name)?;

        let results: Vec<CompletionResult> = stream::iter(completions)
            .map(|record| self.complete_one(route_name, route, record))
            .buffered(BATCH_CONCURRENCY)
            .collect()
            .await;

        Ok(CompletionResponse {
            success: results.iter().all(|r| r.success),
            results,
        })
    }

    fn route(&self, name: &str) -> Result<&UploadRoute, ProtocolError> {
        self.inner
            .routes
            .get(name)
            .ok_or_else(|| ProtocolError::UnknownRoute(name.to_string()))
    }

    async fn presign_one(
        &self,
        route_name: &str,
        route: &UploadRoute,
        file: FileDescriptor,
        files: Arc<Vec<FileDescriptor>>,
    ) -> PresignedFile {
        let validation = route.schema.validate(&file);
        if !validation.is_ok() {
            return self
                .reject(route_name, route, file, None, Metadata::new(), validation.message())
                .await;
        }

        // Middleware runs strictly in order; each call gets a fresh context
        // carrying the metadata accumulated so far.
        let mut metadata = Metadata::new();
        for middleware in &route.middleware {
            let ctx = MiddlewareContext {
                route: route_name.to_string(),
                file: file.clone(),
                files: files.clone(),
                metadata: metadata.clone(),
            };
            match middleware(ctx).await {
                Ok(produced) => {
                    for (key, value) in produced {
                        metadata.insert(key, value);
                    }
                }
                Err(err) => {
                    return self
                        .reject(route_name, route, file, None, metadata, err.to_string())
                        .await;
                }
            }
        }

        let key = match self.generate_key(route, &file, &metadata) {
            Ok(key) => key,
            Err(message) => {
                return self
                    .reject(route_name, route, file, None, metadata, message)
                    .await;
            }
        };

        let params = PresignPut {
            expires_in_secs: self.inner.config.presign_expiry_secs(),
            content_type: file.content_type.clone(),
            content_length: file.size,
            acl: self.inner.config.defaults().acl.clone(),
            metadata: self.inner.config.defaults().metadata.clone(),
        };
        let url = match self.inner.client.presign_put(&key, &params, Utc::now()) {
            Ok(url) => url,
            Err(err) => {
                tracing::error!(route = %route_name, key = %key, error = %err, "Signing failed");
                return self
                    .reject(
                        route_name,
                        route,
                        file,
                        Some(key),
                        metadata,
                        format!("Signing failed: {err}"),
                    )
                    .await;
            }
        };

        let event = UploadEvent {
            route: route_name.to_string(),
            file: file.clone(),
            key: Some(key.clone()),
            url: None,
            metadata: metadata.clone(),
            error: None,
        };
        hooks::fire(
            &self.inner.config.hooks().on_upload_start,
            "onUploadStart",
            event.clone(),
        )
        .await;
        hooks::fire(&route.hooks.on_upload_start, "onUploadStart", event).await;

        tracing::debug!(route = %route_name, key = %key, size = file.size, "Presigned upload");
        PresignedFile::ready(file, key, url.to_string(), metadata)
    }

    async fn complete_one(
        &self,
        route_name: &str,
        route: &UploadRoute,
        record: CompletionRecord,
    ) -> CompletionResult {
        let metadata = record.metadata.clone().unwrap_or_default();

        if let Some(error) = record.error {
            let event = UploadEvent {
                route: route_name.to_string(),
                file: record.file,
                key: Some(record.key.clone()),
                url: None,
                metadata,
                error: Some(error.clone()),
            };
            hooks::fire(
                &self.inner.config.hooks().on_upload_error,
                "onUploadError",
                event.clone(),
            )
            .await;
            hooks::fire(&route.hooks.on_upload_error, "onUploadError", event).await;

            return CompletionResult {
                success: false,
                key: record.key,
                url: None,
                error: Some(error),
            };
        }

        let url = self.inner.client.provider().public_url(&record.key);
        let event = UploadEvent {
            route: route_name.to_string(),
            file: record.file,
            key: Some(record.key.clone()),
            url: Some(url.clone()),
            metadata,
            error: None,
        };
        hooks::fire(
            &self.inner.config.hooks().on_upload_complete,
            "onUploadComplete",
            event.clone(),
        )
        .await;
        hooks::fire(&route.hooks.on_upload_complete, "onUploadComplete", event).await;

        tracing::debug!(route = %route_name, key = %record.key, "Upload completed");
        CompletionResult {
            success: true,
            key: record.key,
            url: Some(url),
            error: None,
        }
    }

    /// Route generator first, then the config one, then the default layout.
    /// Prefixes only shape the default layout; custom generators own the
    /// whole key.
    fn generate_key(
        &self,
        route: &UploadRoute,
        file: &FileDescriptor,
        metadata: &Metadata,
    ) -> Result<String, String> {
        let key = if let Some(generator) = &route.generate_key {
            generator(file, metadata)
        } else if let Some(generator) = &self.inner.config.paths().generate_key {
            generator(file, metadata)
        } else {
            let prefix = route
                .path_prefix
                .as_deref()
                .or(self.inner.config.paths().prefix.as_deref());
            keys::default_key(prefix, file)
        };

        if key.is_empty() {
            return Err("Generated object key is empty".to_string());
        }
        if key.len() > MAX_KEY_BYTES {
            return Err(format!("Generated object key exceeds {MAX_KEY_BYTES} bytes"));
        }
        Ok(key)
    }

    /// Emit a per-file failure and fire the error hooks.
    async fn reject(
        &self,
        route_name: &str,
        route: &UploadRoute,
        file: FileDescriptor,
        key: Option<String>,
        metadata: Metadata,
        error: String,
    ) -> PresignedFile {
        let event = UploadEvent {
            route: route_name.to_string(),
            file: file.clone(),
            key,
            url: None,
            metadata,
            error: Some(error.clone()),
        };
        hooks::fire(
            &self.inner.config.hooks().on_upload_error,
            "onUploadError",
            event.clone(),
        )
        .await;
        hooks::fire(&route.hooks.on_upload_error, "onUploadError", event).await;

        tracing::debug!(route = %route_name, file = %file.name, error = %error, "Presign rejected");
        PresignedFile::rejected(file, error)
    }
}

/// Builder for [`UploadRouter`]. Route names are unique and case-sensitive.
pub struct UploadRouterBuilder {
    config: UploadConfig,
    routes: Vec<(String, UploadRoute)>,
}

impl UploadRouterBuilder {
    #[must_use]
    pub fn route(mut self, name: impl Into<String>, route: UploadRoute) -> Self {
        self.routes.push((name.into(), route));
        self
    }

    /// Validate the route set against the config and freeze the router.
    ///
    /// Enforces the size invariant chain
    /// `schema max ≤ global max ≤ 5 GiB` and fills schema gaps (size cap,
    /// type allowlist) from the config defaults.
    pub fn build(self) -> Result<UploadRouter, ConfigError> {
        let global_max = self
            .config
            .defaults()
            .max_file_size
            .unwrap_or(MAX_SINGLE_UPLOAD_BYTES);
        if global_max > MAX_SINGLE_UPLOAD_BYTES {
            return Err(ConfigError::InvalidConfiguration(format!(
                "global max file size {global_max} exceeds the 5 GiB single-PUT limit"
            )));
        }

        let mut routes = BTreeMap::new();
        for (name, mut route) in self.routes {
            if name.is_empty() {
                return Err(ConfigError::InvalidConfiguration(
                    "route names must not be empty".to_string(),
                ));
            }
            if let Some(literal) = route.schema.invalid_sizes.first() {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "route '{name}': invalid size literal {literal:?}"
                )));
            }

            match route.schema.max_size {
                Some(max) if max > global_max => {
                    return Err(ConfigError::InvalidConfiguration(format!(
                        "route '{name}': max size {max} exceeds the global maximum {global_max}"
                    )));
                }
                None => route.schema.max_size = Some(global_max),
                _ => {}
            }
            if let (Some(min), Some(max)) = (route.schema.min_size, route.schema.max_size) {
                if min > max {
                    return Err(ConfigError::InvalidConfiguration(format!(
                        "route '{name}': min size {min} exceeds max size {max}"
                    )));
                }
            }
            if route.schema.types.is_empty() && !self.config.defaults().allowed_types.is_empty() {
                route.schema.types = self.config.defaults().allowed_types.clone();
            }

            if routes.insert(name.clone(), route).is_some() {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "duplicate route name '{name}'"
                )));
            }
        }

        let client = StorageClient::new(self.config.provider().clone());
        let limiter = self.config.security().rate_limit.map(RateLimiter::new);
        Ok(UploadRouter {
            inner: Arc::new(RouterInner {
                config: self.config,
                routes,
                client,
                limiter,
            }),
        })
    }
}
