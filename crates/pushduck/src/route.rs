//! Named upload routes.
//!
//! A route pairs a [`FileSchema`] with a middleware chain, an optional key
//! policy, and lifecycle hooks. Routes are built once, registered on the
//! router by name, and never mutated afterwards.

use std::future::Future;
use std::sync::Arc;

use pushduck_common::{FileDescriptor, Metadata};
use thiserror::Error;

use crate::hooks::{BoxFuture, HookError, LifecycleHooks, UploadEvent};
use crate::keys::KeyGenFn;
use crate::schema::FileSchema;

/// Context handed to each middleware. Owned and cloned per call: middleware
/// cannot mutate what later middleware sees except through its returned
/// metadata.
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    /// Route name.
    pub route: String,
    /// The file this invocation is about.
    pub file: FileDescriptor,
    /// Every file in the batch.
    pub files: Arc<Vec<FileDescriptor>>,
    /// Metadata accumulated so far.
    pub metadata: Metadata,
}

/// A middleware rejection. The message becomes the per-file error and the
/// remaining chain is skipped.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct MiddlewareError(pub String);

impl From<String> for MiddlewareError {
    fn from(message: String) -> Self {
        MiddlewareError(message)
    }
}

impl From<&str> for MiddlewareError {
    fn from(message: &str) -> Self {
        MiddlewareError(message.to_string())
    }
}

/// Middleware: enrich metadata or reject the file. Each call receives the
/// accumulated metadata; the returned map is shallow-merged over it.
pub type MiddlewareFn =
    Arc<dyn Fn(MiddlewareContext) -> BoxFuture<Result<Metadata, MiddlewareError>> + Send + Sync>;

/// One named upload slot.
#[derive(Clone)]
pub struct UploadRoute {
    pub(crate) schema: FileSchema,
    pub(crate) middleware: Vec<MiddlewareFn>,
    pub(crate) generate_key: Option<KeyGenFn>,
    pub(crate) path_prefix: Option<String>,
    pub(crate) hooks: LifecycleHooks,
}

impl std::fmt::Debug for UploadRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRoute")
            .field("schema", &self.schema)
            .field("middleware", &format!("<{} fn(s)>", self.middleware.len()))
            .field("generate_key", &self.generate_key.as_ref().map(|_| "<fn>"))
            .field("path_prefix", &self.path_prefix)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl UploadRoute {
    pub fn builder() -> UploadRouteBuilder {
        UploadRouteBuilder {
            route: UploadRoute {
                schema: FileSchema::file(),
                middleware: Vec::new(),
                generate_key: None,
                path_prefix: None,
                hooks: LifecycleHooks::default(),
            },
        }
    }

    pub fn schema(&self) -> &FileSchema {
        &self.schema
    }
}

/// Fluent builder for [`UploadRoute`].
pub struct UploadRouteBuilder {
    route: UploadRoute,
}

impl UploadRouteBuilder {
    #[must_use]
    pub fn schema(mut self, schema: FileSchema) -> Self {
        self.route.schema = schema;
        self
    }

    /// Append a middleware. The chain composes left to right; each call sees
    /// the metadata produced so far.
    #[must_use]
    pub fn middleware<F, Fut>(mut self, middleware: F) -> Self
    where
        F: Fn(MiddlewareContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Metadata, MiddlewareError>> + Send + 'static,
    {
        self.route
            .middleware
            .push(Arc::new(move |ctx| Box::pin(middleware(ctx))));
        self
    }

    /// Route-level key generator; takes precedence over the config-level one
    /// and over the default layout.
    #[must_use]
    pub fn generate_key<F>(mut self, generate: F) -> Self
    where
        F: Fn(&FileDescriptor, &Metadata) -> String + Send + Sync + 'static,
    {
        self.route.generate_key = Some(Arc::new(generate));
        self
    }

    /// Prefix for the default key layout. Overrides the config-level
    /// `paths.prefix`; ignored when a custom generator is set.
    #[must_use]
    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.route.path_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn on_upload_start<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(UploadEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.route.hooks = self.route.hooks.on_upload_start(hook);
        self
    }

    #[must_use]
    pub fn on_upload_complete<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(UploadEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.route.hooks = self.route.hooks.on_upload_complete(hook);
        self
    }

    #[must_use]
    pub fn on_upload_error<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(UploadEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.route.hooks = self.route.hooks.on_upload_error(hook);
        self
    }

    pub fn build(self) -> UploadRoute {
        self.route
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_middleware_chain_composes_left_to_right() {
        let route = UploadRoute::builder()
            .middleware(|_ctx| async {
                let mut meta = Metadata::new();
                meta.insert("userId".to_string(), json!("u1"));
                Ok(meta)
            })
            .middleware(|ctx: MiddlewareContext| async move {
                // The second middleware sees what the first produced.
                assert_eq!(ctx.metadata["userId"], "u1");
                let mut meta = Metadata::new();
                meta.insert("scope".to_string(), json!("priv"));
                Ok(meta)
            })
            .build();

        let files = Arc::new(vec![FileDescriptor {
            name: "a.png".to_string(),
            size: 1,
            content_type: "image/png".to_string(),
        }]);
        let mut metadata = Metadata::new();
        for middleware in &route.middleware {
            let ctx = MiddlewareContext {
                route: "doc".to_string(),
                file: files[0].clone(),
                files: files.clone(),
                metadata: metadata.clone(),
            };
            let produced = middleware(ctx).await.unwrap();
            for (key, value) in produced {
                metadata.insert(key, value);
            }
        }

        assert_eq!(metadata["userId"], "u1");
        assert_eq!(metadata["scope"], "priv");
    }

    #[tokio::test]
    async fn test_middleware_rejection_message() {
        let route = UploadRoute::builder()
            .middleware(|_ctx| async { Err(MiddlewareError::from("not allowed")) })
            .build();

        let ctx = MiddlewareContext {
            route: "doc".to_string(),
            file: FileDescriptor {
                name: "a".to_string(),
                size: 1,
                content_type: "t".to_string(),
            },
            files: Arc::new(Vec::new()),
            metadata: Metadata::new(),
        };
        let err = route.middleware[0](ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "not allowed");
    }
}
