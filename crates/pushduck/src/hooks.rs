//! Upload lifecycle hooks.
//!
//! Hooks are host-supplied async callbacks fired around the two phases:
//! `on_upload_start` after a file is validated and signed, `on_upload_complete`
//! when the client confirms an upload, `on_upload_error` when validation,
//! middleware, signing or the client-side PUT failed. They exist at both the
//! config level and the route level; the router fires the config hook first.
//!
//! Hooks are awaited but never fail the HTTP response: by the time a
//! completion hook runs, the bytes are already in storage. Failures are
//! logged and dropped.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use pushduck_common::{FileDescriptor, Metadata};
use thiserror::Error;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// What a hook gets to see. Everything is owned: hooks may outlive the
/// request handler's borrows.
#[derive(Debug, Clone)]
pub struct UploadEvent {
    /// Route name.
    pub route: String,
    pub file: FileDescriptor,
    /// Object key; absent when the failure happened before key generation.
    pub key: Option<String>,
    /// Public URL; populated for completions.
    pub url: Option<String>,
    /// Metadata accumulated by the middleware chain.
    pub metadata: Metadata,
    /// The failure message, for error hooks.
    pub error: Option<String>,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl From<String> for HookError {
    fn from(message: String) -> Self {
        HookError(message)
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        HookError(message.to_string())
    }
}

pub type HookFn =
    Arc<dyn Fn(UploadEvent) -> BoxFuture<Result<(), HookError>> + Send + Sync>;

/// Hook set carried by the config and by each route.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub(crate) on_upload_start: Option<HookFn>,
    pub(crate) on_upload_complete: Option<HookFn>,
    pub(crate) on_upload_error: Option<HookFn>,
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_upload_start", &self.on_upload_start.as_ref().map(|_| "<fn>"))
            .field("on_upload_complete", &self.on_upload_complete.as_ref().map(|_| "<fn>"))
            .field("on_upload_error", &self.on_upload_error.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_upload_start<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(UploadEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.on_upload_start = Some(wrap(hook));
        self
    }

    #[must_use]
    pub fn on_upload_complete<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(UploadEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.on_upload_complete = Some(wrap(hook));
        self
    }

    #[must_use]
    pub fn on_upload_error<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(UploadEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.on_upload_error = Some(wrap(hook));
        self
    }
}

pub(crate) fn wrap<F, Fut>(hook: F) -> HookFn
where
    F: Fn(UploadEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HookError>> + Send + 'static,
{
    Arc::new(move |event| Box::pin(hook(event)))
}

/// Await a hook if present. Hook failures are logged, never propagated.
pub(crate) async fn fire(hook: &Option<HookFn>, name: &str, event: UploadEvent) {
    if let Some(hook) = hook {
        let route = event.route.clone();
        let key = event.key.clone();
        if let Err(err) = hook(event).await {
            tracing::warn!(
                hook = %name,
                route = %route,
                key = key.as_deref().unwrap_or(""),
                error = %err,
                "Lifecycle hook failed"
            );
        }
    }
}
