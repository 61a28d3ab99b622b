//! Root upload configuration.
//!
//! [`UploadConfig`] is built once per application and passed by value to
//! everything that depends on it: the router, the storage façade, the
//! signer callers. There is no process-wide state; building a second config
//! never affects the first.

use std::sync::Arc;
use std::time::Duration;

use pushduck_common::parse_size;
use pushduck_storage::{
    ConfigError, ProviderConfig, ProviderKind, ProviderSettings, Storage,
    DEFAULT_PRESIGN_EXPIRY_SECS, MAX_PRESIGN_EXPIRY_SECS,
};

use crate::hooks::LifecycleHooks;
use crate::keys::KeyGenFn;

/// Per-client upload rate policy, evaluated before any route work.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_uploads: u32,
    pub window: Duration,
}

/// Global constraint defaults, applied where a route's schema is silent.
#[derive(Debug, Clone, Default)]
pub struct DefaultsConfig {
    /// Global ceiling; every schema maximum must fit under it.
    pub max_file_size: Option<u64>,
    /// Fallback type allowlist for schemas without their own.
    pub allowed_types: Vec<String>,
    /// Canned ACL signed into presigned PUTs (`public-read`, ...).
    pub acl: Option<String>,
    /// User metadata signed into presigned PUTs as `x-amz-meta-*` headers.
    pub metadata: Vec<(String, String)>,
}

/// Key layout configuration.
#[derive(Clone, Default)]
pub struct PathsConfig {
    /// Prefix for the default key layout.
    pub prefix: Option<String>,
    /// Config-level key generator; routes may override it.
    pub generate_key: Option<KeyGenFn>,
}

impl std::fmt::Debug for PathsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathsConfig")
            .field("prefix", &self.prefix)
            .field("generate_key", &self.generate_key.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Request-surface policies.
#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    /// Origins allowed by the CORS layer; empty disables CORS handling.
    pub allowed_origins: Vec<String>,
    pub rate_limit: Option<RateLimitConfig>,
}

/// The complete, immutable upload configuration.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    provider: Arc<ProviderConfig>,
    defaults: DefaultsConfig,
    paths: PathsConfig,
    security: SecurityConfig,
    hooks: LifecycleHooks,
    presign_expiry_secs: u64,
}

impl UploadConfig {
    pub fn builder() -> UploadConfigBuilder {
        UploadConfigBuilder {
            kind: None,
            settings: ProviderSettings::default(),
            provider: None,
            defaults: DefaultsConfig::default(),
            default_max_size_literal: None,
            paths: PathsConfig::default(),
            security: SecurityConfig::default(),
            hooks: LifecycleHooks::default(),
            presign_expiry_secs: DEFAULT_PRESIGN_EXPIRY_SECS,
        }
    }

    pub fn provider(&self) -> &Arc<ProviderConfig> {
        &self.provider
    }

    pub fn defaults(&self) -> &DefaultsConfig {
        &self.defaults
    }

    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    pub fn security(&self) -> &SecurityConfig {
        &self.security
    }

    pub(crate) fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    pub fn presign_expiry_secs(&self) -> u64 {
        self.presign_expiry_secs
    }

    /// A storage façade scoped to this config.
    pub fn storage(&self) -> Storage {
        Storage::new(self.provider.clone())
    }
}

/// Fluent builder: `.provider(..)` then optional `.defaults(..)`,
/// `.paths(..)`, `.security(..)`, `.hooks(..)`, then `.build()`.
pub struct UploadConfigBuilder {
    kind: Option<ProviderKind>,
    settings: ProviderSettings,
    provider: Option<ProviderConfig>,
    defaults: DefaultsConfig,
    default_max_size_literal: Option<String>,
    paths: PathsConfig,
    security: SecurityConfig,
    hooks: LifecycleHooks,
    presign_expiry_secs: u64,
}

impl UploadConfigBuilder {
    /// Select the provider; missing settings resolve from the environment at
    /// build time.
    #[must_use]
    pub fn provider(mut self, kind: ProviderKind, settings: ProviderSettings) -> Self {
        self.kind = Some(kind);
        self.settings = settings;
        self
    }

    /// Use an already-resolved provider config (no environment access).
    #[must_use]
    pub fn provider_config(mut self, provider: ProviderConfig) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn defaults(mut self, defaults: DefaultsConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Global maximum as a human literal (`"100MB"`).
    #[must_use]
    pub fn default_max_file_size(mut self, size: &str) -> Self {
        self.default_max_size_literal = Some(size.to_string());
        self
    }

    #[must_use]
    pub fn paths(mut self, paths: PathsConfig) -> Self {
        self.paths = paths;
        self
    }

    #[must_use]
    pub fn security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Presigned URL lifetime in seconds (default 3600, max 7 days).
    #[must_use]
    pub fn presign_expiry(mut self, seconds: u64) -> Self {
        self.presign_expiry_secs = seconds;
        self
    }

    pub fn build(self) -> Result<UploadConfig, ConfigError> {
        let provider = match self.provider {
            Some(provider) => provider,
            None => {
                let kind = self.kind.ok_or_else(|| {
                    ConfigError::InvalidConfiguration("no provider selected".to_string())
                })?;
                ProviderConfig::resolve(kind, self.settings)?
            }
        };

        if self.presign_expiry_secs == 0 || self.presign_expiry_secs > MAX_PRESIGN_EXPIRY_SECS {
            return Err(ConfigError::InvalidConfiguration(format!(
                "presign expiry {}s is outside 1..={MAX_PRESIGN_EXPIRY_SECS}s",
                self.presign_expiry_secs
            )));
        }

        let mut defaults = self.defaults;
        if let Some(literal) = &self.default_max_size_literal {
            defaults.max_file_size = Some(parse_size(literal).map_err(|e| {
                ConfigError::InvalidConfiguration(format!("default max file size: {e}"))
            })?);
        }

        Ok(UploadConfig {
            provider: Arc::new(provider),
            defaults,
            paths: self.paths,
            security: self.security,
            hooks: self.hooks,
            presign_expiry_secs: self.presign_expiry_secs,
        })
    }
}
