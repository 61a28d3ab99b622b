//! Storage provider resolution.
//!
//! Translates a provider descriptor plus caller overrides and environment
//! variables into a canonical [`ProviderConfig`]. All validation happens
//! here, at configuration build time; request-time code can assume the
//! config is complete.

use std::fmt;

use thiserror::Error;
use url::Url;

use crate::signer::uri_encode;

/// Configuration errors. Raised when a config is built, never at request
/// time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ConfigError {
    fn missing(what: &str, hint: &str) -> Self {
        ConfigError::InvalidConfiguration(format!("{what} is required ({hint})"))
    }
}

/// Supported storage providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Aws,
    CloudflareR2,
    DigitalOceanSpaces,
    Minio,
    Gcs,
    Custom,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Aws => "aws",
            ProviderKind::CloudflareR2 => "r2",
            ProviderKind::DigitalOceanSpaces => "spaces",
            ProviderKind::Minio => "minio",
            ProviderKind::Gcs => "gcs",
            ProviderKind::Custom => "custom",
        }
    }
}

/// Static credentials for an S3-compatible endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The secret never reaches logs.
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("session_token", &self.session_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Caller-supplied overrides. Anything left `None` is resolved from the
/// provider's documented environment variables or defaults.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub bucket: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Cloudflare account id (R2) or project id (GCS).
    pub account_id: Option<String>,
    pub force_path_style: Option<bool>,
    pub public_url_base: Option<String>,
    pub use_ssl: Option<bool>,
}

/// Canonical, validated provider description. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    kind: ProviderKind,
    /// Absolute URL, scheme required, no trailing slash.
    endpoint: String,
    region: String,
    bucket: String,
    credentials: Credentials,
    force_path_style: bool,
    public_url_base: Option<String>,
    use_ssl: bool,
}

impl ProviderConfig {
    /// Resolve a provider from overrides and the process environment.
    pub fn resolve(kind: ProviderKind, settings: ProviderSettings) -> Result<Self, ConfigError> {
        Self::resolve_with(kind, settings, |name| std::env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup. The lookup is consulted
    /// per variable name, first match wins across each documented chain.
    pub fn resolve_with(
        kind: ProviderKind,
        settings: ProviderSettings,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let pick = |explicit: &Option<String>, names: &[&str]| -> Option<String> {
            explicit
                .clone()
                .or_else(|| names.iter().find_map(|name| env(name)))
                .filter(|value| !value.is_empty())
        };

        let resolved = match kind {
            ProviderKind::Aws => {
                let region = pick(&settings.region, &["AWS_REGION", "S3_REGION"])
                    .unwrap_or_else(|| "us-east-1".to_string());
                Resolved {
                    endpoint: pick(&settings.endpoint, &[])
                        .unwrap_or_else(|| format!("https://s3.{region}.amazonaws.com")),
                    bucket: pick(&settings.bucket, &["AWS_S3_BUCKET", "S3_BUCKET"])
                        .ok_or_else(|| ConfigError::missing("bucket", "AWS_S3_BUCKET"))?,
                    access_key_id: pick(&settings.access_key_id, &["AWS_ACCESS_KEY_ID"])
                        .ok_or_else(|| {
                            ConfigError::missing("access key id", "AWS_ACCESS_KEY_ID")
                        })?,
                    secret_access_key: pick(
                        &settings.secret_access_key,
                        &["AWS_SECRET_ACCESS_KEY"],
                    )
                    .ok_or_else(|| {
                        ConfigError::missing("secret access key", "AWS_SECRET_ACCESS_KEY")
                    })?,
                    session_token: pick(&settings.session_token, &["AWS_SESSION_TOKEN"]),
                    region,
                    force_path_style: settings.force_path_style.unwrap_or(false),
                }
            }
            ProviderKind::CloudflareR2 => {
                let account_id =
                    pick(&settings.account_id, &["CLOUDFLARE_ACCOUNT_ID", "R2_ACCOUNT_ID"]);
                let endpoint = match pick(&settings.endpoint, &[]) {
                    Some(endpoint) => endpoint,
                    None => {
                        let account_id = account_id.ok_or_else(|| {
                            ConfigError::missing("account id", "CLOUDFLARE_ACCOUNT_ID")
                        })?;
                        format!("https://{account_id}.r2.cloudflarestorage.com")
                    }
                };
                Resolved {
                    endpoint,
                    region: pick(&settings.region, &[]).unwrap_or_else(|| "auto".to_string()),
                    bucket: pick(&settings.bucket, &["CLOUDFLARE_R2_BUCKET", "R2_BUCKET"])
                        .ok_or_else(|| ConfigError::missing("bucket", "CLOUDFLARE_R2_BUCKET"))?,
                    access_key_id: pick(
                        &settings.access_key_id,
                        &["CLOUDFLARE_R2_ACCESS_KEY_ID", "R2_ACCESS_KEY_ID"],
                    )
                    .ok_or_else(|| {
                        ConfigError::missing("access key id", "CLOUDFLARE_R2_ACCESS_KEY_ID")
                    })?,
                    secret_access_key: pick(
                        &settings.secret_access_key,
                        &["CLOUDFLARE_R2_SECRET_ACCESS_KEY", "R2_SECRET_ACCESS_KEY"],
                    )
                    .ok_or_else(|| {
                        ConfigError::missing(
                            "secret access key",
                            "CLOUDFLARE_R2_SECRET_ACCESS_KEY",
                        )
                    })?,
                    session_token: settings.session_token.clone(),
                    force_path_style: settings.force_path_style.unwrap_or(true),
                }
            }
            ProviderKind::DigitalOceanSpaces => {
                let region = pick(&settings.region, &["DO_SPACES_REGION"])
                    .ok_or_else(|| ConfigError::missing("region", "DO_SPACES_REGION"))?;
                Resolved {
                    endpoint: pick(&settings.endpoint, &["DO_SPACES_ENDPOINT"])
                        .unwrap_or_else(|| format!("https://{region}.digitaloceanspaces.com")),
                    bucket: pick(&settings.bucket, &["DO_SPACES_BUCKET"])
                        .ok_or_else(|| ConfigError::missing("bucket", "DO_SPACES_BUCKET"))?,
                    access_key_id: pick(&settings.access_key_id, &["DO_SPACES_ACCESS_KEY_ID"])
                        .ok_or_else(|| {
                            ConfigError::missing("access key id", "DO_SPACES_ACCESS_KEY_ID")
                        })?,
                    secret_access_key: pick(
                        &settings.secret_access_key,
                        &["DO_SPACES_SECRET_ACCESS_KEY"],
                    )
                    .ok_or_else(|| {
                        ConfigError::missing("secret access key", "DO_SPACES_SECRET_ACCESS_KEY")
                    })?,
                    session_token: settings.session_token.clone(),
                    region,
                    force_path_style: settings.force_path_style.unwrap_or(false),
                }
            }
            ProviderKind::Minio => {
                let use_ssl = settings.use_ssl.or_else(|| {
                    env("MINIO_USE_SSL").map(|v| matches!(v.as_str(), "true" | "TRUE" | "1"))
                });
                let endpoint = pick(&settings.endpoint, &["MINIO_ENDPOINT"])
                    .ok_or_else(|| ConfigError::missing("endpoint", "MINIO_ENDPOINT"))?;
                let endpoint = if endpoint.contains("://") {
                    endpoint
                } else if use_ssl.unwrap_or(false) {
                    format!("https://{endpoint}")
                } else {
                    format!("http://{endpoint}")
                };
                Resolved {
                    endpoint,
                    region: pick(&settings.region, &["MINIO_REGION"])
                        .unwrap_or_else(|| "us-east-1".to_string()),
                    bucket: pick(&settings.bucket, &["MINIO_BUCKET"])
                        .ok_or_else(|| ConfigError::missing("bucket", "MINIO_BUCKET"))?,
                    access_key_id: pick(
                        &settings.access_key_id,
                        &["MINIO_ACCESS_KEY_ID", "MINIO_ACCESS_KEY"],
                    )
                    .ok_or_else(|| ConfigError::missing("access key id", "MINIO_ACCESS_KEY_ID"))?,
                    secret_access_key: pick(
                        &settings.secret_access_key,
                        &["MINIO_SECRET_ACCESS_KEY", "MINIO_SECRET_KEY"],
                    )
                    .ok_or_else(|| {
                        ConfigError::missing("secret access key", "MINIO_SECRET_ACCESS_KEY")
                    })?,
                    session_token: settings.session_token.clone(),
                    force_path_style: settings.force_path_style.unwrap_or(true),
                }
            }
            ProviderKind::Gcs => Resolved {
                endpoint: pick(&settings.endpoint, &[])
                    .unwrap_or_else(|| "https://storage.googleapis.com".to_string()),
                region: pick(&settings.region, &[]).unwrap_or_else(|| "auto".to_string()),
                bucket: pick(&settings.bucket, &["GCS_BUCKET"])
                    .ok_or_else(|| ConfigError::missing("bucket", "GCS_BUCKET"))?,
                access_key_id: pick(&settings.access_key_id, &["GCS_ACCESS_KEY_ID"])
                    .ok_or_else(|| ConfigError::missing("HMAC access key id", "GCS_ACCESS_KEY_ID"))?,
                secret_access_key: pick(&settings.secret_access_key, &["GCS_SECRET_ACCESS_KEY"])
                    .ok_or_else(|| {
                        ConfigError::missing("HMAC secret access key", "GCS_SECRET_ACCESS_KEY")
                    })?,
                session_token: settings.session_token.clone(),
                force_path_style: settings.force_path_style.unwrap_or(true),
            },
            ProviderKind::Custom => Resolved {
                endpoint: pick(&settings.endpoint, &["S3_ENDPOINT"])
                    .ok_or_else(|| ConfigError::missing("endpoint", "a custom provider"))?,
                region: pick(&settings.region, &["S3_REGION"])
                    .unwrap_or_else(|| "us-east-1".to_string()),
                bucket: pick(&settings.bucket, &["S3_BUCKET"])
                    .ok_or_else(|| ConfigError::missing("bucket", "S3_BUCKET"))?,
                access_key_id: pick(&settings.access_key_id, &["AWS_ACCESS_KEY_ID"])
                    .ok_or_else(|| ConfigError::missing("access key id", "AWS_ACCESS_KEY_ID"))?,
                secret_access_key: pick(&settings.secret_access_key, &["AWS_SECRET_ACCESS_KEY"])
                    .ok_or_else(|| {
                        ConfigError::missing("secret access key", "AWS_SECRET_ACCESS_KEY")
                    })?,
                session_token: pick(&settings.session_token, &["AWS_SESSION_TOKEN"]),
                force_path_style: settings.force_path_style.unwrap_or(true),
            },
        };

        let endpoint = validate_endpoint(&resolved.endpoint)?;
        validate_bucket(&resolved.bucket)?;
        let use_ssl = settings
            .use_ssl
            .unwrap_or_else(|| endpoint.starts_with("https://"));

        Ok(Self {
            kind,
            endpoint,
            region: resolved.region,
            bucket: resolved.bucket,
            credentials: Credentials {
                access_key_id: resolved.access_key_id,
                secret_access_key: resolved.secret_access_key,
                session_token: resolved.session_token,
            },
            force_path_style: resolved.force_path_style,
            public_url_base: settings
                .public_url_base
                .map(|base| base.trim_end_matches('/').to_string()),
            use_ssl,
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn force_path_style(&self) -> bool {
        self.force_path_style
    }

    pub fn public_url_base(&self) -> Option<&str> {
        self.public_url_base.as_deref()
    }

    pub fn use_ssl(&self) -> bool {
        self.use_ssl
    }

    /// URL of the bucket itself (no key). Path style keeps the bucket in the
    /// path; virtual-hosted style moves it into the host.
    pub fn bucket_url(&self) -> String {
        if self.force_path_style {
            format!("{}/{}", self.endpoint, self.bucket)
        } else {
            match self.endpoint.split_once("://") {
                Some((scheme, rest)) => format!("{scheme}://{}.{rest}", self.bucket),
                None => format!("{}/{}", self.endpoint, self.bucket),
            }
        }
    }

    /// Signable URL for one object. Each key segment is percent-encoded
    /// exactly once; the canonical request uses the encoded path verbatim.
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.bucket_url(), encode_key(key))
    }

    /// Public (unsigned) URL for one object: the configured public base when
    /// present, the provider object URL otherwise.
    pub fn public_url(&self, key: &str) -> String {
        match &self.public_url_base {
            Some(base) => format!("{base}/{}", encode_key(key)),
            None => self.object_url(key),
        }
    }
}

/// Intermediate resolution result before endpoint/bucket validation.
struct Resolved {
    endpoint: String,
    region: String,
    bucket: String,
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
    force_path_style: bool,
}

fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| uri_encode(segment, true))
        .collect::<Vec<_>>()
        .join("/")
}

fn validate_endpoint(endpoint: &str) -> Result<String, ConfigError> {
    if endpoint.ends_with('/') {
        return Err(ConfigError::InvalidConfiguration(format!(
            "endpoint must not end with a slash: {endpoint}"
        )));
    }
    let parsed = Url::parse(endpoint).map_err(|e| {
        ConfigError::InvalidConfiguration(format!("endpoint {endpoint:?} is not a valid URL: {e}"))
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidConfiguration(format!(
            "endpoint must use http or https: {endpoint}"
        )));
    }
    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidConfiguration(format!(
            "endpoint has no host: {endpoint}"
        )));
    }
    Ok(endpoint.to_string())
}

fn validate_bucket(bucket: &str) -> Result<(), ConfigError> {
    let valid_length = (1..=63).contains(&bucket.len());
    let valid_chars = bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let valid_edges = bucket
        .chars()
        .next()
        .zip(bucket.chars().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());
    if !(valid_length && valid_chars && valid_edges) {
        return Err(ConfigError::InvalidConfiguration(format!(
            "bucket name {bucket:?} is not DNS-valid"
        )));
    }
    Ok(())
}
