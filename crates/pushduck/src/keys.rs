//! Object key generation.
//!
//! Keys are chosen in this order: the route's `generate_key`, then the
//! config's `paths.generate_key`, then the default layout
//! `{prefix}/{timestamp-ms}/{8-char-base36}/{sanitized-filename}`. Prefixes
//! (route-level first, then config-level) apply only to the default layout;
//! a custom generator owns the entire key.

use std::sync::Arc;

use chrono::Utc;
use pushduck_common::{FileDescriptor, Metadata};
use rand::Rng;

/// S3 caps keys at 1024 bytes.
pub const MAX_KEY_BYTES: usize = 1024;

const TOKEN_LENGTH: usize = 8;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Host-supplied key generator.
pub type KeyGenFn = Arc<dyn Fn(&FileDescriptor, &Metadata) -> String + Send + Sync>;

/// Make a client filename safe for use as a key segment: collapse `..`,
/// strip leading slashes, replace anything outside `[A-Za-z0-9._/-]`.
pub fn sanitize_filename(name: &str) -> String {
    let mut name = name.trim_start_matches('/').to_string();
    while name.contains("..") {
        name = name.replace("..", ".");
    }
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}

/// Default key layout. The timestamp plus 8 characters of base36 randomness
/// keeps collisions negligible even at very high upload rates.
pub fn default_key(prefix: Option<&str>, file: &FileDescriptor) -> String {
    let timestamp = Utc::now().timestamp_millis();
    let token = base36_token(TOKEN_LENGTH);
    let name = sanitize_filename(&file.name);
    let key = match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{prefix}/{timestamp}/{token}/{name}"),
        None => format!("{timestamp}/{token}/{name}"),
    };
    truncate_key(key)
}

/// Cut a key down to [`MAX_KEY_BYTES`] on a character boundary.
pub fn truncate_key(key: String) -> String {
    if key.len() <= MAX_KEY_BYTES {
        return key;
    }
    let mut end = MAX_KEY_BYTES;
    while !key.is_char_boundary(end) {
        end -= 1;
    }
    key[..end].to_string()
}

fn base36_token(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}
