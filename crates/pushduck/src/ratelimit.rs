//! In-memory upload rate limiting.
//!
//! Fixed-window counter per client key, evaluated inside `POST` before any
//! route work. Single-process only; hosts that need distributed limiting
//! should enforce it in front of the handlers and leave this unset.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Keep the window map from growing without bound under churny client keys.
const PRUNE_THRESHOLD: usize = 4096;

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub(crate) struct RateLimiter {
    max_uploads: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub(crate) fn new(config: RateLimitConfig) -> Self {
        Self {
            max_uploads: config.max_uploads,
            window: config.window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request for `client` and report whether it is allowed.
    pub(crate) fn allow(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            // A poisoned lock only means another request panicked; limiting
            // stays best-effort.
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() > PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count += 1;
        entry.count <= self.max_uploads
    }
}
