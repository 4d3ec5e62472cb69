//! HTTP access to the compiler-debug surface, plus connection health.
//!
//! Every outcome is collapsed to success-or-unavailable: a transport error
//! and a non-2xx status are the same thing to callers. Retry policy lives
//! entirely in the polling cadence of callers, never here.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use lorgnette_types::ConnectionState;
use tracing::debug;

const STATE_CONNECTING: u8 = 0;
const STATE_CONNECTED: u8 = 1;
const STATE_DISCONNECTED: u8 = 2;

/// Shared tri-state liveness indicator for the remote process.
///
/// Mutated only from request outcomes, possibly by several concurrent fetch
/// tasks; a plain atomic with last-writer-wins is sufficient. `Connecting`
/// never recurs: a failure only demotes an established `Connected`.
#[derive(Clone)]
pub struct HealthCell {
    state: Arc<AtomicU8>,
}

impl HealthCell {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(STATE_CONNECTING)),
        }
    }

    pub fn get(&self) -> ConnectionState {
        match self.state.load(Ordering::Relaxed) {
            STATE_CONNECTED => ConnectionState::Connected,
            STATE_DISCONNECTED => ConnectionState::Disconnected,
            _ => ConnectionState::Connecting,
        }
    }

    fn record_success(&self) {
        self.state.store(STATE_CONNECTED, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        // Only an established connection degrades; a failure while still
        // Connecting leaves the state alone.
        let _ = self.state.compare_exchange(
            STATE_CONNECTED,
            STATE_DISCONNECTED,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }
}

impl Default for HealthCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Client for the compiler-debug endpoint set.
///
/// Cheap to clone; clones share one base URL and one [`HealthCell`].
#[derive(Clone)]
pub struct ApiClient {
    base_url: Arc<String>,
    health: HealthCell,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Arc::new(base_url.into().trim_end_matches('/').to_string()),
            health: HealthCell::new(),
        }
    }

    pub fn health(&self) -> &HealthCell {
        &self.health
    }

    /// GETs `base_url + endpoint` and returns the body text, or `None` when
    /// the endpoint was unavailable this call. Records the outcome in the
    /// shared [`HealthCell`] either way.
    pub async fn fetch(&self, endpoint: &str) -> Option<String> {
        let url = format!("{}{}", self.base_url, endpoint);
        let outcome = tokio::task::spawn_blocking(move || http_get_text(&url)).await;
        match outcome {
            Ok(Ok(body)) => {
                self.health.record_success();
                Some(body)
            }
            Ok(Err(error)) => {
                debug!(endpoint, %error, "endpoint unavailable");
                self.health.record_failure();
                None
            }
            Err(error) => {
                debug!(endpoint, %error, "fetch worker join error");
                self.health.record_failure();
                None
            }
        }
    }
}

fn http_get_text(url: &str) -> Result<String, String> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| format!("GET {url}: {e}"))?;
    response
        .into_string()
        .map_err(|e| format!("read GET response body: {e}"))
}
