//! Shared HTTP client for the chat and TTS integrations.

use crate::error::PodcastError;
use reqwest::Client;
use std::time::Duration;

/// Build the client used by every outbound API call in a run.
///
/// One client per run keeps connections to the same host alive across
/// pages; the timeout applies to each request individually.
pub fn http_client(timeout_secs: u64) -> Result<Client, PodcastError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .pool_idle_timeout(Some(Duration::from_secs(30)))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .user_agent(concat!("pdf2podcast/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PodcastError::Internal(format!("Failed to build HTTP client: {e}")))
}
