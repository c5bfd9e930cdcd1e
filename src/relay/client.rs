//! Transport to the remote password servers.
//!
//! Pure plumbing: requests go out form-encoded, responses come back as
//! `(status, body)` with the body uninterpreted. Connection-level failures
//! (DNS, refused, timeout) surface as [`RelayError::Transport`], never
//! disguised as an HTTP status.

use crate::config::RemoteConfig;
use crate::error::RelayResult;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// HTTP client for a team's password server.
pub struct RemoteServerClient {
    http: Client,
}

impl RemoteServerClient {
    /// Create a new client from config
    pub fn new(config: &RemoteConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { http }
    }

    /// POST form fields to `url`, returning the raw status and body.
    pub async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> RelayResult<(StatusCode, String)> {
        debug!("POST {}", url);
        let response = self.http.post(url).form(fields).send().await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("POST {} -> {}", url, status);
        Ok((status, body))
    }

    /// GET `url`, returning the raw status and body.
    pub async fn get(&self, url: &str) -> RelayResult<(StatusCode, String)> {
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("GET {} -> {}", url, status);
        Ok((status, body))
    }
}

impl std::fmt::Debug for RemoteServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteServerClient").finish_non_exhaustive()
    }
}
