use log::warn;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use url::Url;

use crate::auth::Token;
use crate::error::{PerfLensError, Result};

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_SECONDS: u64 = 5;

/// Blocking-style REST client for one Buildkite pipeline.
///
/// Every call is a single awaited round-trip; nothing is issued concurrently.
pub struct BuildkiteClient {
    client: Client,
    pipeline_url: Url,
    token: Token,
    max_retries: u32,
    retry_delay: Duration,
}

impl BuildkiteClient {
    pub fn new(base_url: &str, organization: &str, pipeline: &str, token: Token) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("PerfLens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PerfLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        // Join below needs a trailing slash to append rather than replace.
        let base = if base_url.ends_with('/') {
            Url::parse(base_url)
        } else {
            Url::parse(&format!("{base_url}/"))
        }
        .map_err(|e| PerfLensError::Config(format!("Invalid base URL: {e}")))?;

        let pipeline_url = base
            .join(&format!(
                "v2/organizations/{organization}/pipelines/{pipeline}/"
            ))
            .map_err(|e| PerfLensError::Config(format!("Invalid pipeline URL: {e}")))?;

        Ok(Self {
            client,
            pipeline_url,
            token,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECONDS),
        })
    }

    #[must_use]
    pub fn with_retry_policy(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Resolves a path relative to the pipeline endpoint.
    pub(super) fn url(&self, path: &str) -> Result<Url> {
        self.pipeline_url
            .join(path)
            .map_err(|e| PerfLensError::Config(format!("Invalid request URL '{path}': {e}")))
    }

    /// Sends an authenticated GET, retrying on rate limits, server errors and
    /// connection failures. Any other non-2xx status is returned as an error
    /// carrying the response body.
    pub(super) async fn get(&self, url: Url) -> Result<Response> {
        let mut retry_count = 0;
        loop {
            let request = self
                .client
                .get(url.clone())
                .bearer_auth(self.token.as_str());

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    if retry_count >= self.max_retries {
                        return Err(e.into());
                    }
                    warn!(
                        "Network error ({e}), retrying in {:?} ({}/{})...",
                        self.retry_delay,
                        retry_count + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count < self.max_retries {
                    warn!(
                        "Buildkite API error (status {status}). Retrying in {:?} ({}/{})...",
                        self.retry_delay,
                        retry_count + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    retry_count += 1;
                    continue;
                }
                if retry_count > 0 {
                    return Err(PerfLensError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: self.max_retries,
                    });
                }
            }

            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(PerfLensError::ApiError {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }
    }
}
