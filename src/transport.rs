use std::time::Duration;

use tracing::trace;

use crate::Result;

/// Thin GET wrapper around the shared HTTP client. No retries; every
/// network-level failure surfaces as an error on the single call.
pub(crate) struct Transport {
    http: reqwest::Client,
    base_url: String,
}

impl Transport {
    pub fn new(protocol: &str, host: &str) -> Self {
        let http = reqwest::Client::builder()
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: format!("{protocol}://{host}"),
        }
    }

    pub async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        trace!(url = %url, "GET");
        let resp = self
            .http
            .get(&url)
            .query(query)
            .timeout(timeout)
            .send()
            .await?;
        Ok(resp)
    }
}
