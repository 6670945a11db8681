use crate::core::{config::AnalyticsConfig, telemetry::PageViewTracker};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

/// Reports page views through the Google Analytics measurement protocol.
pub struct GoogleAnalyticsTracker {
    endpoint: String,
    account_id: String,
    client: reqwest::Client,
}

impl GoogleAnalyticsTracker {
    pub fn new(config: &AnalyticsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fundxml/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build analytics client")?;

        Ok(GoogleAnalyticsTracker {
            endpoint: config.endpoint.clone(),
            account_id: config.account_id.clone(),
            client,
        })
    }
}

#[async_trait]
impl PageViewTracker for GoogleAnalyticsTracker {
    async fn track_page_view(&self, path: &str) -> Result<()> {
        // Each invocation is reported as a new anonymous visitor
        let client_id = uuid::Uuid::new_v4().to_string();
        let url = Url::parse_with_params(
            &self.endpoint,
            &[
                ("v", "1"),
                ("tid", self.account_id.as_str()),
                ("cid", client_id.as_str()),
                ("t", "pageview"),
                ("dp", path),
            ],
        )
        .with_context(|| format!("Invalid analytics endpoint: {}", self.endpoint))?;

        let response = self
            .client
            .post(url)
            .send()
            .await
            .context("Page view request failed")?;
        response
            .error_for_status()
            .context("Page view rejected by analytics")?;

        debug!(path = %path, "Recorded page view");
        Ok(())
    }
}
