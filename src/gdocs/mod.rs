//! Document sink interface.
//!
//! Append-only text output; the shipped implementation targets the Google
//! Docs `batchUpdate` endpoint with end-of-segment inserts.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::core::config::settings::DocsSettings;
use crate::core::errors::ApiError;

#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Append `text` at the end of the document body.
    async fn append(&self, document_id: &str, text: &str) -> Result<(), ApiError>;
}

#[derive(Clone)]
pub struct GoogleDocsClient {
    base_url: String,
    access_token: String,
    client: Client,
}

impl GoogleDocsClient {
    pub fn new(settings: &DocsSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("failed to build Docs HTTP client")?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            access_token: settings.access_token.clone(),
            client,
        })
    }
}

#[async_trait]
impl DocumentSink for GoogleDocsClient {
    async fn append(&self, document_id: &str, text: &str) -> Result<(), ApiError> {
        let url = format!("{}/v1/documents/{}:batchUpdate", self.base_url, document_id);

        let body = json!({
            "requests": [{
                "insertText": {
                    "text": text,
                    "endOfSegmentLocation": { "segmentId": "" },
                }
            }]
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let detail = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Docs batchUpdate returned {}: {}",
                status, detail
            )));
        }

        Ok(())
    }
}
