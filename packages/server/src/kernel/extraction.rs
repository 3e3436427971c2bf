//! HTTP client for the extraction pipeline.
//!
//! The pipeline (OCR, LLM structuring, dedup) runs as a separate service;
//! job handlers talk to it through [`BaseExtractionService`]. One POST per
//! job, job type selects the pipeline variant server-side.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::kernel::traits::BaseExtractionService;

pub struct HttpExtractionService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExtractionService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl BaseExtractionService for HttpExtractionService {
    async fn extract(
        &self,
        job_type: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/extract", self.base_url.trim_end_matches('/'));
        debug!(job_type, url = %url, "calling extraction service");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "jobType": job_type, "payload": payload }))
            .send()
            .await
            .context("extraction request failed")?
            .error_for_status()
            .context("extraction service returned an error status")?;

        response
            .json()
            .await
            .context("extraction response was not valid JSON")
    }
}
