//! HTTP client for the analysis service.
//!
//! [`ServiceClient`] implements both [`QuestionSource`] (`GET /question`) and
//! [`Analyzer`] (`POST /analyze_video`, multipart).  Connection details come
//! from [`ServiceConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::config::ServiceConfig;
use crate::metrics::Metrics;

use super::question::{QuestionError, QuestionSource};
use super::upload::{AnalyzeError, Analyzer, MediaFile};
use super::wire::{AnalysisResponse, QuestionResponse};

pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    /// Build a client with the configured per-request timeout.  Falls back to
    /// a default client if the builder fails.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl QuestionSource for ServiceClient {
    async fn fetch_question(&self) -> Result<String, QuestionError> {
        let response = self
            .client
            .get(self.url("question"))
            .send()
            .await?
            .error_for_status()?;

        let body: QuestionResponse = response.json().await?;
        let question = body.question.trim();
        if question.is_empty() {
            return Err(QuestionError::BadResponse("empty question".into()));
        }
        Ok(question.to_string())
    }
}

#[async_trait]
impl Analyzer for ServiceClient {
    async fn analyze(&self, file: &MediaFile) -> Result<Metrics, AnalyzeError> {
        let bytes = tokio::fs::read(file.path()).await.map_err(|e| {
            AnalyzeError::Transfer(format!("could not read {}: {e}", file.path().display()))
        })?;

        log::info!(
            "upload: sending {} ({} bytes)",
            file.display_name(),
            bytes.len()
        );

        let part = Part::bytes(bytes).file_name(file.display_name());
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("analyze_video"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalyzeError::MediaRejected(format!("service answered {status}")));
        }

        let body = response.text().await?;
        let analysis: AnalysisResponse = serde_json::from_str(&body)
            .map_err(|e| AnalyzeError::MediaRejected(format!("malformed response: {e}")))?;

        Ok(analysis.into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
