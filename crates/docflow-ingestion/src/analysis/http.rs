//! HTTP client for a remote analysis service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docflow_core::config::AnalysisConfig;
use docflow_core::error::{AppError, ErrorKind};
use docflow_core::result::AppResult;
use docflow_core::types::id::{DocumentId, JobId};
use docflow_entity::document::model::Document;

use super::{AnalysisClient, AnalysisError, AnalysisReport, SubmissionAck};

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Body of `POST /documents/process`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    job_id: JobId,
    document_id: DocumentId,
    file_name: &'a str,
    file_path: &'a str,
    mime_type: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    reference: Option<String>,
}

/// Analysis client speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnalysisClient {
    /// Build a client from config. Requires `base_url`.
    pub fn new(config: &AnalysisConfig) -> AppResult<Self> {
        config.check_provider()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    format!("Failed to build analysis HTTP client: {e}"),
                    e,
                )
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, AnalysisError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AnalysisError::Status {
            status: status.as_u16(),
            body: truncate(body),
        })
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn submit(
        &self,
        job_id: JobId,
        document: &Document,
    ) -> Result<SubmissionAck, AnalysisError> {
        let request = ProcessRequest {
            job_id,
            document_id: document.id,
            file_name: &document.file_name,
            file_path: &document.file_path,
            mime_type: &document.mime_type,
        };

        let response = self
            .client
            .post(self.endpoint("documents/process"))
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        let response = Self::check_status(response).await?;

        // Some deployments answer with an empty body.
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        let parsed = if body.trim().is_empty() {
            ProcessResponse::default()
        } else {
            serde_json::from_str(&body)
                .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?
        };

        tracing::debug!(job_id = %job_id, reference = ?parsed.reference, "Document submitted for analysis");

        Ok(SubmissionAck {
            job_id,
            reference: parsed.reference,
        })
    }

    async fn poll(&self, job_id: JobId) -> Result<AnalysisReport, AnalysisError> {
        let response = self
            .client
            .get(self.endpoint(&format!("jobs/{job_id}/status")))
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        let response = Self::check_status(response).await?;

        response
            .json::<AnalysisReport>()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_core::config::AnalysisProvider;

    fn config(base_url: &str) -> AnalysisConfig {
        AnalysisConfig {
            provider: AnalysisProvider::Http,
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let client = HttpAnalysisClient::new(&config("http://analysis:8000/")).unwrap();
        assert_eq!(
            client.endpoint("documents/process"),
            "http://analysis:8000/documents/process"
        );
        assert_eq!(client.endpoint("/jobs/x/status"), "http://analysis:8000/jobs/x/status");
    }

    #[test]
    fn test_missing_base_url_is_configuration_error() {
        let err = HttpAnalysisClient::new(&config("  ")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_process_request_shape() {
        let request = ProcessRequest {
            job_id: JobId::new(),
            document_id: DocumentId::new(),
            file_name: "report.pdf",
            file_path: "uploads/report.pdf",
            mime_type: "application/pdf",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["fileName"], "report.pdf");
        assert_eq!(json["mimeType"], "application/pdf");
        assert!(json.get("jobId").is_some());
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let cut = truncate(body);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= MAX_ERROR_BODY + 3);
        assert_eq!(truncate("short".to_string()), "short");
    }
}
