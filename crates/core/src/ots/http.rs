//! HTTP client for the XML typesetting service.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::OtsConfig;
use crate::metrics;

use super::{ConversionClient, JobStatus, OtsError, TargetOperation};

/// Client for the conversion service HTTP API.
///
/// Authenticates with email/password, keeps the session cookie in the
/// jar and re-authenticates once when the service reports the session
/// as expired.
pub struct HttpOtsClient {
    client: Client,
    config: OtsConfig,
    /// Session marker (refreshed on auth failure).
    session: Arc<RwLock<Option<String>>>,
}

impl HttpOtsClient {
    pub fn new(config: OtsConfig) -> Result<Self, OtsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| OtsError::SubmissionFailed(format!("HTTP client init: {}", e)))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Login and mark the session as established.
    async fn login(&self) -> Result<(), OtsError> {
        let url = format!("{}/api/auth/login", self.base_url());

        let params = [
            ("email", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OtsError::Timeout
                } else {
                    OtsError::AuthenticationFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!("conversion service login successful");
            // Session cookie is stored by the cookie jar
            let mut session = self.session.write().await;
            *session = Some("authenticated".to_string());
            Ok(())
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(OtsError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(OtsError::AuthenticationFailed(format!("HTTP {}", status)))
        }
    }

    /// Ensure we have a valid session, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), OtsError> {
        let session = self.session.read().await;
        if session.is_some() {
            return Ok(());
        }
        drop(session);
        self.login().await
    }

    /// Clear the cached session and login again.
    async fn reauthenticate(&self) -> Result<(), OtsError> {
        warn!("conversion service session expired, re-authenticating");
        {
            let mut session = self.session.write().await;
            *session = None;
        }
        self.login().await
    }

    fn is_session_expired(status: StatusCode) -> bool {
        status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
    }

    fn record_request<T>(operation: &str, result: &Result<T, OtsError>) {
        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics::OTS_REQUESTS
            .with_label_values(&[operation, outcome])
            .inc();
    }

    async fn do_submit(
        &self,
        document: &Path,
        target: TargetOperation,
    ) -> Result<String, OtsError> {
        self.ensure_authenticated().await?;

        let file_name = document
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();

        let data = tokio::fs::read(document)
            .await
            .map_err(|e| OtsError::SubmissionFailed(format!("read {}: {}", file_name, e)))?;

        let build_form = |data: Vec<u8>, file_name: String| -> Result<multipart::Form, OtsError> {
            let file_part = multipart::Part::bytes(data)
                .file_name(file_name)
                .mime_str("application/octet-stream")
                .map_err(|e| OtsError::SubmissionFailed(e.to_string()))?;
            Ok(multipart::Form::new()
                .part("file", file_part)
                .text("target", target.as_str()))
        };

        let url = format!("{}/api/job/submit", self.base_url());
        let mut response = self
            .client
            .post(&url)
            .multipart(build_form(data.clone(), file_name.clone())?)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OtsError::Timeout
                } else {
                    OtsError::SubmissionFailed(e.to_string())
                }
            })?;

        if Self::is_session_expired(response.status()) {
            self.reauthenticate().await?;
            response = self
                .client
                .post(&url)
                .multipart(build_form(data, file_name)?)
                .send()
                .await
                .map_err(|e| OtsError::SubmissionFailed(e.to_string()))?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OtsError::SubmissionFailed(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| OtsError::SubmissionFailed(format!("Failed to parse response: {}", e)))?;

        // The service returns the id as either a number or a string.
        let job_id = match parsed.id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(OtsError::SubmissionFailed(format!(
                    "Unexpected job id in response: {}",
                    other
                )))
            }
        };

        debug!(job_id = %job_id, target = target.as_str(), "conversion job submitted");
        Ok(job_id)
    }

    async fn do_status(&self, job_id: &str) -> Result<JobStatus, OtsError> {
        self.ensure_authenticated().await?;

        let url = format!("{}/api/job/status?id={}", self.base_url(), job_id);
        let mut response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                OtsError::Timeout
            } else {
                OtsError::Transient(e.to_string())
            }
        })?;

        if Self::is_session_expired(response.status()) {
            self.reauthenticate().await?;
            response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| OtsError::Transient(e.to_string()))?;
        }

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(OtsError::Permanent(format!("unknown job: {}", job_id)));
        }
        if status.is_server_error() {
            return Err(OtsError::Transient(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(OtsError::Permanent(format!("HTTP {}", status)));
        }

        let parsed: StatusResponse = response
            .json()
            .await
            .map_err(|e| OtsError::Transient(format!("Failed to parse response: {}", e)))?;

        Ok(JobStatus::from_code(parsed.job_status))
    }

    async fn do_fetch_archive(&self, job_id: &str, dest_dir: &Path) -> Result<PathBuf, OtsError> {
        self.ensure_authenticated().await?;

        let url = format!(
            "{}/api/job/retrieve?id={}&conversionStage=zip",
            self.base_url(),
            job_id
        );
        let mut response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                OtsError::Timeout
            } else {
                OtsError::DownloadFailed(e.to_string())
            }
        })?;

        if Self::is_session_expired(response.status()) {
            self.reauthenticate().await?;
            response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| OtsError::DownloadFailed(e.to_string()))?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(OtsError::DownloadFailed(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| OtsError::DownloadFailed(e.to_string()))?;

        if bytes.is_empty() {
            return Err(OtsError::DownloadFailed(format!(
                "empty archive for job {}",
                job_id
            )));
        }

        let archive_path = dest_dir.join(format!("ots-job-{}.zip", job_id));
        tokio::fs::write(&archive_path, &bytes)
            .await
            .map_err(|e| OtsError::DownloadFailed(format!("write archive: {}", e)))?;

        // Re-check on disk so a partial write cannot slip through.
        let metadata = tokio::fs::metadata(&archive_path)
            .await
            .map_err(|e| OtsError::DownloadFailed(e.to_string()))?;
        if metadata.len() == 0 {
            return Err(OtsError::DownloadFailed(format!(
                "archive for job {} is empty on disk",
                job_id
            )));
        }

        debug!(job_id = %job_id, path = %archive_path.display(), size = metadata.len(), "archive downloaded");
        Ok(archive_path)
    }
}

/// Response from the job submission endpoint.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: serde_json::Value,
}

/// Response from the job status endpoint.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(rename = "jobStatus")]
    job_status: i64,
}

#[async_trait]
impl ConversionClient for HttpOtsClient {
    fn name(&self) -> &str {
        "ots-http"
    }

    async fn submit(&self, document: &Path, target: TargetOperation) -> Result<String, OtsError> {
        let result = self.do_submit(document, target).await;
        Self::record_request("submit", &result);
        result
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus, OtsError> {
        let result = self.do_status(job_id).await;
        Self::record_request("status", &result);
        result
    }

    async fn fetch_archive(&self, job_id: &str, dest_dir: &Path) -> Result<PathBuf, OtsError> {
        let result = self.do_fetch_archive(job_id, dest_dir).await;
        Self::record_request("retrieve", &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_client() -> HttpOtsClient {
        HttpOtsClient::new(OtsConfig {
            url: "http://127.0.0.1:1".to_string(),
            username: "editor@example.org".to_string(),
            password: "hunter2".to_string(),
            timeout_secs: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_failed_status_poll_counted() {
        let client = unreachable_client();

        let counter = metrics::OTS_REQUESTS.with_label_values(&["status", "error"]);
        let before = counter.get();

        let result = client.status("job-1").await;
        assert!(result.is_err());
        assert_eq!(counter.get(), before + 1);
    }

    #[tokio::test]
    async fn test_failed_submit_counted() {
        let client = unreachable_client();
        let tmp = tempfile::NamedTempFile::new().unwrap();

        let counter = metrics::OTS_REQUESTS.with_label_values(&["submit", "error"]);
        let before = counter.get();

        let result = client
            .submit(tmp.path(), TargetOperation::XmlConversion)
            .await;
        assert!(result.is_err());
        assert_eq!(counter.get(), before + 1);
    }
}
