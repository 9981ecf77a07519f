//! HTTP backend for all four services.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::{Result, TallyError};

use super::services::{
    ActiveSession, ApprovalRequest, ApprovalService, ExtractionRequest, ExtractionResult,
    ExtractionService, LearnedMapping, MappingLearningService, ProgressService,
};
use super::snapshot::SessionSnapshot;
use super::step::WorkflowStep;

/// Default request timeout. Extraction can take a while.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Backend reached over HTTP with a bearer token.
///
/// Transport failures and non-success statuses become
/// [`TallyError::TransientService`]; lookups answered with 404 are `None`.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpBackend {
    /// Create a backend for `base_url`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, token, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a backend with a custom request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TallyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Create from `TALLY_API_URL` and `TALLY_API_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("TALLY_API_URL").map_err(|_| {
            TallyError::Config("TALLY_API_URL environment variable not set".to_string())
        })?;
        let token = std::env::var("TALLY_API_TOKEN").map_err(|_| {
            TallyError::Config("TALLY_API_TOKEN environment variable not set".to_string())
        })?;
        Self::new(url, token)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token))
                .map_err(|e| TallyError::Config(format!("Invalid API token: {}", e)))?,
        );
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn send(&self, service: &str, request: RequestBuilder) -> Result<Option<Response>> {
        let response = request
            .headers(self.headers()?)
            .send()
            .map_err(|e| TallyError::service(service, format!("request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TallyError::service(service, format!("HTTP {}: {}", status, body)));
        }
        Ok(Some(response))
    }

    fn send_json<T: DeserializeOwned>(&self, service: &str, request: RequestBuilder) -> Result<Option<T>> {
        match self.send(service, request)? {
            Some(response) => response
                .json()
                .map(Some)
                .map_err(|e| TallyError::service(service, format!("invalid response: {}", e))),
            None => Ok(None),
        }
    }

    fn send_unit(&self, service: &str, request: RequestBuilder) -> Result<()> {
        self.send(service, request)?
            .map(|_| ())
            .ok_or_else(|| TallyError::service(service, "endpoint not found"))
    }
}

impl ExtractionService for HttpBackend {
    fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionResult> {
        let builder = self.client.post(self.url("extractions")).json(request);
        self.send_json("extraction", builder)?
            .ok_or_else(|| TallyError::service("extraction", "upload not found"))
    }
}

impl MappingLearningService for HttpBackend {
    fn find_learned_mapping(&self, header: &[String], signature: &str) -> Result<Option<LearnedMapping>> {
        let builder = self
            .client
            .post(self.url("mappings/lookup"))
            .json(&json!({"headers": header, "signature": signature}));
        self.send_json("mapping-learning", builder)
    }

    fn save_learned_mapping(&self, header: &[String], signature: &str, learned: &LearnedMapping) -> Result<()> {
        let builder = self.client.post(self.url("mappings")).json(&json!({
            "headers": header,
            "signature": signature,
            "learned": learned,
        }));
        self.send_unit("mapping-learning", builder)
    }
}

impl ProgressService for HttpBackend {
    fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let builder = self
            .client
            .put(self.url(&format!("progress/{}", snapshot.upload_id)))
            .json(snapshot);
        self.send_unit("progress", builder)
    }

    fn load(&self, upload_id: &str, step: Option<WorkflowStep>) -> Result<Option<SessionSnapshot>> {
        let mut builder = self.client.get(self.url(&format!("progress/{}", upload_id)));
        if let Some(step) = step {
            builder = builder.query(&[("step", step.as_str())]);
        }
        self.send_json("progress", builder)
    }

    fn resume_active(&self, actor_id: &str) -> Result<Option<ActiveSession>> {
        let builder = self
            .client
            .get(self.url("progress/active"))
            .query(&[("actor_id", actor_id)]);
        self.send_json("progress", builder)
    }

    fn discard(&self, upload_id: &str) -> Result<()> {
        let builder = self.client.delete(self.url(&format!("progress/{}", upload_id)));
        // Already gone is fine.
        self.send("progress", builder).map(|_| ())
    }
}

impl ApprovalService for HttpBackend {
    fn approve(&self, request: &ApprovalRequest) -> Result<()> {
        let builder = self
            .client
            .post(self.url(&format!("uploads/{}/approve", request.upload_id)))
            .json(request);
        self.send_unit("approval", builder)
    }

    fn reject(&self, request: &ApprovalRequest, reason: &str) -> Result<()> {
        let builder = self
            .client
            .post(self.url(&format!("uploads/{}/reject", request.upload_id)))
            .json(&json!({"request": request, "reason": reason}));
        self.send_unit("approval", builder)
    }

    fn send_to_pending(&self, request: &ApprovalRequest) -> Result<()> {
        let builder = self
            .client
            .post(self.url(&format!("uploads/{}/pending", request.upload_id)))
            .json(request);
        self.send_unit("approval", builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let backend = HttpBackend::new("https://api.example.com/v1/", "token").unwrap();
        assert_eq!(backend.url("/progress/u1"), "https://api.example.com/v1/progress/u1");
        assert_eq!(backend.url("extractions"), "https://api.example.com/v1/extractions");
    }

    #[test]
    fn test_headers_carry_bearer_token() {
        let backend = HttpBackend::new("http://localhost", "secret").unwrap();
        let headers = backend.headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer secret");
    }

    #[test]
    fn test_unreachable_backend_is_transient() {
        let backend =
            HttpBackend::with_timeout("http://127.0.0.1:9", "t", Duration::from_millis(200)).unwrap();
        let err = backend.load("u1", None).unwrap_err();
        assert!(err.is_transient());
    }
}
