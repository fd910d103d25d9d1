use crate::rental::{DependentCallError, CHECK_PATH};
use crate::telemetry::TraceContext;
use axum::http::StatusCode;
use std::time::Duration;
use tracing::{debug, instrument};

/// Client for the `/check` endpoint the rental chain depends on.
///
/// Holds a pooled [`reqwest::Client`] with an explicit request timeout, so cloning is cheap
/// and every clone shares the same connection pool. Redirects are not followed: a `3xx` from
/// `/check` is the answer, and exactly one request leaves per call.
#[derive(Clone, Debug)]
pub struct VerifyClient {
    http: reqwest::Client,
    check_url: String,
}

impl VerifyClient {
    /// Builds a client calling `{base_url}/check`, giving up after `timeout`.
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let check_url = format!("{}{}", base_url.as_ref().trim_end_matches('/'), CHECK_PATH);
        Ok(Self { http, check_url })
    }

    pub fn check_url(&self) -> &str {
        &self.check_url
    }

    /// Issues one `GET /check` carrying `trace` in its headers.
    ///
    /// Single attempt: a transport failure is returned, never retried.
    #[instrument(skip(self, trace), fields(url = %self.check_url))]
    pub async fn check(&self, trace: &TraceContext) -> Result<StatusCode, DependentCallError> {
        let mut request = self.http.get(&self.check_url);
        for (name, value) in trace.propagation_headers() {
            request = request.header(name, value);
        }
        debug!(trace_id = %trace.trace_id(), span_id = %trace.span_id(), "Sending request");

        let response = request
            .send()
            .await
            .map_err(|source| DependentCallError::Transport {
                url: self.check_url.clone(),
                source,
            })?;

        let status = response.status();
        debug!(%status, "Received response");

        if status.is_success() {
            Ok(status)
        } else {
            Err(DependentCallError::Status {
                url: self.check_url.clone(),
                status,
            })
        }
    }
}
