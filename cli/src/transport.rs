//! Blocking HTTP transport backed by ureq.

use std::time::Duration;

use crmsync_core::{ApiError, HttpMethod, HttpRequest, HttpResponse, Transport};
use tracing::debug;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Executes `HttpRequest`s with a shared ureq agent.
///
/// 4xx/5xx responses come back as data so the core client can interpret
/// them; only failures to complete the round-trip are errors.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(TIMEOUT))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, req: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = req.method.as_str(), url = %req.path, "request");
        let headers = &req.headers;
        let result = match (req.method, req.body.as_deref()) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(&req.path), headers).call(),
            (HttpMethod::Delete, _) => with_headers(self.agent.delete(&req.path), headers).call(),
            (HttpMethod::Post, body) => with_headers(self.agent.post(&req.path), headers)
                .send(body.unwrap_or_default().as_bytes()),
            (HttpMethod::Put, body) => with_headers(self.agent.put(&req.path), headers)
                .send(body.unwrap_or_default().as_bytes()),
        };
        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        debug!(status, "response");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(
    builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    headers
        .iter()
        .fold(builder, |builder, (name, value)| builder.header(name, value))
}
