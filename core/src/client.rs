//! Stateless HTTP request builder and response parser for the CRM REST API.
//!
//! # Design
//! `CloseClient` holds only a base URL and a precomputed `Authorization`
//! header. Each operation is split into a `build_*` method producing an
//! `HttpRequest` and a `parse_*` method consuming an `HttpResponse`. The
//! caller executes the round-trip, keeping this module deterministic.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{Page, ResourceRecord};

/// Public API endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.close.com/api/v1";

/// Records requested per list page.
pub const PAGE_SIZE: usize = 100;

/// Synchronous, stateless client for the CRM configuration endpoints.
///
/// `resource` arguments are collection paths relative to the base URL, e.g.
/// `"status/lead/"`.
#[derive(Clone)]
pub struct CloseClient {
    base_url: String,
    authorization: String,
}

impl std::fmt::Debug for CloseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl CloseClient {
    /// The API key is sent as the Basic auth username with an empty password.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: format!("Basic {}", STANDARD.encode(format!("{api_key}:"))),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_list(&self, resource: &str, skip: usize) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}?_skip={skip}&_limit={PAGE_SIZE}", self.url(resource)),
            headers: self.headers(false),
            body: None,
        }
    }

    pub fn build_create(
        &self,
        resource: &str,
        fields: &Map<String, Value>,
    ) -> Result<HttpRequest, ApiError> {
        let body =
            serde_json::to_string(fields).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: self.url(resource),
            headers: self.headers(true),
            body: Some(body),
        })
    }

    pub fn build_delete(&self, resource: &str, id: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            path: format!("{}{id}/", self.url(resource)),
            headers: self.headers(false),
            body: None,
        }
    }

    pub fn parse_list(&self, response: HttpResponse) -> Result<Page, ApiError> {
        check_status(&response)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    pub fn parse_create(&self, response: HttpResponse) -> Result<ResourceRecord, ApiError> {
        check_status(&response)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    pub fn parse_delete(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    fn url(&self, resource: &str) -> String {
        let resource = resource.trim_start_matches('/');
        if resource.ends_with('/') {
            format!("{}/{resource}", self.base_url)
        } else {
            format!("{}/{resource}/", self.base_url)
        }
    }

    fn headers(&self, with_body: bool) -> Vec<(String, String)> {
        let mut headers = vec![
            ("authorization".to_string(), self.authorization.clone()),
            ("accept".to_string(), "application/json".to_string()),
        ];
        if with_body {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        headers
    }
}

/// Map non-2xx status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    match response.status {
        200..=299 => Ok(()),
        404 => Err(ApiError::NotFound),
        status => Err(ApiError::Http {
            status,
            body: response.body.clone(),
        }),
    }
}
