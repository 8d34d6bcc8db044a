//! The `ResourceClient` seam the sync engine talks to.
//!
//! `HttpResourceClient` is the production implementation: it drives
//! `CloseClient` through a host-provided `Transport`, follows pagination and
//! paces mutating calls.

use std::thread;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;

use crate::client::CloseClient;
use crate::error::ApiError;
use crate::http::Transport;
use crate::types::ResourceRecord;

/// List, create and delete records in one environment.
pub trait ResourceClient {
    /// Every record in the collection, in server order.
    fn list(&self, resource: &str) -> Result<Vec<ResourceRecord>, ApiError>;

    fn create(&self, resource: &str, fields: &Map<String, Value>)
        -> Result<ResourceRecord, ApiError>;

    fn delete(&self, resource: &str, id: &str) -> Result<(), ApiError>;
}

impl<C: ResourceClient + ?Sized> ResourceClient for &C {
    fn list(&self, resource: &str) -> Result<Vec<ResourceRecord>, ApiError> {
        (**self).list(resource)
    }

    fn create(
        &self,
        resource: &str,
        fields: &Map<String, Value>,
    ) -> Result<ResourceRecord, ApiError> {
        (**self).create(resource, fields)
    }

    fn delete(&self, resource: &str, id: &str) -> Result<(), ApiError> {
        (**self).delete(resource, id)
    }
}

/// `ResourceClient` over HTTP.
#[derive(Debug)]
pub struct HttpResourceClient<T> {
    api: CloseClient,
    transport: T,
    write_delay: Duration,
}

impl<T: Transport> HttpResourceClient<T> {
    pub fn new(api: CloseClient, transport: T) -> Self {
        Self {
            api,
            transport,
            write_delay: Duration::ZERO,
        }
    }

    /// Pause after every create or delete, successful or not.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    fn pace(&self) {
        if !self.write_delay.is_zero() {
            thread::sleep(self.write_delay);
        }
    }
}

impl<T: Transport> ResourceClient for HttpResourceClient<T> {
    fn list(&self, resource: &str) -> Result<Vec<ResourceRecord>, ApiError> {
        let mut records = Vec::new();
        loop {
            let request = self.api.build_list(resource, records.len());
            let page = self.api.parse_list(self.transport.execute(request)?)?;
            let fetched = page.data.len();
            debug!(resource, skip = records.len(), fetched, has_more = page.has_more, "fetched page");
            records.extend(page.data);
            if !page.has_more || fetched == 0 {
                break;
            }
        }
        Ok(records)
    }

    fn create(
        &self,
        resource: &str,
        fields: &Map<String, Value>,
    ) -> Result<ResourceRecord, ApiError> {
        let request = self.api.build_create(resource, fields)?;
        let result = self
            .transport
            .execute(request)
            .and_then(|response| self.api.parse_create(response));
        self.pace();
        result
    }

    fn delete(&self, resource: &str, id: &str) -> Result<(), ApiError> {
        let request = self.api.build_delete(resource, id);
        let result = self
            .transport
            .execute(request)
            .and_then(|response| self.api.parse_delete(response));
        self.pace();
        result
    }
}
