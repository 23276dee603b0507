//! Per-station HTTP API client.

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use url::Url;

use crate::models::PhaseDescriptor;
use crate::services::descriptors::{DescriptorSource, RetrieveError};

/// A client for the one-shot HTTP endpoints every station backend exposes.
///
/// The retry middleware only smooths over transient failures of a single
/// request; nothing here schedules refetches. Callers retry lazily on
/// their next access.
pub struct StationApiClient {
    inner: ClientWithMiddleware,
}

impl StationApiClient {
    /// Builds a client with a small transient-retry policy.
    pub fn new() -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(2);
        let inner = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Self { inner }
    }

    fn endpoint(host: &str, port: u16, path: &str) -> Result<Url, RetrieveError> {
        Url::parse(&format!("http://{}:{}/{}", host, port, path))
            .map_err(|e| RetrieveError::Http(format!("invalid endpoint: {}", e)))
    }

    /// Fetches the declared phases of one test, in declaration order.
    pub async fn phase_descriptors(
        &self,
        host: &str,
        port: u16,
        test_id: &str,
    ) -> Result<Vec<PhaseDescriptor>, RetrieveError> {
        let url = Self::endpoint(host, port, &format!("tests/{}/phases", test_id))?;
        let response = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|e| RetrieveError::Http(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RetrieveError::Status(status.as_u16()));
        }
        response
            .json::<Vec<PhaseDescriptor>>()
            .await
            .map_err(|e| RetrieveError::Body(e.to_string()))
    }

    /// Posts an operator's response to a plug prompt. One-shot; the
    /// subscription machinery is not involved.
    pub async fn respond_to_plug(
        &self,
        host: &str,
        port: u16,
        test_id: &str,
        plug: &str,
        response: &serde_json::Value,
    ) -> Result<(), RetrieveError> {
        let url = Self::endpoint(host, port, &format!("plugs/{}/{}", test_id, plug))?;
        let reply = self
            .inner
            .post(url)
            .json(response)
            .send()
            .await
            .map_err(|e| RetrieveError::Http(e.to_string()))?;
        let status = reply.status();
        if !status.is_success() {
            return Err(RetrieveError::Status(status.as_u16()));
        }
        Ok(())
    }
}

impl Default for StationApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DescriptorSource for StationApiClient {
    async fn phase_descriptors(
        &self,
        host: &str,
        port: u16,
        test_id: &str,
    ) -> Result<Vec<PhaseDescriptor>, RetrieveError> {
        StationApiClient::phase_descriptors(self, host, port, test_id).await
    }
}
