//! The phase-descriptor seam.
//!
//! Declared-phase lists live on a per-station HTTP endpoint, not on the
//! stream. The station service only depends on this trait; the production
//! client lives in `retrieve` and tests script their own source.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::PhaseDescriptor;

/// Failures of the HTTP side channel. These never affect the subscription's
/// own state; callers surface them and move on.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("http request failed: {0}")]
    Http(String),
    #[error("unexpected response status: {0}")]
    Status(u16),
    #[error("malformed response body: {0}")]
    Body(String),
}

/// Fetches the declared phases of one test, in declaration order.
#[async_trait]
pub trait DescriptorSource: Send + Sync {
    /// One-shot fetch; the caller decides about caching and retries.
    async fn phase_descriptors(
        &self,
        host: &str,
        port: u16,
        test_id: &str,
    ) -> Result<Vec<PhaseDescriptor>, RetrieveError>;
}
