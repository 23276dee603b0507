//! # HTTP Side Channel
//!
//! One-shot request/response calls to a station backend, independent of any
//! subscription: the declared-phase list for a test id, and operator
//! responses posted back to a plug. Built on `reqwest_middleware` with
//! transient-level retry, the same way the rest of the system's API calls
//! are made. Failures here never touch a subscription's state.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// The per-station API client.
pub mod station_api;

// --- Public API Re-exports ---
pub use crate::services::descriptors::RetrieveError;
pub use station_api::StationApiClient;
