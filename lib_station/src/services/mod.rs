//! # Typed Data Services
//!
//! Each service owns one [`Subscription`](crate::core::Subscription), knows
//! its endpoint URL, parses inbound frames into typed records and maintains
//! a keyed in-memory store. Records are held behind `Arc<Mutex<...>>` and
//! merged in place so consumers that keep a handle to a record observe every
//! update without the entry ever being replaced.
//!
//! The frame pipeline is always validate → parse → apply; a malformed frame
//! is dropped with a warning and the stream carries on.
//!
//! ## Contained Modules:
//! - **`dashboard`**: the station-overview stream. One full snapshot per
//!   frame, keyed `host:port`, pruned against each snapshot.
//! - **`station`**: one station's per-test stream. Incremental updates
//!   keyed by test id, enriched with phase descriptors from the HTTP side
//!   channel.
//! - **`descriptors`**: the seam the station service fetches declared-phase
//!   lists through.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// The station-overview data service.
pub mod dashboard;
/// The phase-descriptor source seam and its error type.
pub mod descriptors;
/// The per-station test data service.
pub mod station;

// --- Public API Re-exports ---
pub use dashboard::DashboardService;
pub use descriptors::{DescriptorSource, RetrieveError};
pub use station::StationService;
