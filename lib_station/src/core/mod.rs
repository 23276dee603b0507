//! # Subscription Core Module
//!
//! The reconnect-aware heart of the StationLink library. A dashboard keeps a
//! long-lived streaming connection open to every backend it watches; those
//! connections drop, race, and get replaced constantly, and the UI on top of
//! them only wants two things: an uninterrupted message stream and honest
//! lifecycle flags. This module provides both.
//!
//! ## Core Components:
//!
//! - **`subscription`**: the state machine. Owns at most one transport at a
//!   time, schedules capped exponential-backoff retries, guards against
//!   callbacks from superseded transports, and republishes inbound frames on
//!   a broadcast stream that survives reconnection.
//!
//! - **`transport`**: the single seam to the wire. A `Connector` opens a
//!   connection attempt and reports `Opened`/`Message`/`Closed` events; the
//!   production WebSocket connector lives in the `transports` module, and
//!   tests script a mock.
//!
//! Everything above this module (the typed data services, the UI) consumes
//! the broadcast stream and the lifecycle flags and never touches the wire.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// The reconnect-aware subscription state machine.
pub mod subscription;
/// The transport seam between the state machine and the wire.
pub mod transport;

// --- Public API Re-exports ---
pub use subscription::{RetryPolicy, Subscription, SubscriptionError, SubscriptionState};
pub use transport::{Connector, Frame, TransportEvent, TransportHandle};
