//! # Transport Implementations
//!
//! Production connectors behind the `core::transport` seam. Only one exists
//! today: the WebSocket connector the station backends speak. Everything
//! here is replaceable in tests by scripting the seam directly.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// The WebSocket connector (tokio-tungstenite).
pub mod ws;

// --- Public API Re-exports ---
pub use ws::WsConnector;
