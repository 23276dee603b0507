//! The transport seam.
//!
//! A `Connector` turns a URL into one live connection attempt and reports
//! everything that happens on it as [`TransportEvent`]s over an unbounded
//! channel. The [`Subscription`](super::subscription::Subscription) owns the
//! returned handle and is the only consumer of the events; it tags every
//! attempt with a generation number so events from a superseded handle can be
//! dropped.
//!
//! Connectors are injected into constructors, never reached as ambient
//! globals, so tests can substitute a scripted mock.

use std::sync::Arc;

use tokio::sync::mpsc;

/// One discrete payload delivered over a transport's message callback.
///
/// Cheap to clone; the broadcast fan-out hands every listener a pointer to
/// the same buffer rather than a copy.
pub type Frame = Arc<str>;

/// What a live connection attempt can report back to its owner.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection reached the open state.
    Opened,
    /// One inbound frame, unchanged from the wire.
    Message(Frame),
    /// The attempt failed to open, or an open connection dropped. Both cases
    /// route through the same handling path upstream.
    Closed,
}

/// Handle to one connection attempt, exclusively owned by a `Subscription`.
pub trait TransportHandle: Send {
    /// Tears the connection down. A handle closed by its owner must not emit
    /// further events; calling `close` more than once is allowed.
    fn close(&mut self);
}

/// Factory that opens a bidirectional, message-oriented connection.
///
/// `connect` must return immediately; the actual I/O happens on spawned
/// tasks, and the outcome arrives as events on `events`.
pub trait Connector: Send + Sync {
    /// Starts one connection attempt to `url`.
    fn connect(
        &self,
        url: &str,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Box<dyn TransportHandle>;
}
