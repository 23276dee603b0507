// Declare the modules to re-export
pub mod core;
pub mod models;
pub mod services;

#[cfg(feature = "transports")]
pub mod transports;

#[cfg(feature = "retrieve")]
pub mod retrieve;

// Re-export the primary types
pub use crate::core::subscription::{RetryPolicy, Subscription, SubscriptionError, SubscriptionState};
pub use crate::core::transport::{Connector, Frame, TransportEvent, TransportHandle};
pub use crate::services::dashboard::DashboardService;
pub use crate::services::descriptors::{DescriptorSource, RetrieveError};
pub use crate::services::station::StationService;

#[cfg(feature = "transports")]
pub use crate::transports::ws::WsConnector;

#[cfg(feature = "retrieve")]
pub use crate::retrieve::StationApiClient;
