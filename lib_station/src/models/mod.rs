//! Domain records maintained by the data services.
//!
//! These are plain value types: wire frames deserialize into lenient
//! `*Update`/`*Wire` shapes (every field optional), which the services
//! convert and merge into the typed records below. Merges are explicit and
//! field-by-field so a reader can see which fields are authoritative on
//! update; an absent field always keeps its previous value.

pub mod station;
pub mod test_record;

pub use station::{Station, StationStatus, StationUpdate};
pub use test_record::{
    Attachment, LogRecord, Measurement, MeasurementOutcome, PhaseDescriptor, PhaseRecord,
    PhaseStatus, TestState, TestStateWire, TestStatus, TestUpdateWire,
};
