//! Test-run records maintained by the station service.
//!
//! The station stream delivers one frame per test update: a test id plus a
//! nested state (status, plugs, test record with phases, measurements, logs
//! and attachments). The wire shapes below are lenient; `TestState` is the
//! normalized record the UI binds to. Normalization synthesizes not-yet-run
//! phases from the declared phase descriptors and flattens the per-phase
//! attachment maps into one list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Overall status of a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    WaitingForTestStart,
    Running,
    Completed,
    Error,
    Timeout,
    Aborted,
    Unknown,
}

impl TestStatus {
    /// Maps the wire status string onto the enum.
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "WAITING_FOR_TEST_START" => TestStatus::WaitingForTestStart,
            "RUNNING" => TestStatus::Running,
            "COMPLETED" | "PASS" => TestStatus::Completed,
            "ERROR" | "FAIL" => TestStatus::Error,
            "TIMEOUT" => TestStatus::Timeout,
            "ABORTED" => TestStatus::Aborted,
            other => {
                log::debug!("unrecognized test status '{}'", other);
                TestStatus::Unknown
            }
        }
    }
}

/// Status of one phase within a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseStatus {
    /// Declared but not executed yet (synthesized from a descriptor).
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
    Error,
}

impl PhaseStatus {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "RUNNING" => PhaseStatus::Running,
            "PASS" => PhaseStatus::Passed,
            "FAIL" => PhaseStatus::Failed,
            "SKIP" => PhaseStatus::Skipped,
            "ERROR" => PhaseStatus::Error,
            other => {
                log::debug!("unrecognized phase outcome '{}'", other);
                PhaseStatus::Pending
            }
        }
    }
}

/// Outcome of one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementOutcome {
    Unset,
    Pass,
    Fail,
}

impl MeasurementOutcome {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "PASS" => MeasurementOutcome::Pass,
            "FAIL" => MeasurementOutcome::Fail,
            _ => MeasurementOutcome::Unset,
        }
    }
}

/// One declared phase, in declaration order, fetched once per test id over
/// the HTTP side channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDescriptor {
    pub id: u32,
    pub name: String,
}

/// One measurement taken during a phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub name: String,
    pub outcome: MeasurementOutcome,
    pub measured_value: Option<Value>,
    pub units: Option<String>,
    pub validators: Vec<String>,
}

/// One file attached during a phase, carrying its owning phase name so the
/// flattened per-test list stays navigable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub phase: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub sha1: Option<String>,
}

/// One executed (or synthesized pending) phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseRecord {
    pub name: String,
    pub status: PhaseStatus,
    pub start_time_ms: Option<i64>,
    pub end_time_ms: Option<i64>,
    pub measurements: Vec<Measurement>,
    pub attachments: Vec<Attachment>,
}

impl PhaseRecord {
    fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: PhaseStatus::Pending,
            start_time_ms: None,
            end_time_ms: None,
            measurements: Vec::new(),
            attachments: Vec::new(),
        }
    }

    fn from_wire(wire: PhaseWire) -> Self {
        let name = wire.name.unwrap_or_default();
        let attachments = wire
            .attachments
            .unwrap_or_default()
            .into_iter()
            .map(|(attachment_name, a)| Attachment {
                phase: name.clone(),
                name: attachment_name,
                mime_type: a.mime_type,
                sha1: a.sha1,
            })
            .collect();
        let measurements = wire
            .measurements
            .unwrap_or_default()
            .into_iter()
            .map(|(measurement_name, m)| Measurement {
                name: measurement_name,
                outcome: m
                    .outcome
                    .as_deref()
                    .map(MeasurementOutcome::from_wire)
                    .unwrap_or(MeasurementOutcome::Unset),
                measured_value: m.measured_value,
                units: m.units,
                validators: m.validators.unwrap_or_default(),
            })
            .collect();
        Self {
            status: wire
                .outcome
                .as_deref()
                .map(PhaseStatus::from_wire)
                .unwrap_or(PhaseStatus::Pending),
            start_time_ms: wire.start_time_millis,
            end_time_ms: wire.end_time_millis,
            measurements,
            attachments,
            name,
        }
    }
}

/// One log line emitted by the test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub level: i32,
    pub logger: String,
    pub message: String,
    pub timestamp_ms: Option<i64>,
}

/// The normalized record for one test run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestState {
    pub test_id: String,
    pub status: TestStatus,
    pub dut_id: Option<String>,
    pub start_time_ms: Option<i64>,
    pub end_time_ms: Option<i64>,
    pub phases: Vec<PhaseRecord>,
    pub logs: Vec<LogRecord>,
    /// Flattened view of every phase's attachments.
    pub attachments: Vec<Attachment>,
    pub plugs: BTreeMap<String, Value>,
}

impl TestState {
    /// An empty record for a test id nothing has been reported about yet.
    pub fn new(test_id: &str) -> Self {
        Self {
            test_id: test_id.to_string(),
            status: TestStatus::Unknown,
            dut_id: None,
            start_time_ms: None,
            end_time_ms: None,
            phases: Vec::new(),
            logs: Vec::new(),
            attachments: Vec::new(),
            plugs: BTreeMap::new(),
        }
    }

    /// Builds a fresh record from one wire update.
    pub fn from_wire(update: TestUpdateWire, descriptors: &[PhaseDescriptor]) -> Option<Self> {
        let test_id = update.test_uid.clone()?;
        let mut state = Self::new(&test_id);
        if let Some(wire) = update.state {
            state.apply_wire(wire, descriptors);
        }
        Some(state)
    }

    /// Merges one wire update into the record in place. Fields absent from
    /// the update keep their previous value; when the update carries a
    /// phase list it replaces the old one wholesale (each frame reports the
    /// full set of executed phases).
    pub fn apply_wire(&mut self, wire: TestStateWire, descriptors: &[PhaseDescriptor]) {
        if let Some(status) = wire.status.as_deref() {
            self.status = TestStatus::from_wire(status);
        }
        if let Some(plugs) = wire.plugs {
            self.plugs = plugs;
        }
        if let Some(record) = wire.test_record {
            if record.dut_id.is_some() {
                self.dut_id = record.dut_id;
            }
            if record.start_time_millis.is_some() {
                self.start_time_ms = record.start_time_millis;
            }
            if record.end_time_millis.is_some() {
                self.end_time_ms = record.end_time_millis;
            }
            if let Some(phases) = record.phases {
                self.phases = phases.into_iter().map(PhaseRecord::from_wire).collect();
            }
            if let Some(logs) = record.log_records {
                self.logs = logs
                    .into_iter()
                    .map(|l| LogRecord {
                        level: l.level.unwrap_or(0),
                        logger: l.logger_name.unwrap_or_default(),
                        message: l.message.unwrap_or_default(),
                        timestamp_ms: l.timestamp_millis,
                    })
                    .collect();
            }
        }
        self.synthesize_pending(descriptors);
        self.attachments = self
            .phases
            .iter()
            .flat_map(|p| p.attachments.iter().cloned())
            .collect();
    }

    /// Appends a `Pending` record for every declared phase that has not
    /// been reported yet, in declaration order.
    fn synthesize_pending(&mut self, descriptors: &[PhaseDescriptor]) {
        let mut declared: Vec<&PhaseDescriptor> = descriptors.iter().collect();
        declared.sort_by_key(|d| d.id);
        for descriptor in declared {
            if !self.phases.iter().any(|p| p.name == descriptor.name) {
                self.phases.push(PhaseRecord::pending(&descriptor.name));
            }
        }
    }
}

/// Lenient wire shape of one station stream frame.
#[derive(Debug, Clone, Deserialize)]
pub struct TestUpdateWire {
    pub test_uid: Option<String>,
    pub state: Option<TestStateWire>,
}

/// Nested test state as sent on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestStateWire {
    pub status: Option<String>,
    pub plugs: Option<BTreeMap<String, Value>>,
    pub test_record: Option<TestRecordWire>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestRecordWire {
    pub dut_id: Option<String>,
    pub start_time_millis: Option<i64>,
    pub end_time_millis: Option<i64>,
    pub phases: Option<Vec<PhaseWire>>,
    pub log_records: Option<Vec<LogWire>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhaseWire {
    pub name: Option<String>,
    pub outcome: Option<String>,
    pub start_time_millis: Option<i64>,
    pub end_time_millis: Option<i64>,
    pub measurements: Option<BTreeMap<String, MeasurementWire>>,
    pub attachments: Option<BTreeMap<String, AttachmentWire>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeasurementWire {
    pub outcome: Option<String>,
    pub measured_value: Option<Value>,
    pub units: Option<String>,
    pub validators: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachmentWire {
    pub mime_type: Option<String>,
    pub sha1: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogWire {
    pub level: Option<i32>,
    pub logger_name: Option<String>,
    pub message: Option<String>,
    pub timestamp_millis: Option<i64>,
}
