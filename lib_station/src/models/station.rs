//! Station records shown in the dashboard overview.

use serde::{Deserialize, Serialize};

/// Reachability of a station as reported by the dashboard stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StationStatus {
    /// The backend answered the dashboard's last probe.
    Online,
    /// The backend did not answer.
    Unreachable,
    /// Status string the dashboard did not recognize.
    Unknown,
}

impl StationStatus {
    /// Maps the wire status string onto the enum.
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "ONLINE" => StationStatus::Online,
            "UNREACHABLE" => StationStatus::Unreachable,
            other => {
                log::debug!("unrecognized station status '{}'", other);
                StationStatus::Unknown
            }
        }
    }
}

/// One test station as known to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub station_id: String,
    pub host: String,
    pub port: u16,
    pub status: StationStatus,
    pub cell: Option<String>,
    pub test_description: Option<String>,
    pub test_run_id: Option<String>,
}

/// Lenient wire shape of one dashboard snapshot entry.
#[derive(Debug, Clone, Deserialize)]
pub struct StationUpdate {
    pub station_id: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub status: Option<String>,
    pub cell: Option<String>,
    pub test_description: Option<String>,
    pub test_run_id: Option<String>,
}

impl Station {
    /// Builds a fresh record from a snapshot entry. Entries missing the
    /// identifying fields are rejected; everything else defaults.
    pub fn from_update(update: StationUpdate) -> Option<Self> {
        Some(Self {
            station_id: update.station_id?,
            host: update.host?,
            port: update.port?,
            status: update
                .status
                .as_deref()
                .map(StationStatus::from_wire)
                .unwrap_or(StationStatus::Unknown),
            cell: update.cell,
            test_description: update.test_description,
            test_run_id: update.test_run_id,
        })
    }

    /// The store key for this station.
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Field-by-field merge. Fields absent in the update keep their
    /// previous value so a partial entry never blanks a populated record.
    pub fn merge_from(&mut self, update: StationUpdate) {
        if let Some(station_id) = update.station_id {
            self.station_id = station_id;
        }
        if let Some(host) = update.host {
            self.host = host;
        }
        if let Some(port) = update.port {
            self.port = port;
        }
        if let Some(status) = update.status.as_deref() {
            self.status = StationStatus::from_wire(status);
        }
        if update.cell.is_some() {
            self.cell = update.cell;
        }
        if update.test_description.is_some() {
            self.test_description = update.test_description;
        }
        if update.test_run_id.is_some() {
            self.test_run_id = update.test_run_id;
        }
    }
}
