//! The dashboard data service.
//!
//! Subscribes to the aggregator's `/sub/dashboard` stream. Every frame is a
//! full snapshot: a JSON object keyed `"host:port"`, one entry per known
//! station. Entries are merged into existing records in place, new keys are
//! inserted, and keys absent from the snapshot are pruned.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::core::subscription::{RetryPolicy, Subscription, SubscriptionError};
use crate::core::transport::{Connector, Frame};
use crate::models::{Station, StationUpdate};

const LOCK_POISONED: &str = "Dashboard store lock poisoned";

type StationStore = Arc<Mutex<HashMap<String, Arc<Mutex<Station>>>>>;

/// Maintains the station-overview store on top of one `Subscription`.
pub struct DashboardService {
    subscription: Subscription,
    url: String,
    stations: StationStore,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl DashboardService {
    /// `base_url` is the aggregator's WebSocket base, e.g. `ws://host:port`.
    pub fn new(connector: Arc<dyn Connector>, base_url: &str) -> Self {
        Self {
            subscription: Subscription::new(connector),
            url: format!("{}/sub/dashboard", base_url.trim_end_matches('/')),
            stations: Arc::new(Mutex::new(HashMap::new())),
            listener: Mutex::new(None),
        }
    }

    /// Opens (or reopens) the dashboard stream. The store-feeding listener
    /// is attached once and survives resubscription, like the broadcast
    /// stream it reads from.
    pub fn subscribe(&self, retry: RetryPolicy) {
        let mut listener = self.listener.lock().expect(LOCK_POISONED);
        if listener.is_none() {
            let rx = self.subscription.messages();
            let stations = Arc::clone(&self.stations);
            *listener = Some(tokio::spawn(listen(rx, stations)));
        }
        drop(listener);
        self.subscription.subscribe_to_url(&self.url, retry);
    }

    /// Looks up one station record by its `"host:port"` key. The returned
    /// handle stays live across updates.
    pub fn station(&self, key: &str) -> Option<Arc<Mutex<Station>>> {
        self.stations.lock().expect(LOCK_POISONED).get(key).cloned()
    }

    /// A snapshot of the store, sorted by key for stable rendering.
    pub fn stations(&self) -> Vec<(String, Arc<Mutex<Station>>)> {
        let store = self.stations.lock().expect(LOCK_POISONED);
        let mut entries: Vec<_> = store
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    // --- Subscription pass-throughs ---

    /// True while the stream connection attempt is in flight.
    pub fn is_subscribing(&self) -> bool {
        self.subscription.is_subscribing()
    }

    /// True while the stream is down, whether or not a retry is scheduled.
    pub fn has_error(&self) -> bool {
        self.subscription.has_error()
    }

    /// Epoch milliseconds of the pending retry, for countdown rendering.
    pub fn retry_time_ms(&self) -> Option<i64> {
        self.subscription.retry_time_ms()
    }

    /// Manual reconnect, bypassing any backoff delay.
    pub fn refresh(&self) -> Result<(), SubscriptionError> {
        self.subscription.refresh()
    }

    /// Fires the scheduled retry immediately.
    pub fn retry_now(&self) -> Result<(), SubscriptionError> {
        self.subscription.retry_now()
    }

    /// Tears the stream down. The store keeps its last contents.
    pub fn unsubscribe(&self) {
        self.subscription.unsubscribe();
    }

    /// The underlying subscription, for consumers that want the raw stream.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

async fn listen(mut rx: broadcast::Receiver<Frame>, stations: StationStore) {
    loop {
        match rx.recv().await {
            Ok(frame) => apply_snapshot(&stations, &frame),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                log::warn!("dashboard listener lagged; {} snapshots dropped", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Validate → parse → apply for one snapshot frame.
fn apply_snapshot(stations: &Mutex<HashMap<String, Arc<Mutex<Station>>>>, frame: &str) {
    let parsed: serde_json::Value = match serde_json::from_str(frame) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("dropping malformed dashboard frame: {}", e);
            return;
        }
    };
    let Some(entries) = parsed.as_object() else {
        log::warn!("dropping dashboard frame: expected a keyed object");
        return;
    };

    let mut store = stations.lock().expect(LOCK_POISONED);

    // The frame is a full snapshot: anything it does not mention is gone.
    store.retain(|key, _| entries.contains_key(key));

    for (key, raw) in entries {
        let update: StationUpdate = match serde_json::from_value(raw.clone()) {
            Ok(u) => u,
            Err(e) => {
                log::warn!("dropping dashboard entry '{}': {}", key, e);
                continue;
            }
        };
        if let Some(existing) = store.get(key).cloned() {
            existing
                .lock()
                .expect("Station record lock poisoned")
                .merge_from(update);
        } else if let Some(station) = Station::from_update(update) {
            log::debug!("station '{}' appeared", key);
            store.insert(key.clone(), Arc::new(Mutex::new(station)));
        } else {
            log::warn!("dropping dashboard entry '{}': missing identity fields", key);
        }
    }
}
